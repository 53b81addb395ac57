use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use regex::Regex;
use std::io::{self, Write};
use std::sync::OnceLock;

const BAR_WIDTH: usize = 40;

fn percentage_regex() -> &'static Regex {
    static PERCENT: OnceLock<Regex> = OnceLock::new();
    PERCENT.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)%").expect("valid percentage regex"))
}

/// First `NN[.N]%` in a chunk of tool output, floored and clamped to 0..=100
pub fn parse_percentage(chunk: &str) -> Option<u8> {
    let caps = percentage_regex().captures(chunk)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.floor().clamp(0.0, 100.0) as u8)
}

/// Single-line progress bar, drawn lazily on the first update
pub struct ProgressBar<W: Write> {
    out: W,
    started: bool,
    current: u8,
}

impl ProgressBar<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> ProgressBar<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            started: false,
            current: 0,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn update(&mut self, percent: u8) {
        self.started = true;
        self.current = percent.min(100);
        self.draw();
    }

    /// Stop the display. A successful run that showed progress ends at 100%.
    pub fn finish(&mut self, success: bool) {
        if !self.started {
            return;
        }
        if success {
            self.update(100);
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    fn draw(&mut self) {
        let filled = BAR_WIDTH * self.current as usize / 100;
        let bar = format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));
        let _ = queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(format!("Progress |{}| {}%", bar, self.current))
        );
        let _ = self.out.flush();
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_percentage() {
        assert_eq!(parse_percentage("Vid 1080p | 45.7% | 3.2MB/s"), Some(45));
        assert_eq!(parse_percentage("12% done"), Some(12));
        assert_eq!(parse_percentage("100.00%"), Some(100));
        assert_eq!(parse_percentage("250%"), Some(100));
        assert_eq!(parse_percentage("no progress here"), None);
        assert_eq!(parse_percentage("3.5 % spaced"), None);
    }

    #[test]
    fn test_bar_is_lazy() {
        let mut bar = ProgressBar::new(Vec::new());
        bar.finish(true);
        assert!(!bar.is_started());
        assert!(bar.into_inner().is_empty());
    }

    #[test]
    fn test_success_finalizes_to_full() {
        let mut bar = ProgressBar::new(Vec::new());
        bar.update(42);
        assert_eq!(bar.current(), 42);
        bar.finish(true);
        assert_eq!(bar.current(), 100);

        let output = String::from_utf8(bar.into_inner()).unwrap();
        assert!(output.contains("42%"));
        assert!(output.contains(&format!("|{}| 100%", "#".repeat(BAR_WIDTH))));
    }

    #[test]
    fn test_failure_keeps_last_value() {
        let mut bar = ProgressBar::new(Vec::new());
        bar.update(61);
        bar.finish(false);
        assert_eq!(bar.current(), 61);
    }
}
