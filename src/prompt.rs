//! Operator-facing selection surface.
//!
//! The batch logic only sees [`Operator`]; the terminal implementation is one of many.

use anyhow::Result;
use crossterm::cursor::{MoveTo, MoveToColumn};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Print, PrintStyledContent, Stylize};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{execute, queue};
use std::io::{self, BufRead, Write};

/// Interactive choices made by the person running the batch
pub trait Operator: Send {
    /// Pick one entry of an ordered list. `None` means cancelled.
    fn choose(&mut self, prompt: &str, labels: &[String]) -> Result<Option<usize>>;

    /// Pick one of a handful of inline options. `None` means cancelled.
    fn toggle(&mut self, prompt: &str, options: &[&str]) -> Result<Option<usize>>;

    /// Free-text answer
    fn ask(&mut self, prompt: &str) -> Result<String>;
}

/// Arrow-key menus on the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalOperator;

impl TerminalOperator {
    pub fn new() -> Self {
        Self
    }
}

/// Restores cooked mode on every exit path
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

enum MenuKey {
    Previous,
    Next,
    Accept,
    Cancel,
    Other,
}

fn read_menu_key() -> Result<MenuKey> {
    loop {
        if let Event::Key(KeyEvent { code, modifiers, kind, .. }) = event::read()? {
            if kind != KeyEventKind::Press {
                continue;
            }
            return Ok(match code {
                KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => MenuKey::Cancel,
                KeyCode::Esc => MenuKey::Cancel,
                KeyCode::Enter => MenuKey::Accept,
                KeyCode::Up | KeyCode::Left => MenuKey::Previous,
                KeyCode::Down | KeyCode::Right => MenuKey::Next,
                _ => MenuKey::Other,
            });
        }
    }
}

fn capitalize(option: &str) -> String {
    let mut chars = option.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn render_list(out: &mut impl Write, prompt: &str, labels: &[String], current: usize) -> Result<()> {
    queue!(
        out,
        MoveTo(0, 0),
        Clear(ClearType::All),
        PrintStyledContent(format!("[?] {}", prompt).cyan().bold()),
        PrintStyledContent(" (Use Arrows, Enter, Esc to cancel)".dark_grey()),
        Print("\r\n\r\n")
    )?;
    for (index, label) in labels.iter().enumerate() {
        if index == current {
            queue!(out, PrintStyledContent(format!(" > {} ", label).black().on_cyan().bold()))?;
        } else {
            queue!(out, PrintStyledContent(format!("   {} ", label).dim()))?;
        }
        queue!(out, Print("\r\n"))?;
    }
    out.flush()?;
    Ok(())
}

fn render_toggle(out: &mut impl Write, prompt: &str, options: &[&str], current: usize) -> Result<()> {
    queue!(
        out,
        MoveToColumn(0),
        Clear(ClearType::CurrentLine),
        PrintStyledContent("[?] ".cyan().bold()),
        Print(format!("{} ", prompt))
    )?;
    for (index, option) in options.iter().enumerate() {
        let formatted = format!(" {} ", capitalize(option));
        if index == current {
            queue!(out, PrintStyledContent(formatted.black().on_cyan().bold()))?;
        } else {
            queue!(out, PrintStyledContent(formatted.dim()))?;
        }
        queue!(out, Print(" "))?;
    }
    out.flush()?;
    Ok(())
}

impl Operator for TerminalOperator {
    fn choose(&mut self, prompt: &str, labels: &[String]) -> Result<Option<usize>> {
        if labels.is_empty() {
            return Ok(None);
        }

        let mut out = io::stdout();
        let guard = RawModeGuard::enable()?;
        let mut current = 0;

        let choice = loop {
            render_list(&mut out, prompt, labels, current)?;
            match read_menu_key()? {
                MenuKey::Previous => current = current.saturating_sub(1),
                MenuKey::Next => current = (current + 1).min(labels.len() - 1),
                MenuKey::Accept => break Some(current),
                MenuKey::Cancel => break None,
                MenuKey::Other => {}
            }
        };

        drop(guard);
        execute!(out, MoveTo(0, 0), Clear(ClearType::All))?;
        Ok(choice)
    }

    fn toggle(&mut self, prompt: &str, options: &[&str]) -> Result<Option<usize>> {
        if options.is_empty() {
            return Ok(None);
        }

        let mut out = io::stdout();
        let guard = RawModeGuard::enable()?;
        let mut current = 0;

        let choice = loop {
            render_toggle(&mut out, prompt, options, current)?;
            match read_menu_key()? {
                MenuKey::Previous => current = current.saturating_sub(1),
                MenuKey::Next => current = (current + 1).min(options.len() - 1),
                MenuKey::Accept => break Some(current),
                MenuKey::Cancel => break None,
                MenuKey::Other => {}
            }
        };

        drop(guard);
        execute!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        if let Some(index) = choice {
            execute!(
                out,
                PrintStyledContent("[SELECTED] ".green()),
                Print(format!("{} ", prompt)),
                PrintStyledContent(capitalize(options[index]).cyan().bold()),
                Print("\n")
            )?;
        }
        Ok(choice)
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        let mut out = io::stdout();
        execute!(out, PrintStyledContent("[?] ".cyan().bold()), Print(prompt))?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("sub"), "Sub");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_render_list_marks_current() {
        let mut buffer = Vec::new();
        let labels = vec!["Auto (Master)".to_string(), "1080p".to_string()];
        render_list(&mut buffer, "Select video quality", &labels, 1).unwrap();

        let rendered = String::from_utf8_lossy(&buffer);
        assert!(rendered.contains(" > 1080p "));
        assert!(rendered.contains("   Auto (Master) "));
    }
}
