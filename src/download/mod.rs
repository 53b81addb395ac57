pub mod progress;

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::DownloadError;
use progress::{parse_percentage, ProgressBar};

/// Proof that the segment-download tool answered its version query.
/// Only [`SegmentTool::detect`] can build one, so holding it means the check ran.
#[derive(Debug, Clone)]
pub struct SegmentTool {
    program: String,
    version: String,
}

impl SegmentTool {
    pub async fn detect(program: &str, install_hint: &str) -> Result<Self, DownloadError> {
        let missing = || DownloadError::ToolMissing {
            tool: program.to_string(),
            hint: install_hint.to_string(),
        };

        let output = Command::new(program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|_| missing())?;

        if !output.status.success() {
            return Err(missing());
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        info!("🔧 Found {} {}", program, version);

        Ok(Self {
            program: program.to_string(),
            version,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Fetches one stream into a file
#[async_trait]
pub trait StreamDownloader: Send + Sync {
    async fn download(
        &self,
        stream_url: &str,
        output_dir: &Path,
        filename_base: &str,
    ) -> Result<(), DownloadError>;
}

/// Runs the segment-download tool and turns its chatter into a progress bar
pub struct DownloadSupervisor {
    tool: SegmentTool,
    referer: String,
    user_agent: String,
}

impl DownloadSupervisor {
    pub fn new(tool: SegmentTool, referer: &str, user_agent: &str) -> Self {
        Self {
            tool,
            referer: referer.to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    fn command(&self, stream_url: &str, output_dir: &Path, filename_base: &str) -> Command {
        let mut cmd = Command::new(self.tool.program());
        cmd.arg(stream_url)
            .arg("-H")
            .arg(format!("Referer: {}", self.referer))
            .arg("-H")
            .arg(format!("User-Agent: {}", self.user_agent))
            .arg("--save-name")
            .arg(filename_base)
            .arg("--save-dir")
            .arg(output_dir)
            .arg("--auto-select")
            .arg("--no-log")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

/// Forward raw output chunks; progress redraws use `\r`, so lines are not a usable unit
fn forward_chunks<R>(mut reader: R, chunks: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if chunks.send(chunk).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

#[async_trait]
impl StreamDownloader for DownloadSupervisor {
    async fn download(
        &self,
        stream_url: &str,
        output_dir: &Path,
        filename_base: &str,
    ) -> Result<(), DownloadError> {
        info!("⬇️ Downloading: {}.mp4", filename_base);

        let mut child = self
            .command(stream_url, output_dir, filename_base)
            .spawn()
            .map_err(|source| DownloadError::Spawn {
                tool: self.tool.program().to_string(),
                source,
            })?;

        let (tx, mut chunks) = mpsc::channel::<String>(64);
        if let Some(stdout) = child.stdout.take() {
            forward_chunks(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_chunks(stderr, tx.clone());
        }
        drop(tx);

        let mut bar = ProgressBar::stderr();
        while let Some(chunk) = chunks.recv().await {
            match parse_percentage(&chunk) {
                Some(percent) => bar.update(percent),
                None => debug!("{}: {}", self.tool.program(), chunk.trim_end()),
            }
        }

        let status = child.wait().await?;
        bar.finish(status.success());

        if status.success() {
            info!("✅ Finished: {}.mp4", filename_base);
            Ok(())
        } else {
            Err(DownloadError::Failed {
                filename: filename_base.to_string(),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // `sh` receives the stream URL as its script path, so the fake tool is a plain script.
    fn shell_tool() -> SegmentTool {
        SegmentTool {
            program: "sh".to_string(),
            version: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_tool_is_reported() {
        let err = SegmentTool::detect("definitely-not-a-real-downloader", "cargo install it")
            .await
            .unwrap_err();
        match err {
            DownloadError::ToolMissing { tool, hint } => {
                assert_eq!(tool, "definitely-not-a-real-downloader");
                assert_eq!(hint, "cargo install it");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_successful_download() {
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("ok.sh");
        std::fs::write(
            &script,
            "printf '12.5%%\\r'\nprintf 'merging\\n' >&2\nprintf '99%%\\n'\n\
             test \"$6\" = foo_ep1_sub || exit 3\nexit 0\n",
        )
        .unwrap();

        let supervisor = DownloadSupervisor::new(shell_tool(), "https://x/", "Mozilla/5.0");
        let result = supervisor
            .download(script.to_str().unwrap(), temp_dir.path(), "foo_ep1_sub")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_with_filename() {
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("fail.sh");
        std::fs::write(&script, "printf '40%%\\n'\nexit 1\n").unwrap();

        let supervisor = DownloadSupervisor::new(shell_tool(), "https://x/", "Mozilla/5.0");
        let err = supervisor
            .download(script.to_str().unwrap(), temp_dir.path(), "foo_ep2_sub")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Failed { ref filename } if filename == "foo_ep2_sub"));
    }
}
