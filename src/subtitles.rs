use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info};

use crate::paths::subtitle_filename;

/// Per-episode subtitle transfer totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleReport {
    pub fetched: usize,
    pub failed: usize,
}

/// Pulls captured subtitle tracks with an external transfer utility
#[derive(Debug, Clone)]
pub struct SubtitleFetcher {
    utility: String,
    enabled: bool,
}

impl SubtitleFetcher {
    pub fn new(utility: &str, enabled: bool) -> Self {
        Self {
            utility: utility.to_string(),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fetch every track concurrently. Individual failures are logged, never returned.
    pub async fn fetch_all(&self, urls: &[String], subs_dir: &Path, filename_base: &str) -> SubtitleReport {
        if !self.enabled || urls.is_empty() {
            return SubtitleReport::default();
        }

        info!("💬 Downloading {} subtitle track(s)...", urls.len());
        let transfers = urls.iter().enumerate().map(|(index, url)| {
            let filename = subtitle_filename(filename_base, index + 1);
            let path = subs_dir.join(&filename);
            async move {
                match self.fetch_one(url, &path).await {
                    Ok(()) => {
                        info!("✅ Downloaded subtitle: {}", filename);
                        true
                    }
                    Err(e) => {
                        error!("❌ Failed subtitle: {} ({})", filename, e);
                        false
                    }
                }
            }
        });

        let results = join_all(transfers).await;
        let fetched = results.iter().filter(|ok| **ok).count();
        SubtitleReport {
            fetched,
            failed: results.len() - fetched,
        }
    }

    async fn fetch_one(&self, url: &str, path: &Path) -> anyhow::Result<()> {
        let status = Command::new(&self.utility)
            .arg("-L")
            .arg(url)
            .arg("-o")
            .arg(path)
            .arg("--silent")
            .arg("--fail")
            .stdin(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(anyhow::anyhow!("{} exited with {}", self.utility, status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_disabled_fetcher_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = SubtitleFetcher::new("definitely-not-curl", false);
        let report = fetcher
            .fetch_all(&["https://cdn.x/subs/eng.vtt".to_string()], temp_dir.path(), "foo_ep1_dub")
            .await;
        assert_eq!(report, SubtitleReport::default());
    }

    #[tokio::test]
    async fn test_no_urls_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = SubtitleFetcher::new("definitely-not-curl", true);
        let report = fetcher.fetch_all(&[], temp_dir.path(), "foo_ep1_dub").await;
        assert_eq!(report, SubtitleReport::default());
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_siblings() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = SubtitleFetcher::new("definitely-not-curl", true);
        let urls = vec![
            "https://cdn.x/subs/eng.vtt".to_string(),
            "https://cdn.x/subs/spa.vtt".to_string(),
        ];
        let report = fetcher.fetch_all(&urls, temp_dir.path(), "foo_ep1_dub").await;
        assert_eq!(report, SubtitleReport { fetched: 0, failed: 2 });
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_transfers_are_counted() {
        let temp_dir = TempDir::new().unwrap();
        // `true` ignores its arguments and exits 0
        let fetcher = SubtitleFetcher::new("true", true);
        let urls = vec![
            "https://cdn.x/subs/eng.vtt".to_string(),
            "https://cdn.x/subs/spa.vtt".to_string(),
        ];
        let report = fetcher.fetch_all(&urls, temp_dir.path(), "foo_ep1_dub").await;
        assert_eq!(report, SubtitleReport { fetched: 2, failed: 0 });
    }
}
