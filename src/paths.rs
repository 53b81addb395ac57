use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::input::VideoType;

/// Per-title directory layout: `<root>/<anime>/downloads/subs`
#[derive(Debug, Clone)]
pub struct DownloadLayout {
    anime_name: String,
    anime_dir: PathBuf,
    downloads_dir: PathBuf,
    subs_dir: PathBuf,
}

impl DownloadLayout {
    pub fn new(output_root: &Path, anime_name: &str) -> Self {
        let anime_dir = output_root.join(anime_name);
        let downloads_dir = anime_dir.join("downloads");
        let subs_dir = downloads_dir.join("subs");

        Self {
            anime_name: anime_name.to_string(),
            anime_dir,
            downloads_dir,
            subs_dir,
        }
    }

    /// Create every directory of the layout. Safe to repeat.
    pub async fn ensure(&self) -> Result<()> {
        for dir in [&self.anime_dir, &self.downloads_dir, &self.subs_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        debug!("📁 Directories ready under {}", self.anime_dir.display());
        Ok(())
    }

    pub fn anime_dir(&self) -> &Path {
        &self.anime_dir
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    pub fn subs_dir(&self) -> &Path {
        &self.subs_dir
    }

    pub fn filename_base(&self, episode: u32, video_type: VideoType) -> String {
        filename_base(&self.anime_name, episode, video_type)
    }
}

/// `{anime}_ep{N}_{type}` with whitespace runs folded to `_` and the name lowercased
pub fn filename_base(anime_name: &str, episode: u32, video_type: VideoType) -> String {
    let safe_name = anime_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();
    format!("{}_ep{}_{}", safe_name, episode, video_type)
}

/// 1-based subtitle track filename
pub fn subtitle_filename(filename_base: &str, index: usize) -> String {
    format!("{}_sub{}.vtt", filename_base, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filename_base_is_stable() {
        let a = filename_base("Frieren Beyond", 3, VideoType::Sub);
        let b = filename_base("  frieren   BEYOND ", 3, VideoType::Sub);
        assert_eq!(a, "frieren_beyond_ep3_sub");
        assert_eq!(a, b);
        assert_eq!(filename_base("one_piece", 1000, VideoType::Dub), "one_piece_ep1000_dub");
    }

    #[test]
    fn test_subtitle_filename() {
        assert_eq!(subtitle_filename("foo_ep1_dub", 2), "foo_ep1_dub_sub2.vtt");
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DownloadLayout::new(temp_dir.path(), "foo");

        layout.ensure().await.unwrap();
        layout.ensure().await.unwrap();

        assert!(layout.subs_dir().is_dir());
        assert_eq!(layout.downloads_dir(), temp_dir.path().join("foo").join("downloads"));

        let entries: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let downloads: Vec<_> = std::fs::read_dir(layout.anime_dir()).unwrap().collect();
        assert_eq!(downloads.len(), 1);
    }
}
