//! Anime Downloader - Rust Implementation
//!
//! Finds a title on the catalog site, captures the HLS manifests its player requests,
//! and drives an external segment downloader across a range of episodes.

pub mod batch;
pub mod capture;
pub mod config;
pub mod download;
pub mod error;
pub mod input;
pub mod manifest;
pub mod paths;
pub mod prompt;
pub mod quality;
pub mod search;
pub mod subtitles;

// Re-export main types for easy access
pub use crate::batch::{BatchOrchestrator, BatchReport, BatchRequest, EpisodeExtractor, EpisodeReport, EpisodeStatus};
pub use crate::capture::{BrowserLauncher, BrowserSession, CapturedUrls, ManifestCapture};
pub use crate::config::Config;
pub use crate::download::{DownloadSupervisor, SegmentTool, StreamDownloader};
pub use crate::error::{BatchError, DownloadError};
pub use crate::input::VideoType;
pub use crate::manifest::{HttpClient, HttpFetch, ManifestParser};
pub use crate::paths::DownloadLayout;
pub use crate::prompt::{Operator, TerminalOperator};
pub use crate::quality::{QualityNegotiator, QualityVariant, Resolution};
pub use crate::search::{CatalogSearch, SearchResult};
pub use crate::subtitles::{SubtitleFetcher, SubtitleReport};

#[cfg(feature = "browser")]
pub use crate::capture::chrome::ChromeLauncher;
