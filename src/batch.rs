use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::capture::ManifestCapture;
use crate::download::StreamDownloader;
use crate::error::{is_transient, BatchError};
use crate::input::{episode_url, VideoType};
use crate::manifest::{HttpFetch, ManifestParser};
use crate::paths::DownloadLayout;
use crate::prompt::Operator;
use crate::quality::{QualityNegotiator, QualityVariant, Resolution};
use crate::subtitles::{SubtitleFetcher, SubtitleReport};

/// Everything the operator decided before the batch starts
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub anime_name: String,
    pub base_url: String,
    pub video_type: VideoType,
    pub episodes: Vec<u32>,
    pub output_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EpisodeStatus {
    Downloaded { quality: String, fallback: bool },
    Skipped { reason: String },
    Failed { reason: String, transient: bool },
}

/// Result of one episode of the batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeReport {
    pub episode: u32,
    pub status: EpisodeStatus,
    pub subtitles: SubtitleReport,
}

impl EpisodeReport {
    fn skipped(episode: u32, reason: &str) -> Self {
        Self {
            episode,
            status: EpisodeStatus::Skipped {
                reason: reason.to_string(),
            },
            subtitles: SubtitleReport::default(),
        }
    }

    fn failed(episode: u32, reason: String, transient: bool) -> Self {
        Self {
            episode,
            status: EpisodeStatus::Failed { reason, transient },
            subtitles: SubtitleReport::default(),
        }
    }

    pub fn is_downloaded(&self) -> bool {
        matches!(self.status, EpisodeStatus::Downloaded { .. })
    }
}

/// Overall batch results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub anime_name: String,
    pub video_type: VideoType,
    pub preferred_quality: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub episodes: Vec<EpisodeReport>,
}

impl BatchReport {
    fn new(request: &BatchRequest) -> Self {
        Self {
            anime_name: request.anime_name.clone(),
            video_type: request.video_type,
            preferred_quality: None,
            started_at: Utc::now(),
            finished_at: None,
            episodes: Vec::new(),
        }
    }

    pub fn successful(&self) -> usize {
        self.episodes.iter().filter(|e| e.is_downloaded()).count()
    }

    pub fn skipped(&self) -> usize {
        self.episodes
            .iter()
            .filter(|e| matches!(e.status, EpisodeStatus::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.episodes
            .iter()
            .filter(|e| matches!(e.status, EpisodeStatus::Failed { .. }))
            .count()
    }

    /// Write the report as pretty JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json_data = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json_data).await?;
        info!("💾 Batch report saved to: {}", path.display());
        Ok(())
    }
}

/// Variants and subtitle tracks found for one episode page
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub variants: Vec<QualityVariant>,
    pub subtitles: Vec<String>,
}

/// Manifest capture followed by master-playlist parsing
pub struct EpisodeExtractor<F: HttpFetch> {
    capture: ManifestCapture,
    parser: ManifestParser<F>,
}

impl<F: HttpFetch> EpisodeExtractor<F> {
    pub fn new(capture: ManifestCapture, parser: ManifestParser<F>) -> Self {
        Self { capture, parser }
    }

    pub async fn extract(&self, url: &str, video_type: VideoType) -> Result<Extraction> {
        info!("🚀 Extracting video streams...");
        let captured = self.capture.capture(url, video_type).await?;
        let variants = self.parser.resolve_variants(captured.manifests()).await?;

        Ok(Extraction {
            variants,
            subtitles: captured.into_subtitles(),
        })
    }
}

enum BatchState {
    AwaitingFirstEpisodeQuality,
    SteadyStateBatch { preference: String },
    Done,
}

/// Sequences extraction, quality negotiation and downloads across an episode range
pub struct BatchOrchestrator<F: HttpFetch> {
    extractor: EpisodeExtractor<F>,
    downloader: Arc<dyn StreamDownloader>,
    subtitles: SubtitleFetcher,
    negotiator: QualityNegotiator,
    pacing: Duration,
}

impl<F: HttpFetch> BatchOrchestrator<F> {
    pub fn new(
        extractor: EpisodeExtractor<F>,
        downloader: Arc<dyn StreamDownloader>,
        subtitles: SubtitleFetcher,
        pacing: Duration,
    ) -> Self {
        Self {
            extractor,
            downloader,
            subtitles,
            negotiator: QualityNegotiator::new(),
            pacing,
        }
    }

    /// Process every episode in order. Only an empty range, a first episode without
    /// streams, a failed first extraction or a cancelled quality choice end the batch early.
    pub async fn run(
        &self,
        request: &BatchRequest,
        operator: &mut dyn Operator,
    ) -> Result<BatchReport, BatchError> {
        if request.episodes.is_empty() {
            return Err(BatchError::InvalidEpisodeRange);
        }

        let layout = DownloadLayout::new(&request.output_root, &request.anime_name);
        let total = request.episodes.len();
        let mut episodes = request.episodes.iter().copied().enumerate();
        let mut report = BatchReport::new(request);
        let mut state = BatchState::AwaitingFirstEpisodeQuality;

        loop {
            state = match state {
                BatchState::AwaitingFirstEpisodeQuality => {
                    let Some((position, episode)) = episodes.next() else {
                        break;
                    };
                    info!(
                        "🔎 Checking qualities for Episode {} ({}/{})",
                        episode,
                        position + 1,
                        total
                    );

                    let url = episode_url(&request.base_url, episode);
                    let extraction = self
                        .extractor
                        .extract(&url, request.video_type)
                        .await
                        .map_err(BatchError::FirstEpisode)?;

                    if extraction.variants.is_empty() {
                        error!("❌ No streams found for first episode. Aborting.");
                        return Err(BatchError::NoStreamsForFirstEpisode);
                    }

                    let chosen = self
                        .negotiator
                        .select_initial(operator, &extraction.variants)
                        .map_err(BatchError::FirstEpisode)?
                        .ok_or(BatchError::QualitySelectionCancelled)?;

                    info!("✅ Preferred quality set to: {}", chosen.label);
                    report.preferred_quality = Some(chosen.label.clone());

                    let entry = self
                        .deliver_or_fail(request, &layout, episode, &chosen, Resolution::Preferred, &extraction.subtitles)
                        .await;
                    report.episodes.push(entry);

                    if position + 1 < total {
                        self.pace().await;
                        BatchState::SteadyStateBatch {
                            preference: chosen.label,
                        }
                    } else {
                        BatchState::Done
                    }
                }
                BatchState::SteadyStateBatch { preference } => match episodes.next() {
                    Some((position, episode)) => {
                        info!(
                            "📺 Processing {} Episode {} ({}/{})",
                            request.video_type.as_str().to_uppercase(),
                            episode,
                            position + 1,
                            total
                        );

                        let entry = match self.process_episode(request, &layout, episode, &preference).await {
                            Ok(entry) => entry,
                            Err(e) => Self::episode_failure(episode, e),
                        };
                        report.episodes.push(entry);

                        if position + 1 < total {
                            self.pace().await;
                        }
                        BatchState::SteadyStateBatch { preference }
                    }
                    None => BatchState::Done,
                },
                BatchState::Done => break,
            };
        }

        report.finished_at = Some(Utc::now());
        info!(
            "🎉 Batch finished: {} downloaded, {} skipped, {} failed",
            report.successful(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }

    async fn process_episode(
        &self,
        request: &BatchRequest,
        layout: &DownloadLayout,
        episode: u32,
        preference: &str,
    ) -> Result<EpisodeReport> {
        let url = episode_url(&request.base_url, episode);
        let extraction = self.extractor.extract(&url, request.video_type).await?;

        let Some((variant, resolution)) = self.negotiator.resolve(preference, &extraction.variants) else {
            warn!("⚠️ No streams found for Episode {}. Skipping.", episode);
            return Ok(EpisodeReport::skipped(episode, "No streams found"));
        };

        self.deliver(request, layout, episode, &variant, resolution, &extraction.subtitles)
            .await
    }

    async fn deliver_or_fail(
        &self,
        request: &BatchRequest,
        layout: &DownloadLayout,
        episode: u32,
        variant: &QualityVariant,
        resolution: Resolution,
        subtitles: &[String],
    ) -> EpisodeReport {
        match self
            .deliver(request, layout, episode, variant, resolution, subtitles)
            .await
        {
            Ok(entry) => entry,
            Err(e) => Self::episode_failure(episode, e),
        }
    }

    /// Stream download first, then every subtitle track joined before completion is reported
    async fn deliver(
        &self,
        request: &BatchRequest,
        layout: &DownloadLayout,
        episode: u32,
        variant: &QualityVariant,
        resolution: Resolution,
        subtitles: &[String],
    ) -> Result<EpisodeReport> {
        layout.ensure().await?;
        let filename_base = layout.filename_base(episode, request.video_type);

        self.downloader
            .download(&variant.url, layout.downloads_dir(), &filename_base)
            .await?;

        let subtitle_report = self
            .subtitles
            .fetch_all(subtitles, layout.subs_dir(), &filename_base)
            .await;

        info!("🎉 Download complete! Files located in: {}", layout.downloads_dir().display());

        Ok(EpisodeReport {
            episode,
            status: EpisodeStatus::Downloaded {
                quality: variant.label.clone(),
                fallback: resolution.is_fallback(),
            },
            subtitles: subtitle_report,
        })
    }

    fn episode_failure(episode: u32, e: anyhow::Error) -> EpisodeReport {
        let transient = is_transient(&e);
        if transient {
            warn!("⚠️ Network connection reset on Episode {} - continuing...", episode);
        } else {
            error!("❌ Failed Episode {}: {:#}", episode, e);
        }
        EpisodeReport::failed(episode, format!("{:#}", e), transient)
    }

    async fn pace(&self) {
        if self.pacing.is_zero() {
            return;
        }
        info!("⏳ Waiting {} seconds...", self.pacing.as_secs());
        tokio::time::sleep(self.pacing).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let request = BatchRequest {
            anime_name: "foo".to_string(),
            base_url: "https://x/anime/foo#ep=".to_string(),
            video_type: VideoType::Sub,
            episodes: vec![1, 2, 3],
            output_root: PathBuf::from("/tmp"),
        };
        let mut report = BatchReport::new(&request);
        report.episodes.push(EpisodeReport {
            episode: 1,
            status: EpisodeStatus::Downloaded {
                quality: "1080p".to_string(),
                fallback: false,
            },
            subtitles: SubtitleReport::default(),
        });
        report.episodes.push(EpisodeReport::skipped(2, "No streams found"));
        report.episodes.push(EpisodeReport::failed(3, "timeout".to_string(), false));

        assert_eq!(report.successful(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_status_serialization() {
        let status = EpisodeStatus::Downloaded {
            quality: "720p".to_string(),
            fallback: true,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "downloaded");
        assert_eq!(json["fallback"], true);
    }
}
