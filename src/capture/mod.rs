//! Manifest capture through passive observation of a browser session's requests
//!
//! The browser forwards every outgoing request URL onto a channel. A collector task
//! classifies them until the settle interval ends, then hands back an immutable snapshot.

#[cfg(feature = "browser")]
pub mod chrome;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::input::VideoType;

/// Marker present in every manifest request
pub const MANIFEST_MARKER: &str = ".m3u8";

/// Sender half handed to the browser for observed request URLs
pub type RequestSink = mpsc::UnboundedSender<String>;

/// One live browser page, exclusively owned by a single extraction
#[async_trait]
pub trait BrowserSession: Send {
    /// Forward every outgoing request URL to `sink`, letting the request proceed untouched
    async fn observe_requests(&mut self, sink: RequestSink) -> Result<()>;

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()>;

    async fn click(&mut self, selector: &str) -> Result<()>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens fresh browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Request URLs captured during one extraction, in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedUrls {
    manifests: Vec<String>,
    subtitles: Vec<String>,
}

impl CapturedUrls {
    pub fn manifests(&self) -> &[String] {
        &self.manifests
    }

    pub fn subtitles(&self) -> &[String] {
        &self.subtitles
    }

    pub fn into_subtitles(self) -> Vec<String> {
        self.subtitles
    }
}

/// Accumulates classified URLs with set semantics
#[derive(Default)]
struct UrlCollector {
    seen: HashSet<String>,
    urls: CapturedUrls,
}

impl UrlCollector {
    fn observe(&mut self, url: String) {
        if self.seen.contains(&url) {
            return;
        }
        if url.contains(MANIFEST_MARKER) {
            debug!("Captured manifest candidate: {}", url);
            self.seen.insert(url.clone());
            self.urls.manifests.push(url);
        } else if is_subtitle_url(&url) {
            debug!("Captured subtitle track: {}", url);
            self.seen.insert(url.clone());
            self.urls.subtitles.push(url);
        }
    }
}

pub fn is_subtitle_url(url: &str) -> bool {
    url.contains("/subs/") && url.ends_with(".vtt")
}

/// Drives a browser session long enough to see the player's manifest requests
pub struct ManifestCapture {
    launcher: Arc<dyn BrowserLauncher>,
    config: BrowserConfig,
}

impl ManifestCapture {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: BrowserConfig) -> Self {
        Self { launcher, config }
    }

    /// Load `url`, pick the requested tab and return every manifest and subtitle URL seen.
    /// The session is closed before returning, on success and on error.
    pub async fn capture(&self, url: &str, video_type: VideoType) -> Result<CapturedUrls> {
        info!("🌐 Launching browser...");
        let mut session = self.launcher.launch().await?;

        let (sink, mut requests) = mpsc::unbounded_channel::<String>();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let collector = tokio::spawn(async move {
            let mut collector = UrlCollector::default();
            loop {
                tokio::select! {
                    maybe_url = requests.recv() => match maybe_url {
                        Some(url) => collector.observe(url),
                        None => break,
                    },
                    _ = &mut stop_rx => {
                        while let Ok(url) = requests.try_recv() {
                            collector.observe(url);
                        }
                        break;
                    }
                }
            }
            collector.urls
        });

        let driven = self.drive(session.as_mut(), sink, url, video_type).await;
        let _ = stop_tx.send(());

        if let Err(e) = session.close().await {
            warn!("Browser close failed: {}", e);
        }

        driven?;
        let urls = collector
            .await
            .map_err(|e| anyhow!("Request collector stopped unexpectedly: {}", e))?;

        info!(
            "📡 Captured {} manifest candidate(s), {} subtitle track(s)",
            urls.manifests.len(),
            urls.subtitles.len()
        );
        Ok(urls)
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        sink: RequestSink,
        url: &str,
        video_type: VideoType,
    ) -> Result<()> {
        session.observe_requests(sink).await?;

        debug!("Navigating to: {}", url);
        session
            .navigate(url, self.config.navigation_timeout())
            .await
            .with_context(|| format!("Navigation to {} failed", url))?;

        let tab_selector = self.config.tab_selector.replace("{type}", video_type.as_str());
        debug!("Selecting '{}' tab...", video_type);
        let clicked = match session
            .wait_for_selector(&tab_selector, self.config.tab_wait_timeout())
            .await
        {
            Ok(()) => session.click(&tab_selector).await,
            Err(e) => Err(e),
        };
        match clicked {
            Ok(()) => debug!("Clicked '{}' tab.", video_type),
            Err(e) => warn!("⚠️ '{}' tab not found or clickable: {}", video_type, e),
        }

        debug!("Waiting {:?} for stream detection...", self.config.settle());
        tokio::time::sleep(self.config.settle()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedSession {
        sink: Option<RequestSink>,
        requests: Vec<String>,
        has_tab: bool,
        fail_navigation: bool,
        closed: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl BrowserSession for ScriptedSession {
        async fn observe_requests(&mut self, sink: RequestSink) -> Result<()> {
            self.sink = Some(sink);
            Ok(())
        }

        async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<()> {
            if self.fail_navigation {
                return Err(anyhow!("timeout of 25000ms exceeded"));
            }
            if let Some(sink) = &self.sink {
                for request in &self.requests {
                    sink.send(request.clone()).unwrap();
                }
            }
            Ok(())
        }

        async fn wait_for_selector(&mut self, selector: &str, _timeout: Duration) -> Result<()> {
            if self.has_tab {
                Ok(())
            } else {
                Err(anyhow!("no element matches {}", selector))
            }
        }

        async fn click(&mut self, _selector: &str) -> Result<()> {
            Ok(())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    struct ScriptedLauncher {
        requests: Vec<String>,
        has_tab: bool,
        fail_navigation: bool,
        closed: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl BrowserLauncher for ScriptedLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
            Ok(Box::new(ScriptedSession {
                sink: None,
                requests: self.requests.clone(),
                has_tab: self.has_tab,
                fail_navigation: self.fail_navigation,
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    fn capture_with(launcher: ScriptedLauncher) -> ManifestCapture {
        let config = BrowserConfig {
            settle_secs: 0,
            ..BrowserConfig::default()
        };
        ManifestCapture::new(Arc::new(launcher), config)
    }

    #[tokio::test]
    async fn test_classifies_and_deduplicates_requests() {
        let closed = Arc::new(Mutex::new(false));
        let capture = capture_with(ScriptedLauncher {
            requests: vec![
                "https://cdn.x/app.js".to_string(),
                "https://cdn.x/hls/list,abc.m3u8".to_string(),
                "https://cdn.x/subs/eng.vtt".to_string(),
                "https://cdn.x/hls/list,abc.m3u8".to_string(),
                "https://cdn.x/hls/720/index.m3u8".to_string(),
                "https://cdn.x/thumbs/sprite.vtt".to_string(),
            ],
            has_tab: true,
            fail_navigation: false,
            closed: Arc::clone(&closed),
        });

        let urls = capture.capture("https://x/watch/foo#ep=1", VideoType::Sub).await.unwrap();

        assert_eq!(
            urls.manifests(),
            &[
                "https://cdn.x/hls/list,abc.m3u8".to_string(),
                "https://cdn.x/hls/720/index.m3u8".to_string(),
            ]
        );
        assert_eq!(urls.subtitles(), &["https://cdn.x/subs/eng.vtt".to_string()]);
        assert!(*closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_missing_tab_is_not_fatal() {
        let closed = Arc::new(Mutex::new(false));
        let capture = capture_with(ScriptedLauncher {
            requests: vec!["https://cdn.x/master.m3u8".to_string()],
            has_tab: false,
            fail_navigation: false,
            closed: Arc::clone(&closed),
        });

        let urls = capture.capture("https://x/watch/foo#ep=1", VideoType::Dub).await.unwrap();
        assert_eq!(urls.manifests().len(), 1);
    }

    #[tokio::test]
    async fn test_navigation_failure_closes_session() {
        let closed = Arc::new(Mutex::new(false));
        let capture = capture_with(ScriptedLauncher {
            requests: Vec::new(),
            has_tab: true,
            fail_navigation: true,
            closed: Arc::clone(&closed),
        });

        let result = capture.capture("https://x/watch/foo#ep=1", VideoType::Sub).await;
        assert!(result.is_err());
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_subtitle_pattern() {
        assert!(is_subtitle_url("https://cdn.x/subs/ep1/eng.vtt"));
        assert!(!is_subtitle_url("https://cdn.x/subs/eng.srt"));
        assert!(!is_subtitle_url("https://cdn.x/eng.vtt"));
    }
}
