use anyhow::{anyhow, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::quality::{QualityVariant, AUTO_LABEL, UNKNOWN_LABEL};

const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF";

/// GET a URL and return its body as text
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String>;
}

/// reqwest-backed fetcher
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout_seconds: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }
}

#[async_trait]
impl HttpFetch for HttpClient {
    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP {} for {}", response.status(), url));
        }
        Ok(response.text().await?)
    }
}

/// Master playlists are served either as `master.m3u8` or under a `/list,` path
pub fn is_master_url(url: &str) -> bool {
    url.contains("/list,") || url.contains("master.m3u8")
}

pub fn select_master_url(candidates: &[String]) -> Option<&str> {
    candidates
        .iter()
        .map(String::as_str)
        .find(|url| is_master_url(url))
}

fn resolution_regex() -> &'static Regex {
    static RESOLUTION: OnceLock<Regex> = OnceLock::new();
    RESOLUTION.get_or_init(|| Regex::new(r"RESOLUTION=\d+x(\d+)").expect("valid resolution regex"))
}

/// Decode a master playlist into variants, the Auto entry first, then manifest order.
/// Stream entries whose URI line is missing or unresolvable are skipped.
pub fn parse_master_playlist(master_url: &str, content: &str) -> Result<Vec<QualityVariant>> {
    let base = Url::parse(master_url).map_err(|e| anyhow!("Invalid master URL {}: {}", master_url, e))?;
    let mut variants = vec![QualityVariant::new(master_url, AUTO_LABEL)];

    let lines: Vec<&str> = content.lines().map(str::trim).collect();
    for (index, line) in lines.iter().enumerate() {
        if !line.starts_with(STREAM_INF_TAG) {
            continue;
        }

        let label = resolution_regex()
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|height| height.as_str().parse::<u32>().ok())
            .map(|height| format!("{}p", height))
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());

        let Some(uri) = lines.get(index + 1).filter(|next| !next.is_empty() && !next.starts_with('#')) else {
            debug!("Skipping stream entry without URI at line {}", index + 1);
            continue;
        };

        match base.join(uri) {
            Ok(resolved) => variants.push(QualityVariant::new(resolved.as_str(), &label)),
            Err(e) => debug!("Skipping unresolvable variant URI {}: {}", uri, e),
        }
    }

    Ok(variants)
}

/// Turns captured manifest candidates into the list of selectable qualities
pub struct ManifestParser<F: HttpFetch> {
    fetcher: F,
}

impl<F: HttpFetch> ManifestParser<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// An empty result means no master playlist was captured
    pub async fn resolve_variants(&self, candidates: &[String]) -> Result<Vec<QualityVariant>> {
        let Some(master_url) = select_master_url(candidates) else {
            warn!("❌ Master playlist not found.");
            return Ok(Vec::new());
        };

        debug!("Parsing master playlist: {}", master_url);
        let content = self.fetcher.get_text(master_url).await?;
        let variants = parse_master_playlist(master_url, &content)?;

        info!("✅ Found {} qualities.", variants.len());
        Ok(variants)
    }
}
