//! Parsing of operator input: episode ranges, direct links and video type
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use url::Url;

/// Path segments that never name a title
const GENERIC_SEGMENTS: [&str; 3] = ["watch", "anime", "video"];

/// Widest range accepted in one batch
pub const MAX_EPISODE_SPAN: u32 = 10_000;

/// Audio track flavour of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoType {
    Sub,
    Dub,
}

impl VideoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoType::Sub => "sub",
            VideoType::Dub => "dub",
        }
    }
}

impl fmt::Display for VideoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sub" => Ok(VideoType::Sub),
            "dub" => Ok(VideoType::Dub),
            other => Err(anyhow!("Unknown video type: {}", other)),
        }
    }
}

/// Parse `"5"` or `"1-5"` into episode numbers. Anything else, including a range wider
/// than [`MAX_EPISODE_SPAN`], yields an empty list.
pub fn parse_episode_range(text: &str) -> Vec<u32> {
    let text = text.trim();

    let Some((start, end)) = text.split_once('-') else {
        return match parse_episode(text) {
            Some(episode) => vec![episode],
            None => Vec::new(),
        };
    };

    match (parse_episode(start), parse_episode(end)) {
        (Some(start), Some(end)) if start <= end => {
            if end - start >= MAX_EPISODE_SPAN {
                warn!("Episode range {}-{} exceeds {} episodes", start, end, MAX_EPISODE_SPAN);
                return Vec::new();
            }
            (start..=end).collect()
        }
        _ => Vec::new(),
    }
}

fn parse_episode(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse::<u32>().ok().filter(|episode| *episode > 0)
}

/// Derive a directory-safe title name from a catalog link
pub fn extract_anime_name(link: &str) -> String {
    match Url::parse(link) {
        Ok(url) => url
            .path_segments()
            .and_then(|segments| {
                segments
                    .rev()
                    .find(|segment| !segment.is_empty() && !GENERIC_SEGMENTS.contains(segment))
            })
            .map(|segment| segment.replace('-', "_"))
            .unwrap_or_else(|| "anime".to_string()),
        Err(e) => {
            warn!("URL parse failed for {}: {}", link, e);
            "anime".to_string()
        }
    }
}

/// Strip any episode fragment and append the `ep=` marker, so `base + N` addresses episode N
pub fn extract_base_url(link: &str) -> String {
    let link = link.trim();
    let base = match link.find("#ep") {
        Some(pos) => &link[..pos],
        None => link,
    };
    let separator = if base.contains('#') { "" } else { "#" };
    format!("{}{}ep=", base, separator)
}

/// Episode page URL for a base produced by [`extract_base_url`]
pub fn episode_url(base_url: &str, episode: u32) -> String {
    format!("{}{}", base_url, episode)
}
