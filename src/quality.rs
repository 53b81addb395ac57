use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{info, warn};

use crate::prompt::Operator;

/// Label of the synthetic variant pointing at the master playlist
pub const AUTO_LABEL: &str = "Auto (Master)";

/// Text identifying the Auto variant during fallback
pub const AUTO_SENTINEL: &str = "Auto";

pub const UNKNOWN_LABEL: &str = "Unknown";

/// One selectable rendition of an episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityVariant {
    pub url: String,
    pub label: String,
}

impl QualityVariant {
    pub fn new(url: &str, label: &str) -> Self {
        Self {
            url: url.to_string(),
            label: label.to_string(),
        }
    }

    pub fn is_auto(&self) -> bool {
        self.label.contains(AUTO_SENTINEL)
    }

    /// Leading digits of the label, e.g. 1080 for "1080p"
    fn height(&self) -> Option<u32> {
        let digits: String = self.label.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
}

/// Auto first, then descending resolution, unparsable labels last; ties keep input order
pub fn sort_variants(variants: &mut [QualityVariant]) {
    variants.sort_by(|a, b| match (a.is_auto(), b.is_auto()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => match (a.height(), b.height()) {
            (Some(ha), Some(hb)) => hb.cmp(&ha),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    });
}

/// How a subsequent episode's variant was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Preferred,
    AutoFallback,
    FirstFallback,
}

impl Resolution {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Resolution::Preferred)
    }
}

/// Establishes the batch's quality preference and applies it to later episodes
#[derive(Debug, Clone, Default)]
pub struct QualityNegotiator;

impl QualityNegotiator {
    pub fn new() -> Self {
        Self
    }

    /// Ask the operator to pick a quality. `None` means the operator cancelled.
    pub fn select_initial(
        &self,
        operator: &mut dyn Operator,
        variants: &[QualityVariant],
    ) -> Result<Option<QualityVariant>> {
        let mut sorted = variants.to_vec();
        sort_variants(&mut sorted);

        let labels: Vec<String> = sorted.iter().map(|v| v.label.clone()).collect();
        let choice = operator.choose("Select video quality", &labels)?;

        Ok(choice.and_then(|index| sorted.get(index).cloned()))
    }

    /// Exact label match, else the Auto variant, else the first entry.
    /// Returns `None` only for an empty variant list.
    pub fn resolve(
        &self,
        preference: &str,
        variants: &[QualityVariant],
    ) -> Option<(QualityVariant, Resolution)> {
        if let Some(variant) = variants.iter().find(|v| v.label == preference) {
            info!("✅ Selected preferred quality: {}", variant.label);
            return Some((variant.clone(), Resolution::Preferred));
        }

        let (variant, resolution) = match variants.iter().find(|v| v.is_auto()) {
            Some(auto) => (auto, Resolution::AutoFallback),
            None => (variants.first()?, Resolution::FirstFallback),
        };
        warn!("⚠️ {} unavailable. Fallback: {}", preference, variant.label);
        Some((variant.clone(), resolution))
    }
}
