//! Catalog title search over the site's HTML listing
use anyhow::{anyhow, Result};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::manifest::HttpFetch;

const MAX_TITLE_WIDTH: usize = 80;

/// One entry of the catalog's search listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    /// Subbed episode count badge
    pub sub: Option<String>,
    /// Dubbed episode count badge
    pub dub: Option<String>,
}

impl SearchResult {
    /// Menu label: title truncated to a fixed width plus episode badges
    pub fn label(&self) -> String {
        let title = if self.title.chars().count() > MAX_TITLE_WIDTH {
            let cut: String = self.title.chars().take(MAX_TITLE_WIDTH - 3).collect();
            format!("{}...", cut)
        } else {
            self.title.clone()
        };

        let mut badges = Vec::new();
        if let Some(sub) = &self.sub {
            badges.push(format!("CC {}", sub));
        }
        if let Some(dub) = &self.dub {
            badges.push(format!("DUB {}", dub));
        }

        if badges.is_empty() {
            title
        } else {
            format!("{:<width$}  {}", title, badges.join(" "), width = MAX_TITLE_WIDTH)
        }
    }
}

pub struct CatalogSearch<F: HttpFetch> {
    fetcher: F,
    search_url: String,
}

impl<F: HttpFetch> CatalogSearch<F> {
    pub fn new(fetcher: F, search_url: &str) -> Self {
        Self {
            fetcher,
            search_url: search_url.to_string(),
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(anyhow!("Search query cannot be empty."));
        }

        info!("🔍 Query: \"{}\"", query);
        let url = format!("{}{}", self.search_url, urlencoding::encode(query));
        let html = self.fetcher.get_text(&url).await?;
        let results = parse_search_results(&url, &html)?;

        if results.is_empty() {
            warn!("⚠️ No results found.");
        } else {
            info!("📚 Found {} result(s)", results.len());
        }
        Ok(results)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {}: {:?}", css, e))
}

fn element_text(element: scraper::ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Extract listing items. Items without both a poster link and a title are skipped.
pub fn parse_search_results(page_url: &str, html: &str) -> Result<Vec<SearchResult>> {
    let base = Url::parse(page_url)?;
    let document = Html::parse_document(html);

    let item_selector = selector("div.aitem")?;
    let poster_selector = selector("a.poster")?;
    let title_selector = selector("a.title")?;
    let sub_selector = selector("span.sub")?;
    let dub_selector = selector("span.dub")?;

    let mut results = Vec::new();
    for item in document.select(&item_selector) {
        let (Some(poster), Some(title)) = (
            item.select(&poster_selector).next(),
            item.select(&title_selector).next(),
        ) else {
            debug!("Skipping listing item without poster or title");
            continue;
        };

        let href = poster.value().attr("href").unwrap_or_default();
        let url = match base.join(href) {
            Ok(url) => url.to_string(),
            Err(e) => {
                debug!("Skipping listing item with bad link {}: {}", href, e);
                continue;
            }
        };

        let title = element_text(title);
        let badge = |sel: &Selector| {
            item.select(sel)
                .next()
                .map(element_text)
                .filter(|text| !text.is_empty())
        };

        results.push(SearchResult {
            title: if title.is_empty() { "Unknown Title".to_string() } else { title },
            url,
            sub: badge(&sub_selector),
            dub: badge(&dub_selector),
        });
    }

    Ok(results)
}
