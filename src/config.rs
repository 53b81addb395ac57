use anyhow::{anyhow, Result};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the anime downloader
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog site endpoints and request identity
    pub site: SiteConfig,

    /// Browser session settings used for manifest capture
    pub browser: BrowserConfig,

    /// Segment-download tool settings
    pub download: DownloadConfig,

    /// Subtitle transfer settings
    pub subtitles: SubtitleConfig,

    /// Batch sequencing settings
    pub batch: BatchConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Search endpoint, the url-encoded keyword is appended
    pub search_url: String,

    /// Referer header sent to the segment-download tool
    pub referer: String,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run the browser without a window
    pub headless: bool,

    /// Extra launch flags
    pub args: Vec<String>,

    /// Page navigation timeout (seconds)
    pub navigation_timeout_secs: u64,

    /// How long to wait for the sub/dub tab (seconds)
    pub tab_wait_timeout_secs: u64,

    /// Settling interval for player initialisation (seconds)
    pub settle_secs: u64,

    /// Tab selector, `{type}` is replaced with sub or dub
    pub tab_selector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Segment-download executable
    pub tool: String,

    /// Remediation shown when the tool is missing
    pub install_hint: String,

    /// Root directory for all downloads
    pub output_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    /// Transfer utility used for subtitle tracks
    pub utility: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Delay between consecutive episodes (seconds)
    pub pacing_secs: u64,

    /// Write batch_report.json after each run
    pub save_report: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level for this crate
    pub level: String,
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn tab_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.tab_wait_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

impl BatchConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }
}

impl LoggingConfig {
    /// Env-filter directive covering both the library and the `anime-downloader` binary.
    /// `verbose` raises both to debug.
    pub fn filter_directive(&self, verbose: bool) -> String {
        let level = if verbose { "debug" } else { self.level.as_str() };
        format!("anime_downloader_rust={0},anime_downloader={0},warn", level)
    }
}

impl Config {
    /// Load configuration from the first config file found
    pub fn load() -> Result<Self> {
        let mut config_paths = vec![
            PathBuf::from("anime-downloader.toml"),
            PathBuf::from("config/anime-downloader.toml"),
        ];
        if let Some(dirs) = Self::project_dirs() {
            config_paths.push(dirs.config_dir().join("config.toml"));
        }

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read config {}: {}", path.display(), e))?;
        let config = toml::from_str(&config_str)
            .map_err(|e| anyhow!("Invalid config {}: {}", path.display(), e))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(output_dir) = std::env::var("ANIME_DL_OUTPUT_DIR") {
            config.download.output_root = PathBuf::from(output_dir);
        }

        if let Ok(tool) = std::env::var("ANIME_DL_TOOL") {
            config.download.tool = tool;
        }

        if let Ok(pacing) = std::env::var("ANIME_DL_PACING_SECS") {
            config.batch.pacing_secs = pacing.parse().unwrap_or(5);
        }

        if let Ok(log_level) = std::env::var("ANIME_DL_LOG_LEVEL") {
            config.logging.level = log_level;
        }

        if let Ok(headless) = std::env::var("ANIME_DL_HEADLESS") {
            config.browser.headless = matches!(headless.as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.download.tool.trim().is_empty() {
            return Err(anyhow!("download.tool must not be empty"));
        }

        if self.subtitles.utility.trim().is_empty() {
            return Err(anyhow!("subtitles.utility must not be empty"));
        }

        if !self.browser.tab_selector.contains("{type}") {
            return Err(anyhow!("browser.tab_selector must contain {{type}}"));
        }

        if self.browser.navigation_timeout_secs == 0 {
            return Err(anyhow!("navigation_timeout_secs must be greater than 0"));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Anime Downloader Configuration:\n\
            - Download Tool: {}\n\
            - Output Directory: {}\n\
            - Headless Browser: {}\n\
            - Settle Interval: {}s\n\
            - Episode Pacing: {}s",
            self.download.tool,
            self.download.output_root.display(),
            self.browser.headless,
            self.browser.settle_secs,
            self.batch.pacing_secs,
        )
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "anime-downloader")
    }

    fn default_output_root() -> PathBuf {
        UserDirs::new()
            .map(|dirs| dirs.home_dir().join("anime-downloads"))
            .unwrap_or_else(|| PathBuf::from("anime-downloads"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            browser: BrowserConfig::default(),
            download: DownloadConfig::default(),
            subtitles: SubtitleConfig::default(),
            batch: BatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            search_url: "https://animekai.to/browser?keyword=".to_string(),
            referer: "https://animekai.bz/".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            args: vec![
                "--no-sandbox".to_string(),
                "--disable-web-security".to_string(),
                "--disable-blink-features=AutomationControlled".to_string(),
                "--disable-images".to_string(),
            ],
            navigation_timeout_secs: 25,
            tab_wait_timeout_secs: 15,
            settle_secs: 8,
            tab_selector: r#"span.tab[data-id="{type}"]"#.to_string(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            tool: "n-m3u8dl-re".to_string(),
            install_hint: "npm install -g n-m3u8dl-re".to_string(),
            output_root: Config::default_output_root(),
        }
    }
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            utility: "curl".to_string(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            pacing_secs: 5,
            save_report: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_output_root(mut self, dir: PathBuf) -> Self {
        self.config.download.output_root = dir;
        self
    }

    pub fn with_pacing(mut self, seconds: u64) -> Self {
        self.config.batch.pacing_secs = seconds;
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.config.download.tool = tool.into();
        self
    }

    pub fn with_settle(mut self, seconds: u64) -> Self {
        self.config.browser.settle_secs = seconds;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.browser.headless = headless;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
