use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use anime_downloader_rust::input::{extract_anime_name, extract_base_url, parse_episode_range};
use anime_downloader_rust::{
    BatchError, BatchOrchestrator, BatchRequest, BrowserLauncher, CatalogSearch, Config, DownloadLayout,
    DownloadSupervisor, EpisodeExtractor, HttpClient, ManifestCapture, ManifestParser, Operator, SegmentTool,
    StreamDownloader, SubtitleFetcher, TerminalOperator, VideoType,
};

const HTTP_TIMEOUT_SECS: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Anime Downloader (Rust)")
        .version("0.1.0")
        .about("Batch HLS episode downloader for the anime catalog site")
        .arg(
            Arg::new("link")
                .short('l')
                .long("link")
                .value_name("URL")
                .help("Watch page link of the anime")
                .conflicts_with("search")
        )
        .arg(
            Arg::new("search")
                .short('s')
                .long("search")
                .value_name("QUERY")
                .help("Search the catalog by title")
        )
        .arg(
            Arg::new("episodes")
                .short('e')
                .long("episodes")
                .value_name("RANGE")
                .help("Episode number or range, e.g. 5 or 1-12")
        )
        .arg(
            Arg::new("type")
                .short('t')
                .long("type")
                .value_name("TYPE")
                .help("Video version to download")
                .value_parser(["sub", "dub"])
        )
        .arg(
            Arg::new("subtitles")
                .long("subtitles")
                .help("Download subtitle tracks")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Root directory for downloads")
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to a TOML configuration file")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    let config_result = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(&PathBuf::from(path)),
        None => Config::load(),
    };
    let mut config = config_result.unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    let verbose = matches.get_flag("verbose");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter_directive(verbose)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if verbose {
        info!("Verbose logging enabled");
    }

    if let Some(dir) = matches.get_one::<String>("output-dir") {
        config.download.output_root = PathBuf::from(dir);
    }
    config.validate()?;

    info!("🚀 Anime Downloader (Rust) starting...");
    for line in config.summary().lines() {
        info!("{}", line);
    }

    let tool = match SegmentTool::detect(&config.download.tool, &config.download.install_hint).await {
        Ok(tool) => tool,
        Err(e) => {
            error!("❌ {}", e);
            return Err(e.into());
        }
    };
    let launcher = browser_launcher(&config)?;

    let mut operator = TerminalOperator::new();
    let fetcher = HttpClient::new(&config.site.user_agent, HTTP_TIMEOUT_SECS);

    let Some(link) = resolve_link(&matches, &config, &fetcher, &mut operator).await? else {
        warn!("No anime selected. Exiting.");
        return Ok(());
    };

    let video_type = match matches.get_one::<String>("type") {
        Some(value) => value.parse::<VideoType>()?,
        None => match operator.toggle("Select version", &["Sub", "Dub"])? {
            Some(0) => VideoType::Sub,
            Some(_) => VideoType::Dub,
            None => {
                warn!("No version selected. Exiting.");
                return Ok(());
            }
        },
    };

    let download_subtitles = matches.get_flag("subtitles")
        || (video_type == VideoType::Dub
            && operator.toggle("Download subtitles?", &["No", "Yes"])? == Some(1));

    let range_text = match matches.get_one::<String>("episodes") {
        Some(text) => text.clone(),
        None => operator.ask("Enter episode range (e.g. 1-12 or 5): ")?,
    };
    let episodes = parse_episode_range(&range_text);
    if episodes.is_empty() {
        error!("❌ Invalid episode range: {}", range_text.trim());
        return Err(BatchError::InvalidEpisodeRange.into());
    }

    let request = BatchRequest {
        anime_name: extract_anime_name(&link),
        base_url: extract_base_url(&link),
        video_type,
        episodes,
        output_root: config.download.output_root.clone(),
    };
    info!("📁 Anime: {}", request.anime_name);
    info!("🎬 Episodes: {} ({})", request.episodes.len(), video_type);

    let extractor = EpisodeExtractor::new(
        ManifestCapture::new(launcher, config.browser.clone()),
        ManifestParser::new(fetcher),
    );
    let downloader: Arc<dyn StreamDownloader> = Arc::new(DownloadSupervisor::new(
        tool,
        &config.site.referer,
        &config.site.user_agent,
    ));
    let subtitles = SubtitleFetcher::new(&config.subtitles.utility, download_subtitles);
    let orchestrator = BatchOrchestrator::new(extractor, downloader, subtitles, config.batch.pacing());

    let start_time = std::time::Instant::now();
    let report = match orchestrator.run(&request, &mut operator).await {
        Ok(report) => report,
        Err(e) => {
            error!("❌ {}", e);
            return Err(e.into());
        }
    };
    let duration = start_time.elapsed();

    info!("🎉 Batch completed in {:.2}s", duration.as_secs_f64());
    info!("✅ Downloaded: {}", report.successful());
    info!("⏭️ Skipped: {}", report.skipped());
    info!("❌ Failed: {}", report.failed());

    if config.batch.save_report {
        let layout = DownloadLayout::new(&request.output_root, &request.anime_name);
        let report_path = layout.anime_dir().join("batch_report.json");
        if let Err(e) = report.save(&report_path).await {
            warn!("Failed to save batch report: {}", e);
        }
    }

    Ok(())
}

/// Watch page link from `--link`, `--search`, or an interactive choice between the two
async fn resolve_link(
    matches: &clap::ArgMatches,
    config: &Config,
    fetcher: &HttpClient,
    operator: &mut dyn Operator,
) -> Result<Option<String>> {
    if let Some(link) = matches.get_one::<String>("link") {
        return Ok(Some(link.trim().to_string()));
    }

    let query = match matches.get_one::<String>("search") {
        Some(query) => query.clone(),
        None => match operator.toggle("Find anime by", &["Search", "Link"])? {
            Some(0) => operator.ask("Search anime: ")?,
            Some(_) => {
                let link = operator.ask("Paste the anime link: ")?;
                let link = link.trim();
                if link.is_empty() {
                    return Err(anyhow!("Anime link cannot be empty."));
                }
                return Ok(Some(link.to_string()));
            }
            None => return Ok(None),
        },
    };

    let search = CatalogSearch::new(fetcher.clone(), &config.site.search_url);
    let results = search.search(&query).await?;
    if results.is_empty() {
        return Ok(None);
    }

    let labels: Vec<String> = results.iter().map(|r| r.label()).collect();
    let choice = operator.choose("Select anime", &labels)?;
    Ok(choice.and_then(|index| results.get(index)).map(|r| r.url.clone()))
}

#[cfg(feature = "browser")]
fn browser_launcher(config: &Config) -> Result<Arc<dyn BrowserLauncher>> {
    Ok(Arc::new(anime_downloader_rust::ChromeLauncher::new(&config.browser)))
}

#[cfg(not(feature = "browser"))]
fn browser_launcher(_config: &Config) -> Result<Arc<dyn BrowserLauncher>> {
    error!("❌ Browser support not compiled in. Rebuild with: cargo build --features browser");
    Err(anyhow!("browser support not compiled in"))
}
