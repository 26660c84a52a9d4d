use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use docent_capture::HttpSession;
use docent_core::report::{ReportFormat, generate_report, save_report};
use docent_core::{
    CaptionNarrator, Collaborators, GraphCache, ManifestRenderer, NavigationGraph, Orchestrator,
    StrategyMode, TourConfig, TourOutcome,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_CACHE_DIR: &str = "~/.cache/docent";

// Helper functions for the run handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file; blank lines and `#` comments are ignored
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add https:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("https://{}", line);
    if let Ok(url) = Url::parse(&with_scheme)
        && url.host_str().is_some_and(|h| h.contains('.') || h == "localhost")
    {
        return Some(with_scheme);
    }

    eprintln!("⚠️  Skipping invalid URL '{}'", line);
    None
}

/// Expand `~` in a user-supplied path
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Directory name for a site's artifacts when several sites are toured in one run
pub fn site_dir_name(url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
        .unwrap_or_default();
    let name: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    if name.is_empty() { "site".to_string() } else { name }
}

/// Command-line values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub output_dir: Option<String>,
    pub duration_secs: Option<u64>,
    pub strategy: Option<StrategyMode>,
    pub max_depth: Option<usize>,
    pub max_pages: Option<usize>,
    pub focus: Option<String>,
    pub follow: bool,
    pub cache: bool,
    pub cache_dir: Option<String>,
}

impl RunOverrides {
    pub fn from_matches(args: &ArgMatches) -> Self {
        Self {
            output_dir: args.get_one::<String>("output").cloned(),
            duration_secs: args.get_one::<u64>("duration").copied(),
            strategy: args
                .get_one::<String>("strategy")
                .and_then(|s| StrategyMode::from_str(s)),
            max_depth: args.get_one::<usize>("max-depth").copied(),
            max_pages: args.get_one::<usize>("max-pages").copied(),
            focus: args.get_one::<String>("focus").cloned(),
            follow: args.get_flag("follow"),
            cache: args.get_flag("cache"),
            cache_dir: args.get_one::<String>("cache-dir").cloned(),
        }
    }
}

/// Configuration from `path`, or the defaults when no file is given
pub fn load_config(path: Option<&str>) -> Result<TourConfig> {
    match path {
        Some(raw) => {
            let path = expand_path(raw);
            TourConfig::from_file(&path)
                .with_context(|| format!("Could not load configuration {}", path.display()))
        }
        None => Ok(TourConfig::default()),
    }
}

pub fn apply_overrides(mut config: TourConfig, overrides: &RunOverrides) -> Result<TourConfig> {
    if let Some(dir) = &overrides.output_dir {
        config.output_dir = PathBuf::from(dir);
    }
    if let Some(secs) = overrides.duration_secs {
        config.pacing.target_duration = Duration::from_secs(secs);
    }
    if let Some(mode) = overrides.strategy {
        config.strategy.mode = mode;
    }
    if let Some(depth) = overrides.max_depth {
        config.strategy.max_depth = depth;
    }
    if let Some(pages) = overrides.max_pages {
        config.strategy.max_total_nodes = pages;
    }
    if let Some(focus) = &overrides.focus {
        config.strategy.focus = Some(focus.clone());
    }
    if overrides.follow {
        config.explore.same_domain_only = false;
    }
    if overrides.cache {
        config.cache.enabled = true;
    }
    if let Some(dir) = &overrides.cache_dir {
        config.cache.dir = Some(PathBuf::from(dir));
    }

    config.output_dir = expand_path(&config.output_dir.to_string_lossy());
    config.cache.dir = Some(expand_path(
        &config
            .cache
            .dir
            .as_deref()
            .map(|d| d.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string()),
    ));

    config.validate()?;
    Ok(config)
}

fn cache_from_args(args: &ArgMatches) -> GraphCache {
    let dir = args
        .get_one::<String>("cache-dir")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CACHE_DIR);
    GraphCache::new(expand_path(dir))
}

/// Indented page tree of a graph, depth-first from the root
pub fn render_tree(graph: &NavigationGraph) -> String {
    let mut tree = String::new();
    if let Some(root) = graph.root_id() {
        graph.dfs(root, |node| {
            let indent = "    ".repeat(node.depth);
            let title = node.title.as_deref().unwrap_or("(untitled)");
            tree.push_str(&format!("{}└── {}  {}", indent, title, node.url));
            if node.has_unexplored_links() {
                tree.push_str(&format!("  ({} unexplored)", node.unexplored_links.len()));
            }
            tree.push('\n');
            true
        });
    }
    tree
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_outcome(outcome: &TourOutcome) {
    let pages = outcome.graph_stats.as_ref().map(|s| s.nodes).unwrap_or(0);
    let summary = format!(
        "{} pages, {}/{} actions, {} artifacts",
        pages,
        outcome.completed_actions(),
        outcome.timeline.len(),
        outcome.artifacts.len()
    );

    match (outcome.success, outcome.fallback) {
        (true, false) => println!(
            "{} {} {}",
            "✓".green().bold(),
            outcome.start_url.bright_white(),
            summary
        ),
        (true, true) => println!(
            "{} {} {}",
            "⚠".yellow().bold(),
            outcome.start_url.bright_white(),
            "single-page fallback".yellow()
        ),
        (false, _) => println!(
            "{} {} {}",
            "✗".red().bold(),
            outcome.start_url.bright_white(),
            outcome.message.as_deref().unwrap_or("tour failed").red()
        ),
    }
}

async fn run_tour(url: &str, config: &TourConfig, timeout_secs: u64, out_dir: PathBuf) -> Result<TourOutcome> {
    info!("Touring {} into {}", url, out_dir.display());
    let session = HttpSession::with_timeout(timeout_secs).context("Could not create capture session")?;
    let collaborators = Collaborators::default()
        .with_renderer(Arc::new(ManifestRenderer::new(&out_dir)))
        .with_narrator(Arc::new(CaptionNarrator::new(&out_dir)));

    let mut orchestrator =
        Orchestrator::new(url, Box::new(session), config.clone()).with_collaborators(collaborators);
    if config.cache.enabled
        && let Some(dir) = &config.cache.dir
    {
        orchestrator = orchestrator.with_cache(GraphCache::new(dir));
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Touring {} (run {})", url, orchestrator.run_id()));

    let outcome = orchestrator.run().await;
    spinner.finish_and_clear();
    Ok(outcome)
}

pub async fn handle_run(args: &ArgMatches) -> Result<()> {
    let urls = load_urls_from_source(args.get_one::<Url>("url"), args.get_one::<PathBuf>("hosts-file"))
        .map_err(anyhow::Error::msg)?;
    let config = apply_overrides(
        load_config(args.get_one::<String>("config").map(String::as_str))?,
        &RunOverrides::from_matches(args),
    )?;
    debug!("Effective configuration: {:?}", config);
    let timeout_secs = args.get_one::<u64>("timeout").copied().unwrap_or(10);
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    print_divider();
    println!("{}", "  DOCENT TOUR".bright_white().bold());
    print_divider();
    println!("{} Sites: {}", "→".blue(), urls.len());
    println!("{} Strategy: {}", "→".blue(), config.strategy.mode);
    println!("{} Target duration: {:?}", "→".blue(), config.target_duration());
    println!(
        "{} Output: {}",
        "→".blue(),
        config.output_dir.display().to_string().bright_white()
    );
    println!();

    let mut reports = Vec::with_capacity(urls.len());
    let mut failures = 0;
    for url in &urls {
        let out_dir = if urls.len() > 1 {
            config.output_dir.join(site_dir_name(url))
        } else {
            config.output_dir.clone()
        };
        let outcome = run_tour(url, &config, timeout_secs, out_dir).await?;
        print_outcome(&outcome);
        if !outcome.success {
            failures += 1;
        }
        reports.push(generate_report(&outcome, format)?);
    }
    println!();

    let report = reports.join("\n");
    match args.get_one::<PathBuf>("report") {
        Some(path) => {
            save_report(&report, path)
                .with_context(|| format!("Could not write report to {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", report),
    }

    if failures > 0 {
        bail!("{} of {} tours failed", failures, urls.len());
    }
    Ok(())
}

pub fn handle_graph(args: &ArgMatches) -> Result<()> {
    let domain = args
        .get_one::<String>("DOMAIN")
        .context("A domain is required")?;
    let format = args.get_one::<String>("format").map(String::as_str).unwrap_or("tree");
    let cache = cache_from_args(args);

    let Some(graph) = cache.load(domain)? else {
        bail!("No cached graph for {} in {}", domain, cache.dir().display());
    };

    match format {
        "dot" => print!("{}", graph.to_dot()),
        "json" => println!("{}", graph.to_json()?),
        _ => {
            let stats = graph.stats();
            println!(
                "{} {} pages, {} transitions, depth {}",
                domain.bright_white().bold(),
                stats.nodes,
                stats.edges,
                stats.max_depth
            );
            print!("{}", render_tree(&graph));
        }
    }
    Ok(())
}

pub fn handle_cache_list(args: &ArgMatches) -> Result<()> {
    let cache = cache_from_args(args);
    let domains = cache.list()?;
    if domains.is_empty() {
        println!("No cached graphs in {}", cache.dir().display());
        return Ok(());
    }
    for domain in domains {
        println!(
            "  {} {}  {}",
            "•".blue(),
            domain.bright_white(),
            cache.path_for(&domain).display().to_string().dimmed()
        );
    }
    Ok(())
}

pub fn handle_cache_remove(args: &ArgMatches) -> Result<()> {
    let domain = args
        .get_one::<String>("DOMAIN")
        .context("A domain is required")?;
    if cache_from_args(args).remove(domain)? {
        println!("{} Removed cached graph for {}", "✓".green().bold(), domain);
    } else {
        println!("{} Nothing cached for {}", "→".blue(), domain);
    }
    Ok(())
}

pub fn handle_cache_clear(args: &ArgMatches) -> Result<()> {
    let removed = cache_from_args(args).clear()?;
    println!("{} Removed {} cached graphs", "✓".green().bold(), removed);
    Ok(())
}

pub fn handle_config_show(args: &ArgMatches) -> Result<()> {
    let config = load_config(args.get_one::<String>("config").map(String::as_str))?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
