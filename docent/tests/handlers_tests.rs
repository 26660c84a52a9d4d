use docent::handlers::*;
use docent::command_argument_builder;
use docent_core::{NavigationGraph, Node, StrategyMode};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;
use url::Url;

fn run_overrides(args: &[&str]) -> RunOverrides {
    let mut argv = vec!["docent", "run"];
    argv.extend_from_slice(args);
    let matches = command_argument_builder().try_get_matches_from(argv).unwrap();
    let (_, run) = matches.subcommand().unwrap();
    RunOverrides::from_matches(run)
}

#[test]
fn test_parse_url_line_with_scheme() {
    let result = parse_url_line("https://example.com");
    assert_eq!(result, Some("https://example.com".to_string()));
}

#[test]
fn test_parse_url_line_without_scheme() {
    assert_eq!(parse_url_line("example.com"), Some("https://example.com".to_string()));
    assert_eq!(
        parse_url_line("localhost:8080"),
        Some("https://localhost:8080".to_string())
    );
}

#[test]
fn test_parse_url_line_invalid() {
    let result = parse_url_line("not a valid url!!!");
    assert_eq!(result, None);
}

#[test]
fn test_load_urls_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://example.com")?;
    writeln!(temp_file, "# staging sites")?;
    writeln!(temp_file, "acme.io")?;
    writeln!(temp_file)?; // Empty line
    writeln!(temp_file, "  https://shop.example.com/start  ")?;

    let urls = load_urls_from_file(temp_file.path())?;

    assert_eq!(
        urls,
        vec![
            "https://example.com",
            "https://acme.io",
            "https://shop.example.com/start"
        ]
    );
    Ok(())
}

#[test]
fn test_load_urls_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   ").unwrap();

    let result = load_urls_from_file(temp_file.path());
    assert!(result.unwrap_err().contains("No valid URLs"));
}

#[test]
fn test_load_urls_from_source_single_url() {
    let url = Url::parse("https://example.com").unwrap();
    let result = load_urls_from_source(Some(&url), None).unwrap();

    assert_eq!(result, vec!["https://example.com/"]);
}

#[test]
fn test_load_urls_from_source_no_input() {
    let result = load_urls_from_source(None, None);
    assert!(
        result
            .unwrap_err()
            .contains("Either --url or --hosts-file must be provided")
    );
}

#[test]
fn test_site_dir_name() {
    assert_eq!(site_dir_name("https://www.Acme.io/pricing"), "acme.io");
    assert_eq!(site_dir_name("http://localhost:3000/"), "localhost");
    assert_eq!(site_dir_name("not a url"), "site");
}

#[test]
fn test_url_and_hosts_file_conflict() {
    let result = command_argument_builder().try_get_matches_from([
        "docent",
        "run",
        "-u",
        "https://acme.io",
        "-H",
        "hosts.txt",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_flags_override_defaults() {
    let overrides = run_overrides(&[
        "-u",
        "https://acme.io",
        "-d",
        "90",
        "-s",
        "breadth-first",
        "--max-depth",
        "2",
        "--max-pages",
        "5",
        "--focus",
        "reporting",
        "--follow",
        "--cache",
        "--cache-dir",
        "/tmp/docent-cache",
        "-o",
        "/tmp/docent-out",
    ]);

    let config = apply_overrides(load_config(None).unwrap(), &overrides).unwrap();

    assert_eq!(config.target_duration(), Duration::from_secs(90));
    assert_eq!(config.strategy.mode, StrategyMode::BreadthFirst);
    assert_eq!(config.strategy.max_depth, 2);
    assert_eq!(config.strategy.max_total_nodes, 5);
    assert_eq!(config.strategy.focus.as_deref(), Some("reporting"));
    assert!(!config.explore.same_domain_only);
    assert!(config.cache.enabled);
    assert_eq!(config.cache.dir, Some(PathBuf::from("/tmp/docent-cache")));
    assert_eq!(config.output_dir, PathBuf::from("/tmp/docent-out"));
}

#[test]
fn test_no_flags_keep_defaults() {
    let overrides = run_overrides(&["-u", "https://acme.io"]);
    let config = apply_overrides(load_config(None).unwrap(), &overrides).unwrap();

    assert_eq!(config.target_duration(), Duration::from_secs(60));
    assert_eq!(config.strategy.mode, StrategyMode::Priority);
    assert!(config.explore.same_domain_only);
    assert!(!config.cache.enabled);
    assert_eq!(config.output_dir, PathBuf::from("docent-output"));
}

#[test]
fn test_invalid_override_rejected() {
    let overrides = run_overrides(&["-u", "https://acme.io", "--max-pages", "0"]);
    let result = apply_overrides(load_config(None).unwrap(), &overrides);
    assert!(result.is_err());
}

#[test]
fn test_config_file_then_flags() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "output_dir = \"/tmp/from-file\"")?;
    writeln!(temp_file, "[pacing]")?;
    writeln!(temp_file, "target_duration_ms = 45000")?;
    writeln!(temp_file, "[strategy]")?;
    writeln!(temp_file, "mode = \"depth-first\"")?;

    let path = temp_file.path().to_string_lossy().into_owned();
    let from_file = load_config(Some(&path))?;
    assert_eq!(from_file.target_duration(), Duration::from_secs(45));
    assert_eq!(from_file.strategy.mode, StrategyMode::DepthFirst);

    let overrides = run_overrides(&["-u", "https://acme.io", "-d", "20"]);
    let config = apply_overrides(from_file, &overrides)?;
    assert_eq!(config.target_duration(), Duration::from_secs(20));
    assert_eq!(config.strategy.mode, StrategyMode::DepthFirst);
    assert_eq!(config.output_dir, PathBuf::from("/tmp/from-file"));
    Ok(())
}

#[test]
fn test_missing_config_file_is_an_error() {
    let result = load_config(Some("/nonexistent/docent.toml"));
    assert!(result.is_err());
}

#[test]
fn test_render_tree() {
    let mut graph = NavigationGraph::new();
    let root = graph
        .add_node(
            Node::new("https://acme.io/")
                .with_title("Acme")
                .with_links(["https://acme.io/pricing", "https://acme.io/blog"]),
        )
        .unwrap()
        .clone();
    graph
        .add_node(Node::new("https://acme.io/pricing").child_of(&root))
        .unwrap();

    let tree = render_tree(&graph);
    let lines: Vec<&str> = tree.lines().collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "└── Acme  https://acme.io/  (2 unexplored)");
    assert_eq!(lines[1], "    └── (untitled)  https://acme.io/pricing");
}
