use docent_core::{CacheError, GraphCache, NavigationGraph, Node};
use tempfile::TempDir;

fn graph(domain: &str) -> NavigationGraph {
    let mut graph = NavigationGraph::new().with_base_domain(domain);
    let root = graph
        .add_node(
            Node::new(format!("https://{}/", domain))
                .with_title("Home")
                .with_links([format!("https://{}/pricing", domain)]),
        )
        .unwrap()
        .clone();
    graph
        .add_node(Node::new(format!("https://{}/pricing", domain)).child_of(&root))
        .unwrap();
    graph
}

#[test]
fn test_missing_entry_loads_as_none() {
    let dir = TempDir::new().unwrap();
    let cache = GraphCache::new(dir.path());

    assert!(!cache.exists("acme.io"));
    assert!(cache.load("acme.io").unwrap().is_none());
}

#[test]
fn test_store_then_load() {
    let dir = TempDir::new().unwrap();
    let cache = GraphCache::new(dir.path().join("nested"));
    let original = graph("acme.io");

    let path = cache.store(&original).unwrap();
    assert_eq!(path, cache.path_for("acme.io"));
    assert!(cache.exists("acme.io"));

    let loaded = cache.load("acme.io").unwrap().unwrap();
    assert_eq!(loaded.node_count(), 2);
    assert_eq!(loaded.root_id(), Some("https://acme.io/"));
    assert_eq!(loaded.stats(), original.stats());
    assert_eq!(
        loaded.node("https://acme.io/").unwrap().title.as_deref(),
        Some("Home")
    );
}

#[test]
fn test_store_without_domain_uses_unknown() {
    let dir = TempDir::new().unwrap();
    let cache = GraphCache::new(dir.path());

    let mut graph = NavigationGraph::new();
    graph.add_node(Node::new("file:///tmp/index.html")).unwrap();
    cache.store(&graph).unwrap();

    assert!(cache.exists("unknown"));
}

#[test]
fn test_path_for_sanitizes_domain() {
    let cache = GraphCache::new("/tmp/docent-cache");
    let path = cache.path_for("Shop.Acme.io:8080");
    assert_eq!(path.file_name().unwrap(), "shop.acme.io_8080.json");
}

#[test]
fn test_list_remove_clear() {
    let dir = TempDir::new().unwrap();
    let cache = GraphCache::new(dir.path());
    assert!(cache.list().unwrap().is_empty());

    cache.store(&graph("zeta.dev")).unwrap();
    cache.store(&graph("acme.io")).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a graph").unwrap();

    assert_eq!(cache.list().unwrap(), vec!["acme.io", "zeta.dev"]);

    assert!(cache.remove("zeta.dev").unwrap());
    assert!(!cache.remove("zeta.dev").unwrap());
    assert_eq!(cache.list().unwrap(), vec!["acme.io"]);

    cache.store(&graph("beta.io")).unwrap();
    assert_eq!(cache.clear().unwrap(), 2);
    assert!(cache.list().unwrap().is_empty());
    assert!(dir.path().join("notes.txt").exists());
}

#[test]
fn test_corrupt_entry_is_an_error() {
    let dir = TempDir::new().unwrap();
    let cache = GraphCache::new(dir.path());
    std::fs::write(cache.path_for("acme.io"), "{ not json").unwrap();

    match cache.load("acme.io") {
        Err(CacheError::Graph(_)) => {}
        other => panic!("expected a graph error, got {:?}", other.map(|g| g.is_some())),
    }
}
