// Tests for the navigation graph

use docent_core::graph::{EdgeKind, EdgeMeta, NavigationGraph, Node, node_id_for, node_score};
use docent_core::GraphError;

fn home() -> Node {
    Node::new("https://acme.io/")
}

/// Root A with children B and C
fn siblings_graph() -> NavigationGraph {
    let mut graph = NavigationGraph::new().with_base_domain("acme.io");
    let a = graph.add_node(home()).unwrap().clone();
    graph
        .add_node(Node::new("https://acme.io/b").child_of(&a))
        .unwrap();
    graph
        .add_node(Node::new("https://acme.io/c").child_of(&a))
        .unwrap();
    graph
}

// ============================================================================
// Node identity
// ============================================================================

#[test]
fn test_node_id_drops_fragment_and_trailing_slash() {
    assert_eq!(node_id_for("https://acme.io/pricing/#plans"), "https://acme.io/pricing");
    assert_eq!(node_id_for("https://acme.io"), "https://acme.io/");
    assert_eq!(node_id_for("not a url"), "not a url");
}

// ============================================================================
// add_node
// ============================================================================

#[test]
fn test_repeated_add_node_counts_visits() {
    let mut graph = NavigationGraph::new();
    for _ in 0..4 {
        graph.add_node(home()).unwrap();
    }

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.root().unwrap().visit_count, 4);
}

#[test]
fn test_first_parentless_node_becomes_root() {
    let mut graph = NavigationGraph::new();
    graph.add_node(home()).unwrap();

    assert_eq!(graph.root_id(), Some("https://acme.io/"));
    let second = graph.add_node(Node::new("https://other.io/"));
    assert!(matches!(second, Err(GraphError::DetachedNode(_))));
}

#[test]
fn test_unknown_parent_rejected() {
    let mut graph = NavigationGraph::new();
    graph.add_node(home()).unwrap();

    let orphan = Node::new("https://acme.io/x").with_parent("https://acme.io/missing", 1);
    assert_eq!(
        graph.add_node(orphan).unwrap_err(),
        GraphError::MissingParent {
            id: "https://acme.io/x".to_string(),
            parent: "https://acme.io/missing".to_string(),
        }
    );
}

#[test]
fn test_siblings_are_linked_both_ways() {
    let graph = siblings_graph();
    let a = graph.node("https://acme.io/").unwrap();
    let b = graph.node("https://acme.io/b").unwrap();
    let c = graph.node("https://acme.io/c").unwrap();

    assert_eq!(a.children.len(), 2);
    assert!(b.siblings.contains(&c.id));
    assert!(c.siblings.contains(&b.id));
    assert_eq!(b.parent.as_deref(), Some("https://acme.io/"));
    assert_eq!(b.depth, 1);
    assert!(a.siblings.is_empty());
}

// ============================================================================
// Edges
// ============================================================================

#[test]
fn test_add_edge_requires_both_endpoints() {
    let mut graph = siblings_graph();
    assert!(matches!(
        graph.add_edge("https://acme.io/", "https://acme.io/zzz", EdgeMeta::default()),
        Err(GraphError::NodeNotFound(_))
    ));
}

#[test]
fn test_repeated_edge_bumps_traversals() {
    let mut graph = siblings_graph();
    assert_eq!(
        graph
            .add_edge("https://acme.io/", "https://acme.io/b", EdgeMeta::click("B"))
            .unwrap(),
        1
    );
    assert_eq!(
        graph
            .add_edge("https://acme.io/", "https://acme.io/b", EdgeMeta::navigation())
            .unwrap(),
        2
    );

    assert_eq!(graph.edge_count(), 1);
    let edge = graph.edge("https://acme.io/", "https://acme.io/b").unwrap();
    assert_eq!(edge.traversals, 2);
    assert_eq!(edge.via, EdgeKind::Click);
    assert_eq!(edge.label.as_deref(), Some("B"));
}

// ============================================================================
// remove_node
// ============================================================================

#[test]
fn test_remove_node_leaves_no_references() {
    let mut graph = siblings_graph();
    let b = "https://acme.io/b";
    graph
        .add_node(Node::new("https://acme.io/b/deep").with_parent(b, 2))
        .unwrap();
    graph.add_edge("https://acme.io/", b, EdgeMeta::click("B")).unwrap();
    graph.add_edge(b, "https://acme.io/c", EdgeMeta::click("C")).unwrap();
    graph.add_edge("https://acme.io/c", b, EdgeMeta::click("B")).unwrap();

    let removed = graph.remove_node(b).unwrap();
    assert_eq!(removed.id, b);

    assert!(!graph.contains(b));
    assert!(graph.edges().all(|e| e.from != b && e.to != b));
    assert!(graph.outgoing("https://acme.io/").all(|id| id != b));
    assert!(graph.incoming("https://acme.io/c").all(|id| id != b));
    assert!(!graph.node("https://acme.io/").unwrap().children.contains(b));
    assert!(!graph.node("https://acme.io/c").unwrap().siblings.contains(b));
    assert_eq!(graph.node("https://acme.io/b/deep").unwrap().parent, None);
}

#[test]
fn test_remove_root_clears_root() {
    let mut graph = siblings_graph();
    graph.remove_node("https://acme.io/").unwrap();
    assert_eq!(graph.root_id(), None);
    assert!(graph.remove_node("https://acme.io/").is_err());
}

// ============================================================================
// Paths and reachability
// ============================================================================

#[test]
fn test_get_path_to_self() {
    let graph = siblings_graph();
    assert_eq!(
        graph.get_path("https://acme.io/b", "https://acme.io/b"),
        vec!["https://acme.io/b".to_string()]
    );
}

#[test]
fn test_get_path_uses_parent_links() {
    let graph = siblings_graph();
    assert_eq!(
        graph.get_path("https://acme.io/b", "https://acme.io/"),
        vec!["https://acme.io/b".to_string(), "https://acme.io/".to_string()]
    );
}

#[test]
fn test_get_path_follows_edges() {
    let mut graph = siblings_graph();
    graph
        .add_edge("https://acme.io/", "https://acme.io/b", EdgeMeta::click("B"))
        .unwrap();
    graph
        .add_edge("https://acme.io/b", "https://acme.io/c", EdgeMeta::click("C"))
        .unwrap();

    assert_eq!(
        graph.get_path("https://acme.io/", "https://acme.io/c"),
        vec![
            "https://acme.io/".to_string(),
            "https://acme.io/b".to_string(),
            "https://acme.io/c".to_string()
        ]
    );
}

#[test]
fn test_get_path_unreachable_is_empty() {
    let graph = siblings_graph();
    assert!(graph.get_path("https://acme.io/", "https://acme.io/c").is_empty());
    assert!(graph.get_path("https://acme.io/", "https://acme.io/nope").is_empty());
}

#[test]
fn test_would_create_cycle_direction() {
    let mut graph = siblings_graph();
    graph
        .add_edge("https://acme.io/", "https://acme.io/b", EdgeMeta::click("B"))
        .unwrap();

    // root already reaches b, so b -> root closes a loop
    assert!(graph.would_create_cycle("https://acme.io/b", "https://acme.io/"));
    assert!(!graph.would_create_cycle("https://acme.io/", "https://acme.io/b"));
    assert!(!graph.would_create_cycle("https://acme.io/", "https://acme.io/c"));
}

// ============================================================================
// Scoring
// ============================================================================

#[test]
fn test_find_best_next_node_prefers_product_pages() {
    let mut graph = NavigationGraph::new();
    let root = graph.add_node(home()).unwrap().clone();
    graph
        .add_node(
            Node::new("https://acme.io/signup")
                .child_of(&root)
                .with_links(["https://acme.io/a", "https://acme.io/b", "https://acme.io/c"]),
        )
        .unwrap();
    graph
        .add_node(
            Node::new("https://acme.io/features")
                .child_of(&root)
                .with_links(["https://acme.io/features/x"]),
        )
        .unwrap();
    graph
        .add_node(Node::new("https://acme.io/empty").child_of(&root))
        .unwrap();

    let best = graph.find_best_next_node().unwrap();
    assert_eq!(best.id, "https://acme.io/features");
}

#[test]
fn test_find_best_next_node_none_without_unexplored_links() {
    let graph = siblings_graph();
    assert!(graph.find_best_next_node().is_none());
}

#[test]
fn test_node_score_formula() {
    let node = Node::new("https://acme.io/about")
        .with_parent("https://acme.io/", 2)
        .with_links(["https://acme.io/1", "https://acme.io/2"])
        .in_navigation(true);
    // -10*2 + 2*2 - 5*0 + 15
    assert_eq!(node_score(&node), -1);
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn test_bfs_visits_every_node_once() {
    let mut graph = siblings_graph();
    graph
        .add_edge("https://acme.io/b", "https://acme.io/c", EdgeMeta::click("C"))
        .unwrap();

    let mut seen = Vec::new();
    let count = graph.bfs("https://acme.io/", |node| {
        seen.push(node.id.clone());
        true
    });

    assert_eq!(count, 3);
    assert_eq!(seen[0], "https://acme.io/");
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 3);
}

#[test]
fn test_traversal_stops_when_visitor_declines() {
    let graph = siblings_graph();
    assert_eq!(graph.bfs("https://acme.io/", |_| false), 1);
    assert_eq!(graph.dfs("https://acme.io/", |_| false), 1);
    assert_eq!(graph.dfs("https://acme.io/missing", |_| true), 0);
}

#[test]
fn test_dfs_goes_deep_first() {
    let mut graph = siblings_graph();
    graph
        .add_node(Node::new("https://acme.io/b/deep").with_parent("https://acme.io/b", 2))
        .unwrap();

    let mut order = Vec::new();
    graph.dfs("https://acme.io/", |node| {
        order.push(node.id.clone());
        true
    });

    assert_eq!(
        order,
        vec![
            "https://acme.io/".to_string(),
            "https://acme.io/b".to_string(),
            "https://acme.io/b/deep".to_string(),
            "https://acme.io/c".to_string(),
        ]
    );
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn test_json_round_trip_preserves_structure() {
    let mut graph = siblings_graph();
    graph
        .add_edge("https://acme.io/", "https://acme.io/b", EdgeMeta::click("B"))
        .unwrap();
    graph
        .add_edge("https://acme.io/", "https://acme.io/b", EdgeMeta::click("B"))
        .unwrap();
    graph
        .add_edge("https://acme.io/b", "https://acme.io/c", EdgeMeta::navigation())
        .unwrap();
    graph.mark_link_explored("https://acme.io/", "https://acme.io/b").unwrap();

    let json = graph.to_json().unwrap();
    let restored = NavigationGraph::from_json(&json).unwrap();

    assert_eq!(restored.to_snapshot(), graph.to_snapshot());
    assert_eq!(restored.root_id(), Some("https://acme.io/"));
    assert_eq!(
        restored
            .edge("https://acme.io/", "https://acme.io/b")
            .unwrap()
            .traversals,
        2
    );
    assert!(restored.is_reachable("https://acme.io/", "https://acme.io/c"));
}

#[test]
fn test_json_uses_camel_case_layout() {
    let graph = siblings_graph();
    let value: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();

    assert_eq!(value["rootId"], "https://acme.io/");
    assert!(value["nodes"]["https://acme.io/b"]["siblings"].is_array());
    assert_eq!(value["metadata"]["baseDomain"], "acme.io");
}

#[test]
fn test_from_json_rejects_dangling_edges() {
    let graph = siblings_graph();
    let mut value: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();
    value["edges"] = serde_json::json!([{
        "from": "https://acme.io/",
        "to": "https://acme.io/ghost",
        "via": "click",
        "traversals": 1,
        "createdAt": "2024-01-01T00:00:00Z"
    }]);

    assert!(NavigationGraph::from_json(&value.to_string()).is_err());
    assert!(NavigationGraph::from_json("{not json").is_err());
}

#[test]
fn test_dot_export_names_pages() {
    let mut graph = NavigationGraph::new();
    let root = graph.add_node(home().with_title("Acme")).unwrap().clone();
    graph
        .add_node(Node::new("https://acme.io/pricing").child_of(&root))
        .unwrap();
    graph
        .add_edge(&root.id, "https://acme.io/pricing", EdgeMeta::click("Pricing"))
        .unwrap();

    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("Acme"));
    assert!(dot.contains("Pricing x1"));
}

#[test]
fn test_stats_and_link_bookkeeping() {
    let mut graph = NavigationGraph::new();
    graph
        .add_node(home().with_links(["https://acme.io/a", "https://acme.io/b"]))
        .unwrap();
    graph
        .mark_link_explored("https://acme.io/", "https://acme.io/a/")
        .unwrap();

    let root = graph.root().unwrap();
    assert_eq!(root.unexplored_links, vec!["https://acme.io/b".to_string()]);
    assert_eq!(root.explored_links, vec!["https://acme.io/a/".to_string()]);

    assert_eq!(graph.record_visit("https://acme.io/").unwrap(), 2);
    graph.mark_leaf("https://acme.io/").unwrap();

    let stats = graph.stats();
    assert_eq!(stats.nodes, 1);
    assert_eq!(stats.leaves, 1);
    assert_eq!(stats.unexplored_links, 0);
}
