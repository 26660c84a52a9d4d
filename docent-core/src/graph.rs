// Directed graph of the pages and application states discovered while exploring a site.
//
// Nodes live in a single id-indexed table. Parent, children, sibling and edge
// relationships are stored as ids and resolved through that table, so the
// graph never holds references between nodes.

use crate::error::GraphError;
use chrono::{DateTime, Utc};
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;
use url::Url;

pub type NodeId = String;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Score for a node flagged as part of the site navigation
const NAVIGATION_BONUS: i32 = 15;

/// Title/URL terms worth steering a tour toward
const NODE_BONUS_TERMS: &[(&str, i32)] = &[("feature", 12), ("product", 10), ("pricing", 10)];

/// Title/URL terms that mark auth walls
const NODE_PENALTY_TERMS: &[&str] = &[
    "login", "log-in", "signin", "sign-in", "signup", "sign-up", "register",
];

const NODE_PENALTY: i32 = 100;

/// Canonical node id for a URL: fragment dropped, trailing slash trimmed (except the root path).
pub fn node_id_for(url: &str) -> NodeId {
    match Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            let path = parsed.path().to_string();
            if path.len() > 1 && path.ends_with('/') {
                parsed.set_path(path.trim_end_matches('/'));
            }
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub parent: Option<NodeId>,
    pub children: BTreeSet<NodeId>,
    pub siblings: BTreeSet<NodeId>,
    pub depth: usize,
    pub visit_count: u32,
    pub explored_links: Vec<String>,
    pub unexplored_links: Vec<String>,
    pub is_leaf: bool,
    pub in_navigation: bool,
    pub discovered_at: DateTime<Utc>,
    pub last_visited_at: DateTime<Utc>,
}

impl Node {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::with_id(node_id_for(&url), url)
    }

    pub fn with_id(id: impl Into<NodeId>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            url: url.into(),
            title: None,
            parent: None,
            children: BTreeSet::new(),
            siblings: BTreeSet::new(),
            depth: 0,
            visit_count: 0,
            explored_links: Vec::new(),
            unexplored_links: Vec::new(),
            is_leaf: true,
            in_navigation: false,
            discovered_at: now,
            last_visited_at: now,
        }
    }

    /// Attach under `parent`, one level deeper
    pub fn child_of(mut self, parent: &Node) -> Self {
        self.parent = Some(parent.id.clone());
        self.depth = parent.depth + 1;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<NodeId>, depth: usize) -> Self {
        self.parent = Some(parent.into());
        self.depth = depth;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Links discovered on this state, all initially unexplored
    pub fn with_links<I, S>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        self.unexplored_links = links
            .into_iter()
            .map(Into::into)
            .filter(|l| seen.insert(l.clone()))
            .collect();
        self.is_leaf = self.unexplored_links.is_empty();
        self
    }

    pub fn in_navigation(mut self, flag: bool) -> Self {
        self.in_navigation = flag;
        self
    }

    pub fn has_unexplored_links(&self) -> bool {
        !self.unexplored_links.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    #[default]
    Click,
    Navigation,
    Redirect,
}

/// How an edge was traversed, supplied when it is recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeMeta {
    pub via: EdgeKind,
    pub label: Option<String>,
}

impl EdgeMeta {
    pub fn click(label: impl Into<String>) -> Self {
        Self {
            via: EdgeKind::Click,
            label: Some(label.into()),
        }
    }

    pub fn navigation() -> Self {
        Self {
            via: EdgeKind::Navigation,
            label: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub via: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub traversals: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetadata {
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_domain: Option<String>,
}

/// Serialized form of a [`NavigationGraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub root_id: Option<NodeId>,
    pub nodes: BTreeMap<NodeId, Node>,
    pub edges: Vec<Edge>,
    pub metadata: GraphMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub max_depth: usize,
    pub leaves: usize,
    pub unexplored_links: usize,
}

#[derive(Debug, Clone)]
pub struct NavigationGraph {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<(NodeId, NodeId), Edge>,
    outgoing: BTreeMap<NodeId, BTreeSet<NodeId>>,
    incoming: BTreeMap<NodeId, BTreeSet<NodeId>>,
    root: Option<NodeId>,
    metadata: GraphMetadata,
}

impl Default for NavigationGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationGraph {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            outgoing: BTreeMap::new(),
            incoming: BTreeMap::new(),
            root: None,
            metadata: GraphMetadata {
                created_at: now,
                modified_at: now,
                base_domain: None,
            },
        }
    }

    pub fn with_base_domain(mut self, domain: impl Into<String>) -> Self {
        self.metadata.base_domain = Some(domain.into());
        self
    }

    pub fn metadata(&self) -> &GraphMetadata {
        &self.metadata
    }

    pub fn root_id(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref().and_then(|id| self.nodes.get(id))
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<&Edge> {
        self.edges.get(&(from.to_string(), to.to_string()))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes_at_depth(&self, depth: usize) -> usize {
        self.nodes.values().filter(|n| n.depth == depth).count()
    }

    pub fn children(&self, id: &str) -> Vec<&Node> {
        self.nodes
            .get(id)
            .map(|n| n.children.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }

    pub fn outgoing(&self, id: &str) -> impl Iterator<Item = &NodeId> {
        self.outgoing.get(id).into_iter().flatten()
    }

    pub fn incoming(&self, id: &str) -> impl Iterator<Item = &NodeId> {
        self.incoming.get(id).into_iter().flatten()
    }

    fn touch(&mut self) {
        self.metadata.modified_at = Utc::now();
    }

    /// Insert a node, or count another visit if its id is already known.
    ///
    /// A fresh node is wired into its parent's children and linked both ways
    /// with every existing sibling. The first parentless node becomes the root.
    pub fn add_node(&mut self, mut node: Node) -> Result<&Node> {
        let id = node.id.clone();

        if let Some(existing) = self.nodes.get_mut(&id) {
            existing.visit_count += 1;
            existing.last_visited_at = Utc::now();
            debug!("Revisited {} ({} visits)", id, existing.visit_count);
        } else {
            match node.parent.clone() {
                Some(parent_id) => {
                    let parent =
                        self.nodes
                            .get_mut(&parent_id)
                            .ok_or_else(|| GraphError::MissingParent {
                                id: id.clone(),
                                parent: parent_id.clone(),
                            })?;
                    let siblings: BTreeSet<NodeId> = parent.children.clone();
                    parent.children.insert(id.clone());

                    for sibling_id in &siblings {
                        if let Some(sibling) = self.nodes.get_mut(sibling_id) {
                            sibling.siblings.insert(id.clone());
                        }
                    }
                    node.siblings = siblings;
                }
                None => {
                    if self.root.is_some() {
                        return Err(GraphError::DetachedNode(id));
                    }
                    self.root = Some(id.clone());
                    node.siblings.clear();
                }
            }

            node.children.clear();
            node.visit_count = 1;
            debug!("Discovered {} at depth {}", id, node.depth);
            self.nodes.insert(id.clone(), node);
        }

        self.touch();
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Count a return to an already known node
    pub fn record_visit(&mut self, id: &str) -> Result<u32> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        node.visit_count += 1;
        node.last_visited_at = Utc::now();
        let count = node.visit_count;
        self.touch();
        Ok(count)
    }

    /// Move `url` from the node's unexplored list to its explored list
    pub fn mark_link_explored(&mut self, id: &str, url: &str) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        let wanted = node_id_for(url);
        node.unexplored_links
            .retain(|l| l != url && node_id_for(l) != wanted);
        if !node.explored_links.iter().any(|l| l == url) {
            node.explored_links.push(url.to_string());
        }
        self.touch();
        Ok(())
    }

    /// Drop every remaining unexplored link, e.g. when a state turns out not to be worth touring
    pub fn mark_leaf(&mut self, id: &str) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        node.unexplored_links.clear();
        node.is_leaf = true;
        self.touch();
        Ok(())
    }

    /// Record a transition; a repeated `(from, to)` pair only bumps its traversal counter.
    /// Returns the edge's traversal count.
    pub fn add_edge(&mut self, from: &str, to: &str, meta: EdgeMeta) -> Result<u32> {
        for endpoint in [from, to] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GraphError::NodeNotFound(endpoint.to_string()));
            }
        }

        let key = (from.to_string(), to.to_string());
        let traversals = match self.edges.get_mut(&key) {
            Some(edge) => {
                edge.traversals += 1;
                edge.traversals
            }
            None => {
                self.edges.insert(
                    key,
                    Edge {
                        from: from.to_string(),
                        to: to.to_string(),
                        via: meta.via,
                        label: meta.label,
                        traversals: 1,
                        created_at: Utc::now(),
                    },
                );
                self.outgoing
                    .entry(from.to_string())
                    .or_default()
                    .insert(to.to_string());
                self.incoming
                    .entry(to.to_string())
                    .or_default()
                    .insert(from.to_string());
                1
            }
        };

        self.touch();
        Ok(traversals)
    }

    /// Remove a node and every reference to it: parent's children, siblings'
    /// sibling sets, and edges in both directions. Its children lose their parent link.
    pub fn remove_node(&mut self, id: &str) -> Result<Node> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;

        if let Some(parent_id) = &node.parent
            && let Some(parent) = self.nodes.get_mut(parent_id)
        {
            parent.children.remove(id);
        }
        for sibling_id in &node.siblings {
            if let Some(sibling) = self.nodes.get_mut(sibling_id) {
                sibling.siblings.remove(id);
            }
        }
        for child_id in &node.children {
            if let Some(child) = self.nodes.get_mut(child_id) {
                child.parent = None;
            }
        }

        if let Some(targets) = self.outgoing.remove(id) {
            for target in targets {
                self.edges.remove(&(id.to_string(), target.clone()));
                if let Some(sources) = self.incoming.get_mut(&target) {
                    sources.remove(id);
                }
            }
        }
        if let Some(sources) = self.incoming.remove(id) {
            for source in sources {
                self.edges.remove(&(source.clone(), id.to_string()));
                if let Some(targets) = self.outgoing.get_mut(&source) {
                    targets.remove(id);
                }
            }
        }

        if self.root.as_deref() == Some(id) {
            self.root = None;
        }

        self.touch();
        Ok(node)
    }

    /// Shortest route from `from` to `to`, following edges forward or stepping
    /// back to a parent. Empty when unreachable.
    pub fn get_path(&self, from: &str, to: &str) -> Vec<NodeId> {
        if !self.contains(from) || !self.contains(to) {
            return Vec::new();
        }
        if from == to {
            return vec![from.to_string()];
        }

        let mut previous: HashMap<&str, &str> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::from([from]);
        let mut queue: VecDeque<&str> = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            let parent = self
                .nodes
                .get(current)
                .and_then(|n| n.parent.as_deref());
            let next = self
                .outgoing(current)
                .map(String::as_str)
                .chain(parent);

            for neighbor in next {
                if !visited.insert(neighbor) {
                    continue;
                }
                previous.insert(neighbor, current);
                if neighbor == to {
                    let mut path = vec![to.to_string()];
                    let mut step = to;
                    while let Some(&prev) = previous.get(step) {
                        path.push(prev.to_string());
                        step = prev;
                    }
                    path.reverse();
                    return path;
                }
                queue.push_back(neighbor);
            }
        }

        Vec::new()
    }

    /// Whether `to` can be reached from `from` over forward edges
    pub fn is_reachable(&self, from: &str, to: &str) -> bool {
        if !self.contains(from) || !self.contains(to) {
            return false;
        }
        if from == to {
            return true;
        }

        let mut visited: HashSet<&str> = HashSet::from([from]);
        let mut queue: VecDeque<&str> = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            for neighbor in self.outgoing(current) {
                if neighbor == to {
                    return true;
                }
                if visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        false
    }

    /// An edge `from -> to` closes a cycle iff `to` already reaches `from`
    pub fn would_create_cycle(&self, from: &str, to: &str) -> bool {
        self.is_reachable(to, from)
    }

    /// Best candidate to resume exploring from, among nodes with unexplored links
    pub fn find_best_next_node(&self) -> Option<&Node> {
        let mut best: Option<(&Node, i32)> = None;
        for node in self.nodes.values().filter(|n| n.has_unexplored_links()) {
            let score = node_score(node);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((node, score));
            }
        }
        best.map(|(node, _)| node)
    }

    fn neighbors(&self, id: &str) -> Vec<&NodeId> {
        let mut out: Vec<&NodeId> = Vec::new();
        if let Some(node) = self.nodes.get(id) {
            out.extend(node.children.iter());
        }
        for target in self.outgoing(id) {
            if !out.contains(&target) {
                out.push(target);
            }
        }
        out
    }

    /// Breadth-first walk over children and forward edges; stops when `visitor` returns false.
    /// Returns the number of nodes visited.
    pub fn bfs<F>(&self, start: &str, mut visitor: F) -> usize
    where
        F: FnMut(&Node) -> bool,
    {
        let Some(start_node) = self.nodes.get(start) else {
            return 0;
        };

        let mut visited: HashSet<&str> = HashSet::from([start_node.id.as_str()]);
        let mut queue: VecDeque<&Node> = VecDeque::from([start_node]);
        let mut count = 0;

        while let Some(node) = queue.pop_front() {
            count += 1;
            if !visitor(node) {
                break;
            }
            for neighbor in self.neighbors(&node.id) {
                if visited.insert(neighbor.as_str())
                    && let Some(next) = self.nodes.get(neighbor)
                {
                    queue.push_back(next);
                }
            }
        }
        count
    }

    /// Depth-first (pre-order) counterpart of [`bfs`](Self::bfs)
    pub fn dfs<F>(&self, start: &str, mut visitor: F) -> usize
    where
        F: FnMut(&Node) -> bool,
    {
        let Some(start_node) = self.nodes.get(start) else {
            return 0;
        };

        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&Node> = vec![start_node];
        let mut count = 0;

        while let Some(node) = stack.pop() {
            if !visited.insert(node.id.as_str()) {
                continue;
            }
            count += 1;
            if !visitor(node) {
                break;
            }
            for neighbor in self.neighbors(&node.id).into_iter().rev() {
                if !visited.contains(neighbor.as_str())
                    && let Some(next) = self.nodes.get(neighbor)
                {
                    stack.push(next);
                }
            }
        }
        count
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            max_depth: self.nodes.values().map(|n| n.depth).max().unwrap_or(0),
            leaves: self.nodes.values().filter(|n| n.is_leaf).count(),
            unexplored_links: self
                .nodes
                .values()
                .map(|n| n.unexplored_links.len())
                .sum(),
        }
    }

    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            root_id: self.root.clone(),
            nodes: self.nodes.clone(),
            edges: self.edges.values().cloned().collect(),
            metadata: self.metadata.clone(),
        }
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let GraphSnapshot {
            root_id,
            nodes,
            edges,
            metadata,
        } = snapshot;

        if let Some((key, node)) = nodes.iter().find(|(key, node)| **key != node.id) {
            return Err(GraphError::Serialization(format!(
                "node keyed {} carries id {}",
                key, node.id
            )));
        }
        if let Some(root) = &root_id
            && !nodes.contains_key(root)
        {
            return Err(GraphError::NodeNotFound(root.clone()));
        }

        let mut graph = Self {
            nodes,
            edges: BTreeMap::new(),
            outgoing: BTreeMap::new(),
            incoming: BTreeMap::new(),
            root: root_id,
            metadata,
        };

        for edge in edges {
            for endpoint in [&edge.from, &edge.to] {
                if !graph.nodes.contains_key(endpoint) {
                    return Err(GraphError::NodeNotFound(endpoint.clone()));
                }
            }
            graph
                .outgoing
                .entry(edge.from.clone())
                .or_default()
                .insert(edge.to.clone());
            graph
                .incoming
                .entry(edge.to.clone())
                .or_default()
                .insert(edge.from.clone());
            graph
                .edges
                .insert((edge.from.clone(), edge.to.clone()), edge);
        }

        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_snapshot())
            .map_err(|e| GraphError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: GraphSnapshot =
            serde_json::from_str(json).map_err(|e| GraphError::Serialization(e.to_string()))?;
        Self::from_snapshot(snapshot)
    }

    /// Graphviz rendering of the explored site, for diagrams
    pub fn to_dot(&self) -> String {
        let mut diagram: DiGraph<String, String> = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

        for node in self.nodes.values() {
            let label = node.title.clone().unwrap_or_else(|| node.id.clone());
            indices.insert(node.id.as_str(), diagram.add_node(label));
        }
        for edge in self.edges.values() {
            if let (Some(&from), Some(&to)) =
                (indices.get(edge.from.as_str()), indices.get(edge.to.as_str()))
            {
                let label = match &edge.label {
                    Some(label) => format!("{} x{}", label, edge.traversals),
                    None => format!("x{}", edge.traversals),
                };
                diagram.add_edge(from, to, label);
            }
        }

        format!("{}", Dot::new(&diagram))
    }
}

/// Exploration priority of a node: shallow, link-rich, rarely visited,
/// navigation-area and product-related pages first; auth pages last.
pub fn node_score(node: &Node) -> i32 {
    let mut score = -10 * node.depth as i32 + 2 * node.unexplored_links.len() as i32
        - 5 * node.visit_count as i32;

    if node.in_navigation {
        score += NAVIGATION_BONUS;
    }

    let haystack = format!(
        "{} {}",
        node.title.as_deref().unwrap_or_default(),
        node.url
    )
    .to_lowercase();

    for (term, bonus) in NODE_BONUS_TERMS {
        if haystack.contains(term) {
            score += bonus;
        }
    }
    if NODE_PENALTY_TERMS.iter().any(|term| haystack.contains(term)) {
        score -= NODE_PENALTY;
    }

    score
}
