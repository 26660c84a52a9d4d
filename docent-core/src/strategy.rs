// Exploration policy: which link to follow next, when to backtrack, and when to stop.

use crate::collaborators::{DecisionOracle, NoOracle, NodeSummary};
use crate::config::duration_ms;
use crate::filters::{LinkFilter, default_filters, passes_all};
use crate::graph::{NavigationGraph, Node, node_id_for};
use docent_capture::Link;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Link vocabulary worth touring, with its weight
const POSITIVE_TERMS: &[(&str, i32)] = &[
    ("feature", 20),
    ("product", 15),
    ("pricing", 15),
    ("demo", 12),
    ("tour", 10),
    ("solution", 8),
    ("how it works", 8),
    ("plans", 8),
    ("integration", 6),
    ("use case", 6),
    ("customers", 4),
];

const NEGATIVE_TERMS: &[(&str, i32)] = &[
    ("login", -50),
    ("log in", -50),
    ("sign in", -50),
    ("signin", -50),
    ("sign up", -50),
    ("signup", -50),
    ("register", -50),
    ("privacy", -40),
    ("terms", -40),
    ("legal", -40),
    ("cookie", -40),
    ("career", -30),
    ("jobs", -30),
    ("hiring", -30),
];

const NAVIGATION_LINK_BONUS: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyMode {
    #[default]
    Priority,
    DepthFirst,
    BreadthFirst,
    AiGuided,
}

impl StrategyMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "priority" => Some(StrategyMode::Priority),
            "depth-first" | "dfs" => Some(StrategyMode::DepthFirst),
            "breadth-first" | "bfs" => Some(StrategyMode::BreadthFirst),
            "ai-guided" | "ai" => Some(StrategyMode::AiGuided),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyMode::Priority => "priority",
            StrategyMode::DepthFirst => "depth-first",
            StrategyMode::BreadthFirst => "breadth-first",
            StrategyMode::AiGuided => "ai-guided",
        }
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub mode: StrategyMode,
    pub max_depth: usize,
    pub max_nodes_per_level: usize,
    pub max_total_nodes: usize,
    /// Free-text steer passed to the decision oracle
    pub focus: Option<String>,
    #[serde(rename = "oracle_timeout_ms", with = "duration_ms")]
    pub oracle_timeout: Duration,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            mode: StrategyMode::Priority,
            max_depth: 3,
            max_nodes_per_level: 8,
            max_total_nodes: 20,
            focus: None,
            oracle_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplorationDecision {
    Click { target: Link, reason: String },
    Back { reason: String },
    Done { reason: String },
    /// The current state should not be toured; leave it
    Skip,
}

impl ExplorationDecision {
    pub fn label(&self) -> &'static str {
        match self {
            ExplorationDecision::Click { .. } => "click",
            ExplorationDecision::Back { .. } => "back",
            ExplorationDecision::Done { .. } => "done",
            ExplorationDecision::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StrategyStats {
    pub links_evaluated: usize,
    pub links_skipped: usize,
    pub decisions: usize,
    pub oracle_fallbacks: usize,
}

#[derive(Debug, Deserialize)]
struct OracleReply {
    action: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

pub struct ExplorationStrategy {
    config: StrategyConfig,
    filters: Vec<LinkFilter>,
    oracle: Arc<dyn DecisionOracle>,
    processed: HashSet<String>,
    stats: StrategyStats,
}

impl ExplorationStrategy {
    /// A strategy with no link filters registered
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            config,
            filters: Vec::new(),
            oracle: Arc::new(NoOracle),
            processed: HashSet::new(),
            stats: StrategyStats::default(),
        }
    }

    pub fn with_default_filters(mut self) -> Self {
        self.filters.extend(default_filters());
        self
    }

    pub fn with_filter(mut self, filter: LinkFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn DecisionOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn stats(&self) -> StrategyStats {
        self.stats
    }

    pub fn mark_processed(&mut self, url: &str) {
        self.processed.insert(node_id_for(url));
    }

    pub fn is_processed(&self, url: &str) -> bool {
        self.processed.contains(&node_id_for(url))
    }

    fn budget_exhausted(&self, graph: &NavigationGraph) -> bool {
        graph.node_count() >= self.config.max_total_nodes
    }

    fn rejection(&self, graph: &NavigationGraph, node: &Node, link: &Link) -> Option<&'static str> {
        let key = node_id_for(&link.href);
        let child_depth = node.depth + 1;

        if self.processed.contains(&key) || graph.contains(&key) {
            Some("already processed")
        } else if !passes_all(&self.filters, link, node) {
            Some("rejected by filter")
        } else if child_depth > self.config.max_depth {
            Some("depth limit")
        } else if graph.nodes_at_depth(child_depth) >= self.config.max_nodes_per_level {
            Some("level full")
        } else if self.budget_exhausted(graph) {
            Some("node budget exhausted")
        } else {
            None
        }
    }

    /// Links from `available` that would survive filtering, in discovery order
    pub fn viable_links(&self, graph: &NavigationGraph, node: &Node, available: &[Link]) -> Vec<Link> {
        let mut seen = HashSet::new();
        available
            .iter()
            .filter(|link| seen.insert(node_id_for(&link.href)))
            .filter(|link| self.rejection(graph, node, link).is_none())
            .cloned()
            .collect()
    }

    fn filter_links(&mut self, graph: &NavigationGraph, node: &Node, available: &[Link]) -> Vec<Link> {
        let mut seen = HashSet::new();
        let mut survivors = Vec::new();

        for link in available {
            self.stats.links_evaluated += 1;
            let reason = if seen.insert(node_id_for(&link.href)) {
                self.rejection(graph, node, link)
            } else {
                Some("duplicate")
            };

            match reason {
                Some(reason) => {
                    self.stats.links_skipped += 1;
                    debug!("Skipping {} ({})", link.href, reason);
                }
                None => survivors.push(link.clone()),
            }
        }
        survivors
    }

    /// Whether any of the parent's unexplored links could still be followed
    fn parent_has_viable_links(&self, graph: &NavigationGraph, node: &Node) -> bool {
        let Some(parent) = node.parent.as_deref().and_then(|p| graph.node(p)) else {
            return false;
        };
        parent
            .unexplored_links
            .iter()
            .any(|href| self.rejection(graph, parent, &Link::new(href.clone(), "")).is_none())
    }

    pub fn should_go_back(&self, graph: &NavigationGraph, node: &Node) -> bool {
        !node.has_unexplored_links()
            || node.depth >= self.config.max_depth
            || (self.config.mode == StrategyMode::BreadthFirst
                && self.parent_has_viable_links(graph, node))
    }

    fn back_or_done(node: &Node, reason: impl Into<String>) -> ExplorationDecision {
        let reason = reason.into();
        if node.parent.is_some() {
            ExplorationDecision::Back { reason }
        } else {
            ExplorationDecision::Done { reason }
        }
    }

    /// Decide the next navigation step from `node`, given the links visible on it.
    ///
    /// Never fails: an unusable oracle answer falls back to priority scoring.
    pub async fn select_next_action(
        &mut self,
        graph: &NavigationGraph,
        node: &Node,
        available: &[Link],
    ) -> ExplorationDecision {
        let decision = self.decide(graph, node, available).await;

        self.stats.decisions += 1;
        if let ExplorationDecision::Click { target, reason } = &decision {
            self.processed.insert(node_id_for(&target.href));
            info!("[{}] click {} ({})", self.config.mode, target.label(), reason);
        } else {
            debug!("[{}] {} at {}", self.config.mode, decision.label(), node.id);
        }
        decision
    }

    async fn decide(
        &mut self,
        graph: &NavigationGraph,
        node: &Node,
        available: &[Link],
    ) -> ExplorationDecision {
        let own_link = Link::new(node.url.clone(), node.title.clone().unwrap_or_default());
        if node.parent.is_some() && !passes_all(&self.filters, &own_link, node) {
            return ExplorationDecision::Skip;
        }

        let candidates = self.filter_links(graph, node, available);

        if candidates.is_empty() {
            if self.budget_exhausted(graph) {
                return ExplorationDecision::Done {
                    reason: format!("node budget of {} reached", self.config.max_total_nodes),
                };
            }
            return Self::back_or_done(node, "no valid links remain");
        }

        if self.should_go_back(graph, node) {
            return Self::back_or_done(node, "backtracking");
        }

        if self.budget_exhausted(graph) {
            return ExplorationDecision::Done {
                reason: format!("node budget of {} reached", self.config.max_total_nodes),
            };
        }

        match self.config.mode {
            StrategyMode::Priority => self.pick_by_priority(&candidates),
            StrategyMode::DepthFirst | StrategyMode::BreadthFirst => ExplorationDecision::Click {
                target: candidates[0].clone(),
                reason: format!("next link in {} order", self.config.mode),
            },
            StrategyMode::AiGuided => self.consult_oracle(node, &candidates).await,
        }
    }

    fn pick_by_priority(&self, candidates: &[Link]) -> ExplorationDecision {
        let mut best = &candidates[0];
        let mut best_score = score_link(best);
        for link in &candidates[1..] {
            let score = score_link(link);
            if score > best_score {
                best = link;
                best_score = score;
            }
        }

        ExplorationDecision::Click {
            target: best.clone(),
            reason: format!("highest priority score ({})", best_score),
        }
    }

    async fn consult_oracle(&mut self, node: &Node, candidates: &[Link]) -> ExplorationDecision {
        let summary = NodeSummary::from(node);
        let labels: Vec<String> = candidates.iter().map(|l| l.label().to_string()).collect();
        let oracle = self.oracle.clone();

        let response = tokio::time::timeout(
            self.config.oracle_timeout,
            oracle.decide(&summary, &labels, self.config.focus.as_deref()),
        )
        .await;

        let reply = match response {
            Ok(Ok(text)) => parse_oracle_reply(&text),
            Ok(Err(e)) => {
                debug!("Oracle unavailable: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    "Oracle timed out after {:?}",
                    self.config.oracle_timeout
                );
                None
            }
        };

        if let Some(reply) = reply {
            let reason = reply
                .reason
                .clone()
                .unwrap_or_else(|| "oracle decision".to_string());
            match reply.action.trim().to_lowercase().as_str() {
                "click" => {
                    if let Some(target) = reply
                        .target
                        .as_deref()
                        .and_then(|t| match_candidate(candidates, t))
                    {
                        return ExplorationDecision::Click { target, reason };
                    }
                    warn!("Oracle picked a link outside the candidate set: {:?}", reply.target);
                }
                "back" if node.parent.is_some() => return ExplorationDecision::Back { reason },
                "done" => return ExplorationDecision::Done { reason },
                other => warn!("Unusable oracle action '{}'", other),
            }
        }

        self.stats.oracle_fallbacks += 1;
        match self.pick_by_priority(candidates) {
            ExplorationDecision::Click { target, reason } => ExplorationDecision::Click {
                target,
                reason: format!("{} (oracle fallback)", reason),
            },
            other => other,
        }
    }
}

/// Keyword-weighted interest of a link for a product tour
pub fn score_link(link: &Link) -> i32 {
    let haystack = format!("{} {}", link.text, link.href).to_lowercase();
    let mut score = 0;

    for (term, weight) in POSITIVE_TERMS.iter().chain(NEGATIVE_TERMS) {
        if haystack.contains(term) {
            score += weight;
        }
    }
    if link.in_navigation {
        score += NAVIGATION_LINK_BONUS;
    }
    score
}

fn parse_oracle_reply(text: &str) -> Option<OracleReply> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn match_candidate(candidates: &[Link], target: &str) -> Option<Link> {
    let wanted = target.trim().to_lowercase();
    let wanted_id = node_id_for(target);
    candidates
        .iter()
        .find(|l| {
            l.label().to_lowercase() == wanted
                || l.href.to_lowercase() == wanted
                || node_id_for(&l.href) == wanted_id
        })
        .cloned()
}
