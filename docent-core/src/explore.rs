// Exploration loop: drives the page through the site, asking the strategy what
// to do at every state and recording what it finds in a NavigationGraph.

use crate::collaborators::StateDetector;
use crate::config::ExploreConfig;
use crate::error::PhaseError;
use crate::graph::{EdgeKind, EdgeMeta, NavigationGraph, Node, NodeId, node_id_for};
use crate::orchestrator::Phase;
use crate::recovery::{ErrorRecovery, FaultContext, RecoveryOutcome, bounded};
use crate::strategy::{ExplorationDecision, ExplorationStrategy};
use docent_capture::{Link, PageAutomation, PageSnapshot};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Build the graph node for a freshly loaded page
pub fn node_from_snapshot(snapshot: &PageSnapshot, parent: Option<&Node>) -> Node {
    let mut node = Node::new(snapshot.url.clone())
        .with_links(snapshot.links.iter().map(|l| l.href.clone()));
    if let Some(title) = snapshot.title.as_deref().filter(|t| !t.trim().is_empty()) {
        node = node.with_title(title.trim());
    }
    if let Some(parent) = parent {
        node = node.child_of(parent);
    }
    node
}

/// Load `url`, handing every failure to recovery. `None` means recovery chose to skip it.
pub(crate) async fn navigate_with_recovery(
    page: &mut dyn PageAutomation,
    recovery: &mut ErrorRecovery,
    config: &ExploreConfig,
    url: &str,
    phase: Phase,
) -> Result<Option<PageSnapshot>, PhaseError> {
    let limit = config.navigation_timeout;
    loop {
        match bounded(limit, "navigate", page.navigate(url, config.wait, limit)).await {
            Ok(snapshot) => return Ok(Some(snapshot)),
            Err(e) => {
                let context = FaultContext::new(phase)
                    .with_url(url)
                    .with_action("navigate");
                if recovery.absorb(&e, context, page).await? == RecoveryOutcome::Skip {
                    return Ok(None);
                }
            }
        }
    }
}

/// Click `target`, switching to a substitute element when recovery finds one.
/// Returns false when recovery chose to skip the click.
pub(crate) async fn click_with_recovery(
    page: &mut dyn PageAutomation,
    recovery: &mut ErrorRecovery,
    target: &str,
    phase: Phase,
) -> Result<bool, PhaseError> {
    let limit = recovery.config().action_timeout;
    let mut selector = target.to_string();
    loop {
        match bounded(limit, "click", page.click(&selector)).await {
            Ok(()) => return Ok(true),
            Err(e) => {
                let mut context = FaultContext::new(phase)
                    .with_action("click")
                    .with_target(selector.clone());
                if let Some(url) = page.current_url() {
                    context = context.with_url(url);
                }
                match recovery.absorb(&e, context, page).await? {
                    RecoveryOutcome::Retry => {
                        if let Some(substitute) = recovery.take_substitute() {
                            selector = substitute;
                        }
                    }
                    _ => return Ok(false),
                }
            }
        }
    }
}

/// One exploration session over a single capture page.
pub struct Explorer<'a> {
    page: &'a mut dyn PageAutomation,
    strategy: &'a mut ExplorationStrategy,
    recovery: &'a mut ErrorRecovery,
    detector: Arc<dyn StateDetector>,
    config: &'a ExploreConfig,
    graph: NavigationGraph,
    current: NodeId,
    links: Vec<Link>,
}

impl<'a> Explorer<'a> {
    pub fn new(
        page: &'a mut dyn PageAutomation,
        strategy: &'a mut ExplorationStrategy,
        recovery: &'a mut ErrorRecovery,
        detector: Arc<dyn StateDetector>,
        config: &'a ExploreConfig,
    ) -> Self {
        Self {
            page,
            strategy,
            recovery,
            detector,
            config,
            graph: NavigationGraph::new(),
            current: NodeId::new(),
            links: Vec::new(),
        }
    }

    /// Explore from `start_url` until the strategy is done or the step budget runs out
    pub async fn run(mut self, start_url: &str) -> Result<NavigationGraph, PhaseError> {
        if let Some(host) = Url::parse(start_url).ok().and_then(|u| u.host_str().map(String::from)) {
            self.graph = NavigationGraph::new().with_base_domain(host);
        }

        let snapshot =
            navigate_with_recovery(self.page, self.recovery, self.config, start_url, Phase::Explore)
                .await?
                .ok_or_else(|| PhaseError::Unrecoverable {
                    phase: Phase::Explore,
                    reason: format!("start page {} could not be loaded", start_url),
                })?;
        self.settle().await?;

        let root = self.graph.add_node(node_from_snapshot(&snapshot, None))?;
        self.current = root.id.clone();
        self.links = snapshot.links;
        info!("Exploring from {}", self.current);

        let mut steps = 0;
        while steps < self.config.max_steps {
            steps += 1;
            let Some(node) = self.graph.node(&self.current).cloned() else {
                break;
            };

            let decision = self
                .strategy
                .select_next_action(&self.graph, &node, &self.links)
                .await;

            let keep_going = match decision {
                ExplorationDecision::Click { target, .. } => self.follow(&node, &target).await?,
                ExplorationDecision::Back { reason } => {
                    debug!("Leaving {}: {}", node.id, reason);
                    self.retire_if_exhausted(&node)?;
                    self.back_to_parent(&node).await?
                }
                ExplorationDecision::Skip => {
                    debug!("Dropping {} from the tour", node.id);
                    let parent = node.parent.clone();
                    self.graph.remove_node(&node.id)?;
                    match parent.and_then(|p| self.graph.node(&p).cloned()) {
                        Some(parent) => self.go_to(&parent).await?,
                        None => false,
                    }
                }
                ExplorationDecision::Done { reason } => {
                    debug!("Done at {}: {}", node.id, reason);
                    self.resume_elsewhere(&node).await?
                }
            };

            if !keep_going {
                break;
            }
        }

        let stats = self.graph.stats();
        info!(
            "Exploration finished after {} steps: {} pages, {} transitions",
            steps, stats.nodes, stats.edges
        );
        Ok(self.graph)
    }

    /// Let the page finish rendering; faults here only matter when recovery gives up
    async fn settle(&mut self) -> Result<(), PhaseError> {
        let limit = self.config.navigation_timeout;
        if let Err(e) = bounded(
            limit,
            "wait for content",
            self.detector.wait_for_content_ready(self.page, limit),
        )
        .await
        {
            let mut context = FaultContext::new(Phase::Explore).with_action("wait for content");
            if let Some(url) = self.page.current_url() {
                context = context.with_url(url);
            }
            self.recovery.absorb(&e, context, self.page).await?;
        }
        Ok(())
    }

    async fn follow(&mut self, node: &Node, target: &Link) -> Result<bool, PhaseError> {
        self.graph.mark_link_explored(&node.id, &target.href)?;

        if !click_with_recovery(self.page, self.recovery, &target.href, Phase::Explore).await? {
            return Ok(true);
        }
        self.settle().await?;

        let limit = self.recovery.config().action_timeout;
        let snapshot = match bounded(limit, "snapshot", self.page.snapshot()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let context = FaultContext::new(Phase::Explore)
                    .with_url(target.href.clone())
                    .with_action("snapshot");
                self.recovery.absorb(&e, context, self.page).await?;
                return self.go_to(node).await;
            }
        };

        let landed = node_id_for(&snapshot.url);
        let via = if landed == node_id_for(&target.href) {
            EdgeKind::Click
        } else {
            EdgeKind::Redirect
        };

        if self.graph.contains(&landed) {
            self.graph.record_visit(&landed)?;
        } else {
            let mut child = node_from_snapshot(&snapshot, Some(node));
            child.in_navigation = target.in_navigation;
            self.graph.add_node(child)?;
        }
        self.graph.add_edge(
            &node.id,
            &landed,
            EdgeMeta {
                via,
                label: Some(target.label().to_string()),
            },
        )?;

        self.link_known_pages(&landed, &snapshot.links)?;

        self.current = landed;
        self.links = snapshot.links;
        Ok(true)
    }

    /// Record links from `from` to pages already in the graph. They are never
    /// followed, but the transitions belong to the site's structure.
    fn link_known_pages(&mut self, from: &str, links: &[Link]) -> Result<(), PhaseError> {
        for link in links {
            let to = node_id_for(&link.href);
            if to == from || !self.graph.contains(&to) || self.graph.edge(from, &to).is_some() {
                continue;
            }
            self.graph.add_edge(
                from,
                &to,
                EdgeMeta {
                    via: EdgeKind::Navigation,
                    label: Some(link.label().to_string()),
                },
            )?;
        }
        Ok(())
    }

    /// A node whose remaining links can never be followed is finished
    fn retire_if_exhausted(&mut self, node: &Node) -> Result<(), PhaseError> {
        if node.has_unexplored_links()
            && self
                .strategy
                .viable_links(&self.graph, node, &self.links)
                .is_empty()
        {
            self.graph.mark_leaf(&node.id)?;
        }
        Ok(())
    }

    async fn back_to_parent(&mut self, node: &Node) -> Result<bool, PhaseError> {
        let Some(parent) = node.parent.as_deref().and_then(|p| self.graph.node(p)).cloned() else {
            return Ok(false);
        };

        let limit = self.config.navigation_timeout;
        match bounded(limit, "back", self.page.go_back(limit)).await {
            Ok(snapshot) if node_id_for(&snapshot.url) == parent.id => {
                self.graph.record_visit(&parent.id)?;
                self.current = parent.id;
                self.links = snapshot.links;
                Ok(true)
            }
            Ok(snapshot) => {
                debug!("History led to {} instead of {}", snapshot.url, parent.id);
                self.go_to(&parent).await
            }
            Err(e) => {
                debug!("Back navigation failed ({}), loading {} directly", e, parent.url);
                self.go_to(&parent).await
            }
        }
    }

    /// Load a known node directly. Returns false when it could not be reached.
    async fn go_to(&mut self, node: &Node) -> Result<bool, PhaseError> {
        let Some(snapshot) =
            navigate_with_recovery(self.page, self.recovery, self.config, &node.url, Phase::Explore)
                .await?
        else {
            warn!("Could not return to {}", node.id);
            return Ok(false);
        };
        self.settle().await?;

        self.graph.record_visit(&node.id)?;
        self.current = node.id.clone();
        self.links = snapshot.links;
        Ok(true)
    }

    /// After a `done`, continue from the most promising unfinished node if the
    /// stop was only local to this one.
    async fn resume_elsewhere(&mut self, node: &Node) -> Result<bool, PhaseError> {
        if self.graph.node_count() >= self.strategy.config().max_total_nodes {
            return Ok(false);
        }
        if !self
            .strategy
            .viable_links(&self.graph, node, &self.links)
            .is_empty()
        {
            // explicit stop while links were still open
            return Ok(false);
        }
        if node.has_unexplored_links() {
            self.graph.mark_leaf(&node.id)?;
        }

        let Some(next) = self
            .graph
            .find_best_next_node()
            .filter(|n| n.id != node.id)
            .cloned()
        else {
            return Ok(false);
        };
        debug!("Resuming exploration at {}", next.id);
        self.go_to(&next).await
    }
}
