// Phased state machine driving a whole tour:
// Init → Explore → Plan → Execute → Finalize → Done, with a Fallback path
// reachable from any phase and a Cleanup step that always runs.

use crate::cache::GraphCache;
use crate::collaborators::{Collaborators, TourMaterial};
use crate::config::TourConfig;
use crate::error::PhaseError;
use crate::execute::Executor;
use crate::explore::Explorer;
use crate::filters::same_domain;
use crate::graph::{GraphSnapshot, GraphStats, NavigationGraph};
use crate::pacing::PacingStatus;
use crate::plan::{ActionKind, ActionStatus, ExecutedAction, TourPlan};
use crate::recovery::{
    ErrorRecovery, FaultContext, FaultRecord, RecoveryOutcome, RecoveryStats, bounded,
};
use crate::strategy::ExplorationStrategy;
use docent_capture::PageAutomation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Init,
    Explore,
    Plan,
    Execute,
    Finalize,
    Fallback,
    Cleanup,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Explore => "explore",
            Phase::Plan => "plan",
            Phase::Execute => "execute",
            Phase::Finalize => "finalize",
            Phase::Fallback => "fallback",
            Phase::Cleanup => "cleanup",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    /// Offset from the start of the run
    pub at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Everything a run produced, successful or not.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourOutcome {
    pub success: bool,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub run_id: String,
    pub start_url: String,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<GraphSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_stats: Option<GraphStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<TourPlan>,
    pub timeline: Vec<ExecutedAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pacing: Option<PacingStatus>,
    pub faults: Vec<FaultRecord>,
    pub fault_stats: RecoveryStats,
    pub artifacts: Vec<PathBuf>,
    pub transitions: Vec<PhaseTransition>,
    pub elapsed_ms: u64,
}

impl TourOutcome {
    pub fn completed_actions(&self) -> usize {
        self.timeline
            .iter()
            .filter(|a| a.status == ActionStatus::Completed)
            .count()
    }
}

/// Host used for domain filtering and cache keys, without a leading `www.`
fn base_domain(url: &str) -> Option<String> {
    let host = Url::parse(url).ok()?.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

pub struct Orchestrator {
    start_url: String,
    config: TourConfig,
    page: Box<dyn PageAutomation>,
    collaborators: Collaborators,
    recovery: ErrorRecovery,
    cache: Option<GraphCache>,
    run_id: String,
    phase: Phase,
    transitions: Vec<PhaseTransition>,
    started_at: Instant,
    graph: Option<NavigationGraph>,
    from_cache: bool,
    plan: Option<TourPlan>,
    timeline: Vec<ExecutedAction>,
    pacing: Option<PacingStatus>,
    artifacts: Vec<PathBuf>,
}

impl Orchestrator {
    pub fn new(start_url: impl Into<String>, page: Box<dyn PageAutomation>, config: TourConfig) -> Self {
        let collaborators = Collaborators::default();
        let recovery = Self::build_recovery(&config, &collaborators);
        Self {
            start_url: start_url.into(),
            config,
            page,
            collaborators,
            recovery,
            cache: None,
            run_id: Uuid::new_v4().to_string(),
            phase: Phase::Init,
            transitions: Vec::new(),
            started_at: Instant::now(),
            graph: None,
            from_cache: false,
            plan: None,
            timeline: Vec::new(),
            pacing: None,
            artifacts: Vec::new(),
        }
    }

    fn build_recovery(config: &TourConfig, collaborators: &Collaborators) -> ErrorRecovery {
        ErrorRecovery::new(config.recovery.clone())
            .with_finder(collaborators.finder.clone())
            .with_detector(collaborators.detector.clone())
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.recovery = Self::build_recovery(&self.config, &collaborators);
        self.collaborators = collaborators;
        self
    }

    pub fn with_cache(mut self, cache: GraphCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn transition(&mut self, to: Phase, note: Option<String>) {
        let from = self.phase;
        match &note {
            Some(note) => info!("Phase {} -> {} ({})", from, to, note),
            None => info!("Phase {} -> {}", from, to),
        }
        self.transitions.push(PhaseTransition {
            from,
            to,
            at_ms: self.started_at.elapsed().as_millis() as u64,
            note,
        });
        self.phase = to;
    }

    /// Run the whole tour. Never fails: problems are reported on the outcome.
    pub async fn run(mut self) -> TourOutcome {
        self.started_at = Instant::now();
        info!("Starting tour {} of {}", self.run_id, self.start_url);

        let (success, fallback, message) = match self.run_phases().await {
            Ok(()) => (true, false, None),
            Err(err) => {
                warn!("Tour interrupted: {}", err);
                self.transition(Phase::Fallback, Some(err.to_string()));
                match self.run_fallback().await {
                    Ok(()) => (
                        true,
                        true,
                        Some(format!("Fell back to a single-page tour: {}", err)),
                    ),
                    Err(fallback_err) => {
                        error!("Fallback failed: {}", fallback_err);
                        (false, false, Some(fallback_err.to_string()))
                    }
                }
            }
        };

        self.cleanup().await;
        self.transition(Phase::Done, None);
        self.into_outcome(success, fallback, message)
    }

    async fn run_phases(&mut self) -> Result<(), PhaseError> {
        for phase in [Phase::Explore, Phase::Plan, Phase::Execute, Phase::Finalize] {
            self.transition(phase, None);
            loop {
                let result = match phase {
                    Phase::Explore => self.explore().await,
                    Phase::Plan => self.plan(),
                    Phase::Execute => self.execute().await,
                    _ => self.finalize(false).await,
                };
                match result {
                    Ok(()) => break,
                    Err(err) => self.route_failure(phase, err).await?,
                }
            }
        }
        Ok(())
    }

    /// Hand a phase failure to recovery. `Ok` means run the phase again.
    async fn route_failure(&mut self, phase: Phase, err: PhaseError) -> Result<(), PhaseError> {
        if err.is_terminal() {
            return Err(err);
        }

        let url = self
            .page
            .current_url()
            .unwrap_or_else(|| self.start_url.clone());
        let context = FaultContext::new(phase).with_url(url);

        match self.recovery.recover(&err, context, self.page.as_mut()).await {
            RecoveryOutcome::Retry | RecoveryOutcome::Skip => {
                warn!("{} phase failed ({}), running it again", phase, err);
                Ok(())
            }
            RecoveryOutcome::Abort | RecoveryOutcome::Fallback => Err(err),
        }
    }

    async fn explore(&mut self) -> Result<(), PhaseError> {
        let domain = base_domain(&self.start_url);

        if self.config.cache.enabled
            && let (Some(cache), Some(domain)) = (&self.cache, &domain)
        {
            match cache.load(domain) {
                Ok(Some(graph)) => {
                    info!("Reusing cached graph for {} ({} pages)", domain, graph.node_count());
                    self.graph = Some(graph);
                    self.from_cache = true;
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable cache entry for {}: {}", domain, e),
            }
        }

        let mut strategy = ExplorationStrategy::new(self.config.strategy.clone())
            .with_oracle(self.collaborators.oracle.clone());
        if self.config.explore.default_filters {
            strategy = strategy.with_default_filters();
        }
        if self.config.explore.same_domain_only
            && let Some(domain) = &domain
        {
            strategy = strategy.with_filter(same_domain(domain));
        }

        let graph = Explorer::new(
            self.page.as_mut(),
            &mut strategy,
            &mut self.recovery,
            self.collaborators.detector.clone(),
            &self.config.explore,
        )
        .run(&self.start_url)
        .await?;

        let stats = strategy.stats();
        info!(
            "Strategy made {} decisions, skipped {} of {} links",
            stats.decisions, stats.links_skipped, stats.links_evaluated
        );

        if self.config.cache.enabled
            && let Some(cache) = &self.cache
        {
            let stored = match &domain {
                Some(domain) => cache.store_as(domain, &graph),
                None => cache.store(&graph),
            };
            if let Err(e) = stored {
                warn!("Could not cache graph: {}", e);
            }
        }

        self.graph = Some(graph);
        Ok(())
    }

    fn plan(&mut self) -> Result<(), PhaseError> {
        let graph = self.graph.as_ref().ok_or(PhaseError::EmptyPlan)?;
        let plan = TourPlan::from_graph(graph, &self.config.plan, self.config.target_duration())?;
        info!(
            "Planned {} actions across {} pages for {:?}",
            plan.len(),
            plan.scene_count(),
            plan.target_duration
        );
        self.plan = Some(plan);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), PhaseError> {
        let plan = self.plan.clone().ok_or(PhaseError::EmptyPlan)?;

        let (timeline, status) = Executor::new(
            self.page.as_mut(),
            &mut self.recovery,
            self.collaborators.detector.clone(),
            &self.config.explore,
        )
        .run(&plan, self.config.pacing.clone())
        .await?;

        self.timeline = timeline;
        self.pacing = Some(status);
        Ok(())
    }

    async fn finalize(&mut self, fallback: bool) -> Result<(), PhaseError> {
        let material = TourMaterial {
            run_id: self.run_id.clone(),
            start_url: self.start_url.clone(),
            fallback,
            graph: if fallback {
                None
            } else {
                self.graph.as_ref().map(NavigationGraph::to_snapshot)
            },
            plan: self
                .plan
                .clone()
                .unwrap_or_else(|| TourPlan::single_state(&self.start_url, self.config.target_duration())),
            timeline: self.timeline.clone(),
        };

        let renderer = self.collaborators.renderer.clone();
        let narrator = self.collaborators.narrator.clone();
        let (rendered, narrated) =
            futures::join!(renderer.render(&material), narrator.narrate(&material));

        let mut artifacts = rendered?;
        artifacts.extend(narrated?);
        info!("Finalized {} artifacts", artifacts.len());
        self.artifacts = artifacts;
        Ok(())
    }

    /// Reduced single-page tour: no exploration, no pacing, no recovery.
    async fn run_fallback(&mut self) -> Result<(), PhaseError> {
        let plan = TourPlan::single_state(&self.start_url, self.config.target_duration());
        let navigation_limit = self.config.explore.navigation_timeout;
        let action_limit = self.config.recovery.action_timeout;
        let started = Instant::now();
        let mut timeline = Vec::with_capacity(plan.len());

        for action in &plan.actions {
            let offset = started.elapsed();
            let action_started = Instant::now();

            let status = match &action.kind {
                ActionKind::Navigate { url } => {
                    bounded(
                        navigation_limit,
                        "navigate",
                        self.page.navigate(url, self.config.explore.wait, navigation_limit),
                    )
                    .await?;
                    ActionStatus::Completed
                }
                ActionKind::Scroll { pixels } => match bounded(
                    action_limit,
                    "scroll",
                    self.page.scroll(*pixels),
                )
                .await
                {
                    Ok(()) => ActionStatus::Completed,
                    Err(e) => {
                        warn!("Fallback scroll failed: {}", e);
                        ActionStatus::Failed
                    }
                },
                _ => ActionStatus::Completed,
            };

            let spent = action_started.elapsed();
            if spent < action.planned_duration {
                tokio::time::sleep(action.planned_duration - spent).await;
            }
            timeline.push(ExecutedAction::new(action, status, offset, action_started.elapsed()));
        }

        self.plan = Some(plan);
        self.timeline = timeline;
        self.pacing = None;
        self.finalize(true).await
    }

    async fn cleanup(&mut self) {
        self.transition(Phase::Cleanup, None);
        let limit = self.config.recovery.action_timeout;
        if !self.page.is_closed()
            && let Err(e) = bounded(limit, "close", self.page.close()).await
        {
            warn!("Failed to close capture session: {}", e);
        }
    }

    fn into_outcome(self, success: bool, fallback: bool, message: Option<String>) -> TourOutcome {
        let elapsed_ms = self.started_at.elapsed().as_millis() as u64;
        // a fallback tour never used what exploration found
        let graph = if fallback { None } else { self.graph };
        TourOutcome {
            success,
            fallback,
            message,
            run_id: self.run_id,
            start_url: self.start_url,
            from_cache: self.from_cache,
            graph: graph.as_ref().map(NavigationGraph::to_snapshot),
            graph_stats: graph.as_ref().map(NavigationGraph::stats),
            plan: self.plan,
            timeline: self.timeline,
            pacing: self.pacing,
            faults: self.recovery.history().to_vec(),
            fault_stats: self.recovery.stats(),
            artifacts: self.artifacts,
            transitions: self.transitions,
            elapsed_ms,
        }
    }
}
