pub mod cache;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod execute;
pub mod explore;
pub mod filters;
pub mod graph;
pub mod manifest;
pub mod orchestrator;
pub mod pacing;
pub mod plan;
pub mod recovery;
pub mod report;
pub mod strategy;

pub use cache::GraphCache;
pub use collaborators::{
    Collaborators, DecisionOracle, ElementAlternativeFinder, Narrator, NodeSummary, Renderer,
    StateDetector, TourMaterial,
};
pub use config::TourConfig;
pub use error::{CacheError, CollaboratorError, ConfigError, GraphError, OracleError, PhaseError};
pub use graph::{Edge, EdgeKind, EdgeMeta, NavigationGraph, Node, NodeId};
pub use manifest::{CaptionNarrator, ManifestRenderer};
pub use orchestrator::{Orchestrator, Phase, TourOutcome};
pub use pacing::{PaceState, Paced, PacingConfig, PacingController, PacingStatus};
pub use plan::{ActionKind, ActionStatus, ExecutedAction, TourAction, TourPlan};
pub use recovery::{ErrorRecovery, FaultContext, FaultKind, FaultRecord, RecoveryConfig, RecoveryOutcome};
pub use strategy::{ExplorationDecision, ExplorationStrategy, StrategyConfig, StrategyMode};

/// ASCII banner shown by the command-line tool
pub fn print_banner() {
    println!(
        r#"
     _                      _
  __| | ___   ___ ___ _ __ | |_
 / _` |/ _ \ / __/ _ \ '_ \| __|
| (_| | (_) | (_|  __/ | | | |_
 \__,_|\___/ \___\___|_| |_|\__|
        guided tours of the web, v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
