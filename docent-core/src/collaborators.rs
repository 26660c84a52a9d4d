// Capability interfaces for the external collaborators the core consumes.
//
// Each optional capability has a null-object implementation so the core
// always calls a concrete method instead of probing for presence.

use crate::error::{CollaboratorError, OracleError};
use crate::graph::{GraphSnapshot, Node};
use crate::plan::{ExecutedAction, TourPlan};
use async_trait::async_trait;
use docent_capture::{CaptureError, PageAutomation, WaitPolicy};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// What the decision oracle is told about the current state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub url: String,
    pub title: Option<String>,
    pub depth: usize,
    pub explored_links: usize,
    pub unexplored_links: usize,
}

impl From<&Node> for NodeSummary {
    fn from(node: &Node) -> Self {
        Self {
            url: node.url.clone(),
            title: node.title.clone(),
            depth: node.depth,
            explored_links: node.explored_links.len(),
            unexplored_links: node.unexplored_links.len(),
        }
    }
}

/// External decision maker for AI-guided exploration.
///
/// Returns the raw response text; the strategy parses it as
/// `{"action": "click"|"back"|"done", "target": "...", "reason": "..."}`.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(
        &self,
        node: &NodeSummary,
        candidates: &[String],
        focus: Option<&str>,
    ) -> Result<String, OracleError>;
}

pub struct NoOracle;

#[async_trait]
impl DecisionOracle for NoOracle {
    async fn decide(
        &self,
        _node: &NodeSummary,
        _candidates: &[String],
        _focus: Option<&str>,
    ) -> Result<String, OracleError> {
        Err(OracleError::Unavailable)
    }
}

/// Suggests substitute targets when an element cannot be found
#[async_trait]
pub trait ElementAlternativeFinder: Send + Sync {
    async fn find_alternatives(
        &self,
        page: &mut dyn PageAutomation,
        failed_target: &str,
    ) -> Vec<String>;
}

pub struct NoAlternatives;

#[async_trait]
impl ElementAlternativeFinder for NoAlternatives {
    async fn find_alternatives(
        &self,
        _page: &mut dyn PageAutomation,
        _failed_target: &str,
    ) -> Vec<String> {
        Vec::new()
    }
}

/// Looks for links on the current page whose text or href shares a word with the failed target.
pub struct SimilarLinkFinder;

impl SimilarLinkFinder {
    fn keywords(target: &str) -> Vec<String> {
        target
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2 && !matches!(*w, "href" | "http" | "https" | "www" | "com"))
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl ElementAlternativeFinder for SimilarLinkFinder {
    async fn find_alternatives(
        &self,
        page: &mut dyn PageAutomation,
        failed_target: &str,
    ) -> Vec<String> {
        let Ok(snapshot) = page.snapshot().await else {
            return Vec::new();
        };
        let keywords = Self::keywords(failed_target);
        if keywords.is_empty() {
            return Vec::new();
        }

        snapshot
            .links
            .iter()
            .filter(|link| link.href != failed_target)
            .filter(|link| {
                let haystack = format!("{} {}", link.text, link.href).to_lowercase();
                keywords.iter().any(|k| haystack.contains(k.as_str()))
            })
            .map(|link| link.href.clone())
            .collect()
    }
}

/// Detects and clears page states that block interaction
#[async_trait]
pub trait StateDetector: Send + Sync {
    /// Returns true when something was dismissed
    async fn dismiss_blocking_elements(
        &self,
        page: &mut dyn PageAutomation,
    ) -> Result<bool, CaptureError>;

    async fn wait_for_content_ready(
        &self,
        page: &mut dyn PageAutomation,
        timeout: Duration,
    ) -> Result<(), CaptureError>;
}

/// Dismisses nothing and defers readiness to the page's own load signal
pub struct NoDetector;

#[async_trait]
impl StateDetector for NoDetector {
    async fn dismiss_blocking_elements(
        &self,
        _page: &mut dyn PageAutomation,
    ) -> Result<bool, CaptureError> {
        Ok(false)
    }

    async fn wait_for_content_ready(
        &self,
        page: &mut dyn PageAutomation,
        timeout: Duration,
    ) -> Result<(), CaptureError> {
        page.wait_for_ready(WaitPolicy::Load, timeout).await
    }
}

/// Everything produced by a run, handed to the Finalize collaborators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourMaterial {
    pub run_id: String,
    pub start_url: String,
    pub fallback: bool,
    pub graph: Option<GraphSnapshot>,
    pub plan: TourPlan,
    pub timeline: Vec<ExecutedAction>,
}

/// Turns tour material into recording artifacts
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, material: &TourMaterial) -> Result<Vec<PathBuf>, CollaboratorError>;
}

/// Produces the narration track for a tour
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, material: &TourMaterial) -> Result<Vec<PathBuf>, CollaboratorError>;
}

pub struct NoRenderer;

#[async_trait]
impl Renderer for NoRenderer {
    async fn render(&self, _material: &TourMaterial) -> Result<Vec<PathBuf>, CollaboratorError> {
        Ok(Vec::new())
    }
}

pub struct NoNarrator;

#[async_trait]
impl Narrator for NoNarrator {
    async fn narrate(&self, _material: &TourMaterial) -> Result<Vec<PathBuf>, CollaboratorError> {
        Ok(Vec::new())
    }
}

/// The set of collaborators an orchestrator run is wired with
#[derive(Clone)]
pub struct Collaborators {
    pub oracle: Arc<dyn DecisionOracle>,
    pub finder: Arc<dyn ElementAlternativeFinder>,
    pub detector: Arc<dyn StateDetector>,
    pub renderer: Arc<dyn Renderer>,
    pub narrator: Arc<dyn Narrator>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            oracle: Arc::new(NoOracle),
            finder: Arc::new(SimilarLinkFinder),
            detector: Arc::new(NoDetector),
            renderer: Arc::new(NoRenderer),
            narrator: Arc::new(NoNarrator),
        }
    }
}

impl Collaborators {
    pub fn with_oracle(mut self, oracle: Arc<dyn DecisionOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_finder(mut self, finder: Arc<dyn ElementAlternativeFinder>) -> Self {
        self.finder = finder;
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn StateDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = narrator;
        self
    }
}
