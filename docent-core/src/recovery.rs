// Fault classification, bounded retries and the circuit breaker shared by
// every phase of a run.

use crate::collaborators::{ElementAlternativeFinder, NoAlternatives, NoDetector, StateDetector};
use crate::config::duration_ms;
use crate::error::PhaseError;
use crate::orchestrator::Phase;
use chrono::{DateTime, Utc};
use docent_capture::{CaptureError, PageAutomation, WaitPolicy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Selectors tried, in order, to close an overlay when no detector handles it
pub const DISMISS_SELECTORS: &[&str] = &[
    "button[aria-label='Close']",
    "button[aria-label='close']",
    "[data-dismiss='modal']",
    ".modal .close",
    ".cookie-banner button",
    "#onetrust-accept-btn-handler",
    "button:has-text('Accept')",
    "button:has-text('Got it')",
];

/// Await one capture call for at most `limit`. A call that does not answer in
/// time fails with a timeout, which the classifier files as `timeout`.
pub(crate) async fn bounded<T>(
    limit: Duration,
    what: &str,
    call: impl Future<Output = Result<T, CaptureError>>,
) -> Result<T, CaptureError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} did not finish within {:?}", what, limit);
            Err(CaptureError::timeout(limit, what))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultKind {
    NavigationFailed,
    ElementNotFound,
    ModalBlocked,
    Timeout,
    ScreenshotFailed,
    Unknown,
}

/// Classification rules, checked in order; the first match wins
const CLASSIFICATION: &[(FaultKind, &[&str])] = &[
    (
        FaultKind::NavigationFailed,
        &[
            "navigation failed",
            "navigation",
            "net::err",
            "err_name_not_resolved",
            "connection refused",
            "dns error",
            "failed to load",
        ],
    ),
    (
        FaultKind::ElementNotFound,
        &[
            "element not found",
            "no element",
            "no node found",
            "unable to find",
            "waiting for selector",
            "not found",
        ],
    ),
    (
        FaultKind::ModalBlocked,
        &[
            "intercept",
            "overlay",
            "modal",
            "obscured",
            "not clickable",
            "blocked",
        ],
    ),
    (FaultKind::Timeout, &["timeout", "timed out", "exceeded"]),
    (FaultKind::ScreenshotFailed, &["screenshot", "capture failed"]),
];

impl FaultKind {
    /// Keyword classification over an error message
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        CLASSIFICATION
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| message.contains(k)))
            .map(|(kind, _)| *kind)
            .unwrap_or(FaultKind::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::NavigationFailed => "navigation-failed",
            FaultKind::ElementNotFound => "element-not-found",
            FaultKind::ModalBlocked => "modal-blocked",
            FaultKind::Timeout => "timeout",
            FaultKind::ScreenshotFailed => "screenshot-failed",
            FaultKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryOutcome {
    Retry,
    Skip,
    Abort,
    Fallback,
}

impl fmt::Display for RecoveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryOutcome::Retry => "retry",
            RecoveryOutcome::Skip => "skip",
            RecoveryOutcome::Abort => "abort",
            RecoveryOutcome::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// Where a fault happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultContext {
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Element the failed action was aimed at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl FaultContext {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            url: None,
            action: None,
            target: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultRecord {
    pub kind: FaultKind,
    pub context: FaultContext,
    pub resolution: RecoveryOutcome,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Strategy attempts per fault
    pub max_retries: u32,
    /// Circuit breaker ceiling across the whole run
    pub max_total_errors: u32,
    /// Recurrences of a single fault kind before giving up on it
    pub max_same_type_errors: u32,
    #[serde(rename = "retry_delay_ms", with = "duration_ms")]
    pub retry_delay: Duration,
    #[serde(rename = "action_timeout_ms", with = "duration_ms")]
    pub action_timeout: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        let max_retries = 3;
        Self {
            max_retries,
            max_total_errors: 10,
            max_same_type_errors: max_retries * 2,
            retry_delay: Duration::from_millis(1000),
            action_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryStats {
    pub total_faults: u32,
    pub by_kind: BTreeMap<FaultKind, u32>,
    pub retries: usize,
    pub skips: usize,
    pub aborts: usize,
    pub fallbacks: usize,
    pub circuit_open: bool,
}

pub struct ErrorRecovery {
    config: RecoveryConfig,
    total_faults: u32,
    per_kind: HashMap<FaultKind, u32>,
    history: Vec<FaultRecord>,
    finder: Arc<dyn ElementAlternativeFinder>,
    detector: Arc<dyn StateDetector>,
    substitute: Option<String>,
}

impl ErrorRecovery {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            total_faults: 0,
            per_kind: HashMap::new(),
            history: Vec::new(),
            finder: Arc::new(NoAlternatives),
            detector: Arc::new(NoDetector),
            substitute: None,
        }
    }

    pub fn with_finder(mut self, finder: Arc<dyn ElementAlternativeFinder>) -> Self {
        self.finder = finder;
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn StateDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn total_faults(&self) -> u32 {
        self.total_faults
    }

    pub fn history(&self) -> &[FaultRecord] {
        &self.history
    }

    /// Circuit breaker state
    pub fn should_abort(&self) -> bool {
        self.total_faults >= self.config.max_total_errors
    }

    /// Substitute target found by the last element-not-found recovery, if any
    pub fn take_substitute(&mut self) -> Option<String> {
        self.substitute.take()
    }

    pub fn reset(&mut self) {
        self.total_faults = 0;
        self.per_kind.clear();
        self.history.clear();
        self.substitute = None;
    }

    pub fn stats(&self) -> RecoveryStats {
        let mut stats = RecoveryStats {
            total_faults: self.total_faults,
            circuit_open: self.should_abort(),
            ..RecoveryStats::default()
        };
        for (kind, count) in &self.per_kind {
            stats.by_kind.insert(*kind, *count);
        }
        for record in &self.history {
            match record.resolution {
                RecoveryOutcome::Retry => stats.retries += 1,
                RecoveryOutcome::Skip => stats.skips += 1,
                RecoveryOutcome::Abort => stats.aborts += 1,
                RecoveryOutcome::Fallback => stats.fallbacks += 1,
            }
        }
        stats
    }

    fn record(
        &mut self,
        kind: FaultKind,
        context: FaultContext,
        resolution: RecoveryOutcome,
        message: String,
    ) -> RecoveryOutcome {
        info!(
            "[{}] {} fault resolved as {}: {}",
            context.phase, kind, resolution, message
        );
        self.history.push(FaultRecord {
            kind,
            context,
            resolution,
            message,
            timestamp: Utc::now(),
        });
        resolution
    }

    /// Classify a fault and decide what the caller should do about it.
    ///
    /// Never fails: a strategy attempt that errors is swallowed and counts
    /// against the retry budget, and running out of attempts means `Fallback`.
    pub async fn recover(
        &mut self,
        error: &(dyn Error + Send + Sync),
        context: FaultContext,
        page: &mut dyn PageAutomation,
    ) -> RecoveryOutcome {
        self.total_faults += 1;
        let message = error.to_string();
        let kind = FaultKind::classify(&message);

        if self.total_faults >= self.config.max_total_errors {
            warn!(
                "Circuit breaker open after {} faults",
                self.total_faults
            );
            return self.record(kind, context, RecoveryOutcome::Fallback, message);
        }

        let same_kind = {
            let count = self.per_kind.entry(kind).or_insert(0);
            *count += 1;
            *count
        };
        if same_kind >= self.config.max_same_type_errors {
            warn!("{} fault recurred {} times", kind, same_kind);
            return self.record(kind, context, RecoveryOutcome::Fallback, message);
        }

        for attempt in 1..=self.config.max_retries {
            match self.apply_strategy(kind, &context, page).await {
                Ok(outcome) => return self.record(kind, context, outcome, message),
                Err(e) => debug!(
                    "Recovery attempt {}/{} for {} failed: {}",
                    attempt, self.config.max_retries, kind, e
                ),
            }
        }

        self.record(kind, context, RecoveryOutcome::Fallback, message)
    }

    /// Run [`recover`](Self::recover) and turn a terminal verdict into a phase error
    pub async fn absorb(
        &mut self,
        error: &(dyn Error + Send + Sync),
        context: FaultContext,
        page: &mut dyn PageAutomation,
    ) -> Result<RecoveryOutcome, PhaseError> {
        let phase = context.phase;
        match self.recover(error, context, page).await {
            outcome @ (RecoveryOutcome::Retry | RecoveryOutcome::Skip) => Ok(outcome),
            RecoveryOutcome::Fallback if self.should_abort() => Err(PhaseError::CircuitOpen {
                faults: self.total_faults,
            }),
            outcome => Err(PhaseError::Unrecoverable {
                phase,
                reason: format!("{} ({})", error, outcome),
            }),
        }
    }

    async fn apply_strategy(
        &mut self,
        kind: FaultKind,
        context: &FaultContext,
        page: &mut dyn PageAutomation,
    ) -> Result<RecoveryOutcome, CaptureError> {
        if page.is_closed() {
            return Ok(RecoveryOutcome::Abort);
        }

        match kind {
            FaultKind::NavigationFailed => {
                let limit = self.config.action_timeout;
                tokio::time::sleep(self.config.retry_delay).await;
                if let Err(e) = bounded(limit, "reload", page.reload(limit)).await {
                    debug!("Reload failed: {}", e);
                    return Ok(if page.is_closed() {
                        RecoveryOutcome::Abort
                    } else {
                        RecoveryOutcome::Skip
                    });
                }
                bounded(limit, "wait for ready", page.wait_for_ready(WaitPolicy::Load, limit)).await?;
                Ok(RecoveryOutcome::Retry)
            }
            FaultKind::ElementNotFound => {
                let Some(target) = context.target.as_deref() else {
                    return Ok(RecoveryOutcome::Skip);
                };
                let finder = self.finder.clone();
                let alternatives = tokio::time::timeout(
                    self.config.action_timeout,
                    finder.find_alternatives(page, target),
                )
                .await
                .unwrap_or_default();
                match alternatives.into_iter().next() {
                    Some(substitute) => {
                        debug!("Substituting {} for {}", substitute, target);
                        self.substitute = Some(substitute);
                        Ok(RecoveryOutcome::Retry)
                    }
                    None => Ok(RecoveryOutcome::Skip),
                }
            }
            FaultKind::ModalBlocked => {
                let limit = self.config.action_timeout;
                let detector = self.detector.clone();
                if !bounded(limit, "dismiss overlays", detector.dismiss_blocking_elements(page)).await? {
                    dismiss_with_heuristics(page, limit).await?;
                }
                Ok(RecoveryOutcome::Retry)
            }
            FaultKind::Timeout | FaultKind::Unknown => Ok(RecoveryOutcome::Skip),
            FaultKind::ScreenshotFailed => {
                tokio::time::sleep(self.config.retry_delay / 2).await;
                Ok(RecoveryOutcome::Retry)
            }
        }
    }
}

/// Click the first known close control that exists, then press Escape
async fn dismiss_with_heuristics(
    page: &mut dyn PageAutomation,
    limit: Duration,
) -> Result<(), CaptureError> {
    for selector in DISMISS_SELECTORS {
        if bounded(limit, "click", page.click(selector)).await.is_ok() {
            debug!("Dismissed overlay via {}", selector);
            break;
        }
    }
    bounded(limit, "key press", page.press_key("Escape")).await
}
