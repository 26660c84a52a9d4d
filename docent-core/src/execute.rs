// Paced execution of a tour plan against the capture page.

use crate::collaborators::StateDetector;
use crate::config::ExploreConfig;
use crate::error::PhaseError;
use crate::explore::{click_with_recovery, navigate_with_recovery};
use crate::orchestrator::Phase;
use crate::pacing::{PacingConfig, PacingController, PacingStatus};
use crate::plan::{ActionKind, ActionStatus, ExecutedAction, TourAction, TourPlan};
use crate::recovery::{ErrorRecovery, FaultContext, RecoveryOutcome, bounded};
use docent_capture::PageAutomation;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Scrolls are split into this many increments so they read as smooth motion
const SCROLL_STEPS: i32 = 4;

pub struct Executor<'a> {
    page: &'a mut dyn PageAutomation,
    recovery: &'a mut ErrorRecovery,
    detector: Arc<dyn StateDetector>,
    config: &'a ExploreConfig,
}

impl<'a> Executor<'a> {
    pub fn new(
        page: &'a mut dyn PageAutomation,
        recovery: &'a mut ErrorRecovery,
        detector: Arc<dyn StateDetector>,
        config: &'a ExploreConfig,
    ) -> Self {
        Self {
            page,
            recovery,
            detector,
            config,
        }
    }

    /// Run every action of `plan` under a fresh pacing controller
    pub async fn run(
        mut self,
        plan: &TourPlan,
        pacing: PacingConfig,
    ) -> Result<(Vec<ExecutedAction>, PacingStatus), PhaseError> {
        let pacing = PacingConfig {
            target_duration: plan.target_duration,
            ..pacing
        };
        let mut controller = PacingController::new(pacing, plan.len());
        let started = Instant::now();
        let mut timeline = Vec::with_capacity(plan.len());

        for action in &plan.actions {
            if self.recovery.should_abort() {
                return Err(PhaseError::CircuitOpen {
                    faults: self.recovery.total_faults(),
                });
            }
            let offset = started.elapsed();

            if controller.should_skip_action(action) {
                debug!("Pacing skips action {} ({})", action.id, action.kind);
                controller.record_skip(action);
                timeline.push(ExecutedAction::new(
                    action,
                    ActionStatus::Skipped,
                    offset,
                    Duration::ZERO,
                ));
                continue;
            }

            let budget = controller.adjusted_duration(action);
            let action_started = Instant::now();
            let status = self.perform(action, budget).await?;
            let actual = action_started.elapsed();

            controller.update(action, actual);
            timeline.push(ExecutedAction::new(action, status, offset, actual));
        }

        let status = controller.status();
        info!(
            "Executed {} actions in {:?} (target {:?}, {:?})",
            timeline.len(),
            status.elapsed,
            plan.target_duration,
            status.state
        );
        Ok((timeline, status))
    }

    /// Carry out one action and hold it for `budget`
    async fn perform(&mut self, action: &TourAction, budget: Duration) -> Result<ActionStatus, PhaseError> {
        let started = Instant::now();

        let status = match &action.kind {
            ActionKind::Navigate { url } => {
                match navigate_with_recovery(self.page, self.recovery, self.config, url, Phase::Execute)
                    .await?
                {
                    Some(_) => {
                        self.settle(action).await?;
                        ActionStatus::Completed
                    }
                    None => ActionStatus::Failed,
                }
            }
            ActionKind::Click { target } => {
                if click_with_recovery(self.page, self.recovery, target, Phase::Execute).await? {
                    self.settle(action).await?;
                    ActionStatus::Completed
                } else {
                    ActionStatus::Failed
                }
            }
            ActionKind::Scroll { pixels } => self.scroll(action, *pixels, budget).await?,
            ActionKind::Hover { target } => self.hover(action, target).await?,
            ActionKind::Pause => ActionStatus::Completed,
        };

        let spent = started.elapsed();
        if spent < budget {
            tokio::time::sleep(budget - spent).await;
        }
        Ok(status)
    }

    fn context(&self, action: &TourAction) -> FaultContext {
        let mut context = FaultContext::new(Phase::Execute).with_action(action.kind.to_string());
        if let Some(url) = self.page.current_url() {
            context = context.with_url(url);
        }
        context
    }

    async fn settle(&mut self, action: &TourAction) -> Result<(), PhaseError> {
        let limit = self.config.navigation_timeout;
        if let Err(e) = bounded(
            limit,
            "wait for content",
            self.detector.wait_for_content_ready(self.page, limit),
        )
        .await
        {
            let context = self.context(action);
            self.recovery.absorb(&e, context, self.page).await?;
        }
        Ok(())
    }

    async fn scroll(
        &mut self,
        action: &TourAction,
        pixels: i32,
        budget: Duration,
    ) -> Result<ActionStatus, PhaseError> {
        let increment = pixels / SCROLL_STEPS;
        let step_pause = budget / (SCROLL_STEPS as u32 * 2);

        let limit = self.recovery.config().action_timeout;
        let mut done = 0;
        while done < SCROLL_STEPS {
            match bounded(limit, "scroll", self.page.scroll(increment)).await {
                Ok(()) => {
                    done += 1;
                    tokio::time::sleep(step_pause).await;
                }
                Err(e) => {
                    let context = self.context(action);
                    if self.recovery.absorb(&e, context, self.page).await? == RecoveryOutcome::Skip {
                        return Ok(ActionStatus::Failed);
                    }
                }
            }
        }
        Ok(ActionStatus::Completed)
    }

    async fn hover(&mut self, action: &TourAction, target: &str) -> Result<ActionStatus, PhaseError> {
        let limit = self.recovery.config().action_timeout;
        let mut selector = target.to_string();
        loop {
            match bounded(limit, "hover", self.page.hover(&selector)).await {
                Ok(()) => return Ok(ActionStatus::Completed),
                Err(e) => {
                    let context = self.context(action).with_target(selector.clone());
                    match self.recovery.absorb(&e, context, self.page).await? {
                        RecoveryOutcome::Retry => {
                            if let Some(substitute) = self.recovery.take_substitute() {
                                selector = substitute;
                            }
                        }
                        _ => return Ok(ActionStatus::Failed),
                    }
                }
            }
        }
    }
}
