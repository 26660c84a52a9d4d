// Closed-loop pacing: keeps a sequence of variable-length actions converging
// on a fixed target duration by stretching, compressing or skipping actions.

use crate::config::duration_ms;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const MIN_SPEED_FACTOR: f64 = 0.5;
const MAX_SPEED_FACTOR: f64 = 2.0;

/// Actions at or above this priority are never skipped
const PROTECTED_PRIORITY: u8 = 80;
/// Below this priority an action may be dropped when running late
const EXPENDABLE_PRIORITY: u8 = 30;
const SKIP_SPEED_FACTOR: f64 = 1.5;

/// Anything the pacing controller can schedule.
pub trait Paced {
    fn planned_duration(&self) -> Duration;

    /// 0-100
    fn priority(&self) -> u8;

    fn is_skippable(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    #[serde(rename = "target_duration_ms", with = "duration_ms")]
    pub target_duration: Duration,
    #[serde(rename = "min_action_duration_ms", with = "duration_ms")]
    pub min_action_duration: Duration,
    #[serde(rename = "max_action_duration_ms", with = "duration_ms")]
    pub max_action_duration: Duration,
    /// Number of action timings kept
    pub history_limit: usize,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            target_duration: Duration::from_secs(60),
            min_action_duration: Duration::from_millis(500),
            max_action_duration: Duration::from_secs(10),
            history_limit: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaceState {
    Behind,
    OnTrack,
    Ahead,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTiming {
    #[serde(with = "duration_ms")]
    pub planned: Duration,
    #[serde(with = "duration_ms")]
    pub actual: Duration,
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacingStatus {
    pub progress: f64,
    pub speed_factor: f64,
    pub completed_actions: usize,
    pub skipped_actions: usize,
    pub total_actions: usize,
    #[serde(rename = "elapsedMs", with = "duration_ms")]
    pub elapsed: Duration,
    #[serde(rename = "remainingMs", with = "duration_ms")]
    pub remaining: Duration,
    /// Naive extrapolation of the total run time from progress so far
    #[serde(rename = "estimatedTotalMs", with = "duration_ms")]
    pub estimated_total: Duration,
    pub state: PaceState,
}

pub struct PacingController {
    config: PacingConfig,
    started_at: Instant,
    total_actions: usize,
    completed_actions: usize,
    skipped_actions: usize,
    speed_factor: f64,
    history: VecDeque<ActionTiming>,
}

impl PacingController {
    /// Starts the clock immediately
    pub fn new(config: PacingConfig, total_actions: usize) -> Self {
        Self {
            config,
            started_at: Instant::now(),
            total_actions,
            completed_actions: 0,
            skipped_actions: 0,
            speed_factor: 1.0,
            history: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining_time(&self) -> Duration {
        self.config.target_duration.saturating_sub(self.elapsed())
    }

    pub fn remaining_actions(&self) -> usize {
        self.total_actions.saturating_sub(self.completed_actions)
    }

    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    pub fn history(&self) -> impl Iterator<Item = &ActionTiming> {
        self.history.iter()
    }

    /// Fraction of actions done, 1.0 when there is nothing to do
    pub fn progress(&self) -> f64 {
        if self.total_actions == 0 {
            return 1.0;
        }
        (self.completed_actions as f64 / self.total_actions as f64).min(1.0)
    }

    fn time_progress(&self) -> f64 {
        let target = self.config.target_duration.as_secs_f64();
        if target <= 0.0 {
            return 1.0;
        }
        self.elapsed().as_secs_f64() / target
    }

    fn recompute_speed_factor(&mut self) {
        let action_progress = self.progress();
        self.speed_factor = if self.total_actions == 0 || action_progress <= 0.0 {
            1.0
        } else {
            (self.time_progress() / action_progress).clamp(MIN_SPEED_FACTOR, MAX_SPEED_FACTOR)
        };
    }

    /// Duration to give `action`, stretched or compressed by the current pace
    /// and its priority, always within the configured bounds.
    pub fn adjusted_duration(&self, action: &impl Paced) -> Duration {
        let min = self.config.min_action_duration;
        let max = self.config.max_action_duration.max(min);

        let priority_weight = 0.5 + f64::from(action.priority()) / 100.0;
        let seconds = action.planned_duration().as_secs_f64() / self.speed_factor * priority_weight;

        if !seconds.is_finite() || seconds <= 0.0 {
            return min;
        }
        Duration::from_secs_f64(seconds.min(max.as_secs_f64())).clamp(min, max)
    }

    pub fn should_skip_action(&self, action: &impl Paced) -> bool {
        if !action.is_skippable() || action.priority() >= PROTECTED_PRIORITY {
            return false;
        }
        if self.speed_factor > SKIP_SPEED_FACTOR && action.priority() < EXPENDABLE_PRIORITY {
            return true;
        }

        // not enough wall-clock left even at minimum duration for everything remaining
        let needed = self
            .config
            .min_action_duration
            .saturating_mul(self.remaining_actions() as u32);
        self.remaining_time() < needed
    }

    fn push_timing(&mut self, timing: ActionTiming) {
        self.history.push_back(timing);
        while self.history.len() > self.config.history_limit {
            self.history.pop_front();
        }
    }

    pub fn update(&mut self, action: &impl Paced, actual: Duration) {
        self.completed_actions += 1;
        self.push_timing(ActionTiming {
            planned: action.planned_duration(),
            actual,
            skipped: false,
        });
        self.recompute_speed_factor();
        debug!(
            "Paced action {}/{} took {:?}, speed factor {:.2}",
            self.completed_actions, self.total_actions, actual, self.speed_factor
        );
    }

    pub fn record_skip(&mut self, action: &impl Paced) {
        self.completed_actions += 1;
        self.skipped_actions += 1;
        self.push_timing(ActionTiming {
            planned: action.planned_duration(),
            actual: Duration::ZERO,
            skipped: true,
        });
        self.recompute_speed_factor();
        debug!(
            "Skipped action {}/{}, speed factor {:.2}",
            self.completed_actions, self.total_actions, self.speed_factor
        );
    }

    pub fn state(&self) -> PaceState {
        if self.speed_factor > 1.1 {
            PaceState::Behind
        } else if self.speed_factor < 0.9 {
            PaceState::Ahead
        } else {
            PaceState::OnTrack
        }
    }

    pub fn should_slow_down(&self) -> bool {
        self.speed_factor < 0.9
    }

    pub fn should_speed_up(&self) -> bool {
        self.speed_factor > 1.1
    }

    pub fn status(&self) -> PacingStatus {
        let progress = self.progress();
        let elapsed = self.elapsed();
        let estimated_total = if progress > 0.0 {
            elapsed.div_f64(progress)
        } else {
            self.config.target_duration
        };

        PacingStatus {
            progress,
            speed_factor: self.speed_factor,
            completed_actions: self.completed_actions,
            skipped_actions: self.skipped_actions,
            total_actions: self.total_actions,
            elapsed,
            remaining: self.remaining_time(),
            estimated_total,
            state: self.state(),
        }
    }
}
