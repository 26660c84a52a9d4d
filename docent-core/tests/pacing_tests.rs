// Tests for the pacing controller. Time is paused so the clock only moves
// when a test advances it.

use docent_core::pacing::{PaceState, Paced, PacingConfig, PacingController};
use std::time::Duration;
use tokio::time::advance;

struct Step {
    planned: Duration,
    priority: u8,
    skippable: bool,
}

impl Step {
    fn new(planned_ms: u64, priority: u8) -> Self {
        Self {
            planned: Duration::from_millis(planned_ms),
            priority,
            skippable: true,
        }
    }

    fn essential(mut self) -> Self {
        self.skippable = false;
        self
    }
}

impl Paced for Step {
    fn planned_duration(&self) -> Duration {
        self.planned
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn is_skippable(&self) -> bool {
        self.skippable
    }
}

fn ten_second_tour() -> PacingController {
    PacingController::new(
        PacingConfig {
            target_duration: Duration::from_secs(10),
            ..PacingConfig::default()
        },
        10,
    )
}

/// Controller whose speed factor has been pushed to the upper clamp
async fn running_late() -> PacingController {
    let mut pacing = ten_second_tour();
    advance(Duration::from_secs(8)).await;
    pacing.update(&Step::new(1000, 50), Duration::from_secs(8));
    pacing
}

/// Controller whose speed factor has been pushed to the lower clamp
async fn running_early() -> PacingController {
    let mut pacing = ten_second_tour();
    advance(Duration::from_millis(500)).await;
    for _ in 0..5 {
        pacing.update(&Step::new(1000, 50), Duration::from_millis(100));
    }
    pacing
}

#[tokio::test(start_paused = true)]
async fn test_ahead_of_schedule_slows_down() {
    let mut pacing = ten_second_tour();
    let step = Step::new(1000, 50);

    advance(Duration::from_secs(4)).await;
    for _ in 0..5 {
        pacing.update(&step, Duration::from_millis(800));
    }

    assert!((pacing.speed_factor() - 0.8).abs() < 1e-9);
    assert!(pacing.should_slow_down());
    assert!(!pacing.should_speed_up());

    let status = pacing.status();
    assert_eq!(status.state, PaceState::Ahead);
    assert!((status.progress - 0.5).abs() < 1e-9);
    assert_eq!(status.elapsed, Duration::from_secs(4));
    assert_eq!(status.remaining, Duration::from_secs(6));
    assert_eq!(status.estimated_total, Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_behind_schedule_speeds_up_and_clamps() {
    let pacing = running_late().await;

    assert_eq!(pacing.speed_factor(), 2.0);
    assert!(pacing.should_speed_up());
    assert_eq!(pacing.status().state, PaceState::Behind);
}

#[tokio::test(start_paused = true)]
async fn test_on_track_when_time_matches_progress() {
    let mut pacing = ten_second_tour();
    advance(Duration::from_secs(3)).await;
    for _ in 0..3 {
        pacing.update(&Step::new(1000, 50), Duration::from_secs(1));
    }

    assert!((pacing.speed_factor() - 1.0).abs() < 1e-9);
    assert_eq!(pacing.status().state, PaceState::OnTrack);
}

#[tokio::test(start_paused = true)]
async fn test_speed_factor_never_leaves_bounds() {
    let late = running_late().await;
    let early = running_early().await;

    assert_eq!(late.speed_factor(), 2.0);
    assert_eq!(early.speed_factor(), 0.5);
}

#[tokio::test(start_paused = true)]
async fn test_adjusted_duration_within_bounds() {
    let config = PacingConfig::default();
    let controllers = [ten_second_tour(), running_late().await, running_early().await];

    for pacing in &controllers {
        for planned_ms in [0, 1, 400, 1000, 7_500, 120_000] {
            for priority in [0, 20, 50, 80, 100] {
                let adjusted = pacing.adjusted_duration(&Step::new(planned_ms, priority));
                assert!(adjusted >= config.min_action_duration, "{:?} too short", adjusted);
                assert!(adjusted <= config.max_action_duration, "{:?} too long", adjusted);
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_adjusted_duration_scales_with_priority_and_pace() {
    let pacing = ten_second_tour();
    assert_eq!(pacing.adjusted_duration(&Step::new(2000, 50)), Duration::from_secs(2));
    assert_eq!(pacing.adjusted_duration(&Step::new(2000, 100)), Duration::from_secs(3));

    let late = running_late().await;
    assert_eq!(late.adjusted_duration(&Step::new(2000, 50)), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_skip_rules_when_running_late() {
    let pacing = running_late().await;

    assert!(pacing.should_skip_action(&Step::new(1000, 20)));
    assert!(!pacing.should_skip_action(&Step::new(1000, 20).essential()));
    assert!(!pacing.should_skip_action(&Step::new(1000, 90)));
}

#[tokio::test(start_paused = true)]
async fn test_skip_when_time_cannot_fit_remaining_actions() {
    let pacing = ten_second_tour();
    assert!(!pacing.should_skip_action(&Step::new(1000, 50)));

    // 2s left for 10 actions of at least 500ms each
    advance(Duration::from_secs(8)).await;
    assert_eq!(pacing.speed_factor(), 1.0);
    assert!(pacing.should_skip_action(&Step::new(1000, 50)));
    assert!(!pacing.should_skip_action(&Step::new(1000, 80)));
}

#[tokio::test(start_paused = true)]
async fn test_record_skip_counts_as_progress() {
    let mut pacing = ten_second_tour();
    advance(Duration::from_secs(1)).await;
    pacing.record_skip(&Step::new(1000, 10));

    let status = pacing.status();
    assert_eq!(status.completed_actions, 1);
    assert_eq!(status.skipped_actions, 1);
    assert!((status.progress - 0.1).abs() < 1e-9);
    assert!(pacing.history().all(|t| t.skipped && t.actual.is_zero()));
}

#[tokio::test(start_paused = true)]
async fn test_zero_actions_is_complete() {
    let mut pacing = PacingController::new(PacingConfig::default(), 0);
    advance(Duration::from_secs(5)).await;

    assert_eq!(pacing.progress(), 1.0);
    assert_eq!(pacing.speed_factor(), 1.0);

    pacing.update(&Step::new(1000, 50), Duration::from_secs(1));
    assert_eq!(pacing.speed_factor(), 1.0);
    assert!(pacing.status().speed_factor.is_finite());
}

#[tokio::test(start_paused = true)]
async fn test_history_is_bounded() {
    let mut pacing = PacingController::new(
        PacingConfig {
            history_limit: 3,
            ..PacingConfig::default()
        },
        10,
    );
    for i in 0..5 {
        pacing.update(&Step::new(1000 + i, 50), Duration::from_millis(10));
    }

    let planned: Vec<u128> = pacing.history().map(|t| t.planned.as_millis()).collect();
    assert_eq!(planned, vec![1002, 1003, 1004]);
}
