// Tour planning: turning an explored graph into a timed sequence of scenes.

use crate::config::duration_ms;
use crate::error::PhaseError;
use crate::graph::{NavigationGraph, Node, NodeId};
use crate::pacing::Paced;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const NAVIGATE_PRIORITY: u8 = 100;
const SCROLL_PRIORITY: u8 = 50;
const PAUSE_PRIORITY: u8 = 40;
const HOVER_PRIORITY: u8 = 20;

const NAVIGATE_BASE: Duration = Duration::from_millis(3000);
const SCROLL_BASE: Duration = Duration::from_millis(2000);
const HOVER_BASE: Duration = Duration::from_millis(1500);
const PAUSE_BASE: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionKind {
    Navigate { url: String },
    Click { target: String },
    Scroll { pixels: i32 },
    Hover { target: String },
    Pause,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Navigate { .. } => "navigate",
            ActionKind::Click { .. } => "click",
            ActionKind::Scroll { .. } => "scroll",
            ActionKind::Hover { .. } => "hover",
            ActionKind::Pause => "pause",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Navigate { url } => write!(f, "navigate {}", url),
            ActionKind::Click { target } => write!(f, "click {}", target),
            ActionKind::Scroll { pixels } => write!(f, "scroll {}px", pixels),
            ActionKind::Hover { target } => write!(f, "hover {}", target),
            ActionKind::Pause => f.write_str("pause"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourAction {
    pub id: usize,
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(rename = "plannedDurationMs", with = "duration_ms")]
    pub planned_duration: Duration,
    pub priority: u8,
    pub skippable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl TourAction {
    pub fn new(id: usize, kind: ActionKind, planned_duration: Duration, priority: u8) -> Self {
        Self {
            id,
            kind,
            node_id: None,
            planned_duration,
            priority,
            skippable: true,
            caption: None,
        }
    }

    pub fn essential(mut self) -> Self {
        self.skippable = false;
        self
    }

    pub fn on_node(mut self, node_id: impl Into<NodeId>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

impl Paced for TourAction {
    fn planned_duration(&self) -> Duration {
        self.planned_duration
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn is_skippable(&self) -> bool {
        self.skippable
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Upper bound on the number of pages shown
    pub max_scenes: usize,
    pub scroll_pixels: i32,
    /// Hover over a link that was followed during exploration
    pub hover_highlights: bool,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            max_scenes: 8,
            scroll_pixels: 600,
            hover_highlights: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourPlan {
    pub actions: Vec<TourAction>,
    #[serde(rename = "targetDurationMs", with = "duration_ms")]
    pub target_duration: Duration,
}

fn page_name(node: &Node) -> String {
    node.title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| node.url.clone())
}

impl TourPlan {
    /// One scene per page, breadth-first from the root: navigate, scroll,
    /// hover a followed link, pause. Durations are scaled to `target`.
    pub fn from_graph(
        graph: &NavigationGraph,
        config: &PlanConfig,
        target: Duration,
    ) -> Result<Self, PhaseError> {
        let root_id = graph.root_id().ok_or(PhaseError::EmptyPlan)?;

        let mut scenes: Vec<Node> = Vec::new();
        let limit = config.max_scenes.max(1);
        graph.bfs(root_id, |node| {
            scenes.push(node.clone());
            scenes.len() < limit
        });
        if scenes.is_empty() {
            return Err(PhaseError::EmptyPlan);
        }

        let mut actions = Vec::new();
        for (index, node) in scenes.iter().enumerate() {
            let name = page_name(node);
            let intro = if index == 0 {
                format!("Welcome to {}", name)
            } else {
                format!("Next up: {}", name)
            };

            let next_id = actions.len();
            actions.push(
                TourAction::new(
                    next_id,
                    ActionKind::Navigate {
                        url: node.url.clone(),
                    },
                    NAVIGATE_BASE,
                    NAVIGATE_PRIORITY,
                )
                .essential()
                .on_node(node.id.clone())
                .with_caption(intro),
            );

            let next_id = actions.len();
            actions.push(
                TourAction::new(
                    next_id,
                    ActionKind::Scroll {
                        pixels: config.scroll_pixels,
                    },
                    SCROLL_BASE,
                    SCROLL_PRIORITY,
                )
                .on_node(node.id.clone()),
            );

            let highlight = node
                .explored_links
                .iter()
                .find(|href| scenes.iter().any(|s| &s.url == *href || s.id == **href));
            if config.hover_highlights
                && let Some(href) = highlight
            {
                let next_id = actions.len();
                actions.push(
                    TourAction::new(
                        next_id,
                        ActionKind::Hover {
                            target: href.clone(),
                        },
                        HOVER_BASE,
                        HOVER_PRIORITY,
                    )
                    .on_node(node.id.clone()),
                );
            }

            let next_id = actions.len();
            let mut pause = TourAction::new(next_id, ActionKind::Pause, PAUSE_BASE, PAUSE_PRIORITY)
                .on_node(node.id.clone());
            if let Some(heading) = node.title.as_deref().filter(|t| !t.trim().is_empty()) {
                pause = pause.with_caption(format!("A closer look at {}", heading.trim()));
            }
            actions.push(pause);
        }

        let mut plan = Self {
            actions,
            target_duration: target,
        };
        plan.scale_to_target();
        Ok(plan)
    }

    /// The reduced tour used when exploration or execution cannot continue
    pub fn single_state(url: &str, target: Duration) -> Self {
        let actions = vec![
            TourAction::new(
                0,
                ActionKind::Navigate {
                    url: url.to_string(),
                },
                target.mul_f64(0.3),
                NAVIGATE_PRIORITY,
            )
            .essential()
            .with_caption(format!("A quick look at {}", url)),
            TourAction::new(1, ActionKind::Scroll { pixels: 600 }, target.mul_f64(0.4), SCROLL_PRIORITY),
            TourAction::new(2, ActionKind::Pause, target.mul_f64(0.3), PAUSE_PRIORITY),
        ];

        Self {
            actions,
            target_duration: target,
        }
    }

    fn scale_to_target(&mut self) {
        let planned = self.total_planned().as_secs_f64();
        if planned <= 0.0 {
            return;
        }
        let factor = self.target_duration.as_secs_f64() / planned;
        for action in &mut self.actions {
            action.planned_duration = action.planned_duration.mul_f64(factor);
        }
    }

    pub fn total_planned(&self) -> Duration {
        self.actions.iter().map(|a| a.planned_duration).sum()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of distinct pages the tour visits
    pub fn scene_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a.kind, ActionKind::Navigate { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Completed,
    /// Dropped by the pacing controller
    Skipped,
    /// Attempted, but a fault made recovery give up on it
    Failed,
}

/// One entry of the execution timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedAction {
    pub action_id: usize,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub status: ActionStatus,
    /// Offset from the start of execution
    pub offset_ms: u64,
    pub duration_ms: u64,
}

impl ExecutedAction {
    pub fn new(action: &TourAction, status: ActionStatus, offset: Duration, duration: Duration) -> Self {
        Self {
            action_id: action.id,
            kind: action.kind.name().to_string(),
            node_id: action.node_id.clone(),
            caption: action.caption.clone(),
            status,
            offset_ms: offset.as_millis() as u64,
            duration_ms: duration.as_millis() as u64,
        }
    }
}
