// Human and machine readable summaries of a tour run

use crate::orchestrator::TourOutcome;
use crate::plan::ActionStatus;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

fn status_label(outcome: &TourOutcome) -> &'static str {
    match (outcome.success, outcome.fallback) {
        (true, false) => "Completed",
        (true, true) => "Completed (fallback)",
        (false, _) => "Failed",
    }
}

fn format_ms(ms: u64) -> String {
    format!("{}.{:01}s", ms / 1000, (ms % 1000) / 100)
}

fn status_marker(status: ActionStatus) -> &'static str {
    match status {
        ActionStatus::Completed => "✓",
        ActionStatus::Skipped => "→",
        ActionStatus::Failed => "✗",
    }
}

pub fn generate_report(outcome: &TourOutcome, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(outcome)),
        ReportFormat::Json => generate_json_report(outcome),
        ReportFormat::Markdown => Ok(generate_markdown_report(outcome)),
    }
}

pub fn generate_text_report(outcome: &TourOutcome) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("\n                            DOCENT TOUR REPORT\n");
    report.push_str(RULE);
    report.push_str("\n\n");

    report.push_str(&format!("Run ID:       {}\n", outcome.run_id));
    report.push_str(&format!("Start URL:    {}\n", outcome.start_url));
    report.push_str(&format!("Status:       {}\n", status_label(outcome)));
    report.push_str(&format!("Duration:     {}\n", format_ms(outcome.elapsed_ms)));
    if let Some(message) = &outcome.message {
        report.push_str(&format!("Message:      {}\n", message));
    }
    report.push('\n');

    if let Some(stats) = &outcome.graph_stats {
        report.push_str(RULE);
        report.push_str("\nSITE GRAPH\n");
        report.push_str(RULE);
        report.push_str("\n\n");
        report.push_str(&format!(
            "Pages:        {}{}\n",
            stats.nodes,
            if outcome.from_cache { " (cached)" } else { "" }
        ));
        report.push_str(&format!("Transitions:  {}\n", stats.edges));
        report.push_str(&format!("Max depth:    {}\n", stats.max_depth));
        report.push_str(&format!("Unexplored:   {} links\n\n", stats.unexplored_links));

        if let Some(graph) = &outcome.graph {
            let mut pages: Vec<_> = graph.nodes.values().collect();
            pages.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.id.cmp(&b.id)));
            for page in pages {
                let indent = "    ".repeat(page.depth);
                let title = page.title.as_deref().unwrap_or("(untitled)");
                report.push_str(&format!("{}└── {}  {}\n", indent, title, page.url));
            }
            report.push('\n');
        }
    }

    if !outcome.timeline.is_empty() {
        report.push_str(RULE);
        report.push_str("\nTIMELINE\n");
        report.push_str(RULE);
        report.push_str("\n\n");
        for entry in &outcome.timeline {
            report.push_str(&format!(
                "  {} [{:>7}] {:<9} {:>6}",
                status_marker(entry.status),
                format_ms(entry.offset_ms),
                entry.kind,
                format_ms(entry.duration_ms)
            ));
            if let Some(caption) = &entry.caption {
                report.push_str(&format!("  \"{}\"", caption));
            }
            report.push('\n');
        }
        report.push('\n');
    }

    if let Some(pacing) = &outcome.pacing {
        report.push_str(&format!(
            "Pacing:       {:?}, speed factor {:.2}, {} of {} actions skipped\n\n",
            pacing.state, pacing.speed_factor, pacing.skipped_actions, pacing.total_actions
        ));
    }

    if !outcome.faults.is_empty() {
        report.push_str(RULE);
        report.push_str("\nFAULTS\n");
        report.push_str(RULE);
        report.push_str("\n\n");
        for (idx, fault) in outcome.faults.iter().enumerate() {
            report.push_str(&format!(
                "[{}] {} during {} -> {}\n    {}\n",
                idx + 1,
                fault.kind,
                fault.context.phase,
                fault.resolution,
                fault.message
            ));
        }
        report.push('\n');
    }

    if !outcome.artifacts.is_empty() {
        report.push_str("Artifacts:\n");
        for artifact in &outcome.artifacts {
            report.push_str(&format!("  • {}\n", artifact.display()));
        }
        report.push('\n');
    }

    let phases: Vec<String> = outcome
        .transitions
        .iter()
        .map(|t| t.to.to_string())
        .collect();
    report.push_str(&format!("Phases:       {}\n", phases.join(" → ")));

    report
}

pub fn generate_json_report(outcome: &TourOutcome) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Docent",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "outcome": outcome
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_markdown_report(outcome: &TourOutcome) -> String {
    let mut report = String::new();

    report.push_str("# Docent tour report\n\n");
    report.push_str("| | |\n|---|---|\n");
    report.push_str(&format!("| Run | `{}` |\n", outcome.run_id));
    report.push_str(&format!("| Start URL | {} |\n", outcome.start_url));
    report.push_str(&format!("| Status | {} |\n", status_label(outcome)));
    report.push_str(&format!("| Duration | {} |\n", format_ms(outcome.elapsed_ms)));
    if let Some(stats) = &outcome.graph_stats {
        report.push_str(&format!("| Pages | {} |\n", stats.nodes));
    }
    if let Some(message) = &outcome.message {
        report.push_str(&format!("\n> {}\n", message));
    }

    if !outcome.timeline.is_empty() {
        report.push_str("\n## Timeline\n\n| # | Offset | Action | Status | Caption |\n|---|---|---|---|---|\n");
        for entry in &outcome.timeline {
            report.push_str(&format!(
                "| {} | {} | {} | {:?} | {} |\n",
                entry.action_id,
                format_ms(entry.offset_ms),
                entry.kind,
                entry.status,
                entry.caption.as_deref().unwrap_or("")
            ));
        }
    }

    if !outcome.faults.is_empty() {
        report.push_str("\n## Faults\n\n");
        for fault in &outcome.faults {
            report.push_str(&format!(
                "- **{}** in {}: {} (_{}_)\n",
                fault.kind, fault.context.phase, fault.message, fault.resolution
            ));
        }
    }

    if !outcome.artifacts.is_empty() {
        report.push_str("\n## Artifacts\n\n");
        for artifact in &outcome.artifacts {
            report.push_str(&format!("- `{}`\n", artifact.display()));
        }
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
