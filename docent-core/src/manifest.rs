// File-based Finalize collaborators: a manifest renderer that writes the tour
// timeline and graph for a downstream video pipeline, and a narrator that
// turns action captions into an SRT track.

use crate::collaborators::{Narrator, Renderer, TourMaterial};
use crate::error::CollaboratorError;
use crate::graph::NavigationGraph;
use async_trait::async_trait;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

async fn write_artifact(path: PathBuf, contents: String) -> Result<PathBuf, CollaboratorError> {
    tokio::fs::write(&path, contents)
        .await
        .map_err(|source| CollaboratorError::Io {
            path: path.clone(),
            source,
        })?;
    debug!("Wrote {}", path.display());
    Ok(path)
}

async fn ensure_dir(dir: &Path) -> Result<(), CollaboratorError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| CollaboratorError::Io {
            path: dir.to_path_buf(),
            source,
        })
}

/// Writes `tour.json`, and `graph.json` plus `graph.dot` when the tour has a graph
pub struct ManifestRenderer {
    out_dir: PathBuf,
}

impl ManifestRenderer {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

#[async_trait]
impl Renderer for ManifestRenderer {
    async fn render(&self, material: &TourMaterial) -> Result<Vec<PathBuf>, CollaboratorError> {
        ensure_dir(&self.out_dir).await?;

        let mut written = vec![
            write_artifact(
                self.out_dir.join("tour.json"),
                serde_json::to_string_pretty(material)?,
            )
            .await?,
        ];

        if let Some(snapshot) = &material.graph {
            written.push(
                write_artifact(
                    self.out_dir.join("graph.json"),
                    serde_json::to_string_pretty(snapshot)?,
                )
                .await?,
            );

            let graph = NavigationGraph::from_snapshot(snapshot.clone())
                .map_err(|e| CollaboratorError::Other(e.to_string()))?;
            written.push(write_artifact(self.out_dir.join("graph.dot"), graph.to_dot()).await?);
        }

        Ok(written)
    }
}

/// Caption track in SRT format, one cue per captioned action
pub struct CaptionNarrator {
    out_dir: PathBuf,
}

impl CaptionNarrator {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

fn srt_timestamp(ms: u64) -> String {
    format!(
        "{:02}:{:02}:{:02},{:03}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1000) % 60,
        ms % 1000
    )
}

/// Render captions as SRT; a cue lasts until the next captioned action starts
pub fn captions_to_srt(material: &TourMaterial) -> String {
    let cues: Vec<(u64, u64, &str)> = material
        .timeline
        .iter()
        .filter_map(|entry| {
            entry
                .caption
                .as_deref()
                .map(|c| (entry.offset_ms, entry.offset_ms + entry.duration_ms, c))
        })
        .collect();

    let mut srt = String::new();
    for (index, (start, end, caption)) in cues.iter().enumerate() {
        let end = cues
            .get(index + 1)
            .map(|(next, _, _)| (*next).max(*end))
            .unwrap_or(*end)
            .max(start + 1);
        let _ = writeln!(
            srt,
            "{}\n{} --> {}\n{}\n",
            index + 1,
            srt_timestamp(*start),
            srt_timestamp(end),
            caption
        );
    }
    srt
}

#[async_trait]
impl Narrator for CaptionNarrator {
    async fn narrate(&self, material: &TourMaterial) -> Result<Vec<PathBuf>, CollaboratorError> {
        let srt = captions_to_srt(material);
        if srt.is_empty() {
            return Ok(Vec::new());
        }
        ensure_dir(&self.out_dir).await?;
        Ok(vec![write_artifact(self.out_dir.join("captions.srt"), srt).await?])
    }
}
