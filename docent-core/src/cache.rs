use crate::error::CacheError;
use crate::graph::NavigationGraph;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Explored graphs stored as one JSON file per domain.
#[derive(Debug, Clone)]
pub struct GraphCache {
    dir: PathBuf,
}

/// File stem for a domain: lowercase, anything outside `[a-z0-9.-]` replaced
fn file_stem(domain: &str) -> String {
    domain
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl GraphCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, domain: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(domain)))
    }

    pub fn exists(&self, domain: &str) -> bool {
        self.path_for(domain).is_file()
    }

    pub fn load(&self, domain: &str) -> Result<Option<NavigationGraph>> {
        let path = self.path_for(domain);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        debug!("Loaded cached graph from {}", path.display());
        Ok(Some(NavigationGraph::from_json(&json)?))
    }

    /// Store under the graph's own base domain
    pub fn store(&self, graph: &NavigationGraph) -> Result<PathBuf> {
        let domain = graph
            .metadata()
            .base_domain
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        self.store_as(&domain, graph)
    }

    pub fn store_as(&self, domain: &str, graph: &NavigationGraph) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(domain);
        let json = graph.to_json()?;
        fs::write(&path, json).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("Cached graph for {} at {}", domain, path.display());
        Ok(path)
    }

    /// Returns whether an entry was removed
    pub fn remove(&self, domain: &str) -> Result<bool> {
        let path = self.path_for(domain);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Cached domains, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut domains: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        domains.sort();
        Ok(domains)
    }

    /// Remove every cached graph; returns how many were deleted
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for domain in self.list()? {
            if self.remove(&domain)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
