// Tour configuration, loaded from TOML. Every field has a default so an empty
// file (or no file at all) yields a usable configuration.

use crate::error::ConfigError;
use crate::pacing::PacingConfig;
use crate::plan::PlanConfig;
use crate::recovery::RecoveryConfig;
use crate::strategy::StrategyConfig;
use docent_capture::WaitPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Durations are written as whole milliseconds on disk.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExploreConfig {
    pub wait: WaitPolicy,
    #[serde(rename = "navigation_timeout_ms", with = "duration_ms")]
    pub navigation_timeout: Duration,
    /// Hard stop on the number of exploration decisions
    pub max_steps: usize,
    pub same_domain_only: bool,
    pub default_filters: bool,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::Load,
            navigation_timeout: Duration::from_secs(30),
            max_steps: 200,
            same_domain_only: true,
            default_filters: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Reuse a previously explored graph for the same domain
    pub enabled: bool,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourConfig {
    pub output_dir: PathBuf,
    pub strategy: StrategyConfig,
    pub pacing: PacingConfig,
    pub recovery: RecoveryConfig,
    pub plan: PlanConfig,
    pub explore: ExploreConfig,
    pub cache: CacheConfig,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("docent-output"),
            strategy: StrategyConfig::default(),
            pacing: PacingConfig::default(),
            recovery: RecoveryConfig::default(),
            plan: PlanConfig::default(),
            explore: ExploreConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl TourConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: TourConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// The tour's target duration
    pub fn target_duration(&self) -> Duration {
        self.pacing.target_duration
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pacing.target_duration.is_zero() {
            return Err(ConfigError::Invalid(
                "pacing.target_duration_ms must be positive".to_string(),
            ));
        }
        if self.pacing.min_action_duration > self.pacing.max_action_duration {
            return Err(ConfigError::Invalid(format!(
                "pacing.min_action_duration_ms ({:?}) exceeds pacing.max_action_duration_ms ({:?})",
                self.pacing.min_action_duration, self.pacing.max_action_duration
            )));
        }
        if self.strategy.max_total_nodes == 0 {
            return Err(ConfigError::Invalid(
                "strategy.max_total_nodes must be at least 1".to_string(),
            ));
        }
        if self.recovery.max_total_errors == 0 {
            return Err(ConfigError::Invalid(
                "recovery.max_total_errors must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
