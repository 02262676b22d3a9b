use crate::error::ConfigError;
use route_codec::DisplayOptions;
use route_scanner::ScanConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_TTL_HOURS: u64 = 24;
const MIN_TTL_HOURS: u64 = 1;
const MAX_TTL_HOURS: u64 = 72;
const MS_PER_HOUR: u64 = 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Freshness window protecting Full/Array entries, in hours.
    pub ttl_hours: u64,
    /// Keep a longer cached route when the fresh read is a run or suffix of it.
    pub prefer_longer: bool,
    /// Lets fresh reads replace a protected entry inside its TTL.
    pub allow_downgrade: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            ttl_hours: DEFAULT_TTL_HOURS,
            prefer_longer: true,
            allow_downgrade: false,
        }
    }
}

impl PolicyConfig {
    #[must_use]
    pub fn normalized(&self) -> Self {
        let ttl_hours = self.ttl_hours.clamp(MIN_TTL_HOURS, MAX_TTL_HOURS);
        if ttl_hours != self.ttl_hours {
            log::debug!("Policy ttl_hours {} clamped to {ttl_hours}", self.ttl_hours);
        }
        Self {
            ttl_hours,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_hours
            .clamp(MIN_TTL_HOURS, MAX_TTL_HOURS)
            .saturating_mul(MS_PER_HOUR)
    }
}

/// Everything the engine needs, loadable from a TOML file:
///
/// ```toml
/// audit_candidates = true
///
/// [scan]
/// window_radius = 96
///
/// [policy]
/// ttl_hours = 12
///
/// [display]
/// mode = "short-ids"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub scan: ScanConfig,
    pub policy: PolicyConfig,
    pub display: DisplayOptions,
    /// Emit one audit line per top-N scored candidate.
    pub audit_candidates: bool,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        Ok(config.normalized())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            scan: self.scan.normalized(),
            policy: self.policy.normalized(),
            display: self.display.clone(),
            audit_candidates: self.audit_candidates,
        }
    }
}
