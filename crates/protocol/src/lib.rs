use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU8;
use std::str::FromStr;

mod error;
mod sequence;

pub use error::InvalidSlot;
pub use sequence::{
    contains_run, ends_with_run, RouteSequence, WaypointId, MAX_ROUTE_LEN, MIN_TRUSTED_LEN,
};

pub const STORE_SCHEMA_VERSION: u32 = 1;

/// Logical slot a route belongs to. Every slot is recovered and adopted independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Slot(NonZeroU8);

impl Slot {
    pub fn new(value: u32) -> Result<Self, InvalidSlot> {
        let byte = u8::try_from(value).map_err(|_| InvalidSlot::OutOfRange(value))?;
        NonZeroU8::new(byte).map(Self).ok_or(InvalidSlot::Zero(value))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0.get()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl FromStr for Slot {
    type Err = InvalidSlot;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value: u32 = trimmed
            .parse()
            .map_err(|_| InvalidSlot::NotANumber(trimmed.to_string()))?;
        Self::new(value)
    }
}

/// Ordinal trust attached to a persisted route.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    #[default]
    None = 0,
    Tail = 1,
    Partial = 2,
    Full = 3,
    /// Read from a structured, indexed source rather than a heuristic byte scan.
    Array = 4,
}

impl ConfidenceTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Tail => "tail",
            Self::Partial => "partial",
            Self::Full => "full",
            Self::Array => "array",
        }
    }

    /// Tiers whose fresh entries are protected by the TTL window.
    #[must_use]
    pub fn is_protected(self) -> bool {
        self >= Self::Full
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the freshly read sequence came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceOrigin {
    /// Heuristic byte scan.
    #[default]
    Scan,
    /// Structured field read; trusted above any scan.
    Structured,
}

impl EvidenceOrigin {
    #[must_use]
    pub fn tier(self) -> ConfidenceTier {
        match self {
            Self::Scan => ConfidenceTier::Full,
            Self::Structured => ConfidenceTier::Array,
        }
    }

    #[must_use]
    pub fn source_tag(self) -> &'static str {
        match self {
            Self::Scan => "mem",
            Self::Structured => "array",
        }
    }
}

/// Best route ever confirmed for a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LastGoodRoute {
    pub route_key: String,
    pub confidence: ConfidenceTier,
    pub captured_at_unix_ms: u64,
    /// Free-text provenance: mem, array, manual, ui-scrape, log-replay, ...
    pub source: String,
}

impl LastGoodRoute {
    #[must_use]
    pub fn age_ms(&self, now_unix_ms: u64) -> u64 {
        now_unix_ms.saturating_sub(self.captured_at_unix_ms)
    }

    /// Entries stamped in the future (clock skew) count as fresh.
    #[must_use]
    pub fn is_fresh(&self, now_unix_ms: u64, ttl_ms: u64) -> bool {
        self.age_ms(now_unix_ms) <= ttl_ms
    }
}

/// Reason code attached to every adoption, stable across releases for log tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AdoptionReason {
    Ttl,
    CacheLonger,
    Mem,
    Cache,
    UiScrape,
    LogReplay,
    Manual,
}

impl AdoptionReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ttl => "ttl",
            Self::CacheLonger => "cache-longer",
            Self::Mem => "mem",
            Self::Cache => "cache",
            Self::UiScrape => "ui-scrape",
            Self::LogReplay => "log-replay",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for AdoptionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdoptedFrom {
    Mem,
    Cache,
    Fallback,
    Manual,
}

impl AdoptedFrom {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mem => "mem",
            Self::Cache => "cache",
            Self::Fallback => "fallback",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for AdoptedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence quality of a published route. Absence and degradation are data, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Unknown,
    Degraded,
    Trusted,
}

impl RouteStatus {
    #[must_use]
    pub fn of(sequence: &RouteSequence) -> Self {
        if sequence.is_empty() {
            Self::Unknown
        } else if sequence.is_degraded() {
            Self::Degraded
        } else {
            Self::Trusted
        }
    }
}
