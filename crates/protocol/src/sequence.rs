use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU8;

/// Shortest route that counts as a confirmed read; anything shorter is degraded.
pub const MIN_TRUSTED_LEN: usize = 3;

/// Upper bound on the number of legs a scanned route may carry.
pub const MAX_ROUTE_LEN: usize = 5;

/// One leg of a route. Zero is reserved as the terminator byte and cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct WaypointId(NonZeroU8);

impl WaypointId {
    #[must_use]
    pub fn new(value: u8) -> Option<Self> {
        NonZeroU8::new(value).map(Self)
    }

    /// Accepts wider integers as long as they fit the 1..=255 range.
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        u8::try_from(value).ok().and_then(Self::new)
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0.get()
    }
}

impl fmt::Display for WaypointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Ordered list of waypoints. The empty sequence means "route currently unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RouteSequence(Vec<WaypointId>);

impl RouteSequence {
    #[must_use]
    pub fn new(ids: Vec<WaypointId>) -> Self {
        Self(ids)
    }

    #[must_use]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Builds a sequence from raw bytes, dropping zero bytes.
    #[must_use]
    pub fn from_raw(values: &[u8]) -> Self {
        values.iter().copied().filter_map(WaypointId::new).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.0.len() < MIN_TRUSTED_LEN
    }

    #[must_use]
    pub fn is_trusted(&self) -> bool {
        !self.is_degraded()
    }

    #[must_use]
    pub fn ids(&self) -> &[WaypointId] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = WaypointId> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn to_raw(&self) -> Vec<u8> {
        self.0.iter().map(|id| id.get()).collect()
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }

    /// True when `needle` occurs as a contiguous run inside `self`.
    #[must_use]
    pub fn contains_run(&self, needle: &RouteSequence) -> bool {
        contains_run(&self.0, &needle.0)
    }

    /// True when `needle` is a suffix of `self`.
    #[must_use]
    pub fn ends_with(&self, needle: &RouteSequence) -> bool {
        ends_with_run(&self.0, &needle.0)
    }
}

impl FromIterator<WaypointId> for RouteSequence {
    fn from_iter<I: IntoIterator<Item = WaypointId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for RouteSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, id) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

/// Contiguous-subsequence test. An empty needle never matches.
#[must_use]
pub fn contains_run<T: PartialEq>(haystack: &[T], needle: &[T]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Suffix test. An empty needle never matches.
#[must_use]
pub fn ends_with_run<T: PartialEq>(haystack: &[T], needle: &[T]) -> bool {
    !needle.is_empty() && haystack.ends_with(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn seq(values: &[u8]) -> RouteSequence {
        RouteSequence::from_raw(values)
    }

    #[test]
    fn waypoint_rejects_zero_and_wide_values() {
        assert!(WaypointId::new(0).is_none());
        assert_eq!(WaypointId::new(255).map(WaypointId::get), Some(255));
        assert!(WaypointId::from_u32(256).is_none());
        assert_eq!(WaypointId::from_u32(12).map(WaypointId::get), Some(12));
    }

    #[test]
    fn from_raw_drops_terminators() {
        assert_eq!(seq(&[0, 3, 0, 7]).to_raw(), vec![3, 7]);
    }

    #[test]
    fn degraded_below_three_legs() {
        assert!(seq(&[]).is_degraded());
        assert!(seq(&[9, 21]).is_degraded());
        assert!(seq(&[12, 9, 21]).is_trusted());
    }

    #[test]
    fn contains_and_suffix_relations() {
        let full = seq(&[3, 7, 12, 9, 21]);
        assert!(full.contains_run(&seq(&[7, 12])));
        assert!(!full.contains_run(&seq(&[7, 9])));
        assert!(full.ends_with(&seq(&[9, 21])));
        assert!(!full.ends_with(&seq(&[12, 9])));
        assert!(!full.contains_run(&RouteSequence::empty()));
        assert!(!full.ends_with(&RouteSequence::empty()));
        assert!(full.reversed().contains_run(&seq(&[21, 9])));
    }

    #[test]
    fn display_is_comma_joined() {
        assert_eq!(seq(&[3, 7, 12]).to_string(), "3,7,12");
        assert_eq!(RouteSequence::empty().to_string(), "");
    }

    #[test]
    fn serializes_as_plain_integers() {
        let json = serde_json::to_string(&seq(&[3, 7, 12])).expect("serialize");
        assert_eq!(json, "[3,7,12]");
        let back: RouteSequence = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, seq(&[3, 7, 12]));
        assert!(serde_json::from_str::<RouteSequence>("[3,0,12]").is_err());
    }
}
