use crate::PolicyConfig;
use route_protocol::{
    AdoptedFrom, AdoptionReason, ConfidenceTier, EvidenceOrigin, LastGoodRoute, RouteSequence,
};
use route_store::stored_sequence;

/// Inputs of one adoption decision for one slot.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    /// Best scored read, possibly empty or degraded.
    pub mem: &'a RouteSequence,
    pub origin: EvidenceOrigin,
    pub cached: Option<&'a LastGoodRoute>,
    pub now_unix_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub sequence: RouteSequence,
    pub reason: AdoptionReason,
    pub adopted_from: AdoptedFrom,
    /// Tier to write through to the store, when the decision warrants a write.
    pub persist: Option<ConfidenceTier>,
}

impl PolicyDecision {
    fn from_cache(sequence: RouteSequence, reason: AdoptionReason) -> Self {
        Self {
            sequence,
            reason,
            adopted_from: AdoptedFrom::Cache,
            persist: None,
        }
    }

    fn from_mem(sequence: RouteSequence, persist: Option<ConfidenceTier>) -> Self {
        Self {
            sequence,
            reason: AdoptionReason::Mem,
            adopted_from: AdoptedFrom::Mem,
            persist,
        }
    }
}

/// Picks the route to use now. First matching rule wins:
///
/// 1. `ttl`: a fresh Full/Array cache entry is kept.
/// 2. `cache-longer`: a longer cached route that contains or ends with the read is kept.
/// 3. `mem`: a trusted read is adopted and persisted at its origin's tier.
/// 4. `cache`: a degraded read falls back to a trusted cached route.
/// 5. `mem`: nothing better exists, the read is published as is.
///
/// Pure and deterministic; the caller owns the store write.
#[must_use]
pub fn decide(input: &PolicyInput<'_>, config: &PolicyConfig) -> PolicyDecision {
    let mem = input.mem;
    let cached = input.cached;
    let cached_seq = cached.map(stored_sequence).unwrap_or_default();

    if let Some(entry) = cached {
        if ttl_protects(entry, &cached_seq, input, config) {
            return PolicyDecision::from_cache(cached_seq, AdoptionReason::Ttl);
        }
    }

    if config.prefer_longer
        && !mem.is_empty()
        && cached_seq.is_trusted()
        && cached_seq.len() > mem.len()
        && (cached_seq.contains_run(mem) || cached_seq.ends_with(mem))
    {
        return PolicyDecision::from_cache(cached_seq, AdoptionReason::CacheLonger);
    }

    if mem.is_trusted() {
        return PolicyDecision::from_mem(mem.clone(), Some(input.origin.tier()));
    }

    if cached_seq.is_trusted() {
        return PolicyDecision::from_cache(cached_seq, AdoptionReason::Cache);
    }

    PolicyDecision::from_mem(mem.clone(), None)
}

/// Whether a cached entry is inside its protected freshness window against this read.
#[must_use]
pub fn ttl_protects(
    entry: &LastGoodRoute,
    cached_seq: &RouteSequence,
    input: &PolicyInput<'_>,
    config: &PolicyConfig,
) -> bool {
    if config.allow_downgrade
        || !entry.confidence.is_protected()
        || !cached_seq.is_trusted()
        || !entry.is_fresh(input.now_unix_ms, config.ttl_ms())
    {
        return false;
    }
    // Strictly stronger evidence may replace a protected entry; equal or weaker may not.
    let upgrade = input.mem.is_trusted() && input.origin.tier() > entry.confidence;
    !upgrade
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use route_codec::encode_key;

    const HOUR_MS: u64 = 3_600_000;

    fn seq(values: &[u8]) -> RouteSequence {
        RouteSequence::from_raw(values)
    }

    fn entry(values: &[u8], confidence: ConfidenceTier, at: u64) -> LastGoodRoute {
        LastGoodRoute {
            route_key: encode_key(&seq(values)),
            confidence,
            captured_at_unix_ms: at,
            source: "mem".to_string(),
        }
    }

    fn run(
        mem: &RouteSequence,
        origin: EvidenceOrigin,
        cached: Option<&LastGoodRoute>,
        now: u64,
        config: &PolicyConfig,
    ) -> PolicyDecision {
        decide(
            &PolicyInput {
                mem,
                origin,
                cached,
                now_unix_ms: now,
            },
            config,
        )
    }

    #[test]
    fn fresh_full_entry_beats_different_read() {
        let cached = entry(&[1, 2, 3, 4], ConfidenceTier::Full, 0);
        let decision = run(
            &seq(&[5, 6, 7, 8, 9]),
            EvidenceOrigin::Scan,
            Some(&cached),
            12 * HOUR_MS,
            &PolicyConfig::default(),
        );
        assert_eq!(decision.reason, AdoptionReason::Ttl);
        assert_eq!(decision.adopted_from, AdoptedFrom::Cache);
        assert_eq!(decision.sequence, seq(&[1, 2, 3, 4]));
        assert_eq!(decision.persist, None);
    }

    #[test]
    fn ttl_expires_after_window() {
        let cached = entry(&[1, 2, 3, 4], ConfidenceTier::Full, 0);
        let decision = run(
            &seq(&[5, 6, 7]),
            EvidenceOrigin::Scan,
            Some(&cached),
            24 * HOUR_MS + 1,
            &PolicyConfig::default(),
        );
        assert_eq!(decision.reason, AdoptionReason::Mem);
        assert_eq!(decision.persist, Some(ConfidenceTier::Full));
    }

    #[test]
    fn partial_entries_are_not_protected() {
        let cached = entry(&[1, 2, 3], ConfidenceTier::Partial, 0);
        let decision = run(
            &seq(&[5, 6, 7]),
            EvidenceOrigin::Scan,
            Some(&cached),
            1,
            &PolicyConfig::default(),
        );
        assert_eq!(decision.reason, AdoptionReason::Mem);
        assert_eq!(decision.sequence, seq(&[5, 6, 7]));
    }

    #[test]
    fn structured_read_upgrades_fresh_full_entry() {
        let cached = entry(&[1, 2, 3], ConfidenceTier::Full, 0);
        let decision = run(
            &seq(&[5, 6, 7]),
            EvidenceOrigin::Structured,
            Some(&cached),
            1,
            &PolicyConfig::default(),
        );
        assert_eq!(decision.reason, AdoptionReason::Mem);
        assert_eq!(decision.persist, Some(ConfidenceTier::Array));

        let array = entry(&[1, 2, 3], ConfidenceTier::Array, 0);
        let decision = run(
            &seq(&[5, 6, 7]),
            EvidenceOrigin::Structured,
            Some(&array),
            1,
            &PolicyConfig::default(),
        );
        assert_eq!(decision.reason, AdoptionReason::Ttl);
    }

    #[test]
    fn allow_downgrade_bypasses_ttl() {
        let cached = entry(&[1, 2, 3], ConfidenceTier::Full, 0);
        let config = PolicyConfig {
            allow_downgrade: true,
            ..PolicyConfig::default()
        };
        let decision = run(&seq(&[5, 6, 7]), EvidenceOrigin::Scan, Some(&cached), 1, &config);
        assert_eq!(decision.reason, AdoptionReason::Mem);
    }

    #[test]
    fn longer_cached_run_is_kept() {
        let cached = entry(&[3, 7, 12, 9, 21], ConfidenceTier::Partial, 0);
        let decision = run(
            &seq(&[7, 12, 9]),
            EvidenceOrigin::Scan,
            Some(&cached),
            1,
            &PolicyConfig::default(),
        );
        assert_eq!(decision.reason, AdoptionReason::CacheLonger);
        assert_eq!(decision.sequence, seq(&[3, 7, 12, 9, 21]));

        let off = PolicyConfig {
            prefer_longer: false,
            ..PolicyConfig::default()
        };
        let decision = run(&seq(&[7, 12, 9]), EvidenceOrigin::Scan, Some(&cached), 1, &off);
        assert_eq!(decision.reason, AdoptionReason::Mem);
    }

    #[test]
    fn empty_read_falls_back_to_cache() {
        let cached = entry(&[3, 7, 12], ConfidenceTier::Partial, 0);
        let decision = run(
            &RouteSequence::empty(),
            EvidenceOrigin::Scan,
            Some(&cached),
            1,
            &PolicyConfig::default(),
        );
        assert_eq!(decision.reason, AdoptionReason::Cache);
        assert_eq!(decision.sequence, seq(&[3, 7, 12]));
    }

    #[test]
    fn nothing_trusted_publishes_the_read() {
        let decision = run(
            &seq(&[9]),
            EvidenceOrigin::Scan,
            None,
            1,
            &PolicyConfig::default(),
        );
        assert_eq!(decision.reason, AdoptionReason::Mem);
        assert_eq!(decision.adopted_from, AdoptedFrom::Mem);
        assert_eq!(decision.sequence, seq(&[9]));
        assert_eq!(decision.persist, None);
    }
}
