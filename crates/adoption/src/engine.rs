use crate::audit::{adoption_line, candidate_line, scan_line, AdoptionRecord, AuditSink, LogAuditSink};
use crate::fallback::{FallbackRoute, RouteFallback, RouteQuery};
use crate::policy::{decide, PolicyInput};
use crate::{EngineConfig, EngineError, Result};
use route_codec::{display_or_key, encode_key, AliasTable};
use route_protocol::{
    AdoptedFrom, AdoptionReason, ConfidenceTier, EvidenceOrigin, LastGoodRoute, RouteSequence,
    RouteStatus, Slot, MIN_TRUSTED_LEN,
};
use route_scanner::{ByteWindow, CandidateScanner, RouteCandidate};
use route_store::{stored_sequence, ConfidenceStore};
use serde::Serialize;

/// Per-call evidence for one slot besides the byte window itself.
#[derive(Debug, Clone, Default)]
pub struct RecoverRequest {
    /// Independently trusted trailing fragment; empty when nothing is known.
    pub tail: Vec<u8>,
    pub anchor: Option<usize>,
    pub origin: EvidenceOrigin,
    /// Display name the UI shows for this slot, used by name-keyed fallbacks.
    pub name: Option<String>,
}

/// Everything decided for one slot on one tick.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryOutcome {
    pub slot: Slot,
    pub sequence: RouteSequence,
    pub route_key: String,
    pub display: String,
    pub status: RouteStatus,
    pub reason: AdoptionReason,
    pub adopted_from: AdoptedFrom,
    /// The read that entered the policy.
    pub mem: RouteSequence,
    pub candidate: Option<RouteCandidate>,
    pub cached: Option<LastGoodRoute>,
    /// Entry written this tick, if any.
    pub stored: Option<LastGoodRoute>,
    pub fallback: Option<String>,
    pub store_error: Option<String>,
}

/// Runs scan, scoring, adoption and the degraded fallback chain for one slot at a time.
///
/// Holds no state between calls except what lives in the store, so repeated calls over an
/// unchanged window and store give the same answer.
pub struct RouteEngine<S, A = LogAuditSink> {
    config: EngineConfig,
    scanner: CandidateScanner,
    store: S,
    aliases: AliasTable,
    fallbacks: Vec<Box<dyn RouteFallback + Send>>,
    audit: A,
}

impl<S: ConfidenceStore> RouteEngine<S> {
    pub fn new(store: S, config: &EngineConfig) -> Self {
        let config = config.normalized();
        Self {
            scanner: CandidateScanner::new(&config.scan),
            config,
            store,
            aliases: AliasTable::default(),
            fallbacks: Vec::new(),
            audit: LogAuditSink,
        }
    }
}

impl<S: ConfidenceStore, A: AuditSink> RouteEngine<S, A> {
    #[must_use]
    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    /// Fallbacks are consulted in registration order.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl RouteFallback + Send + 'static) -> Self {
        self.fallbacks.push(Box::new(fallback));
        self
    }

    pub fn with_audit<B: AuditSink>(self, audit: B) -> RouteEngine<S, B> {
        RouteEngine {
            config: self.config,
            scanner: self.scanner,
            store: self.store,
            aliases: self.aliases,
            fallbacks: self.fallbacks,
            audit,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    /// Scans `window`, ranks against the request's tail and adopts the best read.
    pub fn recover<W: ByteWindow + ?Sized>(
        &mut self,
        slot: Slot,
        window: &W,
        request: &RecoverRequest,
        now_unix_ms: u64,
    ) -> RecoveryOutcome {
        let ranked = self.scanner.rank(window, &request.tail, request.anchor);
        let best = ranked.first().cloned();
        let mem = best
            .as_ref()
            .map(|cand| cand.sequence.clone())
            .unwrap_or_default();

        self.audit.record(&scan_line(slot, &mem));
        if self.config.audit_candidates {
            for (idx, cand) in ranked.iter().enumerate() {
                self.audit.record(&candidate_line(slot, idx + 1, cand));
            }
        }

        let query = query_for(slot, request);
        self.adopt_read(slot, mem, request.origin, best, &query, now_unix_ms)
    }

    /// Adopts an already-read sequence, e.g. from a structured source that needs no scan.
    pub fn adopt(
        &mut self,
        slot: Slot,
        mem: &RouteSequence,
        origin: EvidenceOrigin,
        query: &RouteQuery,
        now_unix_ms: u64,
    ) -> RecoveryOutcome {
        self.audit.record(&scan_line(slot, mem));
        self.adopt_read(slot, mem.clone(), origin, None, query, now_unix_ms)
    }

    /// Operator override: stores `sequence` at tier Full with source `manual`.
    pub fn set_manual(
        &mut self,
        slot: Slot,
        sequence: &RouteSequence,
        now_unix_ms: u64,
    ) -> Result<LastGoodRoute> {
        if sequence.is_degraded() {
            return Err(EngineError::DegradedRoute {
                slot,
                len: sequence.len(),
                min: MIN_TRUSTED_LEN,
            });
        }
        let cache = self
            .store
            .get(slot)
            .map(|entry| stored_sequence(&entry))
            .unwrap_or_default();
        let entry = self
            .store
            .put_route(slot, sequence, ConfidenceTier::Full, "manual", now_unix_ms)?;
        self.audit.record(&adoption_line(&AdoptionRecord {
            slot,
            mem: sequence,
            cache: &cache,
            adopted_from: AdoptedFrom::Manual,
            reason: AdoptionReason::Manual,
            final_sequence: sequence,
            candidate: None,
        }));
        log::info!("Slot {slot} route set manually to [{sequence}]");
        Ok(entry)
    }

    fn adopt_read(
        &mut self,
        slot: Slot,
        mem: RouteSequence,
        origin: EvidenceOrigin,
        candidate: Option<RouteCandidate>,
        query: &RouteQuery,
        now_unix_ms: u64,
    ) -> RecoveryOutcome {
        let cached = self.store.get(slot);
        let cached_seq = cached.as_ref().map(stored_sequence).unwrap_or_default();
        let input = PolicyInput {
            mem: &mem,
            origin,
            cached: cached.as_ref(),
            now_unix_ms,
        };
        let decision = decide(&input, &self.config.policy);

        let mut sequence = decision.sequence;
        let mut reason = decision.reason;
        let mut adopted_from = decision.adopted_from;
        let mut stored = None;
        let mut store_error = None;
        let mut fallback = None;

        if let Some(tier) = decision.persist {
            match self
                .store
                .put_route(slot, &sequence, tier, origin.source_tag(), now_unix_ms)
            {
                Ok(entry) => stored = Some(entry),
                Err(err) => {
                    log::warn!("Slot {slot}: route not persisted: {err}");
                    store_error = Some(err.to_string());
                }
            }
        }

        if sequence.is_degraded() {
            // A degraded decision means no trusted cache exists, so nothing here is TTL-protected.
            if let Some((name, found)) = self.first_fallback(query) {
                match self
                    .store
                    .put_route(slot, &found.sequence, found.tier, &name, now_unix_ms)
                {
                    Ok(entry) => stored = Some(entry),
                    Err(err) => {
                        log::warn!("Slot {slot}: {name} route not persisted: {err}");
                        store_error = Some(err.to_string());
                    }
                }
                sequence = found.sequence;
                reason = found.reason;
                adopted_from = AdoptedFrom::Fallback;
                fallback = Some(name);
            }
        }

        self.audit.record(&adoption_line(&AdoptionRecord {
            slot,
            mem: &mem,
            cache: &cached_seq,
            adopted_from,
            reason,
            final_sequence: &sequence,
            candidate: candidate.as_ref(),
        }));
        log::info!("Slot {slot} adopted [{sequence}] from {adopted_from} ({reason})");

        RecoveryOutcome {
            slot,
            route_key: encode_key(&sequence),
            display: display_or_key(&sequence, &self.aliases, &self.config.display),
            status: RouteStatus::of(&sequence),
            sequence,
            reason,
            adopted_from,
            mem,
            candidate,
            cached,
            stored,
            fallback,
            store_error,
        }
    }

    fn first_fallback(&self, query: &RouteQuery) -> Option<(String, FallbackRoute)> {
        self.fallbacks.iter().find_map(|fallback| {
            let found = fallback.lookup(query).filter(|f| f.sequence.is_trusted());
            if found.is_none() {
                log::debug!("Slot {}: fallback {} has nothing", query.slot, fallback.name());
            }
            found.map(|f| (fallback.name().to_string(), f))
        })
    }
}

fn query_for(slot: Slot, request: &RecoverRequest) -> RouteQuery {
    let query = RouteQuery::new(slot);
    match &request.name {
        Some(name) => query.with_name(name.clone()),
        None => query,
    }
}
