use pretty_assertions::assert_eq;
use route_adoption::{
    EngineConfig, EngineError, LogReplayFallback, MemoryAuditSink, PolicyConfig, RecoverRequest,
    RouteEngine, RouteQuery, UiScrapeFallback,
};
use route_codec::encode_key;
use route_protocol::{
    AdoptedFrom, AdoptionReason, ConfidenceTier, EvidenceOrigin, LastGoodRoute, RouteSequence,
    RouteStatus, Slot,
};
use route_scanner::ScanConfig;
use route_store::{ConfidenceStore, JsonFileConfidenceStore, MemoryConfidenceStore};

const HOUR_MS: u64 = 3_600_000;
const T0: u64 = 1_700_000_000_000;

fn slot(n: u32) -> Slot {
    Slot::new(n).expect("slot")
}

fn seq(values: &[u8]) -> RouteSequence {
    RouteSequence::from_raw(values)
}

fn whole_buffer_config() -> EngineConfig {
    EngineConfig {
        scan: ScanConfig {
            window_radius: 0,
            ..ScanConfig::default()
        },
        audit_candidates: true,
        ..EngineConfig::default()
    }
}

fn engine(store: MemoryConfidenceStore) -> RouteEngine<MemoryConfidenceStore, MemoryAuditSink> {
    RouteEngine::new(store, &whole_buffer_config()).with_audit(MemoryAuditSink::new())
}

fn seeded(values: &[u8], confidence: ConfidenceTier, at: u64) -> MemoryConfidenceStore {
    let mut store = MemoryConfidenceStore::new();
    store
        .put(
            slot(1),
            LastGoodRoute {
                route_key: encode_key(&seq(values)),
                confidence,
                captured_at_unix_ms: at,
                source: "mem".to_string(),
            },
        )
        .expect("seed");
    store
}

fn tail_request(tail: &[u8]) -> RecoverRequest {
    RecoverRequest {
        tail: tail.to_vec(),
        ..RecoverRequest::default()
    }
}

#[test]
fn suffix_run_in_buffer_is_adopted_and_persisted() {
    let buffer = vec![0u8, 0, 3, 7, 12, 9, 21, 0, 0];
    let mut engine = engine(MemoryConfidenceStore::new());

    let outcome = engine.recover(slot(1), &buffer, &tail_request(&[9, 21]), T0);

    assert_eq!(outcome.sequence, seq(&[3, 7, 12, 9, 21]));
    assert_eq!(outcome.reason, AdoptionReason::Mem);
    assert_eq!(outcome.adopted_from, AdoptedFrom::Mem);
    assert_eq!(outcome.status, RouteStatus::Trusted);
    let candidate = outcome.candidate.as_ref().expect("winning candidate");
    assert_eq!(candidate.source_offset, 2);
    assert_eq!(candidate.stride, 1);
    assert!(candidate.score >= 40 + 4 * 2 + 5);

    let stored = engine.store().get(slot(1)).expect("persisted");
    assert_eq!(stored.confidence, ConfidenceTier::Full);
    assert_eq!(stored.source, "mem");
    assert_eq!(stored.captured_at_unix_ms, T0);
    assert_eq!(outcome.stored.as_ref(), Some(&stored));
    assert_eq!(outcome.route_key, "Point-3 - Point-7 - Point-12 - Point-9 - Point-21");
    assert_eq!(outcome.display, "C>G>L>I>U");

    let lines = &engine.audit().lines;
    assert_eq!(lines[0], "S1 route bytes = 3,7,12,9,21");
    assert!(lines[1].starts_with("S1 cand #1 score="));
    assert_eq!(
        lines.last().map(String::as_str),
        Some(
            "S1 route mem=[3,7,12,9,21], cache=[], adopted=mem, reason=mem, final=[3,7,12,9,21] cand=off=0x2,stride=1,phase=0,rev=false"
        )
    );
}

#[test]
fn identical_inputs_give_identical_outcomes() {
    let buffer = vec![5u8, 0, 3, 7, 12, 9, 21, 0, 1, 2, 9, 21, 0];
    let request = tail_request(&[9, 21]);

    let mut first = engine(MemoryConfidenceStore::new());
    let mut second = engine(MemoryConfidenceStore::new());
    let a = first.recover(slot(1), &buffer, &request, T0);
    let b = second.recover(slot(1), &buffer, &request, T0);

    assert_eq!(
        serde_json::to_value(&a).expect("json"),
        serde_json::to_value(&b).expect("json")
    );
    assert_eq!(first.audit().lines, second.audit().lines);

    let again = first.recover(slot(1), &buffer, &request, T0 + 1);
    assert_eq!(again.sequence, a.sequence);
    assert_eq!(again.display, a.display);
}

#[test]
fn fresh_full_route_survives_a_different_read() {
    let store = seeded(&[1, 2, 3, 4, 5], ConfidenceTier::Full, T0);
    let mut engine = engine(store);
    let buffer = vec![0u8, 6, 7, 8, 9, 21, 0];

    let outcome = engine.recover(slot(1), &buffer, &tail_request(&[9, 21]), T0 + 12 * HOUR_MS);

    assert_eq!(outcome.mem, seq(&[6, 7, 8, 9, 21]));
    assert_eq!(outcome.sequence, seq(&[1, 2, 3, 4, 5]));
    assert_eq!(outcome.reason, AdoptionReason::Ttl);
    assert_eq!(outcome.adopted_from, AdoptedFrom::Cache);
    assert!(outcome.stored.is_none());
    assert_eq!(
        engine.store().get(slot(1)).map(|e| e.captured_at_unix_ms),
        Some(T0)
    );
}

#[test]
fn expired_full_route_is_not_dropped_for_a_short_read() {
    let now = T0 + 30 * HOUR_MS;
    let config = EngineConfig {
        policy: PolicyConfig {
            prefer_longer: false,
            ..PolicyConfig::default()
        },
        ..whole_buffer_config()
    };
    let mut engine = RouteEngine::new(seeded(&[3, 7, 12, 9, 21], ConfidenceTier::Full, T0), &config)
        .with_audit(MemoryAuditSink::new());

    let outcome = engine.adopt(
        slot(1),
        &seq(&[40, 41]),
        EvidenceOrigin::Scan,
        &RouteQuery::new(slot(1)),
        now,
    );

    // Outside the TTL, rule order still keeps the trusted cache over a degraded read.
    assert_eq!(outcome.sequence, seq(&[3, 7, 12, 9, 21]));
    assert_eq!(outcome.reason, AdoptionReason::Cache);
    assert_eq!(outcome.adopted_from, AdoptedFrom::Cache);
    assert!(outcome.stored.is_none());
    assert_eq!(
        engine.store().get(slot(1)).map(|e| e.route_key),
        Some(encode_key(&seq(&[3, 7, 12, 9, 21])))
    );
}

#[test]
fn truncated_tail_read_keeps_longer_cached_route() {
    let store = seeded(&[3, 7, 12, 9, 21], ConfidenceTier::Partial, T0);
    let mut engine = engine(store);

    let outcome = engine.adopt(
        slot(1),
        &seq(&[9, 21]),
        EvidenceOrigin::Scan,
        &RouteQuery::new(slot(1)),
        T0 + 1,
    );

    assert_eq!(outcome.sequence, seq(&[3, 7, 12, 9, 21]));
    assert_eq!(outcome.reason, AdoptionReason::CacheLonger);
    assert_eq!(outcome.status, RouteStatus::Trusted);
}

#[test]
fn degraded_read_is_upgraded_by_ui_scrape_at_declared_tier() {
    let ui = UiScrapeFallback::from_lines(["Nautilus: 3, 7, 12, 9, 21"]);
    let log = LogReplayFallback::from_text("S1 route bytes = 1,2,3\n");
    let mut engine = engine(MemoryConfidenceStore::new())
        .with_fallback(ui)
        .with_fallback(log);

    let outcome = engine.adopt(
        slot(1),
        &seq(&[9]),
        EvidenceOrigin::Scan,
        &RouteQuery::new(slot(1)).with_name("Nautilus"),
        T0,
    );

    assert_eq!(outcome.mem, seq(&[9]));
    assert_eq!(outcome.sequence, seq(&[3, 7, 12, 9, 21]));
    assert_eq!(outcome.reason, AdoptionReason::UiScrape);
    assert_eq!(outcome.adopted_from, AdoptedFrom::Fallback);
    assert_eq!(outcome.fallback.as_deref(), Some("ui-scrape"));

    let stored = engine.store().get(slot(1)).expect("persisted");
    assert_eq!(stored.confidence, ConfidenceTier::Partial);
    assert_eq!(stored.source, "ui-scrape");
    assert!(engine
        .audit()
        .lines
        .iter()
        .any(|l| l.contains("adopted=fallback, reason=ui-scrape, final=[3,7,12,9,21]")));
}

#[test]
fn trusted_cache_short_circuits_fallbacks_even_when_stale() {
    let ui = UiScrapeFallback::from_lines(["Nautilus: 3, 7, 12, 9, 21"]);
    let mut engine =
        engine(seeded(&[13, 18, 15], ConfidenceTier::Partial, T0 - 100 * HOUR_MS)).with_fallback(ui);

    let outcome = engine.adopt(
        slot(1),
        &seq(&[9]),
        EvidenceOrigin::Scan,
        &RouteQuery::new(slot(1)).with_name("Nautilus"),
        T0,
    );

    assert_eq!(outcome.sequence, seq(&[13, 18, 15]));
    assert_eq!(outcome.reason, AdoptionReason::Cache);
    assert!(outcome.fallback.is_none());
    assert!(outcome.stored.is_none());
    let kept = engine.store().get(slot(1)).expect("entry");
    assert_eq!(kept.source, "mem");
    assert_eq!(kept.captured_at_unix_ms, T0 - 100 * HOUR_MS);
}

#[test]
fn log_replay_runs_when_ui_scrape_has_nothing() {
    let ui = UiScrapeFallback::from_lines(["Orca: 1, 2"]);
    let log = LogReplayFallback::from_text("S2 route bytes = 13,18,15,10,26\nS1 route bytes = 4,5,6\n")
        .with_tier(ConfidenceTier::Tail);
    let mut engine = engine(MemoryConfidenceStore::new())
        .with_fallback(ui)
        .with_fallback(log);

    let request = RecoverRequest {
        name: Some("Orca".to_string()),
        ..RecoverRequest::default()
    };
    let outcome = engine.recover(slot(2), &Vec::<u8>::new(), &request, T0);

    assert_eq!(outcome.sequence, seq(&[13, 18, 15, 10, 26]));
    assert_eq!(outcome.reason, AdoptionReason::LogReplay);
    assert_eq!(
        engine.store().get(slot(2)).map(|e| e.confidence),
        Some(ConfidenceTier::Tail)
    );
    assert!(engine.store().get(slot(1)).is_none());
}

#[test]
fn no_evidence_anywhere_is_an_unknown_route() {
    let mut engine = engine(MemoryConfidenceStore::new());
    let outcome = engine.recover(slot(3), &Vec::<u8>::new(), &RecoverRequest::default(), T0);

    assert!(outcome.sequence.is_empty());
    assert_eq!(outcome.status, RouteStatus::Unknown);
    assert_eq!(outcome.reason, AdoptionReason::Mem);
    assert_eq!(outcome.display, "");
    assert!(outcome.stored.is_none());
    assert_eq!(engine.audit().lines[0], "S3 route bytes = (none)");
}

#[test]
fn structured_read_replaces_fresh_scan_entry() {
    let mut engine = engine(seeded(&[1, 2, 3], ConfidenceTier::Full, T0));

    let outcome = engine.adopt(
        slot(1),
        &seq(&[4, 5, 6, 7]),
        EvidenceOrigin::Structured,
        &RouteQuery::new(slot(1)),
        T0 + HOUR_MS,
    );
    assert_eq!(outcome.reason, AdoptionReason::Mem);
    let stored = engine.store().get(slot(1)).expect("stored");
    assert_eq!(stored.confidence, ConfidenceTier::Array);
    assert_eq!(stored.source, "array");

    // Equal-tier evidence cannot replace it while fresh.
    let outcome = engine.adopt(
        slot(1),
        &seq(&[8, 9, 10]),
        EvidenceOrigin::Structured,
        &RouteQuery::new(slot(1)),
        T0 + 2 * HOUR_MS,
    );
    assert_eq!(outcome.reason, AdoptionReason::Ttl);
    assert_eq!(outcome.sequence, seq(&[4, 5, 6, 7]));
}

#[test]
fn manual_override_is_stored_as_full_and_protected() {
    let mut engine = engine(MemoryConfidenceStore::new());

    let err = engine.set_manual(slot(1), &seq(&[9, 21]), T0).unwrap_err();
    assert!(matches!(err, EngineError::DegradedRoute { len: 2, .. }));

    let entry = engine
        .set_manual(slot(1), &seq(&[3, 7, 12, 9, 21]), T0)
        .expect("manual");
    assert_eq!(entry.confidence, ConfidenceTier::Full);
    assert_eq!(entry.source, "manual");
    assert!(engine
        .audit()
        .lines
        .iter()
        .any(|l| l.ends_with("adopted=manual, reason=manual, final=[3,7,12,9,21]")));

    let buffer = vec![0u8, 1, 2, 3, 0];
    let outcome = engine.recover(slot(1), &buffer, &RecoverRequest::default(), T0 + 1);
    assert_eq!(outcome.reason, AdoptionReason::Ttl);
    assert_eq!(outcome.sequence, seq(&[3, 7, 12, 9, 21]));
}

#[test]
fn slots_do_not_share_state() {
    let mut engine = engine(seeded(&[1, 2, 3], ConfidenceTier::Full, T0));
    let outcome = engine.adopt(
        slot(2),
        &seq(&[7, 8]),
        EvidenceOrigin::Scan,
        &RouteQuery::new(slot(2)),
        T0,
    );
    assert_eq!(outcome.sequence, seq(&[7, 8]));
    assert_eq!(outcome.status, RouteStatus::Degraded);
    assert!(outcome.cached.is_none());
}

#[test]
fn file_store_round_trip_through_engine() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("routes.json");
    let buffer = vec![0u8, 0, 3, 7, 12, 9, 21, 0, 0];

    {
        let store = JsonFileConfidenceStore::open(&path).expect("open");
        let mut engine = RouteEngine::new(store, &whole_buffer_config());
        let outcome = engine.recover(slot(1), &buffer, &tail_request(&[9, 21]), T0);
        assert!(outcome.store_error.is_none());
    }

    let store = JsonFileConfidenceStore::open(&path).expect("reopen");
    let mut engine = RouteEngine::new(store, &whole_buffer_config());
    let outcome = engine.recover(slot(1), &Vec::<u8>::new(), &RecoverRequest::default(), T0 + 1);
    assert_eq!(outcome.sequence, seq(&[3, 7, 12, 9, 21]));
    assert_eq!(outcome.reason, AdoptionReason::Ttl);
}
