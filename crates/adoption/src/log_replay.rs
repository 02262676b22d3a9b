use crate::fallback::{FallbackRoute, RouteFallback, RouteQuery};
use regex::Regex;
use route_protocol::{AdoptionReason, ConfidenceTier, RouteSequence, Slot, WaypointId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

fn route_record() -> &'static Regex {
    static RECORD: OnceLock<Regex> = OnceLock::new();
    RECORD.get_or_init(|| {
        Regex::new(r"\bS(\d+)\s+route bytes\s*=\s*(.*)$").expect("static route-record pattern")
    })
}

#[derive(Debug, Clone)]
enum LogSource {
    File(PathBuf),
    Text(String),
}

/// Replays `S<slot> route bytes = a,b,c` records from a diagnostic log.
///
/// The last record with at least three ids wins per slot. A file source is read on every lookup,
/// so records appended since construction are seen; an unreadable file is no evidence.
#[derive(Debug, Clone)]
pub struct LogReplayFallback {
    source: LogSource,
    tier: ConfidenceTier,
}

impl LogReplayFallback {
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: LogSource::File(path.into()),
            tier: ConfidenceTier::Partial,
        }
    }

    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            source: LogSource::Text(text.into()),
            tier: ConfidenceTier::Partial,
        }
    }

    #[must_use]
    pub fn with_tier(mut self, tier: ConfidenceTier) -> Self {
        self.tier = tier;
        self
    }

    /// Last trusted record per slot in the current log contents.
    #[must_use]
    pub fn replay(&self) -> HashMap<Slot, RouteSequence> {
        match &self.source {
            LogSource::Text(text) => parse_records(text),
            LogSource::File(path) => match std::fs::read_to_string(path) {
                Ok(text) => parse_records(&text),
                Err(err) => {
                    log::warn!("Log replay skipped, {} unreadable: {err}", path.display());
                    HashMap::new()
                }
            },
        }
    }
}

fn parse_records(text: &str) -> HashMap<Slot, RouteSequence> {
    let mut last = HashMap::new();
    for line in text.lines() {
        let Some(caps) = route_record().captures(line.trim()) else {
            continue;
        };
        let Ok(slot) = caps[1].parse::<Slot>() else {
            continue;
        };
        let sequence: RouteSequence = caps[2]
            .split([',', ' '])
            .filter(|token| !token.is_empty())
            .filter_map(|token| token.parse::<u32>().ok())
            .filter_map(WaypointId::from_u32)
            .collect();
        if sequence.is_trusted() {
            last.insert(slot, sequence);
        }
    }
    last
}

impl RouteFallback for LogReplayFallback {
    fn name(&self) -> &str {
        "log-replay"
    }

    fn lookup(&self, query: &RouteQuery) -> Option<FallbackRoute> {
        let sequence = self.replay().remove(&query.slot)?;
        Some(FallbackRoute {
            sequence,
            tier: self.tier,
            reason: AdoptionReason::LogReplay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn slot(n: u32) -> Slot {
        Slot::new(n).expect("slot")
    }

    const LOG: &str = "\
[12:00:01] S1 route bytes = 13,18,15,10,26
[12:00:02] S2 route bytes = (none)
[12:00:03] S1 route bytes = 13, 18
[12:00:04] S2 route mem=[], cache=[], adopted=mem, reason=mem, final=[]
[12:00:05] S2 route bytes = 4 5 6
[12:00:06] S1 route bytes = 1,2,3
";

    #[test]
    fn last_trusted_record_per_slot_wins() {
        let records = LogReplayFallback::from_text(LOG).replay();
        assert_eq!(records.get(&slot(1)).map(RouteSequence::to_raw), Some(vec![1, 2, 3]));
        assert_eq!(records.get(&slot(2)).map(RouteSequence::to_raw), Some(vec![4, 5, 6]));
        assert!(records.get(&slot(3)).is_none());
    }

    #[test]
    fn file_source_sees_appended_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("route_debug.log");
        let replay = LogReplayFallback::from_path(&path);
        assert!(replay.lookup(&RouteQuery::new(slot(1))).is_none());

        std::fs::write(&path, "S1 route bytes = 9,21\n").expect("write");
        assert!(replay.lookup(&RouteQuery::new(slot(1))).is_none());

        std::fs::write(&path, "S1 route bytes = 9,21\nS1 route bytes = 12,9,21\n").expect("write");
        let found = replay.lookup(&RouteQuery::new(slot(1))).expect("record");
        assert_eq!(found.sequence.to_raw(), vec![12, 9, 21]);
        assert_eq!(found.tier, ConfidenceTier::Partial);
        assert_eq!(found.reason, AdoptionReason::LogReplay);
    }
}
