use route_protocol::{AdoptedFrom, AdoptionReason, RouteSequence, Slot};
use route_scanner::RouteCandidate;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const AUDIT_TARGET: &str = "route_audit";

/// Receives one line of text per audited event.
pub trait AuditSink {
    fn record(&mut self, line: &str);
}

/// Emits audit lines through the `log` facade on target `route_audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&mut self, line: &str) {
        log::info!(target: AUDIT_TARGET, "{line}");
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    pub lines: Vec<String>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Appends audit lines to a plain-text diagnostic log, the one log replay reads back.
#[derive(Debug)]
pub struct FileAuditSink {
    path: PathBuf,
    file: File,
}

impl FileAuditSink {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditSink {
    fn record(&mut self, line: &str) {
        if let Err(err) = writeln!(self.file, "{line}") {
            log::warn!("Audit log {} write failed: {err}", self.path.display());
        }
    }
}

impl<T: AuditSink + ?Sized> AuditSink for Box<T> {
    fn record(&mut self, line: &str) {
        (**self).record(line);
    }
}

/// Fan-out to several sinks.
#[derive(Default)]
pub struct AuditSinks(pub Vec<Box<dyn AuditSink + Send>>);

impl AuditSink for AuditSinks {
    fn record(&mut self, line: &str) {
        for sink in &mut self.0 {
            sink.record(line);
        }
    }
}

fn bracketed(sequence: &RouteSequence) -> String {
    format!("[{sequence}]")
}

#[must_use]
pub fn scan_line(slot: Slot, sequence: &RouteSequence) -> String {
    if sequence.is_empty() {
        format!("S{slot} route bytes = (none)")
    } else {
        format!("S{slot} route bytes = {sequence}")
    }
}

#[must_use]
pub fn candidate_line(slot: Slot, rank: usize, candidate: &RouteCandidate) -> String {
    format!(
        "S{slot} cand #{rank} score={} off=0x{:X} stride={} phase={} rev={} pass={} seq={}",
        candidate.score,
        candidate.source_offset,
        candidate.stride,
        candidate.phase,
        candidate.reversed,
        candidate.pass,
        bracketed(&candidate.sequence)
    )
}

#[derive(Debug, Clone, Copy)]
pub struct AdoptionRecord<'a> {
    pub slot: Slot,
    pub mem: &'a RouteSequence,
    pub cache: &'a RouteSequence,
    pub adopted_from: AdoptedFrom,
    pub reason: AdoptionReason,
    pub final_sequence: &'a RouteSequence,
    pub candidate: Option<&'a RouteCandidate>,
}

#[must_use]
pub fn adoption_line(record: &AdoptionRecord<'_>) -> String {
    let mut line = format!(
        "S{} route mem={}, cache={}, adopted={}, reason={}, final={}",
        record.slot,
        bracketed(record.mem),
        bracketed(record.cache),
        record.adopted_from,
        record.reason,
        bracketed(record.final_sequence)
    );
    if let Some(cand) = record.candidate {
        line.push_str(&format!(
            " cand=off=0x{:X},stride={},phase={},rev={}",
            cand.source_offset, cand.stride, cand.phase, cand.reversed
        ));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use route_scanner::ScanPass;

    fn slot() -> Slot {
        Slot::new(1).expect("slot")
    }

    fn candidate() -> RouteCandidate {
        RouteCandidate {
            source_offset: 0x2A,
            stride: 2,
            phase: 0,
            reversed: false,
            score: 53,
            pass: ScanPass::Window,
            sequence: RouteSequence::from_raw(&[3, 7, 12, 9, 21]),
        }
    }

    #[test]
    fn scan_lines_match_replay_format() {
        assert_eq!(
            scan_line(slot(), &RouteSequence::from_raw(&[3, 7, 12])),
            "S1 route bytes = 3,7,12"
        );
        assert_eq!(scan_line(slot(), &RouteSequence::empty()), "S1 route bytes = (none)");
    }

    #[test]
    fn candidate_line_carries_diagnostics() {
        assert_eq!(
            candidate_line(slot(), 1, &candidate()),
            "S1 cand #1 score=53 off=0x2A stride=2 phase=0 rev=false pass=window seq=[3,7,12,9,21]"
        );
    }

    #[test]
    fn adoption_line_includes_winning_candidate() {
        let cand = candidate();
        let mem = cand.sequence.clone();
        let cache = RouteSequence::empty();
        let line = adoption_line(&AdoptionRecord {
            slot: slot(),
            mem: &mem,
            cache: &cache,
            adopted_from: AdoptedFrom::Mem,
            reason: AdoptionReason::Mem,
            final_sequence: &mem,
            candidate: Some(&cand),
        });
        assert_eq!(
            line,
            "S1 route mem=[3,7,12,9,21], cache=[], adopted=mem, reason=mem, final=[3,7,12,9,21] cand=off=0x2A,stride=2,phase=0,rev=false"
        );
    }

    #[test]
    fn file_sink_appends_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs").join("route_debug.log");
        let mut sink = FileAuditSink::open(&path).expect("open");
        sink.record("S1 route bytes = 1,2,3");
        sink.record("S2 route bytes = (none)");
        drop(sink);
        let text = std::fs::read_to_string(&path).expect("read");
        assert_eq!(text, "S1 route bytes = 1,2,3\nS2 route bytes = (none)\n");
    }
}
