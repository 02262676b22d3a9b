use crate::RouteCandidate;
use route_protocol::{contains_run, ends_with_run};

const SUFFIX_BASE: i64 = 40;
const SUFFIX_PER_TAIL: i64 = 4;
const CONTAINS_BASE: i64 = 20;
const CONTAINS_PER_TAIL: i64 = 3;
const REVERSED_SUFFIX_BASE: i64 = 36;
const REVERSED_SUFFIX_PER_TAIL: i64 = 3;
const REVERSED_CONTAINS_BASE: i64 = 18;
const REVERSED_CONTAINS_PER_TAIL: i64 = 2;
const PROXIMITY_MAX: i64 = 24;
const PROXIMITY_DIVISOR: i64 = 4;

/// The four relationships between a candidate and the known tail fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailMatch {
    pub contains: bool,
    pub suffix: bool,
    pub reversed_contains: bool,
    pub reversed_suffix: bool,
}

impl TailMatch {
    #[must_use]
    pub fn of(sequence: &[u8], tail: &[u8]) -> Self {
        let reversed: Vec<u8> = tail.iter().rev().copied().collect();
        Self {
            contains: contains_run(sequence, tail),
            suffix: ends_with_run(sequence, tail),
            reversed_contains: contains_run(sequence, &reversed),
            reversed_suffix: ends_with_run(sequence, &reversed),
        }
    }

    #[must_use]
    pub fn any(&self) -> bool {
        self.contains || self.suffix || self.reversed_contains || self.reversed_suffix
    }
}

/// Ranks scan candidates against a trusted trailing fragment and an anchor offset.
///
/// Pure: no I/O, no state between calls.
#[derive(Debug, Clone)]
pub struct CandidateScorer {
    tail: Vec<u8>,
    anchor: Option<usize>,
}

impl CandidateScorer {
    /// Zero bytes in `tail` are treated as absent slots and dropped.
    #[must_use]
    pub fn new(tail: &[u8], anchor: Option<usize>) -> Self {
        Self {
            tail: tail.iter().copied().filter(|b| *b != 0).collect(),
            anchor,
        }
    }

    #[must_use]
    pub fn tail(&self) -> &[u8] {
        &self.tail
    }

    /// Scores one candidate; None when a tail is known and the candidate shows none of it.
    #[must_use]
    pub fn score(&self, candidate: &RouteCandidate) -> Option<(i64, bool)> {
        let mut score = 0i64;
        let mut reversed = false;

        if !self.tail.is_empty() {
            let tail_len = self.tail.len() as i64;
            let matched = TailMatch::of(&candidate.sequence.to_raw(), &self.tail);
            if !matched.any() {
                return None;
            }
            if matched.suffix {
                score += SUFFIX_BASE + SUFFIX_PER_TAIL * tail_len;
            } else if matched.contains {
                score += CONTAINS_BASE + CONTAINS_PER_TAIL * tail_len;
            }
            if matched.reversed_suffix {
                score += REVERSED_SUFFIX_BASE + REVERSED_SUFFIX_PER_TAIL * tail_len;
                reversed = true;
            } else if matched.reversed_contains {
                score += REVERSED_CONTAINS_BASE + REVERSED_CONTAINS_PER_TAIL * tail_len;
                reversed = true;
            }
        }

        score += candidate.sequence.len() as i64;
        score += self.proximity_bonus(candidate.source_offset);
        Some((score, reversed))
    }

    fn proximity_bonus(&self, offset: usize) -> i64 {
        let Some(anchor) = self.anchor else {
            return 0;
        };
        let distance = i64::try_from(offset.abs_diff(anchor)).unwrap_or(i64::MAX);
        (PROXIMITY_MAX - distance / PROXIMITY_DIVISOR).max(0)
    }

    /// Scores, drops tail-less candidates, sorts descending and keeps the best `top_n`.
    ///
    /// The sort is stable: ties keep discovery order, so earlier strides and offsets win.
    #[must_use]
    pub fn rank(&self, candidates: Vec<RouteCandidate>, top_n: usize) -> Vec<RouteCandidate> {
        let total = candidates.len();
        let mut scored: Vec<RouteCandidate> = candidates
            .into_iter()
            .filter_map(|mut candidate| {
                let (score, reversed) = self.score(&candidate)?;
                candidate.score = score;
                candidate.reversed = reversed;
                Some(candidate)
            })
            .collect();
        let survivors = scored.len();
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(top_n.max(1));
        log::debug!(
            "Scored {total} candidates against tail {:?}: {survivors} kept, top {}",
            self.tail,
            scored.len()
        );
        scored
    }
}
