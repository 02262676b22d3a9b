//! # Route Scanner
//!
//! Recovers route candidates from raw memory and ranks them against a trusted tail fragment.
//!
//! ```text
//! ByteWindow (dump / live region)
//!     │
//!     ├──> scan_window   stride 1/2/4 × window / lenhdr / phase passes
//!     │      └─> RouteCandidate[] (unscored, discovery order)
//!     │
//!     └──> CandidateScorer   tail match + length + anchor proximity
//!            └─> top-N RouteCandidate[]
//! ```

mod config;
mod scan;
mod score;
mod window;

pub use config::ScanConfig;
pub use scan::{scan_window, RouteCandidate, ScanPass, STRIDES};
pub use score::{CandidateScorer, TailMatch};
pub use window::{ByteWindow, FileWindow, Unavailable, UnavailableWindow};

/// Scan plus score in one call, holding a normalized configuration.
#[derive(Debug, Clone, Default)]
pub struct CandidateScanner {
    config: ScanConfig,
}

impl CandidateScanner {
    #[must_use]
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    #[must_use]
    pub fn scan<W: ByteWindow + ?Sized>(&self, window: &W, anchor: Option<usize>) -> Vec<RouteCandidate> {
        scan_window(window, anchor, &self.config)
    }

    /// Best `top_n` candidates, highest score first. Empty when nothing carries the tail.
    #[must_use]
    pub fn rank<W: ByteWindow + ?Sized>(
        &self,
        window: &W,
        tail: &[u8],
        anchor: Option<usize>,
    ) -> Vec<RouteCandidate> {
        let candidates = self.scan(window, anchor);
        CandidateScorer::new(tail, anchor).rank(candidates, self.config.top_n)
    }
}
