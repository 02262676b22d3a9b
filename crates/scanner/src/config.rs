use route_protocol::{MAX_ROUTE_LEN, MIN_TRUSTED_LEN};
use serde::{Deserialize, Serialize};

const DEFAULT_WINDOW_RADIUS: usize = 64;
const DEFAULT_TOP_N: usize = 3;

/// Knobs for one scan. Out-of-range values are clamped by [`ScanConfig::normalized`], never rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub min_count: usize,
    pub max_count: usize,
    /// 0 scans the whole buffer (diagnostic opt-in); otherwise `anchor ± radius` bytes.
    pub window_radius: usize,
    /// A zero element ends a candidate when true, and is skipped when false.
    pub zero_terminated: bool,
    /// Adds the length-header pass and the sub-stride phase passes.
    pub phase_scan_enabled: bool,
    pub top_n: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_count: MIN_TRUSTED_LEN,
            max_count: MAX_ROUTE_LEN,
            window_radius: DEFAULT_WINDOW_RADIUS,
            zero_terminated: true,
            phase_scan_enabled: false,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl ScanConfig {
    /// Full-buffer scan with every pass enabled.
    #[must_use]
    pub fn exhaustive() -> Self {
        Self {
            window_radius: 0,
            phase_scan_enabled: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn normalized(&self) -> Self {
        let max_count = self.max_count.clamp(MIN_TRUSTED_LEN, MAX_ROUTE_LEN);
        let min_count = self.min_count.clamp(MIN_TRUSTED_LEN, max_count);
        let top_n = self.top_n.max(1);
        let normalized = Self {
            min_count,
            max_count,
            top_n,
            ..self.clone()
        };
        if normalized != *self {
            log::debug!(
                "Scan config normalized: min_count {}->{}, max_count {}->{}, top_n {}->{}",
                self.min_count,
                min_count,
                self.max_count,
                max_count,
                self.top_n,
                top_n
            );
        }
        normalized
    }
}
