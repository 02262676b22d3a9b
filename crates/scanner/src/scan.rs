use crate::{ByteWindow, ScanConfig};
use route_protocol::{RouteSequence, WaypointId};
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Range;

/// Element widths tried, in emission order. Element width equals the stride.
pub const STRIDES: [usize; 3] = [1, 2, 4];

const MAX_STRIDE: usize = 4;

/// Which hypothesis produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanPass {
    /// Aligned read of up to `max_count` elements.
    Window,
    /// First element declares the run length.
    LengthHeader,
    /// Aligned read shifted by a sub-stride byte phase.
    Phase { stride: usize, phase: usize },
}

impl fmt::Display for ScanPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Window => f.write_str("window"),
            Self::LengthHeader => f.write_str("lenhdr"),
            Self::Phase { stride, phase } => write!(f, "phase{stride}.{phase}"),
        }
    }
}

impl Serialize for ScanPass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A hypothesized route pulled out of a byte window. Ephemeral: produced per scan, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteCandidate {
    pub source_offset: usize,
    pub stride: usize,
    pub phase: usize,
    pub reversed: bool,
    pub score: i64,
    pub pass: ScanPass,
    pub sequence: RouteSequence,
}

impl RouteCandidate {
    fn new(source_offset: usize, stride: usize, pass: ScanPass, sequence: RouteSequence) -> Self {
        let phase = match pass {
            ScanPass::Phase { phase, .. } => phase,
            ScanPass::Window | ScanPass::LengthHeader => 0,
        };
        Self {
            source_offset,
            stride,
            phase,
            reversed: false,
            score: 0,
            pass,
            sequence,
        }
    }
}

/// Enumerates candidates from `window` under every stride / phase / termination hypothesis.
///
/// An unreadable or empty window yields no candidates; absence of evidence is not an error.
#[must_use]
pub fn scan_window<W: ByteWindow + ?Sized>(
    window: &W,
    anchor: Option<usize>,
    config: &ScanConfig,
) -> Vec<RouteCandidate> {
    let config = config.normalized();
    let total = window.len();
    if total == 0 {
        return Vec::new();
    }

    let offsets = scan_range(total, anchor, config.window_radius);
    if offsets.is_empty() {
        return Vec::new();
    }

    // One read for the whole region, so the scan sees a single snapshot of foreign memory.
    let read_ahead = (config.max_count + 1) * MAX_STRIDE;
    let read_end = offsets.end.saturating_add(read_ahead).min(total);
    let bytes = match window.read(offsets.start, read_end - offsets.start) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::debug!("Scan skipped: {err} at {:#x}", offsets.start);
            return Vec::new();
        }
    };

    let region = Region {
        bytes: &bytes,
        base: offsets.start,
        config: &config,
    };
    let offsets = offsets.start..offsets.end.min(offsets.start + region.bytes.len());

    let mut out = Vec::new();
    for stride in STRIDES {
        let before = out.len();
        region.window_pass(offsets.clone(), stride, 0, ScanPass::Window, &mut out);
        if config.phase_scan_enabled {
            region.length_header_pass(offsets.clone(), stride, &mut out);
            for phase in 1..stride {
                region.window_pass(
                    offsets.clone(),
                    stride,
                    phase,
                    ScanPass::Phase { stride, phase },
                    &mut out,
                );
            }
        }
        log::debug!(
            "Scan stride={stride} offsets={:#x}..{:#x}: {} candidates",
            offsets.start,
            offsets.end,
            out.len() - before
        );
    }
    out
}

fn scan_range(total: usize, anchor: Option<usize>, radius: usize) -> Range<usize> {
    match anchor {
        Some(anchor) if radius > 0 => {
            let start = anchor.saturating_sub(radius).min(total);
            let end = anchor.saturating_add(radius).saturating_add(1).min(total);
            start..end.max(start)
        }
        _ => 0..total,
    }
}

struct Region<'a> {
    bytes: &'a [u8],
    base: usize,
    config: &'a ScanConfig,
}

impl Region<'_> {
    /// Little-endian element of `width` bytes at absolute `offset`, or None past the region end.
    fn element(&self, offset: usize, width: usize) -> Option<u32> {
        let rel = offset.checked_sub(self.base)?;
        let raw = self.bytes.get(rel..rel.checked_add(width)?)?;
        Some(
            raw.iter()
                .rev()
                .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte)),
        )
    }

    fn window_pass(
        &self,
        offsets: Range<usize>,
        stride: usize,
        phase: usize,
        pass: ScanPass,
        out: &mut Vec<RouteCandidate>,
    ) {
        for offset in offsets.filter(|off| off % stride == phase) {
            if let Some(sequence) = self.read_run(offset, stride) {
                out.push(RouteCandidate::new(offset, stride, pass, sequence));
            }
        }
    }

    fn length_header_pass(&self, offsets: Range<usize>, stride: usize, out: &mut Vec<RouteCandidate>) {
        for offset in offsets.filter(|off| off % stride == 0) {
            if let Some(sequence) = self.read_length_prefixed(offset, stride) {
                out.push(RouteCandidate::new(
                    offset,
                    stride,
                    ScanPass::LengthHeader,
                    sequence,
                ));
            }
        }
    }

    fn read_run(&self, offset: usize, stride: usize) -> Option<RouteSequence> {
        let mut ids = Vec::with_capacity(self.config.max_count);
        for slot in 0..self.config.max_count {
            let Some(value) = self.element(offset + slot * stride, stride) else {
                break;
            };
            if value == 0 {
                if self.config.zero_terminated {
                    break;
                }
                continue;
            }
            // Wider than a waypoint id: torn or unrelated memory.
            ids.push(WaypointId::from_u32(value)?);
        }
        (ids.len() >= self.config.min_count).then(|| RouteSequence::new(ids))
    }

    fn read_length_prefixed(&self, offset: usize, stride: usize) -> Option<RouteSequence> {
        let declared = usize::try_from(self.element(offset, stride)?).ok()?;
        if !(self.config.min_count..=self.config.max_count).contains(&declared) {
            return None;
        }
        let mut ids = Vec::with_capacity(declared);
        for k in 0..declared {
            let value = self.element(offset + (k + 1) * stride, stride)?;
            ids.push(WaypointId::from_u32(value)?);
        }
        Some(RouteSequence::new(ids))
    }
}
