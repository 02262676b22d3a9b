//! # Route Store
//!
//! Persists, per slot, the best route ever confirmed together with its confidence tier,
//! capture time and provenance.
//!
//! ## Concurrency
//!
//! Stores are `&mut` for writes and do no internal locking between the TTL check an adoption
//! performs and the write that follows it. Callers that share one store across threads must
//! serialize access per slot themselves (for example one `Mutex` per slot). The file store
//! additionally takes an exclusive OS file lock around each write so two processes never
//! interleave snapshot rewrites.

mod error;
mod file;
mod memory;

pub use error::{Result, StoreError};
pub use file::{JsonFileConfidenceStore, StoreSnapshot};
pub use memory::MemoryConfidenceStore;

use route_codec::{decode_key, encode_key};
use route_protocol::{ConfidenceTier, LastGoodRoute, RouteSequence, Slot};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get/put access to the last-known-good route of each slot.
pub trait ConfidenceStore {
    fn get(&self, slot: Slot) -> Option<LastGoodRoute>;

    /// Replaces the slot's entry. Entries whose key decodes to a degraded route are rejected.
    fn put(&mut self, slot: Slot, entry: LastGoodRoute) -> Result<()>;

    /// Every stored entry, ordered by slot.
    fn entries(&self) -> Vec<(Slot, LastGoodRoute)>;

    fn put_route(
        &mut self,
        slot: Slot,
        sequence: &RouteSequence,
        confidence: ConfidenceTier,
        source: &str,
        now_unix_ms: u64,
    ) -> Result<LastGoodRoute> {
        let entry = LastGoodRoute {
            route_key: encode_key(sequence),
            confidence,
            captured_at_unix_ms: now_unix_ms,
            source: source.to_string(),
        };
        self.put(slot, entry.clone())?;
        Ok(entry)
    }
}

/// Decoded sequence of a stored entry.
#[must_use]
pub fn stored_sequence(entry: &LastGoodRoute) -> RouteSequence {
    decode_key(&entry.route_key)
}

pub(crate) fn ensure_trusted(slot: Slot, entry: &LastGoodRoute) -> Result<()> {
    if stored_sequence(entry).is_degraded() {
        return Err(StoreError::DegradedRoute {
            slot,
            route_key: entry.route_key.clone(),
        });
    }
    Ok(())
}

pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
