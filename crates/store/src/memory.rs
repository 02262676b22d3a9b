use crate::{ensure_trusted, ConfidenceStore, Result};
use route_protocol::{LastGoodRoute, Slot};
use std::collections::BTreeMap;

/// Process-local store. Each instance is independent, so tests never share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfidenceStore {
    routes: BTreeMap<Slot, LastGoodRoute>,
}

impl MemoryConfidenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfidenceStore for MemoryConfidenceStore {
    fn get(&self, slot: Slot) -> Option<LastGoodRoute> {
        self.routes.get(&slot).cloned()
    }

    fn put(&mut self, slot: Slot, entry: LastGoodRoute) -> Result<()> {
        ensure_trusted(slot, &entry)?;
        self.routes.insert(slot, entry);
        Ok(())
    }

    fn entries(&self) -> Vec<(Slot, LastGoodRoute)> {
        self.routes
            .iter()
            .map(|(slot, entry)| (*slot, entry.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    use pretty_assertions::assert_eq;
    use route_protocol::{ConfidenceTier, RouteSequence};

    fn slot(n: u32) -> Slot {
        Slot::new(n).expect("slot")
    }

    #[test]
    fn slots_are_independent() {
        let mut store = MemoryConfidenceStore::new();
        let route = RouteSequence::from_raw(&[3, 7, 12]);
        store
            .put_route(slot(1), &route, ConfidenceTier::Full, "mem", 42)
            .expect("put");

        let entry = store.get(slot(1)).expect("stored");
        assert_eq!(entry.route_key, "Point-3 - Point-7 - Point-12");
        assert_eq!(entry.confidence, ConfidenceTier::Full);
        assert_eq!(entry.captured_at_unix_ms, 42);
        assert!(store.get(slot(2)).is_none());
    }

    #[test]
    fn degraded_routes_are_rejected() {
        let mut store = MemoryConfidenceStore::new();
        let err = store
            .put_route(
                slot(1),
                &RouteSequence::from_raw(&[9, 21]),
                ConfidenceTier::Full,
                "mem",
                1,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::DegradedRoute { .. }));
        assert!(store.entries().is_empty());
    }
}
