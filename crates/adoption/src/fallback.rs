use route_protocol::{AdoptionReason, ConfidenceTier, RouteSequence, Slot};

/// What a fallback is asked about: the slot, and the display name the UI shows for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteQuery {
    pub slot: Slot,
    pub name: Option<String>,
}

impl RouteQuery {
    #[must_use]
    pub fn new(slot: Slot) -> Self {
        Self { slot, name: None }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = (!name.trim().is_empty()).then_some(name);
        self
    }
}

/// A route supplied by a fallback, with the tier its source declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackRoute {
    pub sequence: RouteSequence,
    pub tier: ConfidenceTier,
    pub reason: AdoptionReason,
}

/// Secondary evidence consulted only when the policy result is degraded.
///
/// The engine treats every implementation the same way; it never special-cases where a
/// fallback gets its data.
pub trait RouteFallback {
    fn name(&self) -> &str;

    /// A trusted route for the query, or None when this source knows nothing useful.
    fn lookup(&self, query: &RouteQuery) -> Option<FallbackRoute>;
}
