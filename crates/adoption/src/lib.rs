//! # Route Adoption
//!
//! Decides, per slot and per tick, which recovered route is authoritative.
//!
//! ```text
//! ByteWindow ──> CandidateScanner ──> best candidate (mem)
//!                                          │
//!            ConfidenceStore (cache) ──> decide()   ttl / cache-longer / mem / cache
//!                                          │
//!                              degraded? ──> fallbacks (ui-scrape, log-replay)
//!                                          │
//!                                   RecoveryOutcome + store write + audit line
//! ```

mod audit;
mod config;
mod engine;
mod error;
mod fallback;
mod log_replay;
mod policy;
mod ui_scrape;

pub use audit::{
    adoption_line, candidate_line, scan_line, AdoptionRecord, AuditSink, AuditSinks,
    FileAuditSink, LogAuditSink, MemoryAuditSink, AUDIT_TARGET,
};
pub use config::{EngineConfig, PolicyConfig};
pub use engine::{RecoverRequest, RecoveryOutcome, RouteEngine};
pub use error::{ConfigError, EngineError, Result};
pub use fallback::{FallbackRoute, RouteFallback, RouteQuery};
pub use log_replay::LogReplayFallback;
pub use policy::{decide, ttl_protects, PolicyDecision, PolicyInput};
pub use ui_scrape::UiScrapeFallback;
