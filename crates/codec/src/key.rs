use regex::Regex;
use route_protocol::{RouteSequence, WaypointId};
use std::sync::OnceLock;

pub const KEY_PREFIX: &str = "Point";
pub const KEY_SEPARATOR: &str = " - ";

fn digit_run() -> &'static Regex {
    static DIGIT_RUN: OnceLock<Regex> = OnceLock::new();
    DIGIT_RUN.get_or_init(|| Regex::new(r"[0-9]+").expect("static digit-run pattern"))
}

/// Canonical key: `Point-3 - Point-7 - Point-12`.
#[must_use]
pub fn encode_key(sequence: &RouteSequence) -> String {
    sequence
        .iter()
        .map(|id| format!("{KEY_PREFIX}-{id}"))
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// Extracts every embedded waypoint id from arbitrary text.
///
/// Lossy on purpose: input may come from scraped UI text, so anything that is not a digit run is
/// ignored and digit runs outside `1..=255` are dropped.
#[must_use]
pub fn decode_key(text: &str) -> RouteSequence {
    digit_run()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .filter_map(WaypointId::from_u32)
        .collect()
}
