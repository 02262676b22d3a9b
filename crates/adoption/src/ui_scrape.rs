use crate::fallback::{FallbackRoute, RouteFallback, RouteQuery};
use regex::Regex;
use route_codec::decode_key;
use route_protocol::{AdoptionReason, ConfidenceTier, RouteSequence};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

const NAME_SEPARATORS: [char; 3] = [':', '|', '\t'];

fn placeholder_name() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"^Submarine-\d+$").expect("static placeholder pattern"))
}

#[derive(Debug, Clone)]
enum UiSource {
    File(PathBuf),
    Parsed(HashMap<String, RouteSequence>),
}

/// Routes scraped from on-screen text, looked up by the name shown next to them.
///
/// Each line reads `<name><sep><route text>` with `:`, `|` or a tab as separator. Lines without a
/// separator, with a default `Submarine-<n>` name, or with fewer than three decodable ids are
/// noise and skipped. When a name repeats, the later line wins. A file source is re-read on every
/// lookup so a long-running watcher follows the latest scrape.
#[derive(Debug, Clone)]
pub struct UiScrapeFallback {
    source: UiSource,
    tier: ConfidenceTier,
}

impl UiScrapeFallback {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let routes = parse_lines(lines);
        log::debug!("UI scrape: {} named routes", routes.len());
        Self {
            source: UiSource::Parsed(routes),
            tier: ConfidenceTier::Partial,
        }
    }

    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: UiSource::File(path.into()),
            tier: ConfidenceTier::Partial,
        }
    }

    #[must_use]
    pub fn with_tier(mut self, tier: ConfidenceTier) -> Self {
        self.tier = tier;
        self
    }

    /// Named routes in the current scrape. An unreadable file is no evidence.
    #[must_use]
    pub fn routes(&self) -> HashMap<String, RouteSequence> {
        match &self.source {
            UiSource::Parsed(routes) => routes.clone(),
            UiSource::File(path) => match std::fs::read_to_string(path) {
                Ok(text) => parse_lines(text.lines()),
                Err(err) => {
                    log::warn!("UI scrape skipped, {} unreadable: {err}", path.display());
                    HashMap::new()
                }
            },
        }
    }

    #[must_use]
    pub fn lookup_route_for_name(&self, name: &str) -> Option<RouteSequence> {
        let name = name.trim();
        match &self.source {
            UiSource::Parsed(routes) => routes.get(name).cloned(),
            UiSource::File(_) => self.routes().remove(name),
        }
    }
}

fn parse_lines<I, S>(lines: I) -> HashMap<String, RouteSequence>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut routes = HashMap::new();
    for line in lines {
        if let Some((name, sequence)) = parse_line(line.as_ref()) {
            routes.insert(name, sequence);
        }
    }
    routes
}

fn parse_line(line: &str) -> Option<(String, RouteSequence)> {
    let (name, route) = line.split_once(NAME_SEPARATORS)?;
    let name = name.trim();
    if name.is_empty() || placeholder_name().is_match(name) {
        return None;
    }
    let sequence = decode_key(route);
    sequence.is_trusted().then(|| (name.to_string(), sequence))
}

impl RouteFallback for UiScrapeFallback {
    fn name(&self) -> &str {
        "ui-scrape"
    }

    fn lookup(&self, query: &RouteQuery) -> Option<FallbackRoute> {
        let name = query.name.as_deref()?;
        let sequence = self.lookup_route_for_name(name)?;
        Some(FallbackRoute {
            sequence,
            tier: self.tier,
            reason: AdoptionReason::UiScrape,
        })
    }
}
