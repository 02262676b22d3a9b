use crate::{encode_key, AliasTable};
use route_protocol::{RouteSequence, WaypointId};
use serde::{Deserialize, Serialize};

pub const DISPLAY_SEPARATOR: char = '>';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    /// Alias chain: map alias, generic name, alphabetic fallback, `P<id>`.
    #[default]
    Letters,
    /// Always `P<id>` tokens.
    ShortIds,
    /// The canonical route key itself.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayOptions {
    pub mode: DisplayMode,
    /// Map context used to pick map-scoped aliases.
    pub map_hint: Option<String>,
    /// Render ids 1..=26 as `A`..=`Z` when no alias resolves.
    pub alphabetic_fallback: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Letters,
            map_hint: None,
            alphabetic_fallback: true,
        }
    }
}

/// Synthesized short display and whether every token fell back to `P<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDisplay {
    pub text: String,
    pub all_raw: bool,
}

#[must_use]
pub fn build_display(
    sequence: &RouteSequence,
    aliases: &AliasTable,
    options: &DisplayOptions,
) -> RouteDisplay {
    let mut all_raw = !sequence.is_empty();
    let mut parts = Vec::with_capacity(sequence.len());
    for id in sequence.iter() {
        match token_for(id, aliases, options) {
            Some(token) => {
                all_raw = false;
                parts.push(token);
            }
            None => parts.push(raw_token(id)),
        }
    }
    RouteDisplay {
        text: join(&parts),
        all_raw,
    }
}

/// What the UI should show for a route under the configured mode.
///
/// In `letters` mode an all-raw display carries no more information than the key, so the key wins.
#[must_use]
pub fn display_or_key(
    sequence: &RouteSequence,
    aliases: &AliasTable,
    options: &DisplayOptions,
) -> String {
    if sequence.is_empty() {
        return String::new();
    }
    match options.mode {
        DisplayMode::Raw => encode_key(sequence),
        DisplayMode::ShortIds => {
            let parts: Vec<String> = sequence.iter().map(raw_token).collect();
            join(&parts)
        }
        DisplayMode::Letters => {
            let display = build_display(sequence, aliases, options);
            if display.all_raw {
                encode_key(sequence)
            } else {
                display.text
            }
        }
    }
}

fn token_for(id: WaypointId, aliases: &AliasTable, options: &DisplayOptions) -> Option<String> {
    if let Some(alias) = aliases.resolve(id, options.map_hint.as_deref()) {
        return Some(alias.to_string());
    }
    if options.alphabetic_fallback && (1..=26).contains(&id.get()) {
        return Some(char::from(b'A' + id.get() - 1).to_string());
    }
    None
}

fn raw_token(id: WaypointId) -> String {
    format!("P{id}")
}

fn join(parts: &[String]) -> String {
    let mut out = String::new();
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            out.push(DISPLAY_SEPARATOR);
        }
        out.push_str(part);
    }
    out
}
