use crate::{CodecError, Result};
use route_protocol::WaypointId;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Friendly names for waypoint ids.
///
/// Two layers: aliases scoped to a map context (loaded from an alias index shaped
/// `{ "<map>": { "<alias>": <id> } }`) and a generic per-id name table that applies to every map.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    by_map: HashMap<String, HashMap<u8, String>>,
    names: BTreeMap<u8, String>,
}

impl AliasTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_map.is_empty() && self.names.is_empty()
    }

    pub fn insert_map_alias(&mut self, map: &str, alias: &str, id: WaypointId) {
        let alias = alias.trim();
        if alias.is_empty() {
            return;
        }
        self.by_map
            .entry(map_key(map))
            .or_default()
            .insert(id.get(), alias.to_string());
    }

    pub fn insert_name(&mut self, id: WaypointId, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            self.names.remove(&id.get());
        } else {
            self.names.insert(id.get(), name.to_string());
        }
    }

    /// Map-scoped alias first, then the generic name table.
    #[must_use]
    pub fn resolve(&self, id: WaypointId, map_hint: Option<&str>) -> Option<&str> {
        if let Some(map) = map_hint.filter(|m| !m.trim().is_empty()) {
            if let Some(alias) = self
                .by_map
                .get(&map_key(map))
                .and_then(|table| table.get(&id.get()))
            {
                return Some(alias.as_str());
            }
        }
        self.names.get(&id.get()).map(String::as_str)
    }

    /// Parses an alias index (`map -> alias -> id`) and inverts it into `id -> alias` per map.
    pub fn from_index_json(text: &str) -> Result<Self> {
        let raw: HashMap<String, HashMap<String, u32>> = serde_json::from_str(text)?;
        let mut table = Self::new();
        for (map, aliases) in raw {
            // Deterministic inversion when two aliases claim the same id: lexicographically first wins.
            let mut ordered: Vec<(String, u32)> = aliases.into_iter().collect();
            ordered.sort();
            for (alias, id) in ordered.into_iter().rev() {
                let Some(waypoint) = WaypointId::from_u32(id) else {
                    return Err(CodecError::InvalidAliasTarget { map, alias, id });
                };
                table.insert_map_alias(&map, &alias, waypoint);
            }
        }
        Ok(table)
    }

    /// Merges a generic name table shaped `{ "<id>": "<name>" }`.
    pub fn merge_names_json(&mut self, text: &str) -> Result<usize> {
        let raw: BTreeMap<String, String> = serde_json::from_str(text)?;
        let mut merged = 0usize;
        for (key, name) in raw {
            let Some(id) = key.trim().parse::<u32>().ok().and_then(WaypointId::from_u32) else {
                log::debug!("Skipping route name with non-waypoint key '{key}'");
                continue;
            };
            self.insert_name(id, &name);
            merged += 1;
        }
        Ok(merged)
    }

    /// Merges a generic name table file. Unlike the alias index, the file must exist and parse.
    pub fn merge_names_file(&mut self, path: &Path) -> Result<usize> {
        let text = std::fs::read_to_string(path)?;
        let merged = self.merge_names_json(&text)?;
        log::debug!("Merged {merged} route names from {}", path.display());
        Ok(merged)
    }

    /// Loads an alias index file. A missing or corrupt file yields an empty table.
    #[must_use]
    pub fn load_index_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match Self::from_index_json(&text) {
                Ok(table) => table,
                Err(err) => {
                    log::warn!("Alias index {} ignored: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                log::warn!("Alias index {} unreadable: {err}", path.display());
                Self::default()
            }
        }
    }
}

fn map_key(map: &str) -> String {
    map.trim().to_lowercase()
}
