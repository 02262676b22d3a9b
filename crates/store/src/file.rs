use crate::{ensure_trusted, unix_now_ms, ConfidenceStore, Result, StoreError};
use fs2::FileExt;
use route_protocol::{LastGoodRoute, Slot, STORE_SCHEMA_VERSION};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// On-disk layout of the store file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreSnapshot {
    pub schema_version: u32,
    pub saved_at_unix_ms: u64,
    /// Keyed by slot number.
    pub routes: BTreeMap<String, LastGoodRoute>,
}

/// JSON snapshot store. Writes go through a temp file and a rename under an exclusive file lock.
///
/// A missing file is an empty store. A corrupt or future-versioned file is logged and treated as
/// empty; the next successful write replaces it.
#[derive(Debug)]
pub struct JsonFileConfidenceStore {
    path: PathBuf,
    routes: BTreeMap<Slot, LastGoodRoute>,
}

struct StoreWriteLock {
    file: File,
}

impl Drop for StoreWriteLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl JsonFileConfidenceStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let routes = read_routes(&path)?;
        log::debug!("Opened route store {} with {} slots", path.display(), routes.len());
        Ok(Self { path, routes })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Picks up writes made by other processes since the last read.
    pub fn reload(&mut self) -> Result<()> {
        self.routes = read_routes(&self.path)?;
        Ok(())
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn acquire_write_lock(&self) -> Result<StoreWriteLock> {
        let path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| StoreError::Lock {
                path: path.display().to_string(),
                source,
            })?;
        file.lock_exclusive().map_err(|source| StoreError::Lock {
            path: path.display().to_string(),
            source,
        })?;
        Ok(StoreWriteLock { file })
    }

    fn write_snapshot(&self, routes: &BTreeMap<Slot, LastGoodRoute>) -> Result<()> {
        let snapshot = StoreSnapshot {
            schema_version: STORE_SCHEMA_VERSION,
            saved_at_unix_ms: unix_now_ms(),
            routes: routes
                .iter()
                .map(|(slot, entry)| (slot.to_string(), entry.clone()))
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ConfidenceStore for JsonFileConfidenceStore {
    fn get(&self, slot: Slot) -> Option<LastGoodRoute> {
        self.routes.get(&slot).cloned()
    }

    fn put(&mut self, slot: Slot, entry: LastGoodRoute) -> Result<()> {
        ensure_trusted(slot, &entry)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let _lock = self.acquire_write_lock()?;
        // Merge with whatever other writers persisted for other slots.
        let mut routes = read_routes(&self.path)?;
        routes.insert(slot, entry);
        self.write_snapshot(&routes)?;
        self.routes = routes;
        log::debug!("Route store {} updated slot {slot}", self.path.display());
        Ok(())
    }

    fn entries(&self) -> Vec<(Slot, LastGoodRoute)> {
        self.routes
            .iter()
            .map(|(slot, entry)| (*slot, entry.clone()))
            .collect()
    }
}

fn read_routes(path: &Path) -> Result<BTreeMap<Slot, LastGoodRoute>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(err.into()),
    };
    let snapshot: StoreSnapshot = match serde_json::from_slice(&bytes) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            log::warn!("Route store {} is corrupt, starting empty: {err}", path.display());
            return Ok(BTreeMap::new());
        }
    };
    if snapshot.schema_version > STORE_SCHEMA_VERSION {
        log::warn!(
            "Route store {} has schema v{} (supported: v{STORE_SCHEMA_VERSION}), starting empty",
            path.display(),
            snapshot.schema_version
        );
        return Ok(BTreeMap::new());
    }

    let mut routes = BTreeMap::new();
    for (key, entry) in snapshot.routes {
        match key.parse::<Slot>() {
            Ok(slot) => {
                routes.insert(slot, entry);
            }
            Err(err) => log::warn!("Route store {}: skipping entry '{key}': {err}", path.display()),
        }
    }
    Ok(routes)
}
