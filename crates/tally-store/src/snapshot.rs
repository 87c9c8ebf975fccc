//! Durable JSON snapshots of the committed tables.
//!
//! The whole table set is rewritten on every commit: serialized to a temp
//! file in the target directory, synced, then atomically renamed over the
//! previous snapshot. A reader therefore sees either the old or the new
//! state, never a torn file.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tally_types::{Bonus, Points, Task, User};

use crate::error::{StoreError, StoreResult};
use crate::tables::Tables;

/// On-disk layout: one array per table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub format: u32,
    pub users: Vec<User>,
    pub points: Vec<Points>,
    pub bonuses: Vec<Bonus>,
    pub tasks: Vec<Task>,
}

impl Snapshot {
    pub const FORMAT: u32 = 1;
}

/// Load tables from `path`. A missing file yields `None`.
pub fn load(path: &Path) -> StoreResult<Option<Tables>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let snapshot: Snapshot =
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
    if snapshot.format != Snapshot::FORMAT {
        return Err(StoreError::Serialization(format!(
            "unsupported snapshot format {} (expected {})",
            snapshot.format,
            Snapshot::FORMAT
        )));
    }
    Tables::from_snapshot(snapshot).map(Some)
}

/// Atomically replace the snapshot at `path` with `tables`.
pub fn write(path: &Path, tables: &Tables) -> StoreResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let encoded = serde_json::to_vec_pretty(&tables.to_snapshot())
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(&encoded)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
