//! Saving and loading committed snapshots as JSON files.
//!
//! A snapshot file records the generation, the blake3 fingerprint (hex) and
//! the graph. Loading recomputes the fingerprint and refuses files whose
//! graph does not match it. Saving writes a sibling temp file and renames it
//! over the target, so readers never see a partial file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use sdntwin_core::{Generation, TopologyGraph};

use crate::error::StoreError;
use crate::hash::fingerprint;
use crate::store::TwinSnapshot;

/// On-disk form of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub generation: Generation,
    pub fingerprint: String,
    pub graph: TopologyGraph,
}

impl From<&TwinSnapshot> for SnapshotFile {
    fn from(snapshot: &TwinSnapshot) -> Self {
        SnapshotFile {
            generation: snapshot.generation,
            fingerprint: snapshot.fingerprint.to_hex().to_string(),
            graph: TopologyGraph::clone(&snapshot.graph),
        }
    }
}

/// Writes `snapshot` to `path` as pretty-printed JSON.
pub fn save_snapshot(path: &Path, snapshot: &TwinSnapshot) -> Result<(), StoreError> {
    let file = SnapshotFile::from(snapshot);
    let json = serde_json::to_string_pretty(&file)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, json.as_bytes())?;
    fs::rename(&tmp, path)?;

    tracing::info!(
        path = %path.display(),
        generation = snapshot.generation.0,
        "snapshot saved"
    );
    Ok(())
}

/// Reads and verifies a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<SnapshotFile, StoreError> {
    let bytes = fs::read(path)?;
    let file: SnapshotFile = serde_json::from_slice(&bytes)?;

    let actual = fingerprint(&file.graph).to_hex().to_string();
    if !actual.eq_ignore_ascii_case(&file.fingerprint) {
        return Err(StoreError::Integrity {
            reason: format!(
                "{} records fingerprint {} but its graph hashes to {}",
                path.display(),
                file.fingerprint,
                actual
            ),
        });
    }
    Ok(file)
}
