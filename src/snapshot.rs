//! Versioned JSON snapshots of kernel state.
//!
//! A snapshot captures the config, the step counter, and every edge with its
//! full belief table. Restoring validates the version and replays each
//! belief through the ordinary add path, so indexes and events rebuild
//! consistently. Snapshots are taken when the kernel is quiescent.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::KernelConfig;
use crate::error::{DoxaResult, SnapshotError};
use crate::graph::store::Hypergraph;
use crate::graph::{Belief, now_millis};
use crate::term::{TermId, TermKind};

/// The snapshot format this build reads and writes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One serialized hyperedge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub id: TermId,
    #[serde(rename = "type")]
    pub kind: TermKind,
    pub args: Vec<String>,
    pub beliefs: Vec<Belief>,
}

/// A complete kernel snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub timestamp: u64,
    pub config: KernelConfig,
    pub current_step: u64,
    pub hypergraph: Vec<EdgeSnapshot>,
}

impl Snapshot {
    /// Capture the current state.
    pub fn capture(config: &KernelConfig, current_step: u64, store: &Hypergraph) -> Self {
        let mut hypergraph: Vec<EdgeSnapshot> = store
            .iter()
            .map(|edge| EdgeSnapshot {
                id: edge.id.clone(),
                kind: edge.kind,
                args: edge.args.clone(),
                beliefs: edge.beliefs.clone(),
            })
            .collect();
        // Stable output: edges sorted by id.
        hypergraph.sort_by(|a, b| a.id.cmp(&b.id));

        Self {
            version: SNAPSHOT_VERSION,
            timestamp: now_millis(),
            config: config.clone(),
            current_step,
            hypergraph,
        }
    }

    /// Serialize to a JSON document.
    pub fn to_json(&self) -> DoxaResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            SnapshotError::Corrupt {
                message: format!("serialize failed: {e}"),
            }
            .into()
        })
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> DoxaResult<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(text).map_err(|e| SnapshotError::Corrupt {
                message: e.to_string(),
            })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            }
            .into());
        }
        snapshot.config.validate()?;
        Ok(snapshot)
    }

    /// Write the snapshot to a file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> DoxaResult<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| SnapshotError::Io { source })?;
        Ok(())
    }

    /// Read a snapshot from a file.
    pub fn read_from(path: impl AsRef<Path>) -> DoxaResult<Self> {
        let text =
            std::fs::read_to_string(path).map_err(|source| SnapshotError::Io { source })?;
        Self::from_json(&text)
    }
}
