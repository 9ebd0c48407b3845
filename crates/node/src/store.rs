//! On-disk ledger snapshots.

use anyhow::{Context, Result};
use ezballot_core::{Ledger, ReplayGuard};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything needed to resume a ledger and its relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ledger: Ledger,
    pub guard: ReplayGuard,
}

/// CBOR snapshot file, replaced atomically on save.
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<Snapshot> {
        let bytes = std::fs::read(&self.path).with_context(|| {
            format!(
                "No ledger at {} (run `ezballot init` first)",
                self.path.display()
            )
        })?;
        let snapshot: Snapshot = ciborium::de::from_reader(bytes.as_slice())
            .with_context(|| format!("Corrupt snapshot {}", self.path.display()))?;
        debug!(
            "Loaded snapshot with {} events from {}",
            snapshot.ledger.events().len(),
            self.path.display()
        );
        Ok(snapshot)
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut bytes = Vec::new();
        ciborium::ser::into_writer(snapshot, &mut bytes)?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &bytes)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        debug!("Saved snapshot to {}", self.path.display());
        Ok(())
    }
}
