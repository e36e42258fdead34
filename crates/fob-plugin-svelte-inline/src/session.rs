//! Per-build shared state
//!
//! Everything the transforms of different components share lives in one
//! [`BuildSession`], which is created with the plugin and handed to every
//! pipeline stage. There is no global state.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::runtime::Runtime;
use crate::store::{ArtifactStore, VirtualAssets};

#[derive(Debug, Clone)]
pub struct BuildSession {
    artifacts: ArtifactStore,
    assets: VirtualAssets,
    /// Packages whose `package.json` is hidden by their `exports` map
    inaccessible: Arc<Mutex<BTreeSet<String>>>,
}

impl BuildSession {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            artifacts: ArtifactStore::new(runtime),
            assets: VirtualAssets::new(),
            inaccessible: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn assets(&self) -> &VirtualAssets {
        &self.assets
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        self.artifacts.runtime()
    }

    pub fn note_inaccessible_package(&self, package: impl Into<String>) {
        self.inaccessible.lock().insert(package.into());
    }

    /// Drain the inaccessible-package set, sorted.
    pub fn take_inaccessible_packages(&self) -> Vec<String> {
        std::mem::take(&mut *self.inaccessible.lock())
            .into_iter()
            .collect()
    }
}
