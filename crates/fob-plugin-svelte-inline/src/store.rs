//! Artifact store and virtual asset cache
//!
//! Extracted sub-components become real files next to their parent so the
//! bundler can resolve and load them like any other component. The store
//! owns those files for the duration of a build through a two-phase protocol:
//!
//! 1. **publish**: register the record, write it to disk, mark it published
//! 2. **release**: once the bundler reports the module as parsed, delete it
//!
//! A record is only released while it is published, so a file is never
//! deleted before its write completed, and each publish is released at most
//! once. `build_start` re-publishes every known record, which restores files
//! released by a previous incremental build.

use dashmap::DashMap;
use path_clean::PathClean;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::extractor::SubComponentRecord;
use crate::runtime::Runtime;

#[derive(Debug, Clone)]
struct ArtifactEntry {
    record: SubComponentRecord,
    /// Set after a successful write, cleared by release
    published: bool,
}

/// Registry of extracted sub-components for one build session.
///
/// Cloning shares the same registry.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    entries: Arc<DashMap<PathBuf, ArtifactEntry>>,
    /// Parent path to the artifact paths its last extraction produced
    parents: Arc<DashMap<PathBuf, Vec<PathBuf>>>,
    runtime: Arc<dyn Runtime>,
}

impl ArtifactStore {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            parents: Arc::new(DashMap::new()),
            runtime,
        }
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    /// Insert or replace a record. The replacement is unpublished until
    /// it has been written.
    pub fn register(&self, record: SubComponentRecord) {
        self.entries.insert(
            record.path.clean(),
            ArtifactEntry {
                record,
                published: false,
            },
        );
    }

    /// Write a record's body to its artifact path.
    pub async fn materialize(&self, record: &SubComponentRecord) -> Result<()> {
        self.runtime
            .write_file(&record.path, record.body.as_bytes())
            .await
            .map_err(|e| Error::artifact_write_failed(&record.path, e))?;

        if let Some(mut entry) = self.entries.get_mut(&record.path.clean()) {
            entry.published = true;
        }

        Ok(())
    }

    /// Register and materialize. The artifact exists on disk when this returns.
    pub async fn publish(&self, record: SubComponentRecord) -> Result<()> {
        let path = record.path.clone();
        self.register(record.clone());
        self.materialize(&record).await?;
        debug!(path = %path.display(), "Published sub-component artifact");
        Ok(())
    }

    /// Re-write every known record. Returns how many were written.
    pub async fn materialize_all(&self) -> Result<usize> {
        let records: Vec<SubComponentRecord> = self
            .entries
            .iter()
            .map(|entry| entry.record.clone())
            .collect();

        for record in &records {
            self.materialize(record).await?;
        }

        if !records.is_empty() {
            debug!(count = records.len(), "Materialized sub-component artifacts");
        }
        Ok(records.len())
    }

    /// Delete the on-disk copy of a published artifact.
    ///
    /// Returns whether a deletion was attempted. Unknown or unpublished paths
    /// are ignored. Deletion failures are logged and swallowed.
    pub async fn release(&self, path: &Path) -> bool {
        let key = path.clean();
        let was_published = match self.entries.get_mut(&key) {
            Some(mut entry) if entry.published => {
                entry.published = false;
                true
            }
            _ => false,
        };

        if !was_published {
            return false;
        }

        self.remove_artifact(&key).await;
        true
    }

    /// Forget the artifacts `parent` declared last time but no longer does,
    /// and delete their files. Returns how many were dropped.
    pub async fn retain_for_parent(&self, parent: &Path, current: &[SubComponentRecord]) -> usize {
        let parent = parent.clean();
        let keep: Vec<PathBuf> = current.iter().map(|record| record.path.clean()).collect();

        let previous = if keep.is_empty() {
            self.parents.remove(&parent).map(|(_, paths)| paths)
        } else {
            self.parents.insert(parent.clone(), keep.clone())
        };

        let stale: Vec<PathBuf> = previous
            .unwrap_or_default()
            .into_iter()
            .filter(|path| !keep.contains(path))
            .collect();

        for path in &stale {
            self.entries.remove(path);
            self.remove_artifact(path).await;
        }

        if !stale.is_empty() {
            debug!(
                parent = %parent.display(),
                count = stale.len(),
                "Dropped stale sub-component artifacts"
            );
        }
        stale.len()
    }

    async fn remove_artifact(&self, path: &Path) {
        match self.runtime.remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Released sub-component artifact"),
            Err(e) if e.is_not_found() => {}
            Err(e) => debug!(
                path = %path.display(),
                error = %e,
                "Failed to release sub-component artifact"
            ),
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(&path.clean())
    }

    pub fn get(&self, path: &Path) -> Option<SubComponentRecord> {
        self.entries
            .get(&path.clean())
            .map(|entry| entry.record.clone())
    }

    pub fn is_published(&self, path: &Path) -> bool {
        self.entries
            .get(&path.clean())
            .is_some_and(|entry| entry.published)
    }

    /// Known artifact paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.entries.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// In-memory assets served through `load`, keyed by virtual id.
///
/// Entries live for the whole build and are never evicted.
#[derive(Debug, Clone, Default)]
pub struct VirtualAssets {
    assets: Arc<DashMap<String, String>>,
}

impl VirtualAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, content: impl Into<String>) {
        self.assets.insert(key.into(), content.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.assets.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.assets.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MemoryRuntime;

    fn setup() -> (MemoryRuntime, ArtifactStore) {
        let runtime = MemoryRuntime::new();
        let store = ArtifactStore::new(Arc::new(runtime.clone()));
        (runtime, store)
    }

    fn nav_link() -> SubComponentRecord {
        SubComponentRecord::new(Path::new("/src/App.svelte"), "NavLink", "<a href={link}>")
    }

    #[tokio::test]
    async fn test_publish_writes_before_returning() {
        let (runtime, store) = setup();
        store.publish(nav_link()).await.unwrap();

        assert_eq!(
            runtime.contents("/src/App__NavLink.svelte").as_deref(),
            Some("<a href={link}>")
        );
        assert!(store.is_published(Path::new("/src/App__NavLink.svelte")));
    }

    #[tokio::test]
    async fn test_release_deletes_once() {
        let (runtime, store) = setup();
        let path = Path::new("/src/App__NavLink.svelte");
        store.publish(nav_link()).await.unwrap();

        assert!(store.release(path).await);
        assert!(!runtime.exists(path));
        assert!(!store.release(path).await);
        assert!(store.contains(path));
    }

    #[tokio::test]
    async fn test_release_of_unknown_or_unpublished_path() {
        let (runtime, store) = setup();
        runtime.insert("/src/Other__X.svelte", "user file");
        assert!(!store.release(Path::new("/src/Other__X.svelte")).await);
        assert!(runtime.exists(Path::new("/src/Other__X.svelte")));

        store.register(nav_link());
        assert!(!store.release(Path::new("/src/App__NavLink.svelte")).await);
    }

    #[tokio::test]
    async fn test_release_tolerates_missing_file() {
        let (runtime, store) = setup();
        let path = Path::new("/src/App__NavLink.svelte");
        store.publish(nav_link()).await.unwrap();
        runtime.remove_file(path).await.unwrap();

        assert!(store.release(path).await);
    }

    #[tokio::test]
    async fn test_materialize_all_restores_released_files() {
        let (runtime, store) = setup();
        store.publish(nav_link()).await.unwrap();
        store
            .publish(SubComponentRecord::new(
                Path::new("/src/Page.svelte"),
                "Footer",
                "<footer />",
            ))
            .await
            .unwrap();

        store.release(Path::new("/src/App__NavLink.svelte")).await;
        store.release(Path::new("/src/Page__Footer.svelte")).await;
        assert!(runtime.is_empty());

        assert_eq!(store.materialize_all().await.unwrap(), 2);
        assert_eq!(
            runtime.contents("/src/App__NavLink.svelte").as_deref(),
            Some("<a href={link}>")
        );
        assert_eq!(
            runtime.contents("/src/Page__Footer.svelte").as_deref(),
            Some("<footer />")
        );
        assert!(store.is_published(Path::new("/src/Page__Footer.svelte")));
    }

    #[tokio::test]
    async fn test_materialize_release_materialize_is_stable() {
        let (runtime, store) = setup();
        let record = nav_link();
        store.publish(record.clone()).await.unwrap();
        let first = runtime.contents(&record.path);

        store.release(&record.path).await;
        store.materialize(&record).await.unwrap();
        assert_eq!(runtime.contents(&record.path), first);
    }

    #[tokio::test]
    async fn test_write_failure_is_fatal() {
        let (runtime, store) = setup();
        runtime.set_read_only(true);

        let err = store.publish(nav_link()).await.unwrap_err();
        assert!(matches!(err, Error::ArtifactWriteFailed { .. }));
        assert!(!store.is_published(Path::new("/src/App__NavLink.svelte")));
    }

    #[tokio::test]
    async fn test_republish_overwrites() {
        let (runtime, store) = setup();
        store.publish(nav_link()).await.unwrap();
        store
            .publish(SubComponentRecord::new(
                Path::new("/src/App.svelte"),
                "NavLink",
                "<a>v2</a>",
            ))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            runtime.contents("/src/App__NavLink.svelte").as_deref(),
            Some("<a>v2</a>")
        );
    }

    #[tokio::test]
    async fn test_concurrent_publish_of_distinct_records() {
        let (runtime, store) = setup();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let record = SubComponentRecord::new(
                    Path::new(&format!("/src/Page{i}.svelte")),
                    "Item",
                    format!("<li>{i}</li>"),
                );
                store.publish(record).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.len(), 16);
        assert_eq!(runtime.len(), 16);
        assert_eq!(
            runtime.contents("/src/Page7__Item.svelte").as_deref(),
            Some("<li>7</li>")
        );
    }

    #[tokio::test]
    async fn test_retain_drops_blocks_no_longer_declared() {
        let (runtime, store) = setup();
        let parent = Path::new("/src/App.svelte");
        let old = SubComponentRecord::new(parent, "Old", "<p>old</p>");
        let kept = nav_link();

        store.publish(old.clone()).await.unwrap();
        store.publish(kept.clone()).await.unwrap();
        assert_eq!(store.retain_for_parent(parent, &[old.clone(), kept.clone()]).await, 0);

        store.release(&old.path).await;
        assert_eq!(store.retain_for_parent(parent, &[kept.clone()]).await, 1);
        assert!(!store.contains(&old.path));
        assert!(store.contains(&kept.path));

        assert_eq!(store.materialize_all().await.unwrap(), 1);
        assert!(!runtime.exists(&old.path));
        assert!(runtime.exists(&kept.path));
    }

    #[tokio::test]
    async fn test_retain_with_no_blocks_removes_files() {
        let (runtime, store) = setup();
        let parent = Path::new("/src/App.svelte");
        store.publish(nav_link()).await.unwrap();
        store.retain_for_parent(parent, &[nav_link()]).await;

        assert_eq!(store.retain_for_parent(parent, &[]).await, 1);
        assert!(store.is_empty());
        assert!(runtime.is_empty());
        assert_eq!(store.retain_for_parent(parent, &[]).await, 0);
    }

    #[test]
    fn test_virtual_assets() {
        let assets = VirtualAssets::new();
        assert!(assets.is_empty());
        assets.insert("/src/Button.css", ".btn{color:red}");

        assert!(assets.contains("/src/Button.css"));
        assert_eq!(
            assets.get("/src/Button.css").as_deref(),
            Some(".btn{color:red}")
        );
        assert_eq!(assets.get("/src/Other.css"), None);
    }
}
