//! The bridge to the source manager (§4.3, §6 "Source-manager interface").
//! The concrete VCS-backed implementation of [`SourceManager`] is out of
//! scope for this crate (spec §1) — this module only owns the contract and
//! the caching/single-flight wrapper the solver and vendor writer call
//! through.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::analyzer::PackageTree;
use crate::errors::{Result, VendorlockError};
use crate::lock::Lock;
use crate::manifest::Manifest;
use crate::project::{ProjectIdentifier, ProjectRoot};
use crate::version::Version;

/// A scoped cooperative cancellation token (§5). Cloning shares the same
/// underlying flag; `child()` derives an independent token a caller can
/// cancel without affecting the parent, for fanning cancellation out to a
/// single candidate's prefetch without aborting the whole solve.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Relaxed)
    }

    pub fn child(&self) -> CancelToken {
        CancelToken::new()
    }
}

/// The capability record the core consumes (§6). Implementations perform
/// clone/fetch/checkout and the static analysis pass; everything here may
/// block on network or disk I/O and must respect `cancel`.
pub trait SourceManager: Send + Sync {
    fn deduce_project_root(&self, import_path: &str) -> ProjectRoot;

    fn list_versions(&self, id: &ProjectIdentifier, cancel: &CancelToken) -> Result<Vec<Version>>;

    fn revision_present_in(&self, id: &ProjectIdentifier, revision: &str, cancel: &CancelToken) -> Result<bool>;

    /// Missing manifest/lock files are not errors (§4.3) — `Ok((None,
    /// None))` is a normal result.
    fn get_manifest_and_lock(
        &self,
        id: &ProjectIdentifier,
        version: &Version,
        cancel: &CancelToken,
    ) -> Result<(Option<Manifest>, Option<Lock>)>;

    fn list_packages(&self, id: &ProjectIdentifier, version: &Version, cancel: &CancelToken) -> Result<PackageTree>;

    /// Checks out `id@version` into `dest`, preserving the snapshot's tree
    /// minus VCS metadata. Used only by the vendor writer.
    fn export_project(
        &self,
        id: &ProjectIdentifier,
        version: &Version,
        dest: &Path,
        cancel: &CancelToken,
    ) -> Result<()>;
}

/// A promise-per-key table: the first caller for a given key does the
/// work, concurrent callers block on the same `OnceLock` and share its
/// result (§4.3, §9).
struct SingleFlight<K, V> {
    inflight: Mutex<HashMap<K, Arc<OnceLock<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: std::hash::Hash + Eq,
{
    fn default() -> Self {
        SingleFlight {
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    fn get_or_compute(&self, key: K, compute: impl FnOnce() -> V) -> V {
        let cell = {
            let mut table = self.inflight.lock().unwrap();
            table.entry(key).or_insert_with(|| Arc::new(OnceLock::new())).clone()
        };
        cell.get_or_init(compute).clone()
    }
}

/// Wraps a [`SourceManager`] with the process-lifetime caching and
/// single-flight guarantees the solver relies on (§4.3).
pub struct Bridge {
    inner: Arc<dyn SourceManager>,
    versions: SingleFlight<String, std::result::Result<Vec<Version>, String>>,
    package_cache: Mutex<HashMap<String, PackageTree>>,
    manifest_cache: Mutex<HashMap<String, (Option<Manifest>, Option<Lock>)>>,
}

fn versions_key(id: &ProjectIdentifier) -> String {
    id.to_string()
}

fn candidate_key(id: &ProjectIdentifier, version: &Version) -> String {
    format!("{id}@{}", version.identity_key())
}

impl Bridge {
    pub fn new(inner: Arc<dyn SourceManager>) -> Self {
        Bridge {
            inner,
            versions: SingleFlight::default(),
            package_cache: Mutex::new(HashMap::new()),
            manifest_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn deduce_project_root(&self, import_path: &str) -> ProjectRoot {
        self.inner.deduce_project_root(import_path)
    }

    /// Cached for the process lifetime (§4.3).
    pub fn list_versions(&self, id: &ProjectIdentifier, cancel: &CancelToken) -> Result<Vec<Version>> {
        let key = versions_key(id);
        let result = self.versions.get_or_compute(key, || {
            self.inner
                .list_versions(id, cancel)
                .map(crate::version::order_candidates)
                .map_err(|e| e.to_string())
        });
        result.map_err(|detail| VendorlockError::MissingSource { root: id.root.clone(), detail })
    }

    pub fn revision_present_in(&self, id: &ProjectIdentifier, revision: &str, cancel: &CancelToken) -> Result<bool> {
        self.inner.revision_present_in(id, revision, cancel)
    }

    pub fn get_manifest_and_lock(
        &self,
        id: &ProjectIdentifier,
        version: &Version,
        cancel: &CancelToken,
    ) -> Result<(Option<Manifest>, Option<Lock>)> {
        let key = candidate_key(id, version);
        if let Some(hit) = self.manifest_cache.lock().unwrap().get(&key) {
            return Ok(hit.clone());
        }
        let result = self
            .inner
            .get_manifest_and_lock(id, version, cancel)
            .map_err(|e| VendorlockError::MissingSource { root: id.root.clone(), detail: e.to_string() })?;
        self.manifest_cache.lock().unwrap().insert(key, result.clone());
        Ok(result)
    }

    pub fn list_packages(&self, id: &ProjectIdentifier, version: &Version, cancel: &CancelToken) -> Result<PackageTree> {
        let key = candidate_key(id, version);
        if let Some(hit) = self.package_cache.lock().unwrap().get(&key) {
            return Ok(hit.clone());
        }
        let tree = self
            .inner
            .list_packages(id, version, cancel)
            .map_err(|e| VendorlockError::MissingSource { root: id.root.clone(), detail: e.to_string() })?;
        self.package_cache.lock().unwrap().insert(key, tree.clone());
        Ok(tree)
    }

    pub fn export_project(&self, id: &ProjectIdentifier, version: &Version, dest: &Path, cancel: &CancelToken) -> Result<()> {
        self.inner
            .export_project(id, version, dest, cancel)
            .map_err(|e| VendorlockError::MissingSource { root: id.root.clone(), detail: e.to_string() })
    }
}
