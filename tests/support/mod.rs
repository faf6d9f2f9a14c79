//! Shared fixture for the integration suite: an in-memory `SourceManager`
//! with no VCS or network I/O, built up per-test via the builder methods.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use vendorlock::analyzer::{Package, PackageTree};
use vendorlock::bridge::CancelToken;
use vendorlock::bridge::SourceManager;
use vendorlock::errors::Result;
use vendorlock::lock::Lock;
use vendorlock::manifest::Manifest;
use vendorlock::project::{ProjectIdentifier, ProjectRoot};
use vendorlock::version::Version;

#[derive(Clone)]
pub struct FixtureFile {
    pub path: &'static str,
    pub contents: &'static str,
}

/// Keys fixture lookups by the underlying tag/semver/branch name alone,
/// ignoring any paired revision — candidates that reach `get_manifest_and_lock`
/// / `list_packages` / `export_project` are whatever `list_versions` handed
/// back, which the builders below register before pairing is relevant.
fn version_key(version: &Version) -> String {
    match version.underlying() {
        Some(u) => u.to_string(),
        None => version.revision_str().unwrap_or_default().to_string(),
    }
}

#[derive(Default)]
pub struct FixtureManager {
    versions: Mutex<BTreeMap<String, Vec<Version>>>,
    manifests: Mutex<BTreeMap<(String, String), Manifest>>,
    packages: Mutex<BTreeMap<(String, String), PackageTree>>,
    exports: Mutex<BTreeMap<(String, String), Vec<FixtureFile>>>,
}

impl FixtureManager {
    pub fn new() -> Self {
        FixtureManager::default()
    }

    pub fn with_versions(self, root: &str, versions: Vec<Version>) -> Self {
        self.versions.lock().unwrap().insert(root.to_string(), versions);
        self
    }

    pub fn with_manifest(self, root: &str, version: &str, manifest: Manifest) -> Self {
        self.manifests.lock().unwrap().insert((root.to_string(), version.to_string()), manifest);
        self
    }

    /// Registers a single default package (`.`, no imports) for every
    /// version of `root`, so the solver has something to record as this
    /// project's package list without needing per-version setup.
    pub fn with_default_package(self, root: &str, version: &str) -> Self {
        let mut tree = PackageTree::default();
        tree.packages.insert(".".to_string(), Package::default());
        self.packages.lock().unwrap().insert((root.to_string(), version.to_string()), tree);
        self
    }

    pub fn with_exported_files(self, root: &str, version: &str, files: Vec<FixtureFile>) -> Self {
        self.exports.lock().unwrap().insert((root.to_string(), version.to_string()), files);
        self
    }
}

impl SourceManager for FixtureManager {
    fn deduce_project_root(&self, import_path: &str) -> ProjectRoot {
        ProjectRoot(import_path.to_string())
    }

    fn list_versions(&self, id: &ProjectIdentifier, _cancel: &CancelToken) -> Result<Vec<Version>> {
        Ok(self.versions.lock().unwrap().get(&id.root.0).cloned().unwrap_or_default())
    }

    fn revision_present_in(&self, _id: &ProjectIdentifier, _revision: &str, _cancel: &CancelToken) -> Result<bool> {
        Ok(true)
    }

    fn get_manifest_and_lock(&self, id: &ProjectIdentifier, version: &Version, _cancel: &CancelToken) -> Result<(Option<Manifest>, Option<Lock>)> {
        let key = (id.root.0.clone(), version_key(version));
        Ok((self.manifests.lock().unwrap().get(&key).cloned(), None))
    }

    fn list_packages(&self, id: &ProjectIdentifier, version: &Version, _cancel: &CancelToken) -> Result<PackageTree> {
        let key = (id.root.0.clone(), version_key(version));
        Ok(self.packages.lock().unwrap().get(&key).cloned().unwrap_or_default())
    }

    fn export_project(&self, id: &ProjectIdentifier, version: &Version, dest: &Path, _cancel: &CancelToken) -> Result<()> {
        std::fs::create_dir_all(dest).map_err(vendorlock::errors::VendorlockError::write_failure)?;
        let key = (id.root.0.clone(), version_key(version));
        if let Some(files) = self.exports.lock().unwrap().get(&key) {
            for f in files {
                let full = dest.join(f.path);
                if let Some(parent) = full.parent() {
                    std::fs::create_dir_all(parent).map_err(vendorlock::errors::VendorlockError::write_failure)?;
                }
                std::fs::write(&full, f.contents).map_err(vendorlock::errors::VendorlockError::write_failure)?;
            }
        }
        Ok(())
    }
}
