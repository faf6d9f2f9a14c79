//! Ambient configuration for a single invocation (§4.8). Constructed once
//! at the CLI entry point and threaded through explicitly — no global or
//! thread-local state anywhere in the core.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{Result, VendorlockError};

/// Everything a solve/vendor run needs that isn't part of the manifest
/// itself: where things live on disk and how patient to be with the
/// source manager.
#[derive(Debug, Clone)]
pub struct Context {
    pub project_root: PathBuf,
    pub cache_dir: PathBuf,
    pub bridge_timeout: Duration,
    pub concurrency: usize,
}

impl Context {
    /// Resolves `project_root` (defaulting to the current directory) and
    /// the cache directory (`$XDG_CACHE_HOME/vendorlock` via `dirs`,
    /// falling back to `<project_root>/.vendorlock-cache` if the platform
    /// cache directory can't be determined).
    pub fn discover(project_root: Option<&Path>) -> Result<Context> {
        let project_root = match project_root {
            Some(p) => p.to_path_buf(),
            None => std::env::current_dir().map_err(VendorlockError::write_failure)?,
        };
        let cache_dir = dirs::cache_dir()
            .map(|d| d.join("vendorlock"))
            .unwrap_or_else(|| project_root.join(".vendorlock-cache"));
        Ok(Context {
            project_root,
            cache_dir,
            bridge_timeout: Duration::from_secs(30),
            concurrency: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
        })
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.project_root.join("Manifest.toml")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.project_root.join("Lock.toml")
    }

    pub fn vendor_path(&self) -> PathBuf {
        self.project_root.join("vendor")
    }
}
