//! The transactional writer (§4.7): stages manifest/lock/vendor updates
//! and swaps them into place with a rollback path, so a failure partway
//! through never leaves the project directory half-updated.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::bridge::{Bridge, CancelToken};
use crate::errors::{Result, VendorlockError};
use crate::lock::Lock;
use crate::manifest::Manifest;
use crate::vendor::{self, VendorState};

/// Controls when the vendor tree is (re)written (§4.7 item 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorMode {
    Always,
    OnChanged,
    Never,
}

/// One backup-then-swap step, recorded so a failure can undo it in LIFO
/// order (§4.7 item 4).
enum Move {
    /// `staged` was renamed to `target`; `target`'s previous contents, if
    /// any, were backed up to `backup` first.
    Swapped { target: PathBuf, backup: Option<PathBuf> },
}

/// Writes `manifest`, `lock`, and (depending on `vendor_mode`) the vendor
/// tree atomically under `project_root`. `previous_lock` is used only to
/// decide whether `OnChanged` should rebuild the vendor tree.
pub fn commit(
    bridge: &Bridge,
    project_root: &Path,
    manifest: &Manifest,
    lock: &Lock,
    previous_lock: Option<&Lock>,
    vendor_mode: VendorMode,
    cancel: &CancelToken,
    mut on_progress: impl FnMut(&crate::lock::LockedProject, VendorState),
) -> Result<()> {
    let staging = TempDir::new_in(project_root).map_err(VendorlockError::write_failure)?;
    let staging_path = staging.path();

    let manifest_text = manifest.to_toml_string()?;
    fs::write(staging_path.join("Manifest.toml"), manifest_text).map_err(VendorlockError::write_failure)?;
    lock.save(&staging_path.join("Lock.toml"))?;

    let should_write_vendor = match vendor_mode {
        VendorMode::Always => true,
        VendorMode::Never => false,
        VendorMode::OnChanged => !locks_equivalent(previous_lock, lock),
    };

    let preserved_git = if should_write_vendor {
        let staged_vendor = staging_path.join("vendor");
        fs::create_dir_all(&staged_vendor).map_err(VendorlockError::write_failure)?;
        let preserved = preserve_vendor_git(project_root, staging_path)?;
        vendor::write_vendor_tree(bridge, manifest, lock, &staged_vendor, cancel, &mut on_progress)?;
        preserved
    } else {
        None
    };

    let result = swap_into_place(project_root, staging_path, should_write_vendor, preserved_git.as_ref());
    // `staging` (a TempDir) removes its directory on drop regardless of
    // `result` (§4.7 item 4: "staging directory is removed unconditionally").
    result
}

/// A crude but sufficient equivalence check for `OnChanged`: same set of
/// (root, version, packages) triples, order-independent.
fn locks_equivalent(previous: Option<&Lock>, current: &Lock) -> bool {
    let Some(previous) = previous else { return false };
    if previous.projects.len() != current.projects.len() {
        return false;
    }
    let mut a: Vec<(String, String, Vec<String>)> = previous
        .projects
        .iter()
        .map(|p| (p.id.root.0.clone(), p.version.identity_key(), p.packages.clone()))
        .collect();
    let mut b: Vec<(String, String, Vec<String>)> = current
        .projects
        .iter()
        .map(|p| (p.id.root.0.clone(), p.version.identity_key(), p.packages.clone()))
        .collect();
    a.sort();
    b.sort();
    a == b
}

/// Moves an existing `vendor/.git` into the staging area before the vendor
/// tree write begins, so the writer never has to special-case it; returns
/// the path it was moved to, if it existed (§4.7 item 5).
fn preserve_vendor_git(project_root: &Path, staging_path: &Path) -> Result<Option<PathBuf>> {
    let existing = project_root.join("vendor").join(".git");
    if !existing.exists() {
        return Ok(None);
    }
    let preserved = staging_path.join("preserved-vendor-git");
    fs::rename(&existing, &preserved).map_err(VendorlockError::write_failure)?;
    Ok(Some(preserved))
}

fn swap_into_place(
    project_root: &Path,
    staging_path: &Path,
    wrote_vendor: bool,
    preserved_git: Option<&PathBuf>,
) -> Result<()> {
    let mut executed: Vec<Move> = Vec::new();
    let attempt = (|| -> Result<()> {
        swap_one(project_root, staging_path, "Manifest.toml", &mut executed)?;
        swap_one(project_root, staging_path, "Lock.toml", &mut executed)?;
        if wrote_vendor {
            if let Some(preserved) = preserved_git {
                let dest = staging_path.join("vendor").join(".git");
                fs::rename(preserved, &dest).map_err(VendorlockError::write_failure)?;
            }
            swap_one(project_root, staging_path, "vendor", &mut executed)?;
        }
        Ok(())
    })();

    if let Err(e) = attempt {
        rollback(executed);
        return Err(e);
    }
    Ok(())
}

/// Renames `project_root/name`'s current contents aside (if present), then
/// moves the staged replacement into place, recording the step.
fn swap_one(project_root: &Path, staging_path: &Path, name: &str, executed: &mut Vec<Move>) -> Result<()> {
    let target = project_root.join(name);
    let staged = staging_path.join(name);
    if !staged.exists() {
        return Ok(());
    }

    let backup = if target.exists() {
        let backup = staging_path.join(format!("backup-{name}"));
        fs::rename(&target, &backup).map_err(VendorlockError::write_failure)?;
        Some(backup)
    } else {
        None
    };

    fs::rename(&staged, &target).map_err(VendorlockError::write_failure)?;
    executed.push(Move::Swapped { target: target.clone(), backup });
    Ok(())
}

/// Undoes `executed` moves in LIFO order (§4.7 item 4).
fn rollback(executed: Vec<Move>) {
    for mv in executed.into_iter().rev() {
        match mv {
            Move::Swapped { target, backup } => {
                if target.exists() {
                    let _ = remove_any(&target);
                }
                if let Some(backup) = backup {
                    let _ = fs::rename(&backup, &target);
                }
            }
        }
    }
}

fn remove_any(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
