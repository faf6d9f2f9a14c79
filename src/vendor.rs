//! The vendor tree writer (§4.6): materializes every locked project into
//! `vendor/<root>/` via the bridge, then applies the four prune bits in a
//! fixed order so pruning is idempotent regardless of the order the bits
//! are set in the manifest.

use std::fs;
use std::path::{Path, PathBuf};

use filetime::{set_file_mtime, FileTime};
use walkdir::WalkDir;

use crate::analyzer::Analyzer;
use crate::bridge::{Bridge, CancelToken};
use crate::errors::{Result, VendorlockError};
use crate::lock::{Lock, LockedProject};
use crate::manifest::{Manifest, PruneOptions};

/// Progress states reported through a caller-supplied callback (§4.6), in
/// the order a single project passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorState {
    Fetching,
    Copying,
    Pruning,
    Done,
}

/// Fixed epoch every vendored file's mtime is normalized to, so two runs
/// over identical inputs produce byte-identical trees down to metadata
/// (§4.6, determinism requirement carried from §8).
const NORMALIZED_MTIME: FileTime = FileTime::zero();

/// Writes the vendor tree for every project in `lock` under
/// `vendor_dir`, reporting progress through `on_progress`.
pub fn write_vendor_tree(
    bridge: &Bridge,
    manifest: &Manifest,
    lock: &Lock,
    vendor_dir: &Path,
    cancel: &CancelToken,
    mut on_progress: impl FnMut(&LockedProject, VendorState),
) -> Result<()> {
    for project in &lock.projects {
        let dest = vendor_dir.join(&project.id.root.0);

        on_progress(project, VendorState::Fetching);
        if dest.exists() {
            fs::remove_dir_all(&dest).map_err(VendorlockError::write_failure)?;
        }
        fs::create_dir_all(&dest).map_err(VendorlockError::write_failure)?;

        on_progress(project, VendorState::Copying);
        bridge.export_project(&project.id, &project.version, &dest, cancel)?;
        strip_vcs_metadata(&dest)?;

        on_progress(project, VendorState::Pruning);
        let prune = manifest.prune_for(&project.id.root);
        apply_prune(&dest, project, &prune)?;

        normalize_mtimes(&dest)?;
        on_progress(project, VendorState::Done);
    }

    prune_unused_packages_globally(vendor_dir, lock, manifest)?;
    Ok(())
}

/// Removes VCS directories (`.git`, `.hg`, `.bzr`, `.svn`) from an exported
/// project tree. Always applied — unlike the four prune bits, this is not
/// configurable (§4.6: vendored trees never carry VCS metadata, reserving
/// `vendor/.git` exclusively for the *enclosing* repository's own git dir,
/// which the transactional writer is responsible for preserving).
fn strip_vcs_metadata(dir: &Path) -> Result<()> {
    for name in [".git", ".hg", ".bzr", ".svn"] {
        let path = dir.join(name);
        if path.is_dir() {
            fs::remove_dir_all(&path).map_err(VendorlockError::write_failure)?;
        } else if path.exists() {
            fs::remove_file(&path).map_err(VendorlockError::write_failure)?;
        }
    }
    Ok(())
}

/// Applies the per-project prune bits in the fixed order §4.6 mandates:
/// nested vendor directories first (so an unused-package scan never has to
/// look inside them), then test files, then non-code files, then unused
/// packages (computed last since removing tests/non-code files can change
/// which packages still contain anything worth keeping).
fn apply_prune(dest: &Path, project: &LockedProject, prune: &PruneOptions) -> Result<()> {
    if prune.nested_vendor {
        remove_nested_vendor(dest)?;
    }
    if prune.tests {
        remove_matching_files(dest, |name| name.ends_with("_test.go") || name.ends_with("_test.rs"))?;
    }
    if prune.non_code_files {
        remove_non_code_files(dest)?;
    }
    if prune.unused_packages {
        remove_unused_packages(dest, project)?;
    }
    Ok(())
}

/// Re-applies the prune bits to an already-exported project directory,
/// without fetching or stripping VCS metadata again. Used by the `prune`
/// subcommand, which only ever touches an existing vendor tree.
pub fn apply_prune_in_place(dest: &Path, project: &LockedProject, prune: &PruneOptions) -> Result<()> {
    apply_prune(dest, project, prune)
}

fn remove_nested_vendor(dest: &Path) -> Result<()> {
    for entry in WalkDir::new(dest).min_depth(1).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_dir() && entry.file_name() == "vendor" {
            fs::remove_dir_all(entry.path()).map_err(VendorlockError::write_failure)?;
        }
    }
    Ok(())
}

fn remove_matching_files(dest: &Path, pred: impl Fn(&str) -> bool) -> Result<()> {
    for entry in WalkDir::new(dest).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if pred(name) {
                fs::remove_file(entry.path()).map_err(VendorlockError::write_failure)?;
            }
        }
    }
    Ok(())
}

/// Source extensions and common project metadata survive; everything else
/// (READMEs are kept — they are not "code" but are conventionally retained
/// by vendor tools for license attribution, per the other example repos'
/// vendor writers) goes. Kept extensions mirror [`Analyzer::source_extensions`]'s
/// default plus the manifest/lock/license/module files every project carries.
fn remove_non_code_files(dest: &Path) -> Result<()> {
    let analyzer = Analyzer::default();
    let keep_names = ["LICENSE", "LICENSE.md", "LICENSE.txt", "NOTICE", "Manifest.toml", "Lock.toml"];
    for entry in WalkDir::new(dest).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_code = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| analyzer.source_extensions.iter().any(|e| e == ext));
        let is_kept_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| keep_names.contains(&n));
        if !is_code && !is_kept_name {
            fs::remove_file(path).map_err(VendorlockError::write_failure)?;
        }
    }
    Ok(())
}

/// Removes package directories not named in `project.packages` (the set the
/// solver recorded as actually imported, transitively, from the root).
fn remove_unused_packages(dest: &Path, project: &LockedProject) -> Result<()> {
    let used: std::collections::BTreeSet<&str> = project.packages.iter().map(|p| p.as_str()).collect();
    for entry in WalkDir::new(dest).min_depth(1).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dest)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        if !used.contains(rel.as_str()) && !used.iter().any(|u| u.starts_with(&format!("{rel}/"))) {
            if entry.path().is_dir() {
                let _ = fs::remove_dir_all(entry.path());
            }
        }
    }
    Ok(())
}

/// A project absent from every other project's reach and from the root's
/// own reach is still whole-project-pruned by virtue of not being in the
/// lock at all (the solver only ever locks reachable roots) — this pass
/// exists only to remove `vendor/` entries left over from a prior solve
/// that are no longer in `lock` at all.
fn prune_unused_packages_globally(vendor_dir: &Path, lock: &Lock, _manifest: &Manifest) -> Result<()> {
    if !vendor_dir.exists() {
        return Ok(());
    }
    let locked_roots: std::collections::BTreeSet<&str> = lock.projects.iter().map(|p| p.id.root.0.as_str()).collect();
    let mut stale = Vec::new();
    collect_stale_roots(vendor_dir, vendor_dir, &locked_roots, &mut stale)?;
    for path in stale {
        fs::remove_dir_all(&path).map_err(VendorlockError::write_failure)?;
    }
    Ok(())
}

fn collect_stale_roots(
    base: &Path,
    dir: &Path,
    locked_roots: &std::collections::BTreeSet<&str>,
    stale: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in fs::read_dir(dir).map_err(VendorlockError::write_failure)? {
        let entry = entry.map_err(VendorlockError::write_failure)?;
        if !entry.file_type().map_err(VendorlockError::write_failure)?.is_dir() {
            continue;
        }
        let path = entry.path();
        let rel = path.strip_prefix(base).unwrap_or(&path).to_string_lossy().replace('\\', "/");
        if locked_roots.contains(rel.as_str()) {
            continue;
        }
        if locked_roots.iter().any(|r| r.starts_with(&format!("{rel}/"))) {
            collect_stale_roots(base, &path, locked_roots, stale)?;
        } else {
            stale.push(path);
        }
    }
    Ok(())
}

fn normalize_mtimes(dir: &Path) -> Result<()> {
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        set_file_mtime(entry.path(), NORMALIZED_MTIME).map_err(VendorlockError::write_failure)?;
    }
    Ok(())
}
