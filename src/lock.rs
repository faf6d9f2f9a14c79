//! The lock model, its TOML codec, and the inputs digest (§3 `Lock`,
//! §4.5, §6 `Lock.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::analyzer::PackageTree;
use crate::errors::{Result, VendorlockError};
use crate::manifest::Manifest;
use crate::project::{ProjectIdentifier, ProjectRoot, Source};
use crate::version::Version;

pub const ANALYZER_NAME: &str = "vendorlock-analyzer";
pub const ANALYZER_VERSION: i64 = 1;
pub const SOLVER_NAME: &str = "vendorlock-solver";
pub const SOLVER_VERSION: i64 = 1;
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// §3 `LockedProject`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedProject {
    pub id: ProjectIdentifier,
    pub version: Version,
    pub packages: Vec<String>,
    pub source_url: Option<String>,
}

impl LockedProject {
    pub fn root(&self) -> &ProjectRoot {
        &self.id.root
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveMeta {
    pub inputs_digest: Option<[u8; 32]>,
    pub analyzer_name: String,
    pub analyzer_version: i64,
    pub solver_name: String,
    pub solver_version: i64,
    pub tool_version: String,
}

impl Default for SolveMeta {
    fn default() -> Self {
        SolveMeta {
            inputs_digest: None,
            analyzer_name: ANALYZER_NAME.to_string(),
            analyzer_version: ANALYZER_VERSION,
            solver_name: SOLVER_NAME.to_string(),
            solver_version: SOLVER_VERSION,
            tool_version: TOOL_VERSION.to_string(),
        }
    }
}

/// §3 `Lock`: an ordered sequence of locked projects plus solve metadata.
/// Entries are only ever constructed by the solver or copied defensively
/// from a prior solution (§3 lifecycle note).
#[derive(Debug, Clone, Default)]
pub struct Lock {
    pub projects: Vec<LockedProject>,
    pub solve_meta: SolveMeta,
}

impl Lock {
    /// Builds a lock from an unordered solution, enforcing invariant 1
    /// (every root appears once) and the sort-by-identifier requirement
    /// (§6 "Projects MUST be sorted by identifier"). Per §9's sort-stability
    /// note, this always sorts a fresh copy, never the caller's vector in
    /// place, so a concurrent reader of that vector never observes a
    /// half-sorted state.
    pub fn new(mut projects: Vec<LockedProject>, solve_meta: SolveMeta) -> Lock {
        projects.sort_by(|a, b| a.id.cmp(&b.id));
        Lock { projects, solve_meta }
    }

    pub fn find(&self, root: &ProjectRoot) -> Option<&LockedProject> {
        self.projects.iter().find(|p| p.root() == root)
    }

    /// Loads a lock from disk. A malformed lock is downgraded to "no prior
    /// lock" by the caller (§7) — this function itself still reports the
    /// parse error so the caller can log it.
    pub fn load(path: &Path) -> Result<Lock> {
        let text = fs::read_to_string(path).map_err(|e| VendorlockError::MalformedLock(e.to_string()))?;
        let raw: RawLock = toml::from_str(&text).map_err(|e| VendorlockError::MalformedLock(e.to_string()))?;
        let mut lock = raw.into_lock()?;

        if lock.solve_meta.inputs_digest.is_none() {
            if let Some(sidecar) = Self::read_sidecar(path)? {
                lock.solve_meta.inputs_digest = Some(sidecar);
            }
        }
        Ok(lock)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let sidecar_path = Self::sidecar_path(path);
        let had_sidecar = sidecar_path.exists();

        let raw = RawLock::from_lock(self, had_sidecar);
        let text = toml::to_string_pretty(&raw).map_err(VendorlockError::write_failure)?;
        fs::write(path, text).map_err(VendorlockError::write_failure)?;

        if had_sidecar {
            if let Some(digest) = self.solve_meta.inputs_digest {
                fs::write(sidecar_path, hex::encode(digest)).map_err(VendorlockError::write_failure)?;
            }
        }
        Ok(())
    }

    fn sidecar_path(lock_path: &Path) -> PathBuf {
        let dir = lock_path.parent().unwrap_or_else(|| Path::new("."));
        let name = lock_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("Lock.toml");
        dir.join(format!(".{name}.digest"))
    }

    fn read_sidecar(lock_path: &Path) -> Result<Option<[u8; 32]>> {
        let sidecar_path = Self::sidecar_path(lock_path);
        if !sidecar_path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&sidecar_path).map_err(|e| VendorlockError::MalformedLock(e.to_string()))?;
        let bytes = hex::decode(text.trim()).map_err(|e| VendorlockError::MalformedLock(e.to_string()))?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| VendorlockError::MalformedLock("digest sidecar is not 32 bytes".to_string()))?;
        Ok(Some(digest))
    }
}

/// §4.5 / invariant 4: `H(sorted root-manifest bytes ‖ sorted analyzer
/// outputs of root project)`.
pub fn compute_inputs_digest(manifest: &Manifest, root_packages: &PackageTree) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(manifest_canonical_bytes(manifest));
    hasher.update(root_packages.canonical_bytes());
    hasher.finalize().into()
}

/// Normalized byte form of a manifest: sorted keys (the `BTreeMap`s already
/// guarantee this), default fields omitted from nothing (the JSON form
/// always includes every field, which is fine — it only needs to be
/// stable, not minimal).
fn manifest_canonical_bytes(manifest: &Manifest) -> Vec<u8> {
    #[derive(Serialize)]
    struct Canonical<'a> {
        constraints: &'a std::collections::BTreeMap<ProjectRoot, crate::manifest::ProjectPropertiesCanonical>,
        overrides: &'a std::collections::BTreeMap<ProjectRoot, crate::manifest::ProjectPropertiesCanonical>,
        ignored: &'a std::collections::BTreeSet<String>,
        required: &'a std::collections::BTreeSet<String>,
        prune: crate::manifest::PruneOptions,
    }
    let constraints = manifest.constraints_canonical();
    let overrides = manifest.overrides_canonical();
    let canonical = Canonical {
        constraints: &constraints,
        overrides: &overrides,
        ignored: &manifest.ignored,
        required: &manifest.required,
        prune: manifest.prune,
    };
    serde_json::to_vec(&canonical).expect("canonical manifest form is always serializable")
}

// ---- TOML wire shapes (§6) ----

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct RawLock {
    #[serde(rename = "solve-meta")]
    solve_meta: RawSolveMeta,
    projects: Vec<RawLockedProject>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct RawSolveMeta {
    #[serde(rename = "inputs-digest", skip_serializing_if = "Option::is_none")]
    inputs_digest: Option<String>,
    #[serde(rename = "analyzer-name")]
    analyzer_name: String,
    #[serde(rename = "analyzer-version")]
    analyzer_version: i64,
    #[serde(rename = "solver-name")]
    solver_name: String,
    #[serde(rename = "solver-version")]
    solver_version: i64,
    #[serde(rename = "tool-version")]
    tool_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawLockedProject {
    name: String,
    revision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(rename = "source-url", skip_serializing_if = "Option::is_none")]
    source_url: Option<String>,
    #[serde(default)]
    packages: Vec<String>,
}

impl RawLockedProject {
    fn into_domain(self) -> Result<LockedProject> {
        // Open question resolved in DESIGN.md: reject on read, never write.
        if self.branch.is_some() && self.version.is_some() {
            return Err(VendorlockError::MalformedLock(format!(
                "{}: both branch and version set",
                self.name
            )));
        }
        let underlying = match (self.branch, self.version) {
            (Some(b), None) => crate::version::Underlying::Branch(b),
            (None, Some(v)) => match Version::parse(&v).underlying() {
                Some(u) => u.clone(),
                None => crate::version::Underlying::Tag(v),
            },
            (None, None) => {
                return Err(VendorlockError::MalformedLock(format!(
                    "{}: neither branch nor version set",
                    self.name
                )))
            }
            _ => unreachable!(),
        };
        let version = Version::Paired {
            underlying,
            revision: self.revision.to_lowercase(),
        };
        Ok(LockedProject {
            id: ProjectIdentifier {
                root: ProjectRoot(self.name),
                source: self.source.map(Source),
            },
            version,
            packages: self.packages,
            source_url: self.source_url,
        })
    }

    fn from_domain(p: &LockedProject) -> RawLockedProject {
        let (revision, branch, version) = p.version.components();
        RawLockedProject {
            name: p.id.root.0.clone(),
            revision: revision.unwrap_or_default(),
            branch,
            version,
            source: p.id.source.as_ref().map(|s| s.0.clone()),
            source_url: p.source_url.clone(),
            packages: p.packages.clone(),
        }
    }
}

impl RawLock {
    fn into_lock(self) -> Result<Lock> {
        let mut projects = Vec::with_capacity(self.projects.len());
        for raw in self.projects {
            projects.push(raw.into_domain()?);
        }
        let inputs_digest = match self.solve_meta.inputs_digest {
            Some(hex_str) if !hex_str.is_empty() => {
                let bytes = hex::decode(&hex_str).map_err(|e| VendorlockError::MalformedLock(e.to_string()))?;
                Some(
                    bytes
                        .try_into()
                        .map_err(|_| VendorlockError::MalformedLock("inputs-digest is not 32 bytes".to_string()))?,
                )
            }
            _ => None,
        };
        Ok(Lock {
            projects,
            solve_meta: SolveMeta {
                inputs_digest,
                analyzer_name: self.solve_meta.analyzer_name,
                analyzer_version: self.solve_meta.analyzer_version,
                solver_name: self.solve_meta.solver_name,
                solver_version: self.solve_meta.solver_version,
                tool_version: self.solve_meta.tool_version,
            },
        })
    }

    /// `omit_digest`: when the lock was previously stored with the digest
    /// sidecar convention, we keep writing it that way (§4.5 compatibility
    /// path) rather than switching formats out from under a downstream
    /// consumer.
    fn from_lock(lock: &Lock, omit_digest: bool) -> RawLock {
        RawLock {
            solve_meta: RawSolveMeta {
                inputs_digest: if omit_digest {
                    None
                } else {
                    lock.solve_meta.inputs_digest.map(hex::encode)
                },
                analyzer_name: lock.solve_meta.analyzer_name.clone(),
                analyzer_version: lock.solve_meta.analyzer_version,
                solver_name: lock.solve_meta.solver_name.clone(),
                solver_version: lock.solve_meta.solver_version,
                tool_version: lock.solve_meta.tool_version.clone(),
            },
            // Always serialized from the already-sorted `projects` field
            // (built by `Lock::new`), never re-sorted here (§9).
            projects: lock.projects.iter().map(RawLockedProject::from_domain).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Manifest, ProjectProperties};

    fn sample_lock() -> Lock {
        let locked = LockedProject {
            id: ProjectIdentifier::new("example.com/foo"),
            version: Version::parse("v1.2.0").pair("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef"),
            packages: vec![".".to_string(), "sub".to_string()],
            source_url: None,
        };
        Lock::new(vec![locked], SolveMeta::default())
    }

    #[test]
    fn round_trips_through_toml() {
        let lock = sample_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lock.toml");
        lock.save(&path).unwrap();
        let reloaded = Lock::load(&path).unwrap();
        assert_eq!(reloaded.projects.len(), 1);
        assert_eq!(reloaded.projects[0].id.root, ProjectRoot::from("example.com/foo"));
        assert_eq!(reloaded.solve_meta.analyzer_name, ANALYZER_NAME);
    }

    #[test]
    fn rejects_both_branch_and_version() {
        let text = r#"
[solve-meta]
analyzer-name = "a"
analyzer-version = 1
solver-name = "s"
solver-version = 1
tool-version = "0"

[[projects]]
name = "example.com/foo"
revision = "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef"
branch = "master"
version = "v1.0.0"
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lock.toml");
        fs::write(&path, text).unwrap();
        assert!(Lock::load(&path).is_err());
    }

    #[test]
    fn sidecar_is_adopted_when_digest_field_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lock.toml");
        let mut lock = sample_lock();
        lock.solve_meta.inputs_digest = Some([7u8; 32]);
        lock.save(&path).unwrap();

        // Simulate the compatibility path: blank the embedded digest, write
        // a sidecar by hand, and confirm the loader adopts it.
        let sidecar = Lock::sidecar_path(&path);
        fs::write(&sidecar, hex::encode([7u8; 32])).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let text = text.replacen(&format!("inputs-digest = \"{}\"\n", hex::encode([7u8; 32])), "", 1);
        fs::write(&path, text).unwrap();

        let reloaded = Lock::load(&path).unwrap();
        assert_eq!(reloaded.solve_meta.inputs_digest, Some([7u8; 32]));
    }

    #[test]
    fn digest_is_stable_across_manifest_map_iteration_order() {
        let mut m1 = Manifest::default();
        m1.constraints.insert(
            ProjectRoot::from("b"),
            ProjectProperties { source: None, constraint: crate::version::Constraint::Any },
        );
        m1.constraints.insert(
            ProjectRoot::from("a"),
            ProjectProperties { source: None, constraint: crate::version::Constraint::Any },
        );

        let mut m2 = Manifest::default();
        m2.constraints.insert(
            ProjectRoot::from("a"),
            ProjectProperties { source: None, constraint: crate::version::Constraint::Any },
        );
        m2.constraints.insert(
            ProjectRoot::from("b"),
            ProjectProperties { source: None, constraint: crate::version::Constraint::Any },
        );

        let tree = PackageTree::default();
        assert_eq!(
            compute_inputs_digest(&m1, &tree),
            compute_inputs_digest(&m2, &tree)
        );
    }
}
