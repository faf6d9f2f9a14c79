//! The root manifest and the TOML codec for it (§3 Manifest, §6
//! `Manifest.toml`). The solver only ever sees the domain types in this
//! module — TOML is strictly a boundary concern, confined to
//! [`Manifest::load`]/[`Manifest::to_toml_string`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, VendorlockError};
use crate::project::{ProjectRoot, Source};
use crate::version::Constraint;

/// Per-root constraint plus source alias (§3 `ProjectProperties`, minus the
/// prune bits which only apply at the root and live on [`Manifest`]
/// directly).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectProperties {
    pub source: Option<Source>,
    pub constraint: Constraint,
}

/// The four orthogonal prune bits from §3/§4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PruneOptions {
    pub unused_packages: bool,
    pub non_code_files: bool,
    pub tests: bool,
    pub nested_vendor: bool,
}

impl PruneOptions {
    /// Applies a per-root override on top of these (global) defaults,
    /// falling back field-by-field (§4.6 step 1).
    pub fn overridden_by(&self, over: &PruneOverride) -> PruneOptions {
        PruneOptions {
            unused_packages: over.unused_packages.unwrap_or(self.unused_packages),
            non_code_files: over.non_code_files.unwrap_or(self.non_code_files),
            tests: over.tests.unwrap_or(self.tests),
            nested_vendor: over.nested_vendor.unwrap_or(self.nested_vendor),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PruneOverride {
    pub unused_packages: Option<bool>,
    pub non_code_files: Option<bool>,
    pub tests: Option<bool>,
    pub nested_vendor: Option<bool>,
}

/// The root project's manifest (§3 "Manifest (root)"). A non-root manifest
/// (read from a dependency's own repository by the bridge) only ever
/// consults `constraints` and `ignored`/`required` — see
/// [`Manifest::dependency_view`].
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub constraints: BTreeMap<ProjectRoot, ProjectProperties>,
    pub overrides: BTreeMap<ProjectRoot, ProjectProperties>,
    pub ignored: BTreeSet<String>,
    pub required: BTreeSet<String>,
    pub prune: PruneOptions,
    pub prune_overrides: BTreeMap<ProjectRoot, PruneOverride>,
}

impl Manifest {
    /// View used by a non-root manifest: overrides and prune policy belong
    /// only to the root (§3).
    pub fn dependency_view(constraints: BTreeMap<ProjectRoot, ProjectProperties>, ignored: BTreeSet<String>, required: BTreeSet<String>) -> Manifest {
        Manifest {
            constraints,
            ignored,
            required,
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> Result<Manifest> {
        let text = fs::read_to_string(path)
            .map_err(|e| VendorlockError::MalformedManifest(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Manifest> {
        let raw: RawManifest = toml::from_str(text)
            .map_err(|e| VendorlockError::MalformedManifest(e.to_string()))?;
        raw.into_manifest()
    }

    pub fn to_toml_string(&self) -> Result<String> {
        let raw = RawManifest::from_manifest(self);
        toml::to_string_pretty(&raw).map_err(|e| VendorlockError::MalformedManifest(e.to_string()))
    }

    /// Effective prune bits for a root: per-root override falling back to
    /// the global config (§4.6 step 1).
    pub fn prune_for(&self, root: &ProjectRoot) -> PruneOptions {
        match self.prune_overrides.get(root) {
            Some(over) => self.prune.overridden_by(over),
            None => self.prune,
        }
    }

    /// A `Serialize`-able, `BTreeMap`-ordered view of `constraints` used
    /// only to build the lock digest's canonical bytes (§4.5).
    pub fn constraints_canonical(&self) -> BTreeMap<ProjectRoot, ProjectPropertiesCanonical> {
        canonicalize_properties(&self.constraints)
    }

    pub fn overrides_canonical(&self) -> BTreeMap<ProjectRoot, ProjectPropertiesCanonical> {
        canonicalize_properties(&self.overrides)
    }
}

fn canonicalize_properties(
    map: &BTreeMap<ProjectRoot, ProjectProperties>,
) -> BTreeMap<ProjectRoot, ProjectPropertiesCanonical> {
    map.iter()
        .map(|(root, props)| {
            (
                root.clone(),
                ProjectPropertiesCanonical {
                    source: props.source.as_ref().map(|s| s.0.clone()),
                    constraint: props.constraint.to_string(),
                },
            )
        })
        .collect()
}

/// Serializable stand-in for [`ProjectProperties`] (whose `Constraint`
/// field has no `Serialize` impl of its own, since the domain algebra in
/// [`crate::version::constraint`] never needs one — its `Display` form is
/// stable enough to hash).
#[derive(Debug, Clone, Serialize)]
pub struct ProjectPropertiesCanonical {
    pub source: Option<String>,
    pub constraint: String,
}

// ---- TOML wire shapes (§6) ----

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct RawManifest {
    #[serde(rename = "constraint")]
    constraints: Vec<RawConstraintEntry>,
    #[serde(rename = "override")]
    overrides: Vec<RawConstraintEntry>,
    required: Vec<String>,
    ignored: Vec<String>,
    prune: RawPrune,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawConstraintEntry {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct RawPrune {
    #[serde(rename = "unused-packages")]
    unused_packages: bool,
    #[serde(rename = "non-go")]
    non_go: bool,
    #[serde(rename = "go-tests")]
    go_tests: bool,
    #[serde(rename = "nested-vendor")]
    nested_vendor: bool,
    #[serde(rename = "project")]
    project: Vec<RawPruneProject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPruneProject {
    name: String,
    #[serde(rename = "unused-packages", skip_serializing_if = "Option::is_none")]
    unused_packages: Option<bool>,
    #[serde(rename = "non-go", skip_serializing_if = "Option::is_none")]
    non_go: Option<bool>,
    #[serde(rename = "go-tests", skip_serializing_if = "Option::is_none")]
    go_tests: Option<bool>,
    #[serde(rename = "nested-vendor", skip_serializing_if = "Option::is_none")]
    nested_vendor: Option<bool>,
}

impl RawConstraintEntry {
    fn into_properties(self) -> Result<(ProjectRoot, ProjectProperties)> {
        let constraint = match (self.version, self.branch, self.revision) {
            (Some(v), None, None) => parse_constraint_field(&v)?,
            (None, Some(b), None) => Constraint::Branch(b),
            (None, None, Some(r)) => Constraint::Revision(r.to_lowercase()),
            (None, None, None) => Constraint::Any,
            _ => {
                return Err(VendorlockError::MalformedManifest(format!(
                    "{}: exactly one of version/branch/revision may be set",
                    self.name
                )))
            }
        };
        let properties = ProjectProperties {
            source: self.source.map(Source),
            constraint,
        };
        Ok((ProjectRoot(self.name), properties))
    }

    fn from_properties(root: &ProjectRoot, properties: &ProjectProperties) -> RawConstraintEntry {
        let (version, branch, revision) = match &properties.constraint {
            Constraint::Any => (None, None, None),
            Constraint::None => (None, None, None),
            Constraint::SemverRange(range) => (Some(range.to_string()), None, None),
            Constraint::Branch(b) => (None, Some(b.clone()), None),
            Constraint::Revision(r) => (None, None, Some(r.clone())),
            // `k` is the internal identity key (§4.1), which for a
            // manifest-authored tag constraint is always `u:<tag>` (see
            // `parse_constraint_field` below) — the wire field holds the
            // bare tag, or `parse_constraint_field` would re-prefix it.
            Constraint::Exact(k) => (Some(k.strip_prefix("u:").unwrap_or(k).to_string()), None, None),
        };
        RawConstraintEntry {
            name: root.0.clone(),
            version,
            branch,
            revision,
            source: properties.source.as_ref().map(|s| s.0.clone()),
        }
    }
}

/// Manifest constraints accept a semver range *or* an exact tag name; try
/// the range parser first (it also accepts bare versions as `^version`) and
/// fall back to treating the string as an exact tag otherwise.
fn parse_constraint_field(v: &str) -> Result<Constraint> {
    match crate::version::constraint::SemverRange::parse(v) {
        Ok(range) => Ok(Constraint::SemverRange(range)),
        Err(_) => Ok(Constraint::Exact(format!("u:{v}"))),
    }
}

impl RawManifest {
    fn into_manifest(self) -> Result<Manifest> {
        let mut constraints = BTreeMap::new();
        for entry in self.constraints {
            let (root, props) = entry.into_properties()?;
            constraints.insert(root, props);
        }
        let mut overrides = BTreeMap::new();
        for entry in self.overrides {
            let (root, props) = entry.into_properties()?;
            overrides.insert(root, props);
        }
        let mut prune_overrides = BTreeMap::new();
        for p in self.prune.project {
            prune_overrides.insert(
                ProjectRoot(p.name.clone()),
                PruneOverride {
                    unused_packages: p.unused_packages,
                    non_code_files: p.non_go,
                    tests: p.go_tests,
                    nested_vendor: p.nested_vendor,
                },
            );
        }
        Ok(Manifest {
            constraints,
            overrides,
            ignored: self.ignored.into_iter().collect(),
            required: self.required.into_iter().collect(),
            prune: PruneOptions {
                unused_packages: self.prune.unused_packages,
                non_code_files: self.prune.non_go,
                tests: self.prune.go_tests,
                nested_vendor: self.prune.nested_vendor,
            },
            prune_overrides,
        })
    }

    fn from_manifest(m: &Manifest) -> RawManifest {
        RawManifest {
            constraints: m
                .constraints
                .iter()
                .map(|(root, props)| RawConstraintEntry::from_properties(root, props))
                .collect(),
            overrides: m
                .overrides
                .iter()
                .map(|(root, props)| RawConstraintEntry::from_properties(root, props))
                .collect(),
            required: m.required.iter().cloned().collect(),
            ignored: m.ignored.iter().cloned().collect(),
            prune: RawPrune {
                unused_packages: m.prune.unused_packages,
                non_go: m.prune.non_code_files,
                go_tests: m.prune.tests,
                nested_vendor: m.prune.nested_vendor,
                project: m
                    .prune_overrides
                    .iter()
                    .map(|(root, over)| RawPruneProject {
                        name: root.0.clone(),
                        unused_packages: over.unused_packages,
                        non_go: over.non_code_files,
                        go_tests: over.tests,
                        nested_vendor: over.nested_vendor,
                    })
                    .collect(),
            },
        }
    }
}
