//! The project analyzer (§4.2): walks a project tree and enumerates the
//! packages it contains, the external project roots those packages import,
//! and the ignore/require filters from the root manifest.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use regex::Regex;
use std::sync::OnceLock;
use walkdir::WalkDir;

use crate::project::ProjectRoot;

fn single_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\s*import\s+(?:\w+\s+)?"([^"]+)"\s*$"#).expect("static regex"))
}

fn grouped_import_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\s*(?:\w+\s+)?"([^"]+)"\s*$"#).expect("static regex"))
}

/// A single package (source directory). Errors are recorded, not fatal
/// (§4.2 "unreadable packages do not fail the analyzer").
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub imports: BTreeSet<String>,
    pub test_imports: BTreeSet<String>,
    pub errors: Vec<String>,
}

/// The result of walking a project tree: one [`Package`] per relative
/// directory that contains recognized source files.
#[derive(Debug, Clone, Default)]
pub struct PackageTree {
    pub packages: BTreeMap<String, Package>,
}

impl PackageTree {
    /// Every import string mentioned anywhere in the tree, normal imports
    /// plus (when `include_tests` was set) test imports, deduplicated and
    /// sorted — used both for external-reach computation and for the lock
    /// digest's analyzer-output input (§4.5 item 2).
    pub fn all_imports(&self) -> BTreeSet<String> {
        let mut all = BTreeSet::new();
        for pkg in self.packages.values() {
            all.extend(pkg.imports.iter().cloned());
            all.extend(pkg.test_imports.iter().cloned());
        }
        all
    }

    /// Canonical `(package path, sorted imports)` bytes for the digest
    /// (§4.5 item 2: "ordered list of triples with imports sorted within
    /// each").
    /// `(package path, error message)` pairs, surfaced as
    /// [`crate::errors::VendorlockError::AnalyzerIncomplete`] warnings by
    /// callers rather than aborting the analysis (§4.2, §7).
    pub fn warnings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.packages
            .iter()
            .flat_map(|(path, pkg)| pkg.errors.iter().map(move |e| (path.as_str(), e.as_str())))
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (path, pkg) in &self.packages {
            out.extend_from_slice(path.as_bytes());
            out.push(0);
            for import in &pkg.imports {
                out.extend_from_slice(import.as_bytes());
                out.push(0);
            }
            out.push(0xff);
        }
        out
    }
}

/// Maps an import path to the project root that owns it. Real deduction
/// (path-prefix matching against known hosting patterns, with an HTTP
/// metadata fallback per §4.2) is a source-manager responsibility; this
/// default implementation covers the common case — a host plus up to two
/// path segments — and is memoized per-analyzer-instance (§4.2, §9: no
/// global cache).
pub struct RootDeducer {
    cache: Mutex<BTreeMap<String, ProjectRoot>>,
    http_fallback: bool,
}

impl Default for RootDeducer {
    fn default() -> Self {
        RootDeducer {
            cache: Mutex::new(BTreeMap::new()),
            http_fallback: false,
        }
    }
}

impl RootDeducer {
    pub fn new(http_fallback: bool) -> Self {
        RootDeducer {
            cache: Mutex::new(BTreeMap::new()),
            http_fallback,
        }
    }

    /// Deduces the project root owning `import_path`, memoizing the result.
    pub fn deduce(&self, import_path: &str) -> ProjectRoot {
        if let Some(cached) = self.cache.lock().unwrap().get(import_path) {
            return cached.clone();
        }
        let root = self.deduce_uncached(import_path);
        self.cache
            .lock()
            .unwrap()
            .insert(import_path.to_string(), root.clone());
        root
    }

    fn deduce_uncached(&self, import_path: &str) -> ProjectRoot {
        let segments: Vec<&str> = import_path.split('/').collect();
        let host = segments.first().copied().unwrap_or(import_path);
        let depth = known_hosting_depth(host);
        let root = segments
            .iter()
            .take((1 + depth).min(segments.len()))
            .copied()
            .collect::<Vec<_>>()
            .join("/");
        if self.http_fallback {
            log::debug!("deduced {import_path} -> {root} (prefix match, no HTTP probe needed)");
        }
        ProjectRoot(root)
    }
}

/// Path-prefix depth for well-known hosts: `github.com/owner/repo` needs two
/// extra segments beyond the host, most others (a vanity domain with a
/// single repo) need none.
fn known_hosting_depth(host: &str) -> usize {
    match host {
        "github.com" | "bitbucket.org" | "gitlab.com" => 2,
        _ => 0,
    }
}

/// Standard-library-ish or same-project imports never count as external
/// reach (§4.2 rule 1). `project_root` is compared as a path prefix.
fn is_internal_or_stdlib(import_path: &str, project_root: &ProjectRoot) -> bool {
    !import_path.contains('.') || import_path.starts_with(&project_root.0)
}

pub struct Analyzer {
    /// Source file extensions treated as code (default: `.go`-alike single
    /// extension list, configurable per §4.2's "configurable extension"
    /// note in SPEC_FULL §4.2).
    pub source_extensions: Vec<String>,
    pub deducer: RootDeducer,
}

impl Default for Analyzer {
    fn default() -> Self {
        Analyzer {
            source_extensions: vec!["go".to_string()],
            deducer: RootDeducer::default(),
        }
    }
}

impl Analyzer {
    /// Walks `dir` (a project root on disk) and produces a [`PackageTree`].
    /// `include_tests` controls whether `_test`-suffixed files contribute
    /// imports (§4.2: used for the root project, not dependencies).
    pub fn list_packages(&self, dir: &Path, include_tests: bool) -> PackageTree {
        let mut tree = PackageTree::default();
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !self.source_extensions.iter().any(|e| e == ext) {
                continue;
            }
            let rel_dir = path
                .parent()
                .unwrap_or(dir)
                .strip_prefix(dir)
                .unwrap_or(path.parent().unwrap_or(dir))
                .to_string_lossy()
                .replace('\\', "/");
            let rel_dir = if rel_dir.is_empty() { ".".to_string() } else { rel_dir };

            let is_test = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.ends_with("_test"));

            let pkg = tree.packages.entry(rel_dir).or_default();
            match std::fs::read_to_string(path) {
                Ok(contents) => {
                    let imports = extract_imports(&contents);
                    if is_test {
                        if include_tests {
                            pkg.test_imports.extend(imports);
                        }
                    } else {
                        pkg.imports.extend(imports);
                    }
                }
                Err(e) => {
                    // Unreadable file: recorded as a warning, contributes no
                    // imports (§4.2).
                    pkg.errors.push(format!("{}: {e}", path.display()));
                }
            }
        }
        tree
    }

    /// §4.2 `externalReach`: the set of project roots reachable from
    /// `packages`, excluding stdlib/internal imports and anything under
    /// `ignored`, plus whatever `required` names explicitly.
    pub fn external_reach(
        &self,
        project_root: &ProjectRoot,
        packages: &PackageTree,
        ignored: &BTreeSet<String>,
        required: &BTreeSet<String>,
    ) -> BTreeSet<ProjectRoot> {
        let mut reach = BTreeSet::new();
        for (pkg_path, pkg) in &packages.packages {
            if is_ignored(pkg_path, ignored) {
                continue;
            }
            for import in pkg.imports.iter().chain(pkg.test_imports.iter()) {
                if is_internal_or_stdlib(import, project_root) {
                    continue;
                }
                if is_ignored(import, ignored) {
                    continue;
                }
                reach.insert(self.deducer.deduce(import));
            }
        }
        for pkg_path in required {
            reach.insert(self.deducer.deduce(pkg_path));
        }
        reach
    }
}

fn is_ignored(path: &str, ignored: &BTreeSet<String>) -> bool {
    ignored.iter().any(|i| path == i || path.starts_with(&format!("{i}/")))
}

/// Best-effort static import scan: single `import "path"` and grouped
/// `import ( "path" ... )` forms (§4.2). Not a full parser — this is
/// sufficient to discover external reach without compiling the source.
fn extract_imports(contents: &str) -> BTreeSet<String> {
    let mut imports = BTreeSet::new();
    let mut in_group = false;
    for line in contents.lines() {
        let trimmed = line.trim();
        if in_group {
            if trimmed == ")" {
                in_group = false;
                continue;
            }
            if let Some(caps) = grouped_import_line_re().captures(trimmed) {
                imports.insert(caps[1].to_string());
            }
            continue;
        }
        if trimmed == "import (" {
            in_group = true;
            continue;
        }
        if let Some(caps) = single_import_re().captures(trimmed) {
            imports.insert(caps[1].to_string());
        }
    }
    imports
}
