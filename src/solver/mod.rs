//! The backtracking constraint solver (§4.4). Pure with respect to the
//! filesystem: every external fact (candidate versions, dependency
//! manifests, package lists) comes through the [`Bridge`], so the same
//! inputs always produce the same [`Lock`] regardless of solve order.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::analyzer::PackageTree;
use crate::bridge::{Bridge, CancelToken};
use crate::errors::{Result, VendorlockError};
use crate::lock::{Lock, LockedProject, SolveMeta};
use crate::manifest::{Manifest, ProjectProperties};
use crate::project::{ProjectIdentifier, ProjectRoot};
use crate::version::{Constraint, Version};

/// A constraint on `root` not yet folded into the working table, tagged
/// with the root that imposed it (used for conflict reporting).
#[derive(Debug, Clone)]
struct PendingConstraint {
    root: ProjectRoot,
    id: ProjectIdentifier,
    constraint: Constraint,
    imposed_by: ProjectRoot,
}

#[derive(Debug, Clone)]
struct Selection {
    id: ProjectIdentifier,
    version: Version,
    tree: PackageTree,
    source_url: Option<String>,
}

struct Outcome {
    new_pending: Vec<PendingConstraint>,
    tree: PackageTree,
    source_url: Option<String>,
}

/// One solver run's mutable state: the selection stack (`selected`), the
/// working constraint table (`table`), the frontier (`queue`), and the
/// bail set (`rejected`) from §4.4. `rejected` is scoped to the subtree
/// that recorded it: it is snapshotted alongside `queue`/`table` before a
/// candidate attempt and restored if that attempt's whole subtree fails,
/// so a rejection made while resolving a constraint chain under candidate
/// X never leaks into the chain explored after X is backtracked away.
struct Session<'a> {
    bridge: &'a Bridge,
    cancel: CancelToken,
    overrides: &'a BTreeMap<ProjectRoot, ProjectProperties>,
    prior_lock: Option<&'a Lock>,
    table: BTreeMap<ProjectRoot, Constraint>,
    queue: VecDeque<PendingConstraint>,
    selected: BTreeMap<ProjectRoot, Selection>,
    rejected: HashSet<(ProjectRoot, String)>,
}

impl<'a> Session<'a> {
    /// Dequeues the next root by the §4.4.a heuristic: locked-in-prior-lock
    /// first, then fewest candidates, then lexicographic on the root — so
    /// the search fails fast and backtracks as shallowly as possible.
    fn pick_next(&mut self) -> Option<PendingConstraint> {
        if self.queue.is_empty() {
            return None;
        }
        let mut best_idx = 0usize;
        let mut best_key: Option<(bool, usize, String)> = None;
        for (i, item) in self.queue.iter().enumerate() {
            let locked = self
                .prior_lock
                .map(|l| l.find(&item.root).is_some())
                .unwrap_or(false);
            let count = self
                .bridge
                .list_versions(&item.id, &self.cancel)
                .map(|v| v.len())
                .unwrap_or(usize::MAX);
            let key = (!locked, count, item.root.0.clone());
            if best_key.as_ref().map(|b| &key < b).unwrap_or(true) {
                best_key = Some(key);
                best_idx = i;
            }
        }
        Some(
            self.queue
                .remove(best_idx)
                .expect("best_idx is always a valid index into queue"),
        )
    }

    fn restore_table(&mut self, root: &ProjectRoot, prev: Option<Constraint>) {
        match prev {
            Some(c) => {
                self.table.insert(root.clone(), c);
            }
            None => {
                self.table.remove(root);
            }
        }
    }

    fn conflict(&self, pending: &PendingConstraint, existing: &Constraint, incoming: &Constraint) -> VendorlockError {
        VendorlockError::UnresolvableConflict {
            root: pending.root.clone(),
            constraints: vec![
                (pending.root.clone(), existing.clone()),
                (pending.imposed_by.clone(), incoming.clone()),
            ],
            detail: format!(
                "{} cannot simultaneously satisfy {existing} and {incoming}",
                pending.root
            ),
        }
    }

    /// Runs until the queue drains (success) or every avenue from the
    /// current frame is exhausted (failure propagates to the caller, which
    /// is the previous frame's candidate loop in `resolve`).
    fn run(&mut self) -> Result<()> {
        match self.pick_next() {
            Some(pending) => self.resolve(pending),
            None => Ok(()),
        }
    }

    fn resolve(&mut self, pending: PendingConstraint) -> Result<()> {
        let incoming = self
            .overrides
            .get(&pending.root)
            .map(|o| o.constraint.clone())
            .unwrap_or_else(|| pending.constraint.clone());
        let existing = self.table.get(&pending.root).cloned().unwrap_or(Constraint::Any);
        let merged = existing.intersect(&incoming);
        if merged == Constraint::None {
            return Err(self.conflict(&pending, &existing, &incoming));
        }

        if let Some(sel) = self.selected.get(&pending.root).cloned() {
            if merged.matches(&sel.version) {
                let prev = self.table.insert(pending.root.clone(), merged);
                let result = self.run();
                if result.is_err() {
                    self.restore_table(&pending.root, prev);
                }
                return result;
            }
            return Err(self.conflict(&pending, &existing, &incoming));
        }

        let prev_table_entry = self.table.insert(pending.root.clone(), merged.clone());
        let locked_version = self
            .prior_lock
            .and_then(|l| l.find(&pending.root))
            .map(|lp| lp.version.clone());

        let mut candidates = match self.bridge.list_versions(&pending.id, &self.cancel) {
            Ok(versions) => versions.into_iter().filter(|v| merged.matches(v)).collect::<Vec<_>>(),
            Err(e) => {
                self.restore_table(&pending.root, prev_table_entry);
                return Err(e);
            }
        };
        // Locked-hint: tried first, dropped silently if unsatisfiable (§4.4
        // tie-breaking invariants).
        if let Some(lv) = &locked_version {
            if let Some(pos) = candidates.iter().position(|v| v == lv) {
                let v = candidates.remove(pos);
                candidates.insert(0, v);
            }
        }

        if candidates.is_empty() {
            self.restore_table(&pending.root, prev_table_entry);
            return Err(VendorlockError::UnresolvableConflict {
                root: pending.root.clone(),
                constraints: vec![(pending.imposed_by.clone(), merged)],
                detail: format!("no version of {} satisfies the constraints imposed on it", pending.root),
            });
        }

        let mut last_err = None;
        for v in candidates {
            if self.rejected.contains(&(pending.root.clone(), v.identity_key())) {
                continue;
            }
            let queue_snapshot = self.queue.clone();
            let table_snapshot = self.table.clone();
            let rejected_snapshot = self.rejected.clone();

            match self.expand(&pending, &v) {
                Ok(outcome) => {
                    self.queue.extend(outcome.new_pending);
                    self.selected.insert(
                        pending.root.clone(),
                        Selection {
                            id: pending.id.clone(),
                            version: v.clone(),
                            tree: outcome.tree,
                            source_url: outcome.source_url,
                        },
                    );
                    match self.run() {
                        Ok(()) => return Ok(()),
                        Err(e) => {
                            self.selected.remove(&pending.root);
                            self.queue = queue_snapshot;
                            self.table = table_snapshot;
                            // Restore first: any rejection recorded while
                            // exploring this candidate's subtree (e.g. a
                            // transitive root rejected only because *this*
                            // candidate's constraint on it was unsatisfiable)
                            // applied only under this candidate's assumption
                            // and must not survive it. Only the candidate
                            // itself stays rejected for the remainder of
                            // this loop.
                            self.rejected = rejected_snapshot;
                            self.rejected.insert((pending.root.clone(), v.identity_key()));
                            last_err = Some(e);
                        }
                    }
                }
                Err(e) => {
                    self.rejected.insert((pending.root.clone(), v.identity_key()));
                    last_err = Some(e);
                }
            }
        }

        self.restore_table(&pending.root, prev_table_entry);
        Err(last_err.unwrap_or_else(|| VendorlockError::UnresolvableConflict {
            root: pending.root.clone(),
            constraints: vec![(pending.imposed_by.clone(), merged)],
            detail: format!("every candidate version of {} was rejected", pending.root),
        }))
    }

    /// §4.4.d: fetches the candidate's own manifest and reads its declared
    /// constraints (overrides/prune/ignored/required are root-only and
    /// never consulted here), plus its package tree. The tree is kept in
    /// full (not yet reduced to the imported subset) — [`collect_used_packages`]
    /// reduces it once the whole graph is known, after `run()` returns.
    fn expand(&self, pending: &PendingConstraint, v: &Version) -> Result<Outcome> {
        let (manifest, _lock) = self.bridge.get_manifest_and_lock(&pending.id, v, &self.cancel)?;
        let tree = self.bridge.list_packages(&pending.id, v, &self.cancel)?;

        let mut new_pending = Vec::new();
        if let Some(m) = manifest {
            for (root, props) in &m.constraints {
                if *root == pending.root {
                    continue;
                }
                let id = match &props.source {
                    Some(src) => ProjectIdentifier::with_source(root.clone(), src.clone()),
                    None => ProjectIdentifier::new(root.clone()),
                };
                new_pending.push(PendingConstraint {
                    root: root.clone(),
                    id,
                    constraint: props.constraint.clone(),
                    imposed_by: pending.root.clone(),
                });
            }
        }

        Ok(Outcome {
            new_pending,
            tree,
            source_url: pending.id.source.as_ref().map(|s| s.0.clone()),
        })
    }
}

/// Whether `import` is a standard-library-ish bare identifier rather than a
/// hosted import path (mirrors [`crate::analyzer`]'s own stdlib heuristic:
/// nothing under `vendor/` package pruning ever needs to deduce a root for
/// `"fmt"`).
fn looks_external(import: &str) -> bool {
    import.contains('.')
}

/// Strips `root`'s own prefix off an import path to get the package
/// subpath within that project, defaulting to `"."` for the root package
/// itself (§6 lock `packages` entries, §4.2 package-path convention).
fn subpath_within(root: &ProjectRoot, import: &str) -> String {
    match import.strip_prefix(&root.0) {
        Some(rest) => {
            let rest = rest.trim_start_matches('/');
            if rest.is_empty() {
                ".".to_string()
            } else {
                rest.to_string()
            }
        }
        None => ".".to_string(),
    }
}

/// Walks every import reachable from the root project's own packages
/// across the selected dependency graph, recording which package subpath
/// of each locked project is actually imported by something (§4.6
/// "Unused" / invariant 3). A project reachable only through a manifest
/// constraint or override that nothing literally imports ends up with an
/// empty set here — there is nothing for unused-package pruning to keep.
fn collect_used_packages(
    bridge: &Bridge,
    root_id: &ProjectIdentifier,
    root_packages: &PackageTree,
    selected: &BTreeMap<ProjectRoot, Selection>,
) -> BTreeMap<ProjectRoot, BTreeSet<String>> {
    let mut used: BTreeMap<ProjectRoot, BTreeSet<String>> = BTreeMap::new();
    let mut queue: VecDeque<(ProjectRoot, String)> = VecDeque::new();

    let mut seed = |imports: &BTreeSet<String>, used: &mut BTreeMap<ProjectRoot, BTreeSet<String>>, queue: &mut VecDeque<(ProjectRoot, String)>| {
        for import in imports {
            if !looks_external(import) {
                continue;
            }
            let root = bridge.deduce_project_root(import);
            if root == root_id.root || !selected.contains_key(&root) {
                continue;
            }
            let subpath = subpath_within(&root, import);
            if used.entry(root.clone()).or_default().insert(subpath.clone()) {
                queue.push_back((root, subpath));
            }
        }
    };

    for pkg in root_packages.packages.values() {
        seed(&pkg.imports, &mut used, &mut queue);
        seed(&pkg.test_imports, &mut used, &mut queue);
    }

    while let Some((root, subpath)) = queue.pop_front() {
        let Some(sel) = selected.get(&root) else { continue };
        let Some(pkg) = sel.tree.packages.get(&subpath) else { continue };
        seed(&pkg.imports, &mut used, &mut queue);
    }

    used
}

/// Solves for a complete, deterministic [`Lock`] given the root's external
/// reach (from [`crate::analyzer::Analyzer::external_reach`]), its own
/// package tree (used only to seed [`collect_used_packages`]), and manifest.
/// `prior_lock` is a hint only — dropped silently wherever it no longer
/// satisfies the working constraints.
pub fn solve(
    bridge: &Bridge,
    cancel: CancelToken,
    root_id: &ProjectIdentifier,
    root_manifest: &Manifest,
    root_packages: &PackageTree,
    external_reach: &BTreeSet<ProjectRoot>,
    prior_lock: Option<&Lock>,
) -> Result<Lock> {
    let mut queue = VecDeque::new();
    let mut seen = BTreeSet::new();

    for root in external_reach {
        if *root == root_id.root {
            continue;
        }
        seen.insert(root.clone());
        let props = root_manifest.constraints.get(root);
        let constraint = props.map(|p| p.constraint.clone()).unwrap_or(Constraint::Any);
        let id = match props.and_then(|p| p.source.as_ref()) {
            Some(src) => ProjectIdentifier::with_source(root.clone(), src.clone()),
            None => ProjectIdentifier::new(root.clone()),
        };
        queue.push_back(PendingConstraint {
            root: root.clone(),
            id,
            constraint,
            imposed_by: root_id.root.clone(),
        });
    }

    // §4.4 step 1: every override root is injected even if the analyzer
    // never observed an import reaching it.
    for (root, over) in &root_manifest.overrides {
        if seen.contains(root) || *root == root_id.root {
            continue;
        }
        seen.insert(root.clone());
        let id = match &over.source {
            Some(src) => ProjectIdentifier::with_source(root.clone(), src.clone()),
            None => ProjectIdentifier::new(root.clone()),
        };
        queue.push_back(PendingConstraint {
            root: root.clone(),
            id,
            constraint: over.constraint.clone(),
            imposed_by: root_id.root.clone(),
        });
    }

    let mut session = Session {
        bridge,
        cancel,
        overrides: &root_manifest.overrides,
        prior_lock,
        table: BTreeMap::new(),
        queue,
        selected: BTreeMap::new(),
        rejected: HashSet::new(),
    };
    session.run()?;

    let used = collect_used_packages(bridge, root_id, root_packages, &session.selected);

    let projects: Vec<LockedProject> = session
        .selected
        .into_values()
        .map(|sel| {
            let mut packages: Vec<String> = used.get(&sel.id.root).cloned().unwrap_or_default().into_iter().collect();
            packages.sort();
            LockedProject {
                id: sel.id,
                version: sel.version,
                packages,
                source_url: sel.source_url,
            }
        })
        .collect();
    Ok(Lock::new(projects, SolveMeta::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Package, PackageTree};
    use crate::bridge::SourceManager;
    use crate::manifest::ProjectProperties;
    use std::path::Path;
    use std::sync::Arc;

    /// An in-memory fixture with no real VCS or network I/O: each project
    /// root maps to a fixed, pre-ordered candidate list and an optional
    /// manifest per version.
    struct FixtureManager {
        versions: BTreeMap<String, Vec<Version>>,
        manifests: BTreeMap<(String, String), Manifest>,
        packages: BTreeMap<(String, String), PackageTree>,
    }

    impl FixtureManager {
        fn new() -> Self {
            FixtureManager { versions: BTreeMap::new(), manifests: BTreeMap::new(), packages: BTreeMap::new() }
        }

        fn with_versions(mut self, root: &str, versions: Vec<Version>) -> Self {
            self.versions.insert(root.to_string(), versions);
            self
        }

        fn with_manifest(mut self, root: &str, version: &str, manifest: Manifest) -> Self {
            self.manifests.insert((root.to_string(), version.to_string()), manifest);
            self
        }

        fn with_packages(mut self, root: &str, version: &str, tree: PackageTree) -> Self {
            self.packages.insert((root.to_string(), version.to_string()), tree);
            self
        }
    }

    impl SourceManager for FixtureManager {
        /// Matches an import against the longest known root it's prefixed
        /// by, falling back to the import path itself (mirrors the real
        /// bridge's "unknown host" fallback for roots the fixture never
        /// registered).
        fn deduce_project_root(&self, import_path: &str) -> ProjectRoot {
            self.versions
                .keys()
                .filter(|root| import_path == root.as_str() || import_path.starts_with(&format!("{root}/")))
                .max_by_key(|root| root.len())
                .map(|root| ProjectRoot(root.clone()))
                .unwrap_or_else(|| ProjectRoot(import_path.to_string()))
        }

        fn list_versions(&self, id: &ProjectIdentifier, _cancel: &CancelToken) -> Result<Vec<Version>> {
            Ok(self.versions.get(&id.root.0).cloned().unwrap_or_default())
        }

        fn revision_present_in(&self, _id: &ProjectIdentifier, _revision: &str, _cancel: &CancelToken) -> Result<bool> {
            Ok(true)
        }

        fn get_manifest_and_lock(
            &self,
            id: &ProjectIdentifier,
            version: &Version,
            _cancel: &CancelToken,
        ) -> Result<(Option<Manifest>, Option<Lock>)> {
            let key = (id.root.0.clone(), version.to_string());
            Ok((self.manifests.get(&key).cloned(), None))
        }

        fn list_packages(&self, id: &ProjectIdentifier, version: &Version, _cancel: &CancelToken) -> Result<PackageTree> {
            let key = (id.root.0.clone(), version.to_string());
            if let Some(tree) = self.packages.get(&key) {
                return Ok(tree.clone());
            }
            let mut tree = PackageTree::default();
            tree.packages.insert(".".to_string(), Package::default());
            Ok(tree)
        }

        fn export_project(&self, _id: &ProjectIdentifier, _version: &Version, _dest: &Path, _cancel: &CancelToken) -> Result<()> {
            Ok(())
        }
    }

    fn root_id() -> ProjectIdentifier {
        ProjectIdentifier::new("example.com/root")
    }

    fn reach(roots: &[&str]) -> BTreeSet<ProjectRoot> {
        roots.iter().map(|r| ProjectRoot::from(*r)).collect()
    }

    #[test]
    fn solves_simple_semver_constraint() {
        let manager = Arc::new(
            FixtureManager::new().with_versions(
                "example.com/dep",
                vec![Version::parse("v1.2.0"), Version::parse("v1.1.0"), Version::parse("v1.0.0")],
            ),
        );
        let bridge = Bridge::new(manager);
        let manifest = Manifest::default();
        let lock = solve(&bridge, CancelToken::new(), &root_id(), &manifest, &PackageTree::default(), &reach(&["example.com/dep"]), None).unwrap();
        assert_eq!(lock.projects.len(), 1);
        assert_eq!(lock.projects[0].version.to_string(), "v1.2.0");
    }

    #[test]
    fn backtracks_when_a_transitive_constraint_conflicts() {
        // `dep-a` v2 requires dep-b ^2.0.0, which doesn't exist; v1 requires
        // dep-b ^1.0.0, which does. The solver must reject v2 and settle on
        // v1 without surfacing an error.
        let mut dep_a_v2_manifest = Manifest::default();
        dep_a_v2_manifest.constraints.insert(
            ProjectRoot::from("example.com/dep-b"),
            ProjectProperties { source: None, constraint: Constraint::SemverRange(crate::version::constraint::SemverRange::parse("^2.0.0").unwrap()) },
        );
        let mut dep_a_v1_manifest = Manifest::default();
        dep_a_v1_manifest.constraints.insert(
            ProjectRoot::from("example.com/dep-b"),
            ProjectProperties { source: None, constraint: Constraint::SemverRange(crate::version::constraint::SemverRange::parse("^1.0.0").unwrap()) },
        );

        let manager = Arc::new(
            FixtureManager::new()
                .with_versions("example.com/dep-a", vec![Version::parse("v2.0.0"), Version::parse("v1.0.0")])
                .with_versions("example.com/dep-b", vec![Version::parse("v1.0.0")])
                .with_manifest("example.com/dep-a", "v2.0.0", dep_a_v2_manifest)
                .with_manifest("example.com/dep-a", "v1.0.0", dep_a_v1_manifest),
        );
        let bridge = Bridge::new(manager);
        let manifest = Manifest::default();
        let lock = solve(&bridge, CancelToken::new(), &root_id(), &manifest, &PackageTree::default(), &reach(&["example.com/dep-a"]), None).unwrap();
        let dep_a = lock.find(&ProjectRoot::from("example.com/dep-a")).unwrap();
        assert_eq!(dep_a.version.to_string(), "v1.0.0");
        let dep_b = lock.find(&ProjectRoot::from("example.com/dep-b")).unwrap();
        assert_eq!(dep_b.version.to_string(), "v1.0.0");
    }

    #[test]
    fn reports_unresolvable_conflict_when_no_candidate_fits() {
        let manager = Arc::new(FixtureManager::new().with_versions("example.com/dep", vec![Version::parse("v1.0.0")]));
        let bridge = Bridge::new(manager);
        let mut manifest = Manifest::default();
        manifest.constraints.insert(
            ProjectRoot::from("example.com/dep"),
            ProjectProperties {
                source: None,
                constraint: Constraint::SemverRange(crate::version::constraint::SemverRange::parse("^2.0.0").unwrap()),
            },
        );
        let err = solve(&bridge, CancelToken::new(), &root_id(), &manifest, &PackageTree::default(), &reach(&["example.com/dep"]), None).unwrap_err();
        assert!(matches!(err, VendorlockError::UnresolvableConflict { .. }));
    }

    #[test]
    fn override_wins_unconditionally() {
        let manager = Arc::new(
            FixtureManager::new().with_versions("example.com/dep", vec![Version::parse("v2.0.0"), Version::parse("v1.0.0")]),
        );
        let bridge = Bridge::new(manager);
        let mut manifest = Manifest::default();
        manifest.constraints.insert(
            ProjectRoot::from("example.com/dep"),
            ProjectProperties {
                source: None,
                constraint: Constraint::SemverRange(crate::version::constraint::SemverRange::parse("^2.0.0").unwrap()),
            },
        );
        manifest.overrides.insert(
            ProjectRoot::from("example.com/dep"),
            ProjectProperties { source: None, constraint: Constraint::exact(&Version::parse("v1.0.0")) },
        );
        let lock = solve(&bridge, CancelToken::new(), &root_id(), &manifest, &PackageTree::default(), &reach(&["example.com/dep"]), None).unwrap();
        assert_eq!(lock.projects[0].version.to_string(), "v1.0.0");
    }

    #[test]
    fn locked_hint_is_honored_when_still_satisfiable() {
        let manager = Arc::new(
            FixtureManager::new().with_versions("example.com/dep", vec![Version::parse("v1.2.0"), Version::parse("v1.1.0")]),
        );
        let bridge = Bridge::new(manager);
        let manifest = Manifest::default();
        let prior = Lock::new(
            vec![LockedProject {
                id: ProjectIdentifier::new("example.com/dep"),
                version: Version::parse("v1.1.0"),
                packages: vec![".".to_string()],
                source_url: None,
            }],
            SolveMeta::default(),
        );
        let lock = solve(&bridge, CancelToken::new(), &root_id(), &manifest, &PackageTree::default(), &reach(&["example.com/dep"]), Some(&prior)).unwrap();
        assert_eq!(lock.projects[0].version.to_string(), "v1.1.0");
    }

    #[test]
    fn solve_is_deterministic_across_manifest_map_orders() {
        let mut m1 = Manifest::default();
        m1.constraints.insert(ProjectRoot::from("example.com/b"), ProjectProperties { source: None, constraint: Constraint::Any });
        m1.constraints.insert(ProjectRoot::from("example.com/a"), ProjectProperties { source: None, constraint: Constraint::Any });

        let mut m2 = Manifest::default();
        m2.constraints.insert(ProjectRoot::from("example.com/a"), ProjectProperties { source: None, constraint: Constraint::Any });
        m2.constraints.insert(ProjectRoot::from("example.com/b"), ProjectProperties { source: None, constraint: Constraint::Any });

        let manager = Arc::new(
            FixtureManager::new()
                .with_versions("example.com/a", vec![Version::parse("v1.0.0")])
                .with_versions("example.com/b", vec![Version::parse("v1.0.0")]),
        );
        let bridge1 = Bridge::new(manager.clone());
        let bridge2 = Bridge::new(manager);
        let roots = reach(&["example.com/a", "example.com/b"]);
        let lock1 = solve(&bridge1, CancelToken::new(), &root_id(), &m1, &PackageTree::default(), &roots, None).unwrap();
        let lock2 = solve(&bridge2, CancelToken::new(), &root_id(), &m2, &PackageTree::default(), &roots, None).unwrap();
        let names1: Vec<_> = lock1.projects.iter().map(|p| p.id.root.0.clone()).collect();
        let names2: Vec<_> = lock2.projects.iter().map(|p| p.id.root.0.clone()).collect();
        assert_eq!(names1, names2);
    }

    #[test]
    fn locked_project_packages_are_restricted_to_the_imported_subset() {
        // dep has two packages: "sub", imported by the root, and "unused",
        // which nothing imports. Only "sub" should end up recorded.
        let sub = Package::default();
        let mut dep_tree = PackageTree::default();
        dep_tree.packages.insert("sub".to_string(), sub);
        dep_tree.packages.insert("unused".to_string(), Package::default());

        let manager = Arc::new(
            FixtureManager::new()
                .with_versions("example.com/dep", vec![Version::parse("v1.0.0")])
                .with_packages("example.com/dep", "v1.0.0", dep_tree),
        );
        let bridge = Bridge::new(manager);
        let manifest = Manifest::default();

        let mut root_pkg = Package::default();
        root_pkg.imports.insert("example.com/dep/sub".to_string());
        let mut root_tree = PackageTree::default();
        root_tree.packages.insert(".".to_string(), root_pkg);

        let lock = solve(&bridge, CancelToken::new(), &root_id(), &manifest, &root_tree, &reach(&["example.com/dep"]), None).unwrap();
        let dep = lock.find(&ProjectRoot::from("example.com/dep")).unwrap();
        assert_eq!(dep.packages, vec!["sub".to_string()]);
    }
}
