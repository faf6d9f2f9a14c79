//! Concrete solver scenarios A-D from the specification's testable
//! properties, plus determinism and override-dominance checks that need a
//! full `solve()` call rather than the narrower unit tests in
//! `src/solver/mod.rs`.

mod support;

use std::collections::BTreeSet;
use std::sync::Arc;

use support::FixtureManager;
use vendorlock::bridge::{Bridge, CancelToken};
use vendorlock::manifest::{Manifest, ProjectProperties};
use vendorlock::project::{ProjectIdentifier, ProjectRoot};
use vendorlock::analyzer::PackageTree;
use vendorlock::solver::solve;
use vendorlock::version::constraint::SemverRange;
use vendorlock::version::{Constraint, Version};

fn root_id() -> ProjectIdentifier {
    ProjectIdentifier::new("example.com/root")
}

fn reach(roots: &[&str]) -> BTreeSet<ProjectRoot> {
    roots.iter().map(|r| ProjectRoot::from(*r)).collect()
}

fn semver_constraint(manifest: &mut Manifest, root: &str, range: &str) {
    manifest.constraints.insert(
        ProjectRoot::from(root),
        ProjectProperties { source: None, constraint: Constraint::SemverRange(SemverRange::parse(range).unwrap()) },
    );
}

/// Scenario A: root requires `A: ^1.2.0`; source offers 1.2.0/1.2.1/1.3.0/2.0.0.
/// The highest version inside the range wins, paired with its revision.
#[test]
fn scenario_a_simple_semver() {
    let manager = Arc::new(
        FixtureManager::new()
            .with_versions(
                "example.com/A",
                vec![
                    Version::parse("v2.0.0").pair("rev2000000000000000000000000000000000000"),
                    Version::parse("v1.3.0").pair("rev1300000000000000000000000000000000000"),
                    Version::parse("v1.2.1").pair("rev1210000000000000000000000000000000000"),
                    Version::parse("v1.2.0").pair("rev1200000000000000000000000000000000000"),
                ],
            )
            .with_default_package("example.com/A", "v1.3.0"),
    );
    let bridge = Bridge::new(manager);
    let mut manifest = Manifest::default();
    semver_constraint(&mut manifest, "example.com/A", "^1.2.0");

    let lock = solve(&bridge, CancelToken::new(), &root_id(), &manifest, &PackageTree::default(), &reach(&["example.com/A"]), None).unwrap();
    let a = lock.find(&ProjectRoot::from("example.com/A")).unwrap();
    assert_eq!(a.version.components().2.as_deref(), Some("v1.3.0"));
    assert_eq!(a.version.revision_str(), Some("rev1300000000000000000000000000000000000"));
}

/// Scenario B: root constrains `A` by `branch: master`; the source offers
/// only branches. The lock must carry the branch name and the tip revision.
#[test]
fn scenario_b_branch_pinning() {
    let manager = Arc::new(
        FixtureManager::new()
            .with_versions("example.com/A", vec![Version::branch("master").pair("tiprevisionaaaaaaaaaaaaaaaaaaaaaaaaaaaa")])
            .with_default_package("example.com/A", "master"),
    );
    let bridge = Bridge::new(manager);
    let mut manifest = Manifest::default();
    manifest.constraints.insert(
        ProjectRoot::from("example.com/A"),
        ProjectProperties { source: None, constraint: Constraint::Branch("master".to_string()) },
    );

    let lock = solve(&bridge, CancelToken::new(), &root_id(), &manifest, &PackageTree::default(), &reach(&["example.com/A"]), None).unwrap();
    let a = lock.find(&ProjectRoot::from("example.com/A")).unwrap();
    let (revision, branch, version) = a.version.components();
    assert_eq!(branch.as_deref(), Some("master"));
    assert_eq!(version, None);
    assert_eq!(revision.as_deref(), Some("tiprevisionaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
}

/// Scenario C: A@1.0 requires C^1 (exists); B@1.0 requires C^2 (doesn't
/// exist) but B@0.9 requires C^1. The solver must backtrack B down to 0.9
/// and settle C at its highest matching version.
#[test]
fn scenario_c_conflict_with_backtrack() {
    let mut a_manifest = Manifest::default();
    semver_constraint(&mut a_manifest, "example.com/C", "^1");

    let mut b_1_0_manifest = Manifest::default();
    semver_constraint(&mut b_1_0_manifest, "example.com/C", "^2");

    let mut b_0_9_manifest = Manifest::default();
    semver_constraint(&mut b_0_9_manifest, "example.com/C", "^1");

    let manager = Arc::new(
        FixtureManager::new()
            .with_versions("example.com/A", vec![Version::parse("v1.0.0")])
            .with_versions("example.com/B", vec![Version::parse("v1.0.0"), Version::parse("v0.9.0")])
            .with_versions("example.com/C", vec![Version::parse("v1.5.0"), Version::parse("v1.0.0")])
            .with_manifest("example.com/A", "v1.0.0", a_manifest)
            .with_manifest("example.com/B", "v1.0.0", b_1_0_manifest)
            .with_manifest("example.com/B", "v0.9.0", b_0_9_manifest)
            .with_default_package("example.com/A", "v1.0.0")
            .with_default_package("example.com/B", "v1.0.0")
            .with_default_package("example.com/B", "v0.9.0")
            .with_default_package("example.com/C", "v1.5.0"),
    );
    let bridge = Bridge::new(manager);
    let manifest = Manifest::default();

    let lock = solve(&bridge, CancelToken::new(), &root_id(), &manifest, &PackageTree::default(), &reach(&["example.com/A", "example.com/B"]), None).unwrap();
    assert_eq!(lock.find(&ProjectRoot::from("example.com/A")).unwrap().version.to_string(), "v1.0.0");
    assert_eq!(lock.find(&ProjectRoot::from("example.com/B")).unwrap().version.to_string(), "v0.9.0");
    assert_eq!(lock.find(&ProjectRoot::from("example.com/C")).unwrap().version.to_string(), "v1.5.0");
}

/// Scenario D: root overrides D to 2.0.0; root also imports E, which
/// declares D: ^1. The override must win without a conflict being raised,
/// and E's D constraint must never be consulted when selecting D's version.
#[test]
fn scenario_d_override_wins() {
    let mut e_manifest = Manifest::default();
    semver_constraint(&mut e_manifest, "example.com/D", "^1");

    let manager = Arc::new(
        FixtureManager::new()
            .with_versions("example.com/D", vec![Version::parse("v2.0.0"), Version::parse("v1.0.0")])
            .with_versions("example.com/E", vec![Version::parse("v1.0.0")])
            .with_manifest("example.com/E", "v1.0.0", e_manifest)
            .with_default_package("example.com/D", "v2.0.0")
            .with_default_package("example.com/E", "v1.0.0"),
    );
    let bridge = Bridge::new(manager);
    let mut manifest = Manifest::default();
    manifest.overrides.insert(
        ProjectRoot::from("example.com/D"),
        ProjectProperties { source: None, constraint: Constraint::exact(&Version::parse("v2.0.0")) },
    );

    let lock = solve(&bridge, CancelToken::new(), &root_id(), &manifest, &PackageTree::default(), &reach(&["example.com/E"]), None).unwrap();
    assert_eq!(lock.find(&ProjectRoot::from("example.com/D")).unwrap().version.to_string(), "v2.0.0");
}

/// Universal property 1 (determinism): the same inputs, fed through two
/// independently constructed bridges, produce byte-identical locks.
#[test]
fn solve_is_deterministic_for_fixed_inputs() {
    let build = || {
        Arc::new(
            FixtureManager::new()
                .with_versions("example.com/A", vec![Version::parse("v1.1.0"), Version::parse("v1.0.0")])
                .with_versions("example.com/B", vec![Version::parse("v1.0.0")])
                .with_default_package("example.com/A", "v1.1.0")
                .with_default_package("example.com/B", "v1.0.0"),
        )
    };
    let mut manifest = Manifest::default();
    semver_constraint(&mut manifest, "example.com/A", "^1");
    let roots = reach(&["example.com/A", "example.com/B"]);

    let lock1 = solve(&Bridge::new(build()), CancelToken::new(), &root_id(), &manifest, &PackageTree::default(), &roots, None).unwrap();
    let lock2 = solve(&Bridge::new(build()), CancelToken::new(), &root_id(), &manifest, &PackageTree::default(), &roots, None).unwrap();

    let as_pairs = |l: &vendorlock::lock::Lock| -> Vec<(String, String)> {
        l.projects.iter().map(|p| (p.id.root.0.clone(), p.version.identity_key())).collect()
    };
    assert_eq!(as_pairs(&lock1), as_pairs(&lock2));
}
