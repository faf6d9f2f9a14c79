//! Constraints and their algebra (§4.1 `intersect`, `matches`).

use std::fmt;

use semver::{Comparator, Op, VersionReq};

use super::{Underlying, Version};

/// A normalized conjunction of semver comparators: "normal form" per §3 has
/// no disjunctions for a single project root, so a `SemverRange` is always
/// an AND of comparators, never an OR of ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemverRange {
    req: VersionReq,
}

impl SemverRange {
    /// Parses caret/tilde/comparison syntax via `semver::VersionReq`. A bare
    /// version (`"1.2.3"`) is treated as `^1.2.3`, matching `VersionReq`'s
    /// own default parsing behavior.
    pub fn parse(s: &str) -> Result<SemverRange, semver::Error> {
        Ok(SemverRange {
            req: VersionReq::parse(s)?,
        })
    }

    pub fn exact(version: &semver::Version) -> SemverRange {
        SemverRange {
            req: VersionReq {
                comparators: vec![Comparator {
                    op: Op::Exact,
                    major: version.major,
                    minor: Some(version.minor),
                    patch: Some(version.patch),
                    pre: version.pre.clone(),
                }],
            },
        }
    }

    /// Pre-release exclusion rule: `semver::VersionReq::matches` already
    /// refuses to match a pre-release version unless some comparator names
    /// the identical major.minor.patch with a pre-release field, which is
    /// exactly the rule in §4.1 — no extra logic needed here.
    pub fn matches(&self, version: &semver::Version) -> bool {
        self.req.matches(version)
    }

    /// AND of comparators is associative and commutative, so intersection
    /// is just concatenation. We do not attempt to algebraically prove the
    /// merged range is non-empty (the solver discovers that by filtering
    /// the source's actual candidate list against it instead — this is a
    /// heuristics-driven backtracker, not a range-emptiness prover).
    pub fn intersect(&self, other: &SemverRange) -> SemverRange {
        let mut comparators = self.req.comparators.clone();
        comparators.extend(other.req.comparators.iter().cloned());
        SemverRange {
            req: VersionReq { comparators },
        }
    }
}

impl fmt::Display for SemverRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.req)
    }
}

/// §3 Constraint: `{any, none, exact, semver range, branch, bare revision}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Any,
    None,
    Exact(String),
    SemverRange(SemverRange),
    Branch(String),
    Revision(String),
}

impl Constraint {
    pub fn exact(version: &Version) -> Constraint {
        Constraint::Exact(version.identity_key())
    }

    /// Closed under intersection; `none` absorbing, `any` identity (§4.1).
    /// Mismatched variant kinds (e.g. a branch constraint against a semver
    /// range) are definitionally unsatisfiable together and collapse to
    /// `None`.
    pub fn intersect(&self, other: &Constraint) -> Constraint {
        use Constraint::*;
        match (self, other) {
            (Any, x) | (x, Any) => x.clone(),
            (None, _) | (_, None) => Constraint::None,
            (SemverRange(a), SemverRange(b)) => SemverRange(a.intersect(b)),
            (Branch(a), Branch(b)) => {
                if a == b {
                    Branch(a.clone())
                } else {
                    Constraint::None
                }
            }
            (Revision(a), Revision(b)) => {
                if a.eq_ignore_ascii_case(b) {
                    Revision(a.clone())
                } else {
                    Constraint::None
                }
            }
            (Exact(a), Exact(b)) => {
                if a == b {
                    Exact(a.clone())
                } else {
                    Constraint::None
                }
            }
            _ => Constraint::None,
        }
    }

    /// §4.1 `matches`.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::None => false,
            Constraint::Exact(key) => &version.identity_key() == key || key_matches_loosely(key, version),
            Constraint::SemverRange(range) => version.semver().is_some_and(|sv| range.matches(sv)),
            Constraint::Branch(name) => version.branch_name() == Some(name.as_str()),
            Constraint::Revision(rev) => version
                .revision_str()
                .is_some_and(|r| r.eq_ignore_ascii_case(rev)),
        }
    }
}

/// `Exact` is normally built from a known [`Version`]'s identity key, but a
/// manifest entry names a version by its tag/branch string alone (it cannot
/// know the revision yet) — so exactness also matches on the underlying tag
/// or branch name when the identity-key comparison misses.
fn key_matches_loosely(key: &str, version: &Version) -> bool {
    match version.underlying() {
        Some(Underlying::Semver(_)) | Some(Underlying::Branch(_)) | Some(Underlying::Tag(_)) => {
            key == format!("u:{}", version.underlying().unwrap())
        }
        None => false,
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Any => write!(f, "*"),
            Constraint::None => write!(f, "<none>"),
            Constraint::Exact(k) => write!(f, "={k}"),
            Constraint::SemverRange(r) => write!(f, "{r}"),
            Constraint::Branch(b) => write!(f, "branch={b}"),
            Constraint::Revision(r) => write!(f, "revision={r}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sv(s: &str) -> semver::Version {
        semver::Version::parse(s).unwrap()
    }

    #[test]
    fn any_is_identity() {
        let c = Constraint::SemverRange(SemverRange::parse("^1.0.0").unwrap());
        assert_eq!(c.intersect(&Constraint::Any), c);
        assert_eq!(Constraint::Any.intersect(&c), c);
    }

    #[test]
    fn none_is_absorbing() {
        let c = Constraint::SemverRange(SemverRange::parse("^1.0.0").unwrap());
        assert_eq!(c.intersect(&Constraint::None), Constraint::None);
    }

    #[test]
    fn semver_range_excludes_prerelease_unless_named() {
        let c = SemverRange::parse("^1.0.0").unwrap();
        assert!(!c.matches(&sv("2.0.0-alpha")));
        assert!(c.matches(&sv("1.2.0")));

        let named = SemverRange::parse(">=1.0.0-alpha, <2.0.0").unwrap();
        assert!(named.matches(&sv("1.0.0-alpha")));
    }

    #[test]
    fn branch_constraint_mismatch_is_none() {
        let c = Constraint::Branch("master".into());
        assert_eq!(c.intersect(&Constraint::Branch("dev".into())), Constraint::None);
    }

    #[test]
    fn mismatched_kinds_are_none() {
        let semver_c = Constraint::SemverRange(SemverRange::parse("^1.0.0").unwrap());
        let branch_c = Constraint::Branch("master".into());
        assert_eq!(semver_c.intersect(&branch_c), Constraint::None);
    }
}
