//! Version algebra: parsing, pairing, ordering, and the constraint type
//! (§4.1). `Constraint` and its intersection/matching rules live in
//! [`constraint`].

pub mod constraint;

pub use constraint::Constraint;

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;
use semver::Version as SemVer;
use std::sync::OnceLock;

fn revision_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{40}$").expect("static regex"))
}

/// The non-revision, non-paired part of a version: a project can be pinned
/// to one of these three things, then optionally bound to an immutable
/// revision via [`Version::pair`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Underlying {
    Semver(SemVer),
    Tag(String),
    Branch(String),
}

impl fmt::Display for Underlying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Underlying::Semver(v) => write!(f, "v{v}"),
            Underlying::Tag(t) => write!(f, "{t}"),
            Underlying::Branch(b) => write!(f, "{b}"),
        }
    }
}

/// A concrete version, per §3. Construction from a bare string cannot
/// distinguish a branch ref from an arbitrary tag (both are just strings
/// until the source manager tells us which VCS ref namespace they came
/// from), so [`Version::parse`] never produces [`Version::Branch`] itself —
/// callers that know a ref is a branch call [`Version::branch`] directly.
/// See DESIGN.md for this decision.
#[derive(Debug, Clone)]
pub enum Version {
    Unpaired(Underlying),
    Revision(String),
    Paired {
        underlying: Underlying,
        revision: String,
    },
}

impl Version {
    /// Recognizes semver (with optional `v` prefix) and 40-hex revisions;
    /// anything else becomes an arbitrary tag. Use [`Version::branch`] when
    /// the caller already knows a string names a branch.
    pub fn parse(s: &str) -> Version {
        let s = s.trim();
        if revision_re().is_match(s) {
            return Version::Revision(s.to_lowercase());
        }
        let stripped = s.strip_prefix('v').unwrap_or(s);
        if let Ok(sv) = SemVer::parse(stripped) {
            return Version::Unpaired(Underlying::Semver(sv));
        }
        Version::Unpaired(Underlying::Tag(s.to_string()))
    }

    pub fn branch(name: &str) -> Version {
        Version::Unpaired(Underlying::Branch(name.to_string()))
    }

    pub fn revision(rev: &str) -> Version {
        Version::Revision(rev.to_lowercase())
    }

    /// Binds an immutable revision to a moving tag/branch reference.
    /// Pairing an already-paired or bare-revision version is a no-op that
    /// overwrites the bound revision, since the bridge is the only caller
    /// and it always pairs freshly-listed versions exactly once.
    pub fn pair(self, revision: &str) -> Version {
        let revision = revision.to_lowercase();
        match self {
            Version::Unpaired(u) => Version::Paired {
                underlying: u,
                revision,
            },
            Version::Paired { underlying, .. } => Version::Paired {
                underlying,
                revision,
            },
            Version::Revision(_) => Version::Revision(revision),
        }
    }

    pub fn underlying(&self) -> Option<&Underlying> {
        match self {
            Version::Unpaired(u) => Some(u),
            Version::Paired { underlying, .. } => Some(underlying),
            Version::Revision(_) => None,
        }
    }

    pub fn revision_str(&self) -> Option<&str> {
        match self {
            Version::Revision(r) => Some(r),
            Version::Paired { revision, .. } => Some(revision),
            Version::Unpaired(_) => None,
        }
    }

    pub fn semver(&self) -> Option<&SemVer> {
        match self.underlying() {
            Some(Underlying::Semver(sv)) => Some(sv),
            _ => None,
        }
    }

    pub fn branch_name(&self) -> Option<&str> {
        match self.underlying() {
            Some(Underlying::Branch(b)) => Some(b.as_str()),
            _ => None,
        }
    }

    /// `(revision, branch, tag)`, used by the lock codec (§6: `revision`,
    /// `branch`, `version` fields).
    pub fn components(&self) -> (Option<String>, Option<String>, Option<String>) {
        let revision = self.revision_str().map(|r| r.to_string());
        match self.underlying() {
            Some(Underlying::Branch(b)) => (revision, Some(b.clone()), None),
            Some(Underlying::Semver(sv)) => (revision, None, Some(format!("v{sv}"))),
            Some(Underlying::Tag(t)) => (revision, None, Some(t.clone())),
            None => (revision, None, None),
        }
    }

    fn class_rank(&self) -> u8 {
        match self.underlying() {
            Some(Underlying::Semver(_)) => 0,
            Some(Underlying::Tag(_)) => 1,
            Some(Underlying::Branch(_)) => 2,
            None => 3,
        }
    }

    /// A stable string identity used to dedupe `(id, v)` attempts during the
    /// solve (§4.4 termination rule) without relying on the intentionally
    /// non-transitive [`PartialEq`] below.
    pub fn identity_key(&self) -> String {
        match self {
            Version::Unpaired(u) => format!("u:{u}"),
            Version::Revision(r) => format!("r:{r}"),
            Version::Paired { underlying, revision } => format!("p:{underlying}:{revision}"),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Unpaired(u) => write!(f, "{u}"),
            Version::Revision(r) => write!(f, "{r}"),
            Version::Paired { underlying, revision } => write!(f, "{underlying} ({revision})"),
        }
    }
}

/// Equality intentionally matches either the tag/branch side, the revision
/// side, or both (§3 invariant on paired versions) — this is not a standard
/// equivalence relation (it is not transitive: a paired version can equal
/// two unpaired versions that do not equal each other). Only used for
/// constraint matching of `Exact`, never as a map key; see `identity_key`
/// for that.
impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Version::Unpaired(a), Version::Unpaired(b)) => a == b,
            (Version::Revision(a), Version::Revision(b)) => a == b,
            (
                Version::Paired { underlying: ua, revision: ra },
                Version::Paired { underlying: ub, revision: rb },
            ) => ua == ub || ra == rb,
            (Version::Paired { underlying, .. }, Version::Unpaired(u))
            | (Version::Unpaired(u), Version::Paired { underlying, .. }) => underlying == u,
            (Version::Paired { revision, .. }, Version::Revision(r))
            | (Version::Revision(r), Version::Paired { revision, .. }) => revision == r,
            _ => false,
        }
    }
}

/// Total order across classes (semver > tag > branch > revision) used only
/// by [`order_candidates`] for deterministic solver iteration. Deliberately
/// independent of [`PartialEq`] above.
impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank = self.class_rank().cmp(&other.class_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self.underlying(), other.underlying()) {
            (Some(Underlying::Semver(a)), Some(Underlying::Semver(b))) => {
                // Descending: newest first. Pre-releases sort after all
                // full releases within the class (§4.1 ordering rule).
                let a_pre = !a.pre.is_empty();
                let b_pre = !b.pre.is_empty();
                match (a_pre, b_pre) {
                    (false, true) => Ordering::Less,
                    (true, false) => Ordering::Greater,
                    _ => b.cmp(a),
                }
            }
            (Some(Underlying::Tag(a)), Some(Underlying::Tag(b))) => b.cmp(a),
            (Some(Underlying::Branch(a)), Some(Underlying::Branch(b))) => a.cmp(b),
            (None, None) => self.revision_str().cmp(&other.revision_str()),
            _ => Ordering::Equal,
        }
    }
}

/// §4.1 `ordering`: the solver's canonical candidate preference.
pub fn order_candidates(mut versions: Vec<Version>) -> Vec<Version> {
    versions.sort();
    versions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recognizes_semver_with_v_prefix() {
        let v = Version::parse("v1.2.3");
        assert_eq!(v.semver().unwrap().to_string(), "1.2.3");
    }

    #[test]
    fn parse_recognizes_revision() {
        let v = Version::parse("a94a8fe5ccb19ba61c4c0873d391e987982fbbd3");
        assert!(matches!(v, Version::Revision(_)));
    }

    #[test]
    fn parse_falls_back_to_tag() {
        let v = Version::parse("release-candidate");
        assert!(matches!(v, Version::Unpaired(Underlying::Tag(_))));
    }

    #[test]
    fn paired_equality_matches_either_side() {
        let paired = Version::parse("v1.0.0").pair("deadbeef");
        assert_eq!(paired, Version::parse("v1.0.0"));
        assert_eq!(paired, Version::revision("deadbeef"));
        assert_ne!(paired, Version::parse("v2.0.0"));
    }

    #[test]
    fn ordering_ranks_semver_above_tag_above_branch_above_revision() {
        let mut versions = vec![
            Version::revision("a94a8fe5ccb19ba61c4c0873d391e987982fbbd3"),
            Version::branch("master"),
            Version::Unpaired(Underlying::Tag("banana".into())),
            Version::parse("v1.0.0"),
        ];
        versions = order_candidates(std::mem::take(&mut versions));
        assert!(matches!(versions[0], Version::Unpaired(Underlying::Semver(_))));
        assert!(matches!(versions[1], Version::Unpaired(Underlying::Tag(_))));
        assert!(matches!(versions[2], Version::Unpaired(Underlying::Branch(_))));
        assert!(matches!(versions[3], Version::Revision(_)));
    }

    #[test]
    fn ordering_prefers_higher_semver_with_prereleases_last() {
        let mut versions = vec![
            Version::parse("v1.2.0"),
            Version::parse("v2.0.0-alpha"),
            Version::parse("v1.3.0"),
            Version::parse("v2.0.0"),
        ];
        versions = order_candidates(std::mem::take(&mut versions));
        let strs: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(strs, vec!["v2.0.0", "v1.3.0", "v1.2.0", "v2.0.0-alpha"]);
    }
}
