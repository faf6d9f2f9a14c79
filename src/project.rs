//! Project identity (§3 `ProjectIdentifier`, `ProjectRoot`, `Source`).

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The canonical import-path prefix a VCS repository claims.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectRoot(pub String);

impl fmt::Display for ProjectRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProjectRoot {
    fn from(s: &str) -> Self {
        ProjectRoot(s.to_string())
    }
}

impl From<String> for ProjectRoot {
    fn from(s: String) -> Self {
        ProjectRoot(s)
    }
}

/// An override URL for where to actually fetch a project root from (a
/// fork, a private mirror). Two identifiers refer to "the same project" iff
/// their roots are equal — `Source` is only an alias for fetching.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Source(pub String);

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `ProjectRoot` plus an optional `Source` alias. Ordering is
/// lexicographic on root, ties broken by source (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectIdentifier {
    pub root: ProjectRoot,
    pub source: Option<Source>,
}

impl ProjectIdentifier {
    pub fn new(root: impl Into<ProjectRoot>) -> Self {
        ProjectIdentifier {
            root: root.into(),
            source: None,
        }
    }

    pub fn with_source(root: impl Into<ProjectRoot>, source: impl Into<Source>) -> Self {
        ProjectIdentifier {
            root: root.into(),
            source: Some(source.into()),
        }
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        Source(s.to_string())
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Source(s)
    }
}

impl fmt::Display for ProjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{} ({src})", self.root),
            None => write!(f, "{}", self.root),
        }
    }
}

impl PartialOrd for ProjectIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProjectIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.root.cmp(&other.root).then_with(|| self.source.cmp(&other.source))
    }
}
