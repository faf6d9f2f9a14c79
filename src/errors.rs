//! Structured error types for the core, plus the CLI-boundary macros.
//!
//! Internal components return [`VendorlockError`] so callers can match on
//! variant; the CLI boundary wraps everything in `anyhow::Error` instead.

use thiserror::Error;

use crate::project::ProjectRoot;
use crate::version::Constraint;

pub type Result<T> = std::result::Result<T, VendorlockError>;

/// One variant per error kind in the error-handling design.
#[derive(Debug, Error)]
pub enum VendorlockError {
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    /// Never propagated past the loader: a malformed lock is downgraded to
    /// "no prior lock exists" by whoever calls [`crate::lock::Lock::load`].
    #[error("malformed lock: {0}")]
    MalformedLock(String),

    #[error("no version of {root} satisfies every constraint imposed on it: {detail}")]
    UnresolvableConflict {
        root: ProjectRoot,
        /// The constraints that could not be simultaneously satisfied, paired
        /// with the root that imposed each one.
        constraints: Vec<(ProjectRoot, Constraint)>,
        detail: String,
    },

    #[error("could not reach source for {root}: {detail}")]
    MissingSource { root: ProjectRoot, detail: String },

    /// Surfaced as a warning; the offending package contributes no imports.
    #[error("analyzer could not fully read {package}: {detail}")]
    AnalyzerIncomplete { package: String, detail: String },

    #[error("write failed: {0}")]
    WriteFailure(String),

    /// Non-fatal: callers treat this as "re-solve", not as a hard error.
    #[error("digest mismatch: stored {stored} computed {computed}")]
    DigestMismatch { stored: String, computed: String },
}

impl VendorlockError {
    pub fn write_failure(err: impl std::fmt::Display) -> Self {
        VendorlockError::WriteFailure(err.to_string())
    }
}

impl From<std::io::Error> for VendorlockError {
    fn from(err: std::io::Error) -> Self {
        VendorlockError::WriteFailure(err.to_string())
    }
}

/// Emits a green status line to stderr, used for normal solve/vendor progress.
#[macro_export]
macro_rules! vendorlock_info {
    ($e:expr) => {{
        use nu_ansi_term::Color::Green;
        eprintln!("{}", Green.paint($e));
    }};
    ($fmt:expr, $( $arg:tt)+) => {{
        use nu_ansi_term::Color::Green;
        eprintln!("{}", Green.paint(format!($fmt, $($arg)+)));
    }};
}

/// Emits an orange warning line, used for `AnalyzerIncomplete` and dropped
/// locked-hints.
#[macro_export]
macro_rules! vendorlock_warn {
    ($e:expr) => {{
        use nu_ansi_term::Color::Rgb;
        eprintln!("{}", Rgb(255, 165, 0).bold().paint($e));
    }};
    ($fmt:expr, $( $arg:tt)+) => {{
        use nu_ansi_term::Color::Rgb;
        eprintln!("{}", Rgb(255, 165, 0).bold().paint(format!($fmt, $($arg)+)));
    }};
}
