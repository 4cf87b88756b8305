//! Diagnostic types for documentation parsing.
//!
//! Diagnostics are the non-fatal outcomes of a compilation run. A malformed block skipped under
//! [`ParsePolicy::SkipMalformed`](super::ParsePolicy::SkipMalformed) is recorded here instead of
//! failing the corpus, so a caller validating full coverage can still inspect what was lost.

use super::BlockKind;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseDiagnostic {
    /// A block that matched no grammar alternative and was left out of its interface.
    Skipped {
        /// Source file name
        source: String,
        /// Interface the block belonged to
        interface: String,
        kind: BlockKind,
        /// Line of the block's signature
        line: usize,
        reason: String,
    },

    /// A warning about the corpus (e.g. a unit that could not be split and was dropped)
    Warning(String),

    /// An informational message about the run
    Info(String),
}

impl ParseDiagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning(message.into())
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::Info(message.into())
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// `(interface, kind, line)` of a skipped block
    pub fn as_skipped(&self) -> Option<(&str, BlockKind, usize)> {
        match self {
            Self::Skipped {
                interface,
                kind,
                line,
                ..
            } => Some((interface.as_str(), *kind, *line)),
            _ => None,
        }
    }
}

impl Display for ParseDiagnostic {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::Skipped {
                source,
                interface,
                kind,
                line,
                reason,
            } => write!(
                f,
                "{source}:{line}: skipped {kind} block of {interface}: {reason}"
            ),
            Self::Warning(msg) => write!(f, "warning: {msg}"),
            Self::Info(msg) => write!(f, "info: {msg}"),
        }
    }
}
