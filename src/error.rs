use std::{fmt, io, path::PathBuf};

use regex::Error as RegexError;
use serde_json::Error as JsonError;
use thiserror::Error;

use crate::{parser::BlockKind, variant::VariantKind};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocbindError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Assembly error: {0}")]
    Assemble(#[from] AssembleError),
    #[error("Generation error: {0}")]
    Generate(#[from] GenerateError),
    #[error("Marshalling error: {0}")]
    Marshal(#[from] MarshalError),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Failure to recognize a block or a doc unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("No {kind} found in block starting at line {line}: {snippet:?}")]
    NoMatch {
        kind: BlockKind,
        line: usize,
        snippet: String,
    },
    #[error("Malformed doc unit '{unit}' in {source_name}: {reason}")]
    MalformedUnit {
        source_name: String,
        unit: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("Interface '{name}' declared twice (first in {first}, again in {second})")]
    DuplicateInterface {
        name: String,
        first: String,
        second: String,
    },
    #[error("Property '{property}' declared twice in interface '{interface}'")]
    DuplicateProperty { interface: String, property: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("Cannot render interface '{interface}': {reason}")]
    Render { interface: String, reason: String },
    #[error("Interfaces '{first}' and '{second}' both map to output {path:?}")]
    OutputCollision {
        path: PathBuf,
        first: String,
        second: String,
    },
    #[error("Formatting failed: {0}")]
    Format(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    #[error("cannot convert {actual} value to {expected}")]
    Conversion {
        expected: &'static str,
        actual: VariantKind,
    },
    #[error("field '{field}' expects {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: VariantKind,
    },
    #[error("invalid directive on field '{field}': {reason}")]
    Directive { field: String, reason: String },
    #[error("'{method}' returned {received} value(s), return #{index} is missing")]
    MissingReturn {
        method: String,
        index: usize,
        received: usize,
    },
}

impl MarshalError {
    /// Attach a field name to a bare conversion failure.
    pub fn for_field(self, field: &str) -> MarshalError {
        match self {
            MarshalError::Conversion { expected, actual } => MarshalError::TypeMismatch {
                field: field.to_string(),
                expected,
                actual,
            },
            other => other,
        }
    }
}

impl From<toml::de::Error> for DocbindError {
    fn from(src: toml::de::Error) -> DocbindError {
        DocbindError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for DocbindError {
    fn from(src: toml::ser::Error) -> DocbindError {
        DocbindError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for DocbindError {
    fn from(src: JsonError) -> DocbindError {
        DocbindError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for DocbindError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => DocbindError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => DocbindError::PermissionDenied,
            _ => DocbindError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<walkdir::Error> for DocbindError {
    fn from(x: walkdir::Error) -> Self {
        match x.into_io_error() {
            Some(io_error) => io_error.into(),
            None => DocbindError::Io("directory walk hit a filesystem loop".to_string()),
        }
    }
}

impl From<fmt::Error> for GenerateError {
    fn from(x: fmt::Error) -> Self {
        GenerateError::Format(format!("{x}"))
    }
}

impl From<fmt::Error> for DocbindError {
    fn from(x: fmt::Error) -> Self {
        DocbindError::Generate(x.into())
    }
}

impl From<RegexError> for DocbindError {
    fn from(x: RegexError) -> Self {
        DocbindError::Serialization(format!("Regex parse failed: {x}"))
    }
}
