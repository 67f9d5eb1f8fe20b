//! Error types for MEI conversion.
//!
//! Every failure is fatal: conversion either completes or returns one of
//! these, naming the offending element. Degraded-but-usable conditions
//! (a tie with a missing endpoint, say) are logged instead.

use thiserror::Error;

/// Top-level conversion error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    /// Input is not well-formed XML
    #[error("XML parse error: {0}")]
    InvalidXml(String),

    /// Element the converter does not handle in this position
    #[error("unsupported element <{element}> inside <{parent}>")]
    UnsupportedElement { element: String, parent: String },

    /// Mandatory attribute missing (note without pname, hairpin without form, ...)
    #[error("<{element}> is missing mandatory attribute @{attribute}")]
    MissingAttribute { element: String, attribute: String },

    /// Pointer-style link whose target event does not exist
    #[error("<{element}>: reference '{reference}' could not be resolved")]
    UnresolvedReference { element: String, reference: String },

    /// Value with no notation counterpart (duration, clef, accidental, ...)
    #[error("unsupported {kind} '{value}'")]
    UnsupportedValue { kind: &'static str, value: String },

    /// Chord members imply different durations and the chord has no @dur
    #[error("chord '{chord}' has members with different durations and no @dur")]
    AmbiguousChordDuration { chord: String },

    /// Cross-staff note naming a staff absent from the current measure
    #[error("staff {staff} referenced by '{element}' not found in measure {measure}")]
    StaffNotFound { element: String, staff: u32, measure: u32 },

    /// Options could not be loaded
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Input file could not be read
    #[error("cannot read '{path}': {message}")]
    Io { path: String, message: String },
}

impl ConvertError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            ConvertError::InvalidXml(_) => "invalid-xml",
            ConvertError::UnsupportedElement { .. } => "unsupported-element",
            ConvertError::MissingAttribute { .. } => "missing-attribute",
            ConvertError::UnresolvedReference { .. } => "unresolved-reference",
            ConvertError::UnsupportedValue { .. } => "unsupported-value",
            ConvertError::AmbiguousChordDuration { .. } => "ambiguous-chord-duration",
            ConvertError::StaffNotFound { .. } => "staff-not-found",
            ConvertError::InvalidOptions(_) => "invalid-options",
            ConvertError::Io { .. } => "io",
        }
    }

    pub(crate) fn unsupported(element: &str, parent: &str) -> Self {
        ConvertError::UnsupportedElement {
            element: element.to_string(),
            parent: parent.to_string(),
        }
    }

    pub(crate) fn missing(element: &str, attribute: &str) -> Self {
        ConvertError::MissingAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn value(kind: &'static str, value: &str) -> Self {
        ConvertError::UnsupportedValue {
            kind,
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_messages() {
        let err = ConvertError::missing("hairpin", "form");
        assert_eq!(err.code(), "missing-attribute");
        assert_eq!(err.to_string(), "<hairpin> is missing mandatory attribute @form");

        let err = ConvertError::value("duration", "128");
        assert_eq!(err.code(), "unsupported-value");
        assert_eq!(err.to_string(), "unsupported duration '128'");
    }
}
