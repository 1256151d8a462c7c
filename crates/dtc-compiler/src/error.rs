use std::path::PathBuf;

/// Errors from compiling a PMML document or reading/writing a binary artifact.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Returned when the PMML input file cannot be read.
    #[error("failed to read model description from {path}")]
    ReadDocument {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the input is not well-formed XML.
    #[error("malformed XML at byte offset {offset}")]
    MalformedXml {
        /// Byte offset the parser had reached when it failed.
        offset: u64,
        /// The underlying XML error.
        source: quick_xml::Error,
    },

    /// Returned when metadata is missing or malformed, or a leaf outcome is not registered.
    #[error("invalid model schema: {reason}")]
    InvalidSchema {
        /// Human-readable description of what is wrong with the document.
        reason: String,
    },

    /// Returned when a split does not have exactly two child nodes.
    #[error("only binary splits are supported, found a node with {children} children")]
    UnsupportedTreeShape {
        /// Number of child `Node` elements found.
        children: usize,
    },

    /// Returned when a predicate references a field absent from the data dictionary.
    #[error("predicate references undeclared feature \"{name}\"")]
    FeatureNotFound {
        /// The normalized feature name that failed to resolve.
        name: String,
    },

    /// Returned when a predicate operator has no runtime code.
    #[error("unsupported predicate operator \"{operator}\"")]
    UnsupportedOperator {
        /// The operator name found in the document.
        operator: String,
    },

    /// Returned when a count does not fit the width of its field in the binary layout.
    #[error("{what} count {count} exceeds the artifact limit of {max}")]
    CapacityExceeded {
        /// Which quantity overflowed (e.g. "node", "feature").
        what: &'static str,
        /// The offending count.
        count: usize,
        /// The largest count the layout can hold.
        max: usize,
    },

    /// Returned when the artifact cannot be persisted.
    #[error("failed to write artifact to {path}")]
    WriteFailed {
        /// Destination path of the artifact.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an artifact file cannot be read.
    #[error("failed to read artifact from {path}")]
    ReadArtifact {
        /// Path to the artifact that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when artifact bytes do not follow the binary layout.
    #[error("malformed artifact: {reason}")]
    MalformedArtifact {
        /// Human-readable description of the layout violation.
        reason: String,
    },
}

impl CompileError {
    pub(crate) fn invalid_schema(reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_artifact(reason: impl Into<String>) -> Self {
        Self::MalformedArtifact {
            reason: reason.into(),
        }
    }
}
