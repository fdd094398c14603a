use thiserror::Error;

use crate::types::{FieldScope, FieldType};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VcfError>;

/// Everything that can go wrong while streaming a VCF file.
#[derive(Debug, Error)]
pub enum VcfError {
    /// The first non-empty line of the input is not a header line.
    #[error("This does not appear to be a VCF file (first line: {line:?})")]
    Filetype { line: String },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Variant(#[from] VariantError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not open input: {0}")]
    Open(#[from] niffler::Error),

    /// The stream hit a fatal error earlier and cannot be resumed.
    #[error("The stream was aborted by an earlier error")]
    Aborted,
}

/// Structural problems with the header or with a body line. Fatal for the stream.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Unexpected contig {contig} found in variant data")]
    UndeclaredContig { contig: String },

    #[error("The {scope} field {field} found in variant data was not declared in the header")]
    UndeclaredField { scope: FieldScope, field: String },

    #[error("Expected at least {expected} tab-separated columns, found {found}")]
    MissingColumns { expected: usize, found: usize },

    #[error("Malformed header line {line}: {reason}")]
    MalformedHeader { line: usize, reason: String },
}

/// A record that cannot be constructed. Only the offending line is lost.
#[derive(Debug, Error)]
pub enum VariantError {
    #[error("Variant position {position} is nonsensical given contig {contig} of length {length}")]
    BeyondContig {
        contig: String,
        position: u64,
        length: u64,
    },

    #[error("Variant position {position} on contig {contig} is negative")]
    NegativePosition { contig: String, position: i64 },

    #[error("Variant position {position} on contig {contig} is out of range")]
    Unrepresentable { contig: String, position: String },
}

/// Raised while registering a filter against the header schemas.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("The {scope} field {field} was not found in the VCF header")]
    UnknownField { scope: FieldScope, field: String },

    #[error("The {scope} field {field} is of type {found}, expected {expected}")]
    IncompatibleType {
        scope: FieldScope,
        field: String,
        found: FieldType,
        expected: String,
    },
}
