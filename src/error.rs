//! Typed error taxonomy for dataflow construction and execution.
//!
//! Every failure mode the core can produce maps to exactly one variant here;
//! see each variant's doc comment for when it is raised. Builder methods
//! return `Result<_, QueryosityError>` directly; callers embedding queryosity
//! inside a larger `anyhow`-based program can rely on the blanket
//! `std::error::Error` impl (via `thiserror`) to convert with `?`.

use thiserror::Error;

/// The error taxonomy for the core dataflow engine.
#[derive(Debug, Error)]
pub enum QueryosityError {
    /// A malformed graph: mixing incompatible types in an expression,
    /// setting a variation on a node that cannot carry one, or otherwise
    /// violating a structural invariant caught at build time.
    #[error("construction error: {0}")]
    Construction(String),

    /// A source refused an `open_column` request because it knows no
    /// column under that name.
    #[error("missing column `{name}` on source")]
    MissingColumn {
        /// The column name that was requested.
        name: String,
    },

    /// A source refused an `open_column` request because the requested
    /// type does not match the column's declared type.
    #[error("type mismatch opening column `{name}`: expected {expected}")]
    TypeMismatch {
        /// The column name that was requested.
        name: String,
        /// The type name the caller asked for.
        expected: &'static str,
    },

    /// No loaded source reported a non-empty partition, so the processor
    /// has no way to determine how many entries to run.
    #[error("no partition: no loaded source reports a non-empty partition")]
    NoPartition,

    /// Sources disagree on the dataset's total span during partition
    /// alignment: every loaded source with a non-empty partition must agree
    /// on the total entry count before slots can be assigned.
    #[error("partition alignment failed: sources report unequal total spans ({0} vs {1})")]
    UnalignedPartitions(u64, u64),

    /// A user-supplied expression, conversion, or reader panicked or
    /// returned an error while computing a column's value for an entry.
    #[error("expression error: {0}")]
    Expression(String),

    /// A variation name was looked up on a query result carrier that has
    /// no variation of that name.
    #[error("unknown variation `{0}`")]
    UnknownVariation(String),
}

/// Convenience alias used throughout the crate's public builder surface.
pub type Result<T> = std::result::Result<T, QueryosityError>;
