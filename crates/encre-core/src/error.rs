//! Error types for the conversion core.

use thiserror::Error;

/// Errors surfaced by the conversion pipeline and the encre file codec.
///
/// Pipeline stages never retry; errors propagate to the top-level entry
/// points (`convert`, `read_encre_file`, `write_encre_file`), which log a
/// one-line diagnostic and hand the error to the caller.
#[derive(Debug, Error)]
pub enum EncreError {
    /// Caller-supplied buffers or dimensions are unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Convex-hull construction failed or produced a flat hull.
    #[error("palette gamut is degenerate (reference colors are coplanar)")]
    DegenerateGamut,

    /// A 3-D gamut needs at least 4 reference colors.
    #[error("palette needs at least 4 colors, got {count}")]
    TooFewColors {
        /// Number of colors that were provided
        count: usize,
    },

    /// A quantity exceeds what the file format header can represent.
    #[error("{what} {value} exceeds the file format limit of {limit}")]
    PaletteTooLarge {
        /// Which quantity overflowed ("palette size", "width", "height")
        what: &'static str,
        /// The offending value
        value: usize,
        /// The format limit
        limit: usize,
    },

    /// The external raster loader could not decode the input (passed through).
    #[error("raster loader failed: {0}")]
    LoaderFailure(String),

    /// Read-time magic, size or format mismatch.
    #[error("malformed encre file: {0}")]
    MalformedFile(String),

    /// Read-time mismatch with the caller's expected geometry.
    #[error("incompatible encre file: {0}")]
    IncompatibleFile(String),

    /// Underlying read/write failure, surfaced verbatim.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
