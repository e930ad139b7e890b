use thiserror::Error;

use crate::geom::ShapeKind;

pub mod layout;
pub mod sequence;

/// Errors that can occur while encoding or decoding geometry records
#[derive(Error, Debug)]
pub enum CodecError {
    /// Measure values without elevation values is not a representable
    /// dimension combination in this format
    #[error("invalid dimension configuration: measures require elevation")]
    InvalidConfiguration,

    /// Ordinate index outside of 0..=3
    #[error("ordinate index {0} out of range")]
    OrdinateOutOfRange(usize),

    /// Malformed `from`/`to` pair in a range copy
    #[error("invalid coordinate range {from}..{to}")]
    InvalidRange { from: usize, to: usize },

    /// Attempt to mutate a buffer-backed sequence
    #[error("buffer backed coordinate sequences are read only")]
    UnsupportedMutation,

    /// Handler invoked against a geometry it does not support
    #[error("geometry does not match shape kind {0}")]
    InvalidShapeKind(ShapeKind),

    /// Numeric shape kind code not defined by the format
    #[error("unknown shape kind code {0}")]
    UnknownShapeCode(i32),

    /// Record buffer ends before the declared contents
    #[error("record truncated: {needed} more bytes expected")]
    Truncated { needed: usize },

    /// Record contents that cannot be produced by a conforming writer
    #[error("malformed record: {0}")]
    Malformed(&'static str),

    /// The measure range of a record is the min/max over its measure values
    /// and is undefined for a geometry without points
    #[error("cannot compute the measure range of an empty geometry")]
    EmptyMeasureRange,
}
