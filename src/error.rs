//! # Error standards
//!
//! This module provides a standardised error enum and result type for this crate.

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Standard result type used in the disparity crate.
pub type Result<T> = std::result::Result<T, Error>;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Image dimensions must be non-zero (got {height}x{width})")]
    ZeroImageDimensions {
        height: usize,
        width: usize
    },

    #[error("Disparity range must be positive (min_disparity {min}, max_disparity {max})")]
    InvalidDisparityRange {
        min: i32,
        max: i32
    },

    #[error("Unsupported number of aggregation paths {0}, expected 4 or 8")]
    InvalidPathCount(u8),

    #[error(
        "Input image is {got_width}x{got_height} but the engine was initialised for \
         {want_width}x{want_height}"
    )]
    ImageSizeMismatch {
        got_width: usize,
        got_height: usize,
        want_width: usize,
        want_height: usize
    }
}
