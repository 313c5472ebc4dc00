//! # Disparity Computation
//!
//! This crate provides dense disparity map computation for stereo computer vision using
//! Hirschmuller's Semi-Global Matching method.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

mod disparity;
mod error;
pub mod hirschmuller;

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub mod prelude {
    pub use crate::disparity::{DisparityAlgorithm, DisparityMap};
    pub use crate::error::{Error, Result};
}
