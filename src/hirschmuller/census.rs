//! # Census descriptors
//!
//! This module provides the census transform used as the matching feature: a per-pixel bit
//! pattern encoding which window neighbours are darker than the centre pixel. Two window sizes
//! are supported, 5x5 (24 effective bits in a `u32`) and 9x7 (63 bits in a `u64`). Matching
//! costs between descriptors are Hamming distances.

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// A fixed-width census code.
pub(crate) trait CensusWord: Copy + Send + Sync {
    /// Number of differing bits between the two codes.
    fn hamming(self, other: Self) -> u8;
}

impl CensusWord for u32 {
    fn hamming(self, other: Self) -> u8 {
        (self ^ other).count_ones() as u8
    }
}

impl CensusWord for u64 {
    fn hamming(self, other: Self) -> u8 {
        (self ^ other).count_ones() as u8
    }
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Census codes of both views, in the width selected at engine initialisation.
///
/// The variant is fixed once per engine instance so every later stage dispatches through a
/// single typed code path.
pub(crate) enum CensusPair {
    Bits32 {
        left: Vec<u32>,
        right: Vec<u32>
    },
    Bits64 {
        left: Vec<u64>,
        right: Vec<u64>
    }
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// 5x5 census transform.
///
/// Border pixels inside the 2 pixel margin keep an all-zero code. A window that does not fit
/// the image leaves the whole field untouched.
pub(crate) fn census_transform_5x5(
    source: &[u8],
    census: &mut [u32],
    height: usize,
    width: usize
) {
    if width <= 5 || height <= 5 {
        return;
    }

    for i in 2..height - 2 {
        for j in 2..width - 2 {
            let centre = source[i * width + j];

            // One bit per window position, most significant first. The centre comparison is
            // always zero, which leaves 24 effective bits.
            let mut census_val = 0u32;
            for r in i - 2..=i + 2 {
                for c in j - 2..=j + 2 {
                    census_val <<= 1;
                    if source[r * width + c] < centre {
                        census_val += 1;
                    }
                }
            }

            census[i * width + j] = census_val;
        }
    }
}

/// 9x7 census transform (9 rows by 7 columns), 63 bits in a `u64`.
pub(crate) fn census_transform_9x7(
    source: &[u8],
    census: &mut [u64],
    height: usize,
    width: usize
) {
    if width <= 9 || height <= 7 {
        return;
    }

    for i in 4..height - 4 {
        for j in 3..width - 3 {
            let centre = source[i * width + j];

            let mut census_val = 0u64;
            for r in i - 4..=i + 4 {
                for c in j - 3..=j + 3 {
                    census_val <<= 1;
                    if source[r * width + c] < centre {
                        census_val += 1;
                    }
                }
            }

            census[i * width + j] = census_val;
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
