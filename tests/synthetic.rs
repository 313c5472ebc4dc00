//! # Synthetic stereo pair tests
//!
//! End-to-end checks of the matcher on deterministic textured pairs where the true disparity
//! is known exactly: the right view samples the same noise texture a fixed number of columns
//! to the right of the left view.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use cv_sgm::hirschmuller::{CensusSize, Hirschmuller, Params};
use cv_sgm::prelude::*;
use image::imageops::crop_imm;
use image::GrayImage;
use imageproc::noise::gaussian_noise;

// -----------------------------------------------------------------------------------------------
// HELPERS
// -----------------------------------------------------------------------------------------------

/// Build a stereo pair with uniform integer disparity `shift` from one seeded noise texture.
fn shifted_pair(width: u32, height: u32, shift: u32, seed: u64) -> (GrayImage, GrayImage) {
    let wide = gaussian_noise(
        &GrayImage::new(width + shift, height),
        128.0,
        40.0,
        seed
    );

    let left = crop_imm(&wide, 0, 0, width, height).to_image();
    let right = crop_imm(&wide, shift, 0, width, height).to_image();

    (left, right)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[test]
fn recovers_a_uniform_shift_within_half_a_pixel() {
    let (width, height) = (48u32, 32u32);
    let shift = 5u32;
    let (left, right) = shifted_pair(width, height, shift, 71);

    let params = Params {
        min_disparity: 0,
        max_disparity: 16,
        min_speckle_area: 50,
        ..Params::default()
    };
    let mut engine = Hirschmuller::new(height as usize, width as usize, params).unwrap();

    let map = engine.compute(&left, &right).unwrap();

    assert_eq!(map.data().len(), (width * height) as usize);

    // Stay clear of the census margins and of columns whose match leaves the right view.
    for y in 4..height as usize - 4 {
        for x in shift as usize + 4..width as usize - 4 {
            let disp = map.get(x, y);
            assert!(
                disp.map_or(false, |d| (d - shift as f32).abs() <= 0.5),
                "pixel ({}, {}) = {:?}, expected about {}",
                x,
                y,
                disp,
                shift
            );
        }
    }
}

#[test]
fn recovers_the_shift_with_the_large_census_window_and_four_paths() {
    let (width, height) = (48u32, 32u32);
    let shift = 5u32;
    let (left, right) = shifted_pair(width, height, shift, 913);

    let params = Params {
        num_paths: 4,
        min_disparity: 0,
        max_disparity: 16,
        census_size: CensusSize::Census9x7,
        min_speckle_area: 50,
        ..Params::default()
    };
    let mut engine = Hirschmuller::new(height as usize, width as usize, params).unwrap();

    let map = engine.compute(&left, &right).unwrap();

    // The 9x7 window widens the undefined border to 4 rows and 3 columns.
    for y in 6..height as usize - 6 {
        for x in shift as usize + 5..width as usize - 5 {
            let disp = map.get(x, y);
            assert!(
                disp.map_or(false, |d| (d - shift as f32).abs() <= 0.5),
                "pixel ({}, {}) = {:?}, expected about {}",
                x,
                y,
                disp,
                shift
            );
        }
    }
}

#[test]
fn nine_by_nine_scenario_recovers_disparity_three_at_the_centre() {
    // 9x9 pair, right view shifted by exactly 3 columns, candidate range [0, 8), 5x5 census,
    // consistency check, speckle removal and hole filling all enabled. The centre pixel sits
    // clear of the 2 pixel descriptor margin and must come out at about 3.0.
    let (left, right) = shifted_pair(9, 9, 3, 42);

    let params = Params {
        min_disparity: 0,
        max_disparity: 8,
        check_uniqueness: false,
        min_speckle_area: 5,
        ..Params::default()
    };
    let mut engine = Hirschmuller::new(9, 9, params).unwrap();

    let map = engine.compute(&left, &right).unwrap();

    assert_eq!(map.data().len(), 81);
    let centre = map.get(4, 4);
    assert!(
        centre.map_or(false, |d| (d - 3.0).abs() <= 0.5),
        "centre pixel = {:?}, expected about 3.0",
        centre
    );
}

#[test]
fn output_always_has_one_entry_per_pixel() {
    let (width, height) = (20u32, 16u32);
    let (left, right) = shifted_pair(width, height, 2, 7);

    for &census_size in &[CensusSize::Census5x5, CensusSize::Census9x7] {
        for &num_paths in &[4u8, 8u8] {
            let params = Params {
                num_paths,
                min_disparity: 0,
                max_disparity: 8,
                census_size,
                ..Params::default()
            };
            let mut engine = Hirschmuller::new(height as usize, width as usize, params).unwrap();

            let map = engine.compute(&left, &right).unwrap();

            assert_eq!(map.data().len(), (width * height) as usize);
            assert!(map
                .data()
                .iter()
                .flatten()
                .all(|d| d.is_finite()));
        }
    }
}

#[test]
fn engine_reuse_and_reset_produce_consistent_results() {
    let (width, height) = (32u32, 24u32);
    let shift = 4u32;
    let (left, right) = shifted_pair(width, height, shift, 333);

    let params = Params {
        min_disparity: 0,
        max_disparity: 16,
        min_speckle_area: 50,
        ..Params::default()
    };
    let mut engine = Hirschmuller::new(height as usize, width as usize, params.clone()).unwrap();

    let first = engine.compute(&left, &right).unwrap();
    let second = engine.compute(&left, &right).unwrap();
    assert_eq!(first.data(), second.data());

    // Resizing through reset makes the engine reject the old frame size and accept the new.
    engine.reset(12, 12, params).unwrap();
    assert!(engine.compute(&left, &right).is_err());

    let (small_left, small_right) = shifted_pair(12, 12, 4, 333);
    assert!(engine.compute(&small_left, &small_right).is_ok());
}
