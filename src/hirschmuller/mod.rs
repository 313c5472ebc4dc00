//! # Hirschmuller disparity computation
//!
//! This module provides an implementation of Hirschmuller's Semi-Global Matching algorithm from
//! ("Stereo Processing by Semiglobal Matching and Mutual Information")[https://ieeexplore.ieee.org/document/4359315],
//! using a census transform and Hamming distance as the matching cost in place of mutual
//! information.
//!
//! The engine is sized once for an image format and reused across frames: all cost volumes and
//! working maps are allocated by [`Hirschmuller::new`] and only their contents change per
//! [`DisparityAlgorithm::compute`] call.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

mod aggregation;
mod census;
mod postprocess;

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::time::Instant;

use image::GrayImage;
use log::info;
use rayon::prelude::*;
use serde::Deserialize;

use crate::disparity::{DisparityAlgorithm, DisparityMap};
use crate::error::*;

use self::census::{CensusPair, CensusWord};

#[cfg(feature = "statistics")]
use plotters::prelude::*;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Neutral cost assigned to candidates whose matching column falls outside the secondary view.
const OUT_OF_VIEW_COST: u8 = u8::MAX / 2;

/// Disparity difference below which two pixels belong to the same speckle region.
const SPECKLE_DIFF_INSAME: f32 = 1.0;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Census window size, fixing the descriptor width for the lifetime of the engine.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CensusSize {
    Census5x5,
    Census9x7
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Semi-Global Matching engine.
pub struct Hirschmuller {
    params: Params,
    height: usize,
    width: usize,
    census: CensusPair,
    cost_init: Vec<u8>,
    cost_paths: Vec<Vec<u8>>,
    cost_aggr: Vec<u16>,
    left_disp: Vec<Option<f32>>,
    right_disp: Vec<Option<f32>>,
    occlusions: Vec<(usize, usize)>,
    mismatches: Vec<(usize, usize)>
}

#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Number of aggregation paths, 4 or 8.
    pub num_paths: u8,
    pub min_disparity: i32,
    /// Exclusive upper bound of the candidate range, must exceed `min_disparity`.
    pub max_disparity: i32,
    pub census_size: CensusSize,
    /// Reject pixels whose best cost is not clearly better than the runner-up.
    pub check_uniqueness: bool,
    pub uniqueness_ratio: f32,
    /// Cross-validate the left map against a right map derived from the same cost volume.
    pub check_lr: bool,
    pub lr_threshold: f32,
    pub remove_speckles: bool,
    pub min_speckle_area: usize,
    pub fill_holes: bool,
    /// Penalty for a one-level disparity change between path neighbours.
    pub p1: i32,
    /// Base penalty for larger changes, attenuated by the local intensity gradient.
    pub p2_init: i32
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Params {
            num_paths: 8,
            min_disparity: 0,
            max_disparity: 64,
            census_size: CensusSize::Census5x5,
            check_uniqueness: true,
            uniqueness_ratio: 0.95,
            check_lr: true,
            lr_threshold: 1.0,
            remove_speckles: true,
            min_speckle_area: 20,
            fill_holes: true,
            p1: 10,
            p2_init: 150
        }
    }
}

impl Hirschmuller {
    /// Create an engine for the given image dimensions, allocating all working buffers.
    pub fn new(height: usize, width: usize, params: Params) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(Error::ZeroImageDimensions { height, width });
        }
        if params.max_disparity <= params.min_disparity {
            return Err(Error::InvalidDisparityRange {
                min: params.min_disparity,
                max: params.max_disparity
            });
        }
        if params.num_paths != 4 && params.num_paths != 8 {
            return Err(Error::InvalidPathCount(params.num_paths));
        }

        let image_size = height * width;
        let disp_range = (params.max_disparity - params.min_disparity) as usize;
        let data_size = image_size * disp_range;

        let census = match params.census_size {
            CensusSize::Census5x5 => CensusPair::Bits32 {
                left: vec![0; image_size],
                right: vec![0; image_size]
            },
            CensusSize::Census9x7 => CensusPair::Bits64 {
                left: vec![0; image_size],
                right: vec![0; image_size]
            }
        };

        Ok(Hirschmuller {
            height,
            width,
            census,
            cost_init: vec![0; data_size],
            cost_paths: (0..params.num_paths).map(|_| vec![0; data_size]).collect(),
            cost_aggr: vec![0; data_size],
            left_disp: vec![None; image_size],
            right_disp: vec![None; image_size],
            occlusions: Vec::new(),
            mismatches: Vec::new(),
            params
        })
    }

    /// Release all buffers and reinitialise for new dimensions or parameters.
    ///
    /// On failure the previous state is left untouched and the engine stays usable.
    pub fn reset(&mut self, height: usize, width: usize, params: Params) -> Result<()> {
        *self = Self::new(height, width, params)?;
        Ok(())
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    fn disp_range(&self) -> usize {
        (self.params.max_disparity - self.params.min_disparity) as usize
    }

    /// Census transform of both views through the descriptor width fixed at initialisation.
    fn census_transform(&mut self, left_img: &[u8], right_img: &[u8]) {
        let (height, width) = (self.height, self.width);

        match &mut self.census {
            CensusPair::Bits32 { left, right } => {
                census::census_transform_5x5(left_img, left, height, width);
                census::census_transform_5x5(right_img, right, height, width);
            }
            CensusPair::Bits64 { left, right } => {
                census::census_transform_9x7(left_img, left, height, width);
                census::census_transform_9x7(right_img, right, height, width);
            }
        }
    }

    /// Initial per-candidate matching cost from descriptor Hamming distances.
    fn compute_cost(&mut self) {
        let (height, width) = (self.height, self.width);
        let (min_d, max_d) = (self.params.min_disparity, self.params.max_disparity);
        let cost_init = &mut self.cost_init;

        match &self.census {
            CensusPair::Bits32 { left, right } => {
                cost_volume(cost_init, left, right, height, width, min_d, max_d)
            }
            CensusPair::Bits64 { left, right } => {
                cost_volume(cost_init, left, right, height, width, min_d, max_d)
            }
        }
    }

    /// Run the configured directional sweeps and sum them into the combined volume.
    ///
    /// Each sweep writes its own per-direction buffer, so all of them run concurrently and
    /// join before the reduction.
    fn aggregate_costs(&mut self, img: &[u8]) {
        let height = self.height;
        let width = self.width;
        let min_d = self.params.min_disparity;
        let max_d = self.params.max_disparity;
        let p1 = self.params.p1;
        let p2_init = self.params.p2_init;

        let cost_init: &[u8] = &self.cost_init;
        let cost_paths = &mut self.cost_paths;
        let sweeps = &aggregation::SWEEPS[..cost_paths.len()];

        rayon::scope(|s| {
            for (path_buf, &(kind, forward)) in cost_paths.iter_mut().zip(sweeps.iter()) {
                s.spawn(move |_| {
                    aggregation::aggregate_path(
                        kind, forward, img, height, width, min_d, max_d, p1, p2_init,
                        cost_init, path_buf
                    )
                });
            }
        });

        let cost_paths = &self.cost_paths;
        self.cost_aggr
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, combined)| {
                *combined = cost_paths.iter().map(|path| path[i] as u16).sum();
            });
    }

    /// Winner-take-all selection with uniqueness check and sub-pixel refinement, left view.
    fn compute_disparity(&mut self) {
        let width = self.width;
        let disp_range = self.disp_range();
        let min_d = self.params.min_disparity;
        let max_d = self.params.max_disparity;
        let check_unique = self.params.check_uniqueness;
        let uniqueness_ratio = self.params.uniqueness_ratio;
        let cost_aggr: &[u16] = &self.cost_aggr;

        self.left_disp
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(i, disp_row)| {
                let mut cost_local = vec![0u16; disp_range];

                for (j, disp) in disp_row.iter_mut().enumerate() {
                    let base = (i * width + j) * disp_range;
                    let mut min_cost = u16::MAX;
                    let mut best_disparity = min_d;

                    for d_idx in 0..disp_range {
                        let cost = cost_aggr[base + d_idx];
                        cost_local[d_idx] = cost;
                        if cost < min_cost {
                            min_cost = cost;
                            best_disparity = min_d + d_idx as i32;
                        }
                    }

                    if check_unique
                        && !is_unique(&cost_local, min_cost, best_disparity, min_d, uniqueness_ratio)
                    {
                        *disp = None;
                        continue;
                    }

                    *disp = refine_subpixel(&cost_local, min_cost, best_disparity, min_d, max_d);
                }
            });
    }

    /// Winner-take-all selection for the right view.
    ///
    /// The right-view cost is read out of the already aggregated left volume through the
    /// identity `cost_right(x, d) = cost_left(x + d, d)`, so no second aggregation is needed.
    fn compute_disparity_right(&mut self) {
        let width = self.width;
        let disp_range = self.disp_range();
        let min_d = self.params.min_disparity;
        let max_d = self.params.max_disparity;
        let check_unique = self.params.check_uniqueness;
        let uniqueness_ratio = self.params.uniqueness_ratio;
        let cost_aggr: &[u16] = &self.cost_aggr;

        self.right_disp
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(i, disp_row)| {
                let mut cost_local = vec![0u16; disp_range];

                for (j, disp) in disp_row.iter_mut().enumerate() {
                    let mut min_cost = u16::MAX;
                    let mut best_disparity = min_d;

                    for d_idx in 0..disp_range {
                        let d = min_d + d_idx as i32;
                        let col_left = j as i32 + d;

                        if col_left >= 0 && col_left < width as i32 {
                            let cost =
                                cost_aggr[(i * width + col_left as usize) * disp_range + d_idx];
                            cost_local[d_idx] = cost;
                            if cost < min_cost {
                                min_cost = cost;
                                best_disparity = d;
                            }
                        }
                        else {
                            cost_local[d_idx] = u16::MAX;
                        }
                    }

                    // Every candidate can be out of view near the image edges.
                    if min_cost == u16::MAX {
                        *disp = None;
                        continue;
                    }

                    if check_unique
                        && !is_unique(&cost_local, min_cost, best_disparity, min_d, uniqueness_ratio)
                    {
                        *disp = None;
                        continue;
                    }

                    *disp = refine_subpixel(&cost_local, min_cost, best_disparity, min_d, max_d);
                }
            });
    }

    /// Cross-view consistency check.
    ///
    /// Invalidated pixels are classified as occlusion or mismatch by reprojecting through the
    /// right-view disparity; the sets feed hole filling.
    fn lr_check(&mut self) {
        let width = self.width;
        let height = self.height;
        let threshold = self.params.lr_threshold;

        let left_disp = &mut self.left_disp;
        let right_disp = &self.right_disp;
        let occlusions = &mut self.occlusions;
        let mismatches = &mut self.mismatches;
        occlusions.clear();
        mismatches.clear();

        for i in 0..height {
            for j in 0..width {
                let idx = i * width + j;

                let disp = match left_disp[idx] {
                    Some(d) => d,
                    None => {
                        mismatches.push((i, j));
                        continue;
                    }
                };

                // Matching pixel in the right view.
                let col_right = (j as f32 - disp + 0.5) as i32;
                if col_right < 0 || col_right >= width as i32 {
                    left_disp[idx] = None;
                    mismatches.push((i, j));
                    continue;
                }

                match right_disp[i * width + col_right as usize] {
                    Some(disp_r) if (disp - disp_r).abs() <= threshold => {}
                    Some(disp_r) => {
                        // Reproject through the right disparity: a larger disparity back on
                        // the left side means this pixel is behind it, hence occluded.
                        let col_rl = (col_right as f32 + disp_r + 0.5) as i32;
                        if col_rl > 0 && col_rl < width as i32 {
                            let occluded = left_disp[i * width + col_rl as usize]
                                .map_or(true, |disp_l| disp_l > disp);
                            if occluded {
                                occlusions.push((i, j));
                            }
                            else {
                                mismatches.push((i, j));
                            }
                        }
                        else {
                            mismatches.push((i, j));
                        }
                        left_disp[idx] = None;
                    }
                    None => {
                        left_disp[idx] = None;
                        mismatches.push((i, j));
                    }
                }
            }
        }
    }

    #[cfg(feature = "statistics")]
    fn plot_statistics(&self) {
        let min_d = self.params.min_disparity;
        let disp_range = self.disp_range();

        let mut counts = vec![0i32; disp_range];
        for disp in self.left_disp.iter().flatten() {
            let bin = (disp.round() as i32 - min_d).max(0).min(disp_range as i32 - 1);
            counts[bin as usize] += 1;
        }
        let max_count = counts.iter().cloned().max().unwrap_or(0).max(1);

        let series: Vec<(i32, i32)> = counts
            .iter()
            .enumerate()
            .map(|(d_idx, &n)| (min_d + d_idx as i32, n))
            .collect();

        let hist = BitMapBackend::new(
            "plots/hirschmuller/disp_histogram.png",
            (800, 600)
        ).into_drawing_area();
        hist.fill(&WHITE).unwrap();

        let mut chart = ChartBuilder::on(&hist)
            .caption("Valid disparity histogram", ("sans-serif", 20).into_font())
            .margin(5)
            .x_label_area_size(30)
            .y_label_area_size(30)
            .build_ranged(
                min_d..self.params.max_disparity,
                0..max_count
            ).unwrap();

        chart.configure_mesh().draw().unwrap();

        chart
            .draw_series(LineSeries::new(
                series,
                &RED
            )).unwrap()
            .label("Pixels per disparity")
            .legend(|(x, y)|
                PathElement::new(vec![(x, y), (x + 20, y)], &RED
            ));

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw().unwrap();

        println!("Stats plotting complete");
    }
}

impl DisparityAlgorithm for Hirschmuller {
    /// Compute the disparity map for the given rectified pair.
    fn compute(&mut self, left: &GrayImage, right: &GrayImage) -> Result<DisparityMap> {
        for img in &[left, right] {
            if img.width() as usize != self.width || img.height() as usize != self.height {
                return Err(Error::ImageSizeMismatch {
                    got_width: img.width() as usize,
                    got_height: img.height() as usize,
                    want_width: self.width,
                    want_height: self.height
                });
            }
        }

        let left_data: &[u8] = left.as_raw();
        let right_data: &[u8] = right.as_raw();

        let start = Instant::now();
        self.census_transform(left_data, right_data);
        self.compute_cost();
        info!("Cost computation took {:.3} s", start.elapsed().as_secs_f64());

        let start = Instant::now();
        self.aggregate_costs(left_data);
        info!("Cost aggregation took {:.3} s", start.elapsed().as_secs_f64());

        let start = Instant::now();
        self.compute_disparity();
        info!("Disparity computation took {:.3} s", start.elapsed().as_secs_f64());

        let start = Instant::now();
        if self.params.check_lr {
            self.compute_disparity_right();
            self.lr_check();
        }

        if self.params.remove_speckles {
            postprocess::remove_speckles(
                &mut self.left_disp,
                self.height,
                self.width,
                SPECKLE_DIFF_INSAME,
                self.params.min_speckle_area
            );
        }

        if self.params.fill_holes {
            postprocess::fill_holes(
                &mut self.left_disp,
                self.height,
                self.width,
                self.params.min_disparity,
                self.params.max_disparity,
                &self.occlusions,
                &self.mismatches
            );
        }

        let filtered = postprocess::median_filter(&self.left_disp, self.height, self.width, 3);
        self.left_disp.copy_from_slice(&filtered);
        info!("Post-processing took {:.3} s", start.elapsed().as_secs_f64());

        #[cfg(feature = "statistics")]
        self.plot_statistics();

        Ok(DisparityMap::from_buffer(filtered, self.width, self.height))
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Fill the initial cost volume with per-candidate Hamming distances; candidates matching
/// outside the secondary view take the neutral sentinel cost.
fn cost_volume<T: CensusWord>(
    cost: &mut [u8],
    left: &[T],
    right: &[T],
    height: usize,
    width: usize,
    min_disparity: i32,
    max_disparity: i32
) {
    let disp_range = (max_disparity - min_disparity) as usize;
    debug_assert_eq!(cost.len(), height * width * disp_range);

    cost.par_chunks_mut(width * disp_range)
        .enumerate()
        .for_each(|(i, cost_row)| {
            for j in 0..width {
                for (d_idx, d) in (min_disparity..max_disparity).enumerate() {
                    let col_right = j as i32 - d;

                    cost_row[j * disp_range + d_idx] =
                        if col_right < 0 || col_right >= width as i32 {
                            OUT_OF_VIEW_COST
                        }
                        else {
                            left[i * width + j].hamming(right[i * width + col_right as usize])
                        };
                }
            }
        });
}

/// Uniqueness constraint: the best cost must beat every other candidate by more than
/// `min_cost * (1 - uniqueness_ratio)`.
fn is_unique(
    cost_local: &[u16],
    min_cost: u16,
    best_disparity: i32,
    min_disparity: i32,
    uniqueness_ratio: f32
) -> bool {
    let mut sec_min_cost = u16::MAX;
    for (d_idx, &cost) in cost_local.iter().enumerate() {
        if min_disparity + d_idx as i32 == best_disparity {
            continue;
        }
        sec_min_cost = sec_min_cost.min(cost);
    }

    sec_min_cost - min_cost > (min_cost as f32 * (1.0 - uniqueness_ratio)) as u16
}

/// Parabola fit through the winning cost and its two neighbours.
///
/// Winners at either end of the candidate range cannot be refined and are invalid.
fn refine_subpixel(
    cost_local: &[u16],
    min_cost: u16,
    best_disparity: i32,
    min_disparity: i32,
    max_disparity: i32
) -> Option<f32> {
    if best_disparity == min_disparity || best_disparity == max_disparity - 1 {
        return None;
    }

    let cost_1 = cost_local[(best_disparity - 1 - min_disparity) as usize] as i32;
    let cost_2 = cost_local[(best_disparity + 1 - min_disparity) as usize] as i32;
    let denom = 1.max(cost_1 + cost_2 - 2 * min_cost as i32);

    Some(best_disparity as f32 + (cost_1 - cost_2) as f32 / (2.0 * denom as f32))
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
