//! # General disparity objects
//!
//! This module provides generic disparity traits and structures for use by different algorithms.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::GrayImage;
use crate::error::*;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A generic floating point disparity map.
///
/// Each pixel holds either a finite sub-pixel disparity or `None` for pixels the algorithm could
/// not estimate (occluded, mismatched or filtered out).
pub struct DisparityMap {
    data: Vec<Option<f32>>,
    width: usize,
    height: usize,
    pub max_disp: Option<f32>,
    pub min_disp: Option<f32>
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait DisparityAlgorithm {
    /// Compute the disparity map of the given rectified stereo pair.
    fn compute(&mut self, left: &GrayImage, right: &GrayImage) -> Result<DisparityMap>;
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl DisparityMap {
    pub fn new(width: usize, height: usize) -> Self {
        DisparityMap {
            data: vec![None; width * height],
            width,
            height,
            min_disp: None,
            max_disp: None
        }
    }

    pub(crate) fn from_buffer(data: Vec<Option<f32>>, width: usize, height: usize) -> Self {
        let mut map = DisparityMap {
            data,
            width,
            height,
            min_disp: None,
            max_disp: None
        };

        for disp in map.data.iter().flatten() {
            map.min_disp = Some(map.min_disp.map_or(*disp, |m: f32| m.min(*disp)));
            map.max_disp = Some(map.max_disp.map_or(*disp, |m: f32| m.max(*disp)));
        }

        map
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        self.data[y * self.width + x]
    }

    pub fn put(&mut self, x: usize, y: usize, val: Option<f32>) {
        self.data[y * self.width + x] = val
    }

    /// Raw row-major access to the underlying buffer.
    pub fn data(&self) -> &[Option<f32>] {
        &self.data
    }

    /// Converts the map into a Luma8 image.
    ///
    /// Values are clamped into `0..=255`; invalid pixels are rendered black.
    pub fn to_luma(&self) -> GrayImage {

        let mut new = image::GrayImage::new(
            self.width as u32,
            self.height as u32
        );

        for y in 0..new.height() {
            for x in 0..new.width() {
                let mut val = match self.get(x as usize, y as usize) {
                    Some(d) => d,
                    None => 0.0
                };

                if val < 0.0 {
                    val = 0.0;
                }
                else if val > 255.0 {
                    val = 255.0;
                }

                *new.get_pixel_mut(x, y) = image::Luma([val as u8]);
            }
        }

        new
    }

    /// Converts the map to a normalised GrayImage.
    ///
    /// Normalises by the maximum observed disparity in the map. If the maximum disparity is not
    /// set then the function is equivalent to `.to_luma()`.
    pub fn to_luma_normalised(&self) -> GrayImage {

        let mut new = image::GrayImage::new(
            self.width as u32,
            self.height as u32
        );

        let mult = match self.max_disp {
            Some(d) if d > 0.0 => 255.0 / d,
            _ => 1.0
        };

        for y in 0..new.height() {
            for x in 0..new.width() {
                let mut val = match self.get(x as usize, y as usize) {
                    Some(d) => d * mult,
                    None => 0.0
                };

                if val < 0.0 {
                    val = 0.0;
                }
                else if val > 255.0 {
                    val = 255.0;
                }

                *new.get_pixel_mut(x, y) = image::Luma([val as u8]);
            }
        }

        new
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_track_valid_pixels_only() {
        let mut data = vec![None; 9];
        data[4] = Some(2.5);
        data[5] = Some(7.0);

        let map = DisparityMap::from_buffer(data, 3, 3);

        assert_eq!(map.min_disp, Some(2.5));
        assert_eq!(map.max_disp, Some(7.0));
        assert_eq!(map.get(1, 1), Some(2.5));
        assert_eq!(map.get(0, 0), None);
    }

    #[test]
    fn normalised_render_maps_max_to_white_and_invalid_to_black() {
        let mut map = DisparityMap::new(2, 1);
        map.put(0, 0, Some(4.0));
        map.max_disp = Some(4.0);

        let luma = map.to_luma_normalised();

        assert_eq!(luma.get_pixel(0, 0)[0], 255);
        assert_eq!(luma.get_pixel(1, 0)[0], 0);
    }
}
