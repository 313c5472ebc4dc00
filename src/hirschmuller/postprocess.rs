//! # Disparity map cleanup
//!
//! Post-processing passes run after consistency checking: speckle removal by connected-region
//! area thresholding, hole filling by directional search, and a final median smoothing.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::cmp::Ordering;
use std::f32::consts::PI;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Ray angles for hole filling, pixels above the vertical midline.
const RAY_ANGLES_UPPER: [f32; 8] = [
    PI,
    3.0 * PI / 4.0,
    PI / 2.0,
    PI / 4.0,
    0.0,
    7.0 * PI / 4.0,
    3.0 * PI / 2.0,
    5.0 * PI / 4.0
];

/// Ray angles for pixels on or below the vertical midline; alternating the two sets avoids a
/// directional bias in the filled values.
const RAY_ANGLES_LOWER: [f32; 8] = [
    PI,
    5.0 * PI / 4.0,
    3.0 * PI / 2.0,
    7.0 * PI / 4.0,
    0.0,
    PI / 4.0,
    PI / 2.0,
    3.0 * PI / 4.0
];

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Invalidate small connected disparity regions.
///
/// Regions are grown breadth-first over the 8-neighbourhood; a neighbour joins when it is valid
/// and its disparity is within `diff_insame` of the frontier pixel it is reached from. Every
/// component smaller than `min_speckle_area` has all of its pixels invalidated.
pub(crate) fn remove_speckles(
    disp: &mut [Option<f32>],
    height: usize,
    width: usize,
    diff_insame: f32,
    min_speckle_area: usize
) {
    let mut visited = vec![false; width * height];

    for i in 0..height {
        for j in 0..width {
            if visited[i * width + j] || disp[i * width + j].is_none() {
                continue;
            }

            // Region growing from this seed.
            let mut region = vec![(i, j)];
            visited[i * width + j] = true;
            let mut cur = 0;

            while cur < region.len() {
                let (row, col) = region[cur];
                cur += 1;

                let base = match disp[row * width + col] {
                    Some(d) => d,
                    None => continue
                };

                for r in -1isize..=1 {
                    for c in -1isize..=1 {
                        if r == 0 && c == 0 {
                            continue;
                        }

                        let nrow = row as isize + r;
                        let ncol = col as isize + c;
                        if nrow < 0
                            || nrow >= height as isize
                            || ncol < 0
                            || ncol >= width as isize
                        {
                            continue;
                        }

                        let nidx = nrow as usize * width + ncol as usize;
                        if visited[nidx] {
                            continue;
                        }

                        if let Some(d) = disp[nidx] {
                            if (d - base).abs() <= diff_insame {
                                region.push((nrow as usize, ncol as usize));
                                visited[nidx] = true;
                            }
                        }
                    }
                }
            }

            if region.len() < min_speckle_area {
                for (row, col) in region {
                    disp[row * width + col] = None;
                }
            }
        }
    }
}

/// Fill invalidated pixels from the nearest valid disparities along eight rays.
///
/// Three passes run in order: the occlusion set, the mismatch set, then every pixel still
/// invalid. Occluded pixels take the second-smallest collected value (preferring background
/// depth); the other passes take the median. Within one pass every fill is computed against
/// the pre-pass map before any value is written. A pixel whose rays collect nothing is left
/// invalid.
pub(crate) fn fill_holes(
    disp: &mut [Option<f32>],
    height: usize,
    width: usize,
    min_disparity: i32,
    max_disparity: i32,
    occlusions: &[(usize, usize)],
    mismatches: &[(usize, usize)]
) {
    // No point searching further than the largest representable disparity.
    let max_search_length = max_disparity.abs().max(min_disparity.abs());

    for pass in 0..3 {
        let targets: Vec<(usize, usize)> = match pass {
            0 => occlusions.to_vec(),
            1 => mismatches.to_vec(),
            _ => {
                let mut remaining = Vec::new();
                for i in 0..height {
                    for j in 0..width {
                        if disp[i * width + j].is_none() {
                            remaining.push((i, j));
                        }
                    }
                }
                remaining
            }
        };

        if targets.is_empty() {
            continue;
        }

        let mut fills: Vec<Option<f32>> = vec![None; targets.len()];
        let mut collected: Vec<f32> = Vec::with_capacity(8);

        for (n, &(y, x)) in targets.iter().enumerate() {
            let angles = if y < height / 2 {
                &RAY_ANGLES_UPPER
            } else {
                &RAY_ANGLES_LOWER
            };

            // First valid disparity along each ray, stopping at the image boundary.
            collected.clear();
            for &angle in angles.iter() {
                let (sina, cosa) = angle.sin_cos();

                for m in 1..max_search_length {
                    let yy = (y as f32 + m as f32 * sina).round() as i32;
                    let xx = (x as f32 + m as f32 * cosa).round() as i32;
                    if yy < 0 || yy >= height as i32 || xx < 0 || xx >= width as i32 {
                        break;
                    }

                    if let Some(d) = disp[yy as usize * width + xx as usize] {
                        collected.push(d);
                        break;
                    }
                }
            }

            if collected.is_empty() {
                continue;
            }

            collected.sort_by(|a, b| a.total_cmp(b));

            fills[n] = Some(if pass == 0 {
                if collected.len() > 1 {
                    collected[1]
                }
                else {
                    collected[0]
                }
            }
            else {
                collected[collected.len() / 2]
            });
        }

        for (n, &(y, x)) in targets.iter().enumerate() {
            if let Some(fill) = fills[n] {
                disp[y * width + x] = Some(fill);
            }
        }
    }
}

/// Fixed-window median filter over the whole map, window clipped at the borders.
///
/// Invalid pixels sort above every finite disparity, so a window dominated by invalid values
/// yields an invalid centre.
pub(crate) fn median_filter(
    input: &[Option<f32>],
    height: usize,
    width: usize,
    wnd_size: usize
) -> Vec<Option<f32>> {
    let radius = (wnd_size / 2) as isize;
    let mut out = vec![None; input.len()];
    let mut window: Vec<Option<f32>> = Vec::with_capacity(wnd_size * wnd_size);

    for i in 0..height as isize {
        for j in 0..width as isize {
            window.clear();

            for r in -radius..=radius {
                for c in -radius..=radius {
                    let row = i + r;
                    let col = j + c;
                    if row >= 0 && row < height as isize && col >= 0 && col < width as isize {
                        window.push(input[row as usize * width + col as usize]);
                    }
                }
            }

            window.sort_by(cmp_disparity);
            out[i as usize * width + j as usize] = window[window.len() / 2];
        }
    }

    out
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Total order on disparity values with invalid greater than any finite disparity.
fn cmp_disparity(a: &Option<f32>, b: &Option<f32>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
