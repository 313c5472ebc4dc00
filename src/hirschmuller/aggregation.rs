//! # Path cost aggregation
//!
//! This module provides the dynamic-programming half of the matcher: the initial matching costs
//! are swept along scan paths and smoothed by the penalty terms P1 (small disparity step) and
//! P2 (large step, attenuated by the local intensity gradient). Four direction families are
//! implemented, each running forward and backward for 4 or 8 sweeps in total:
//!
//! - row-major (left/right),
//! - column-major (top/bottom),
//! - principal diagonal (top-left/bottom-right),
//! - anti-diagonal (top-right/bottom-left).
//!
//! Along a path the recurrence is
//!
//! ```text
//! L(p,d) = C(p,d) + min( L(p-r,d),
//!                        L(p-r,d-1) + P1,
//!                        L(p-r,d+1) + P1,
//!                        min_k L(p-r,k) + max(P1, P2_init / (|I(p)-I(p-r)| + 1)) )
//!          - min_k L(p-r,k)
//! ```
//!
//! with the first pixel of every path taking its initial cost unchanged. Subtracting the
//! previous running minimum keeps values in byte range; the stored result is truncated to a
//! byte. Candidates outside the disparity range read a sentinel maximum so they never win.
//!
//! Diagonal paths that leave the image on a column edge continue on the next row with the
//! column wrapped to the opposite edge, carrying the path state across the jump. This trades
//! strict per-diagonal independence for simple indexing and is kept for output compatibility.

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// The four scan direction families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PathKind {
    Horizontal,
    Vertical,
    DiagonalMain,
    DiagonalAnti
}

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Sweep table in execution order. Four-path aggregation runs the first four entries.
pub(crate) static SWEEPS: [(PathKind, bool); 8] = [
    (PathKind::Horizontal, true),
    (PathKind::Horizontal, false),
    (PathKind::Vertical, true),
    (PathKind::Vertical, false),
    (PathKind::DiagonalMain, true),
    (PathKind::DiagonalMain, false),
    (PathKind::DiagonalAnti, true),
    (PathKind::DiagonalAnti, false)
];

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Run one directional sweep over the whole image.
#[allow(clippy::too_many_arguments)]
pub(crate) fn aggregate_path(
    kind: PathKind,
    forward: bool,
    img: &[u8],
    height: usize,
    width: usize,
    min_disparity: i32,
    max_disparity: i32,
    p1: i32,
    p2_init: i32,
    cost_init: &[u8],
    cost_aggr: &mut [u8]
) {
    let disp_range = (max_disparity - min_disparity) as usize;
    let ctx = PathContext {
        img,
        height,
        width,
        disp_range,
        p1,
        p2_init
    };

    match kind {
        PathKind::Horizontal => aggregate_horizontal(&ctx, cost_init, cost_aggr, forward),
        PathKind::Vertical => aggregate_vertical(&ctx, cost_init, cost_aggr, forward),
        PathKind::DiagonalMain => aggregate_diagonal_main(&ctx, cost_init, cost_aggr, forward),
        PathKind::DiagonalAnti => aggregate_diagonal_anti(&ctx, cost_init, cost_aggr, forward)
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Shared read-only inputs of one sweep.
struct PathContext<'a> {
    img: &'a [u8],
    height: usize,
    width: usize,
    disp_range: usize,
    p1: i32,
    p2_init: i32
}

/// Mutable per-path state: the previous pixel's aggregated costs (padded by one sentinel slot
/// at each end so `d - 1`/`d + 1` reads never leave the vector) and their running minimum.
struct PathState {
    last_costs: Vec<u8>,
    min_last: u8
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Start a path at the given pixel: the aggregated cost equals the initial cost.
fn seed_path(ctx: &PathContext, cost_init: &[u8], cost_aggr: &mut [u8], pixel: usize) -> PathState {
    let idx = pixel * ctx.disp_range;
    let range = idx..idx + ctx.disp_range;

    cost_aggr[range.clone()].copy_from_slice(&cost_init[range.clone()]);

    let mut last_costs = vec![u8::MAX; ctx.disp_range + 2];
    last_costs[1..=ctx.disp_range].copy_from_slice(&cost_aggr[range]);

    let mut min_last = u8::MAX;
    for &cost in &last_costs {
        min_last = min_last.min(cost);
    }

    PathState { last_costs, min_last }
}

/// Apply the recurrence at one pixel and roll the path state forward.
fn aggregate_pixel(
    ctx: &PathContext,
    cost_init: &[u8],
    cost_aggr: &mut [u8],
    pixel: usize,
    gray: u8,
    gray_last: u8,
    state: &mut PathState
) {
    let idx = pixel * ctx.disp_range;
    let grad = (gray as i32 - gray_last as i32).abs();
    let p2 = ctx.p1.max(ctx.p2_init / (grad + 1)) as u16;
    let p1 = ctx.p1 as u16;
    let min_last = state.min_last as u16;

    let mut min_cost = u8::MAX;
    for d in 0..ctx.disp_range {
        let cost = cost_init[idx + d] as u16;
        let l1 = state.last_costs[d + 1] as u16;
        let l2 = state.last_costs[d] as u16 + p1;
        let l3 = state.last_costs[d + 2] as u16 + p1;
        let l4 = min_last + p2;

        // Truncation to a byte matches the reference arithmetic.
        let cost_s = (cost + (l1.min(l2).min(l3).min(l4) - min_last)) as u8;

        cost_aggr[idx + d] = cost_s;
        min_cost = min_cost.min(cost_s);
    }

    state.min_last = min_cost;
    state.last_costs[1..=ctx.disp_range].copy_from_slice(&cost_aggr[idx..idx + ctx.disp_range]);
}

fn aggregate_horizontal(ctx: &PathContext, cost_init: &[u8], cost_aggr: &mut [u8], forward: bool) {
    let dir: isize = if forward { 1 } else { -1 };

    for row in 0..ctx.height {
        let mut col: isize = if forward { 0 } else { ctx.width as isize - 1 };

        let mut pixel = row * ctx.width + col as usize;
        let mut state = seed_path(ctx, cost_init, cost_aggr, pixel);
        let mut gray_last = ctx.img[pixel];
        col += dir;

        for _ in 0..ctx.width - 1 {
            pixel = row * ctx.width + col as usize;
            let gray = ctx.img[pixel];
            aggregate_pixel(ctx, cost_init, cost_aggr, pixel, gray, gray_last, &mut state);
            gray_last = gray;
            col += dir;
        }
    }
}

fn aggregate_vertical(ctx: &PathContext, cost_init: &[u8], cost_aggr: &mut [u8], forward: bool) {
    let dir: isize = if forward { 1 } else { -1 };

    for col in 0..ctx.width {
        let mut row: isize = if forward { 0 } else { ctx.height as isize - 1 };

        let mut pixel = row as usize * ctx.width + col;
        let mut state = seed_path(ctx, cost_init, cost_aggr, pixel);
        let mut gray_last = ctx.img[pixel];
        row += dir;

        for _ in 0..ctx.height - 1 {
            pixel = row as usize * ctx.width + col;
            let gray = ctx.img[pixel];
            aggregate_pixel(ctx, cost_init, cost_aggr, pixel, gray, gray_last, &mut state);
            gray_last = gray;
            row += dir;
        }
    }
}

/// Next pixel along the principal diagonal (row and column advance together). On a column
/// edge the row keeps advancing and the column wraps to the opposite edge.
fn next_main(row: isize, col: isize, dir: isize, height: isize, width: isize) -> (isize, isize) {
    if dir == 1 && col == width - 1 && row < height - 1 {
        (row + 1, 0)
    }
    else if dir == -1 && col == 0 && row > 0 {
        (row - 1, width - 1)
    }
    else {
        (row + dir, col + dir)
    }
}

/// Next pixel along the anti-diagonal (row advances while the column retreats), with the same
/// column wraparound rule.
fn next_anti(row: isize, col: isize, dir: isize, height: isize, width: isize) -> (isize, isize) {
    if dir == 1 && col == 0 && row < height - 1 {
        (row + 1, width - 1)
    }
    else if dir == -1 && col == width - 1 && row > 0 {
        (row - 1, 0)
    }
    else {
        (row + dir, col - dir)
    }
}

fn aggregate_diagonal_main(
    ctx: &PathContext,
    cost_init: &[u8],
    cost_aggr: &mut [u8],
    forward: bool
) {
    let dir: isize = if forward { 1 } else { -1 };
    let height = ctx.height as isize;
    let width = ctx.width as isize;

    for start_col in 0..width {
        let mut row: isize = if forward { 0 } else { height - 1 };
        let mut col = start_col;

        let mut pixel = row as usize * ctx.width + col as usize;
        let mut state = seed_path(ctx, cost_init, cost_aggr, pixel);
        let mut gray_last = ctx.img[pixel];

        let (r, c) = next_main(row, col, dir, height, width);
        row = r;
        col = c;

        for step in 0..ctx.height - 1 {
            pixel = row as usize * ctx.width + col as usize;
            let gray = ctx.img[pixel];
            aggregate_pixel(ctx, cost_init, cost_aggr, pixel, gray, gray_last, &mut state);
            gray_last = gray;

            if step + 2 < ctx.height {
                let (r, c) = next_main(row, col, dir, height, width);
                row = r;
                col = c;
            }
        }
    }
}

fn aggregate_diagonal_anti(
    ctx: &PathContext,
    cost_init: &[u8],
    cost_aggr: &mut [u8],
    forward: bool
) {
    let dir: isize = if forward { 1 } else { -1 };
    let height = ctx.height as isize;
    let width = ctx.width as isize;

    for start_col in 0..width {
        let mut row: isize = if forward { 0 } else { height - 1 };
        let mut col = start_col;

        let mut pixel = row as usize * ctx.width + col as usize;
        let mut state = seed_path(ctx, cost_init, cost_aggr, pixel);
        let mut gray_last = ctx.img[pixel];

        let (r, c) = next_anti(row, col, dir, height, width);
        row = r;
        col = c;

        for step in 0..ctx.height - 1 {
            pixel = row as usize * ctx.width + col as usize;
            let gray = ctx.img[pixel];
            aggregate_pixel(ctx, cost_init, cost_aggr, pixel, gray, gray_last, &mut state);
            gray_last = gray;

            if step + 2 < ctx.height {
                let (r, c) = next_anti(row, col, dir, height, width);
                row = r;
                col = c;
            }
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn run(
        kind: PathKind,
        forward: bool,
        img: &[u8],
        height: usize,
        width: usize,
        disp_range: usize,
        p1: i32,
        p2_init: i32,
        cost_init: &[u8]
    ) -> Vec<u8> {
        let mut cost_aggr = vec![0u8; cost_init.len()];
        aggregate_path(
            kind,
            forward,
            img,
            height,
            width,
            0,
            disp_range as i32,
            p1,
            p2_init,
            cost_init,
            &mut cost_aggr
        );
        cost_aggr
    }

    #[test]
    fn uniform_costs_aggregate_to_themselves() {
        // With every candidate equally good the smoothing terms cancel and L == C everywhere.
        let height = 4;
        let width = 5;
        let disp_range = 4;
        let img: Vec<u8> = (0..height * width).map(|i| (i * 11 % 256) as u8).collect();
        let cost_init = vec![7u8; height * width * disp_range];

        for &(kind, forward) in SWEEPS.iter() {
            let aggr = run(kind, forward, &img, height, width, disp_range, 10, 150, &cost_init);
            assert_eq!(aggr, cost_init, "{:?} forward={}", kind, forward);
        }
    }

    #[test]
    fn first_path_pixel_keeps_its_initial_cost() {
        let height = 3;
        let width = 4;
        let disp_range = 2;
        let img = vec![128u8; height * width];
        let cost_init: Vec<u8> = (0..height * width * disp_range).map(|i| (i % 40) as u8).collect();

        let aggr = run(
            PathKind::Horizontal,
            true,
            &img,
            height,
            width,
            disp_range,
            10,
            150,
            &cost_init
        );

        for row in 0..height {
            let idx = row * width * disp_range;
            assert_eq!(&aggr[idx..idx + disp_range], &cost_init[idx..idx + disp_range]);
        }

        let aggr = run(
            PathKind::Horizontal,
            false,
            &img,
            height,
            width,
            disp_range,
            10,
            150,
            &cost_init
        );

        for row in 0..height {
            let idx = (row * width + width - 1) * disp_range;
            assert_eq!(&aggr[idx..idx + disp_range], &cost_init[idx..idx + disp_range]);
        }
    }

    #[test]
    fn recurrence_matches_hand_computed_values() {
        // Two pixels in a row, three candidates. Flat intensity, so P2 = max(P1, P2_init) with
        // P1 = 1, P2_init = 2.
        let height = 1;
        let width = 2;
        let disp_range = 3;
        let img = vec![100u8; 2];
        let cost_init = vec![
            0, 10, 10, // first pixel
            10, 10, 10 // second pixel
        ];

        let aggr = run(
            PathKind::Horizontal,
            true,
            &img,
            height,
            width,
            disp_range,
            1,
            2,
            &cost_init
        );

        // Second pixel, min over previous costs is 0:
        //   d=0: min(0, 255+1, 10+1, 0+2) = 0  -> 10
        //   d=1: min(10, 0+1, 10+1, 0+2) = 1   -> 11
        //   d=2: min(10, 10+1, 255+1, 0+2) = 2 -> 12
        assert_eq!(&aggr[3..6], &[10, 11, 12]);
    }

    #[test]
    fn single_candidate_sweeps_cover_every_pixel() {
        // With one candidate the recurrence reduces to L == C, so a full sweep must reproduce
        // the initial volume exactly; this exercises the diagonal traversal including the
        // column wraparound on every start column.
        let height = 5;
        let width = 3;
        let img: Vec<u8> = (0..height * width).map(|i| (i * 29 % 256) as u8).collect();
        let cost_init: Vec<u8> = (0..height * width).map(|i| (i * 7 % 100) as u8).collect();

        for &(kind, forward) in SWEEPS.iter() {
            let aggr = run(kind, forward, &img, height, width, 1, 10, 150, &cost_init);
            assert_eq!(aggr, cost_init, "{:?} forward={}", kind, forward);
        }
    }

    #[test]
    fn diagonal_steps_wrap_on_column_edges() {
        // 3x3, principal diagonal forward from the last column: the path drops a row and wraps
        // to column zero.
        assert_eq!(next_main(0, 2, 1, 3, 3), (1, 0));
        assert_eq!(next_main(1, 0, 1, 3, 3), (2, 1));
        // Backward from column zero wraps to the right edge.
        assert_eq!(next_main(1, 0, -1, 3, 3), (0, 2));

        // Anti-diagonal forward from column zero wraps to the right edge.
        assert_eq!(next_anti(0, 0, 1, 3, 3), (1, 2));
        assert_eq!(next_anti(1, 2, 1, 3, 3), (2, 1));
        // Backward from the right edge wraps to column zero.
        assert_eq!(next_anti(1, 2, -1, 3, 3), (0, 0));
    }

    #[test]
    fn smoothing_penalty_scales_with_intensity_gradient() {
        // A strong intensity edge lowers P2 to P2_init / (|grad| + 1), letting large disparity
        // jumps through more cheaply than on flat texture.
        let height = 1;
        let width = 2;
        let disp_range = 4;
        let cost_init = vec![
            0, 200, 200, 200, // first pixel: clear winner at d = 0
            50, 50, 50, 0 // second pixel: clear winner at d = 3
        ];

        let flat = vec![100u8, 100];
        let aggr_flat = run(
            PathKind::Horizontal,
            true,
            &flat,
            height,
            width,
            disp_range,
            10,
            150,
            &cost_init
        );

        let edge = vec![100u8, 250];
        let aggr_edge = run(
            PathKind::Horizontal,
            true,
            &edge,
            height,
            width,
            disp_range,
            10,
            150,
            &cost_init
        );

        // The jump term min_prev + P2 wins at d = 3 on both pairs, but P2 drops from 150 on
        // flat texture to max(10, 150 / 151) = 10 across the edge.
        assert_eq!(aggr_flat[4 + 3], 150);
        assert_eq!(aggr_edge[4 + 3], 10);
    }
}
