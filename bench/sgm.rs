use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cv_sgm::hirschmuller::{Hirschmuller, Params};
use cv_sgm::prelude::*;
use image::{GrayImage, Luma};

/// Deterministic texture so the benchmark needs no assets on disk.
fn texture(x: u32, y: u32) -> u8 {
    let hash = x
        .wrapping_mul(0x9E37_79B9)
        .wrapping_add(y.wrapping_mul(0x85EB_CA6B));
    (hash >> 16) as u8
}

fn sgm_bench(c: &mut Criterion) {
    let (width, height) = (320u32, 240u32);
    let shift = 12u32;

    let left = GrayImage::from_fn(width, height, |x, y| Luma([texture(x, y)]));
    let right = GrayImage::from_fn(width, height, |x, y| Luma([texture(x + shift, y)]));

    let params = Params {
        min_disparity: 0,
        max_disparity: 64,
        ..Params::default()
    };
    let mut engine = Hirschmuller::new(height as usize, width as usize, params).unwrap();

    c.bench_function("hirschmuller 320x240 d64", |b| {
        b.iter(|| engine.compute(black_box(&left), black_box(&right)))
    });
}

criterion_group!(benches, sgm_bench);
criterion_main!(benches);
