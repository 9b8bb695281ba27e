use forward_cull::{reduce_tile_depth, DepthBuffer, TileGrid};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use winit::dpi::PhysicalSize;

const Z_NEAR: f32 = 0.1;

#[test]
fn bounds_are_ordered_for_any_populated_tile() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let mut samples: Vec<f32> = (0..48 * 48).map(|i| ((i % 97) + 1) as f32 / 100.0).collect();
    samples.shuffle(&mut rng);
    let depth = DepthBuffer::new(48, 48, &samples);
    let grid = TileGrid::new(PhysicalSize::new(48, 48), 16);
    for tile_y in 0..grid.tiles_y {
        for tile_x in 0..grid.tiles_x {
            let bounds = reduce_tile_depth(&depth, grid, tile_x, tile_y, Z_NEAR);
            assert!(bounds.nearest <= bounds.furthest);
        }
    }
}

#[test]
fn reduction_is_order_independent() {
    // Same sample multiset laid out in different visitation orders must
    // reduce to identical bounds.
    let base: Vec<f32> = (0..16 * 16).map(|i| ((i * 31 % 255) + 1) as f32 / 256.0).collect();
    let reference = {
        let depth = DepthBuffer::new(16, 16, &base);
        let grid = TileGrid::new(PhysicalSize::new(16, 16), 16);
        reduce_tile_depth(&depth, grid, 0, 0, Z_NEAR)
    };
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    for _ in 0..8 {
        let mut shuffled = base.clone();
        shuffled.shuffle(&mut rng);
        let depth = DepthBuffer::new(16, 16, &shuffled);
        let grid = TileGrid::new(PhysicalSize::new(16, 16), 16);
        assert_eq!(reduce_tile_depth(&depth, grid, 0, 0, Z_NEAR), reference);
    }
}

#[test]
fn partial_edge_tiles_ignore_out_of_bounds_pixels() {
    // 20x20 screen with 16px tiles: edge tiles cover only a 4-pixel strip.
    // Fill the strip with mid-range depth and the rest with near depth; a
    // zero-filled out-of-bounds region would otherwise drag the far bound
    // to infinity.
    let width = 20u32;
    let height = 20u32;
    let mut samples = vec![1.0f32; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            if x >= 16 || y >= 16 {
                samples[(y * width + x) as usize] = 0.5;
            }
        }
    }
    let depth = DepthBuffer::new(width, height, &samples);
    let grid = TileGrid::new(PhysicalSize::new(width, height), 16);
    assert_eq!((grid.tiles_x, grid.tiles_y), (2, 2));

    let corner = reduce_tile_depth(&depth, grid, 1, 1, Z_NEAR);
    let expected = Z_NEAR / 0.5;
    assert!((corner.nearest - expected).abs() < 1e-6);
    assert!((corner.furthest - expected).abs() < 1e-6);
    assert!(corner.furthest.is_finite());
}

#[test]
fn repeated_reduction_is_bit_identical() {
    let samples: Vec<f32> = (0..32 * 32).map(|i| ((i * 13 % 100) + 1) as f32 / 128.0).collect();
    let depth = DepthBuffer::new(32, 32, &samples);
    let grid = TileGrid::new(PhysicalSize::new(32, 32), 16);
    for tile_y in 0..grid.tiles_y {
        for tile_x in 0..grid.tiles_x {
            let first = reduce_tile_depth(&depth, grid, tile_x, tile_y, Z_NEAR);
            let second = reduce_tile_depth(&depth, grid, tile_x, tile_y, Z_NEAR);
            assert_eq!(first.nearest.to_bits(), second.nearest.to_bits());
            assert_eq!(first.furthest.to_bits(), second.furthest.to_bits());
        }
    }
}
