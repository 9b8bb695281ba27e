use glam::{Mat4, Vec3};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU32, Ordering};
use winit::dpi::PhysicalSize;

use crate::config::CullingConfig;
use crate::depth::{reduce_tile_depth, DepthBounds, DepthBuffer};
use crate::frustum::{build_tile_frustum, TileFrustum};
use crate::lights::PointLight;

/// Hard cap on lights considered in one pass; the GPU uniform carries a
/// fixed-size array of this many entries.
pub const MAX_LIGHTS: usize = 256;
/// Hard cap on visible-light indices recorded per tile.
pub const MAX_LIGHTS_PER_TILE: usize = 64;

/// Fixed partition of the viewport into square tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub tile_size: u32,
}

impl TileGrid {
    pub fn new(viewport: PhysicalSize<u32>, tile_size: u32) -> Self {
        let tile_size = tile_size.max(1);
        Self {
            tiles_x: viewport.width.max(1).div_ceil(tile_size),
            tiles_y: viewport.height.max(1).div_ceil(tile_size),
            tile_size,
        }
    }

    pub fn tile_count(&self) -> usize {
        self.tiles_x as usize * self.tiles_y as usize
    }

    /// Flat index of a tile coordinate. Out-of-range coordinates are a
    /// caller contract breach.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> usize {
        assert!(
            tile_x < self.tiles_x && tile_y < self.tiles_y,
            "tile ({tile_x}, {tile_y}) outside {}x{} grid",
            self.tiles_x,
            self.tiles_y
        );
        tile_y as usize * self.tiles_x as usize + tile_x as usize
    }
}

#[derive(Clone, Copy)]
struct ViewLight {
    center: Vec3,
    depth: f32,
    radius: f32,
}

/// Visible-light indices for one tile, in input-list order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileLights {
    pub indices: SmallVec<[u32; 16]>,
}

impl TileLights {
    pub fn count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Vectors reused between passes to avoid per-frame allocation.
#[derive(Default)]
pub struct CullingScratch {
    depth_bounds: Vec<DepthBounds>,
    frustums: Vec<TileFrustum>,
    view_lights: Vec<ViewLight>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CullingMetrics {
    pub total_lights: u32,
    pub truncated_lights: u32,
    pub grid_dims: [u32; 2],
    pub total_tiles: u32,
    pub occupied_tiles: u32,
    pub degenerate_tiles: u32,
    pub light_assignments: u32,
    pub max_lights_per_tile: u32,
    pub overflow_tiles: u32,
    pub tile_size_px: u32,
}

impl CullingMetrics {
    pub fn average_lights_per_tile(&self) -> f32 {
        if self.total_tiles == 0 {
            0.0
        } else {
            self.light_assignments as f32 / self.total_tiles as f32
        }
    }
}

/// Output of one culling pass: per-tile visible-light index lists plus pass
/// metrics. Rebuilt from scratch every pass; holds no cross-pass state.
#[derive(Clone, Debug)]
pub struct TileLightLists {
    grid: TileGrid,
    tiles: Vec<TileLights>,
    metrics: CullingMetrics,
}

impl TileLightLists {
    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    pub fn tiles(&self) -> &[TileLights] {
        &self.tiles
    }

    pub fn tile(&self, tile_x: u32, tile_y: u32) -> &TileLights {
        &self.tiles[self.grid.tile_index(tile_x, tile_y)]
    }

    pub fn visible_count(&self, tile_x: u32, tile_y: u32) -> u32 {
        self.tile(tile_x, tile_y).count()
    }

    pub fn metrics(&self) -> &CullingMetrics {
        &self.metrics
    }

    /// Per-tile visible-light density normalized by the input light count,
    /// for diagnostic rendering. All zeros when the light list is empty.
    pub fn heatmap(&self) -> Vec<f32> {
        let total = self.metrics.total_lights.max(1) as f32;
        self.tiles.iter().map(|tile| tile.count() as f32 / total).collect()
    }
}

/// Runs one full culling pass: per-tile depth reduction, per-tile frustum
/// build, then per-tile light tests. The three stages run as sequential
/// data-parallel sweeps over the tile grid; each sweep completes before the
/// next reads its output, and no tile depends on another tile's state.
pub fn build_tile_light_lists(
    lights: &[PointLight],
    depth: &DepthBuffer<'_>,
    view: Mat4,
    inverse_proj: Mat4,
    z_near: f32,
    config: &CullingConfig,
    scratch: &mut CullingScratch,
) -> TileLightLists {
    let viewport = PhysicalSize::new(depth.width(), depth.height());
    let grid = TileGrid::new(viewport, config.tile_size);
    let tile_count = grid.tile_count();

    let CullingScratch { depth_bounds, frustums, view_lights } = scratch;

    let budget = config.max_lights.min(MAX_LIGHTS);
    let truncated = lights.len().saturating_sub(budget) as u32;
    view_lights.clear();
    view_lights.extend(lights.iter().take(budget).map(|light| {
        let view_pos = view * light.position.extend(1.0);
        ViewLight {
            center: view_pos.truncate(),
            depth: -view_pos.z,
            radius: light.radius.max(0.0),
        }
    }));

    (0..tile_count)
        .into_par_iter()
        .map(|index| {
            let tile_x = (index % grid.tiles_x as usize) as u32;
            let tile_y = (index / grid.tiles_x as usize) as u32;
            reduce_tile_depth(depth, grid, tile_x, tile_y, z_near)
        })
        .collect_into_vec(depth_bounds);

    (0..tile_count)
        .into_par_iter()
        .map(|index| {
            let tile_x = (index % grid.tiles_x as usize) as u32;
            let tile_y = (index / grid.tiles_x as usize) as u32;
            build_tile_frustum(grid, tile_x, tile_y, viewport, inverse_proj)
        })
        .collect_into_vec(frustums);

    let assignments = AtomicU32::new(0);
    let overflow_tiles = AtomicU32::new(0);
    let tiles: Vec<TileLights> = (0..tile_count)
        .into_par_iter()
        .map(|index| {
            let bounds = depth_bounds[index];
            if bounds.is_empty() {
                return TileLights::default();
            }
            let frustum = &frustums[index];
            let mut indices: SmallVec<[u32; 16]> = SmallVec::new();
            for (light_index, light) in view_lights.iter().enumerate() {
                if light.depth - light.radius > bounds.furthest || light.depth + light.radius < bounds.nearest {
                    continue;
                }
                if !frustum.intersects_sphere(light.center, light.radius) {
                    continue;
                }
                if indices.len() >= MAX_LIGHTS_PER_TILE {
                    overflow_tiles.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                indices.push(light_index as u32);
            }
            assignments.fetch_add(indices.len() as u32, Ordering::Relaxed);
            TileLights { indices }
        })
        .collect();

    let degenerate_tiles = depth_bounds.iter().filter(|bounds| bounds.is_empty()).count() as u32;
    let occupied_tiles = tiles.iter().filter(|tile| !tile.indices.is_empty()).count() as u32;
    let max_per_tile = tiles.iter().map(TileLights::count).max().unwrap_or(0);

    let metrics = CullingMetrics {
        total_lights: lights.len() as u32,
        truncated_lights: truncated,
        grid_dims: [grid.tiles_x, grid.tiles_y],
        total_tiles: tile_count as u32,
        occupied_tiles,
        degenerate_tiles,
        light_assignments: assignments.into_inner(),
        max_lights_per_tile: max_per_tile,
        overflow_tiles: overflow_tiles.into_inner(),
        tile_size_px: grid.tile_size,
    };

    TileLightLists { grid, tiles, metrics }
}
