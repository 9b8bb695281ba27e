use anyhow::{Context, Result};
use glam::Mat4;
use std::sync::Arc;
use winit::dpi::PhysicalSize;

use crate::config::CullingConfig;
use crate::cull::{build_tile_light_lists, CullingMetrics, CullingScratch, TileLightLists, MAX_LIGHTS, MAX_LIGHTS_PER_TILE};
use crate::depth::DepthBuffer;
use crate::lights::{hash_point_lights, PointLight, PointLightGpu};

/// Storage layout: one record per tile (offset, count, two pad words),
/// followed by the flattened visible-light index words.
pub const TILE_RECORD_STRIDE_WORDS: u32 = 4;

const CACHE_QUANTIZE: f32 = 1e-4;

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CullingConfigUniform {
    pub viewport: [f32; 4],
    pub depth_params: [f32; 4],
    pub grid_dims: [u32; 4],
    pub stats: [u32; 4],
    pub data_meta: [u32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TileCullUniform {
    pub config: CullingConfigUniform,
    pub lights: [PointLightGpu; MAX_LIGHTS],
}

#[derive(Clone, Copy, Debug, Default)]
struct TileCullCache {
    viewport: PhysicalSize<u32>,
    view_key: [i32; 16],
    proj_key: [i32; 16],
    lights_hash: u64,
    depth_hash: u64,
    metrics: CullingMetrics,
    valid: bool,
}

impl TileCullCache {
    fn matches(&self, viewport: PhysicalSize<u32>, view: Mat4, proj: Mat4, lights_hash: u64, depth_hash: u64) -> bool {
        self.valid
            && self.viewport == viewport
            && self.view_key == quantize_matrix(view)
            && self.proj_key == quantize_matrix(proj)
            && self.lights_hash == lights_hash
            && self.depth_hash == depth_hash
    }

    fn update(
        &mut self,
        viewport: PhysicalSize<u32>,
        view: Mat4,
        proj: Mat4,
        lights_hash: u64,
        depth_hash: u64,
        metrics: CullingMetrics,
    ) {
        self.viewport = viewport;
        self.view_key = quantize_matrix(view);
        self.proj_key = quantize_matrix(proj);
        self.lights_hash = lights_hash;
        self.depth_hash = depth_hash;
        self.metrics = metrics;
        self.valid = true;
    }

    fn invalidate(&mut self) {
        self.valid = false;
    }
}

/// Uploads one culling pass's results for the shading pass to consume:
/// uniform buffer with viewport/grid/light data, storage buffer with
/// per-tile records plus index words.
#[derive(Default)]
pub struct TileCullingPass {
    layout: Option<Arc<wgpu::BindGroupLayout>>,
    uniform_buffer: Option<wgpu::Buffer>,
    storage_buffer: Option<wgpu::Buffer>,
    bind_group: Option<wgpu::BindGroup>,
    storage_capacity_words: usize,
    words: Vec<u32>,
    heatmap: Option<Vec<f32>>,
    metrics: CullingMetrics,
    cache: TileCullCache,
}

pub struct TileCullingParams<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub lights: &'a [PointLight],
    pub depth: &'a DepthBuffer<'a>,
    pub view: Mat4,
    pub proj: Mat4,
    pub z_near: f32,
    pub config: &'a CullingConfig,
    pub scratch: &'a mut CullingScratch,
}

impl TileCullingPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_layout(&mut self, layout: Arc<wgpu::BindGroupLayout>) {
        self.layout = Some(layout);
        self.bind_group = None;
    }

    pub fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }

    pub fn metrics(&self) -> &CullingMetrics {
        &self.metrics
    }

    pub fn reset_metrics(&mut self) {
        self.metrics = CullingMetrics::default();
    }

    /// Heatmap from the most recent pass, present when enabled in config.
    pub fn heatmap(&self) -> Option<&[f32]> {
        self.heatmap.as_deref()
    }

    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }

    pub fn prepare(&mut self, params: TileCullingParams<'_>) -> Result<()> {
        let layout = self.layout.as_ref().context("Tile culling layout missing")?.clone();
        let viewport = PhysicalSize::new(params.depth.width(), params.depth.height());
        let lights_hash = hash_point_lights(params.lights);
        let depth_hash = hash_depth_samples(params.depth);
        if self.cache.matches(viewport, params.view, params.proj, lights_hash, depth_hash) && self.bind_group.is_some() {
            self.metrics = self.cache.metrics;
            return Ok(());
        }

        let inverse_proj = params.proj.inverse();
        let lists = build_tile_light_lists(
            params.lights,
            params.depth,
            params.view,
            inverse_proj,
            params.z_near,
            params.config,
            params.scratch,
        );
        let metrics = *lists.metrics();
        if metrics.truncated_lights > 0 && self.metrics.truncated_lights == 0 {
            eprintln!(
                "[forward_cull] {} point light(s) exceeded the culling budget (max {}). Extra lights will be ignored.",
                metrics.truncated_lights,
                params.config.max_lights.min(MAX_LIGHTS)
            );
        }

        pack_tile_words(&lists, &mut self.words);
        let uniform = build_uniform(params.lights, &lists, viewport, params.z_near, self.words.len());
        self.heatmap = params.config.heatmap.then(|| lists.heatmap());
        self.update_resources(params.device, params.queue, &layout, &uniform)?;
        self.cache.update(viewport, params.view, params.proj, lights_hash, depth_hash, metrics);
        self.metrics = metrics;
        Ok(())
    }

    fn update_resources(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &Arc<wgpu::BindGroupLayout>,
        uniform: &TileCullUniform,
    ) -> Result<()> {
        if self.uniform_buffer.is_none() {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Tile Cull Uniform"),
                size: std::mem::size_of::<TileCullUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.uniform_buffer = Some(buffer);
            self.bind_group = None;
        }
        if self.storage_buffer.is_none() || self.storage_capacity_words < self.words.len() {
            let capacity = self.words.len().max(1);
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Tile Cull Storage"),
                size: (capacity * std::mem::size_of::<u32>()) as u64,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.storage_buffer = Some(buffer);
            self.storage_capacity_words = capacity;
            self.bind_group = None;
        }

        let uniform_buffer = self.uniform_buffer.as_ref().context("Tile cull uniform missing")?;
        queue.write_buffer(uniform_buffer, 0, bytemuck::bytes_of(uniform));

        let storage_buffer = self.storage_buffer.as_ref().context("Tile cull storage missing")?;
        queue.write_buffer(storage_buffer, 0, bytemuck::cast_slice(&self.words));

        if self.bind_group.is_none() {
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Tile Cull Bind Group"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: storage_buffer.as_entire_binding() },
                ],
            });
            self.bind_group = Some(bind_group);
        }
        Ok(())
    }
}

/// Flattens per-tile lists into record words followed by index words.
fn pack_tile_words(lists: &TileLightLists, words: &mut Vec<u32>) {
    words.clear();
    words.reserve(lists.tiles().len() * TILE_RECORD_STRIDE_WORDS as usize + lists.metrics().light_assignments as usize);
    let mut offset = 0u32;
    for tile in lists.tiles() {
        words.push(offset);
        words.push(tile.count());
        words.push(0);
        words.push(0);
        offset += tile.count();
    }
    for tile in lists.tiles() {
        words.extend(tile.indices.iter().copied());
    }
}

fn build_uniform(
    lights: &[PointLight],
    lists: &TileLightLists,
    viewport: PhysicalSize<u32>,
    z_near: f32,
    word_count: usize,
) -> TileCullUniform {
    let metrics = lists.metrics();
    let record_count = metrics.total_tiles;
    let inv_width = if viewport.width == 0 { 0.0 } else { 1.0 / viewport.width as f32 };
    let inv_height = if viewport.height == 0 { 0.0 } else { 1.0 / viewport.height as f32 };

    let mut gpu_lights = [PointLightGpu::default(); MAX_LIGHTS];
    for (dst, src) in gpu_lights.iter_mut().zip(lights.iter()) {
        *dst = PointLightGpu::from(src);
    }

    TileCullUniform {
        config: CullingConfigUniform {
            viewport: [viewport.width as f32, viewport.height as f32, inv_width, inv_height],
            depth_params: [z_near, 0.0, 0.0, 0.0],
            grid_dims: [metrics.grid_dims[0], metrics.grid_dims[1], metrics.tile_size_px, metrics.total_tiles],
            stats: [
                metrics.total_lights - metrics.truncated_lights,
                MAX_LIGHTS_PER_TILE as u32,
                metrics.overflow_tiles,
                0,
            ],
            data_meta: [
                record_count,
                TILE_RECORD_STRIDE_WORDS,
                record_count * TILE_RECORD_STRIDE_WORDS,
                word_count as u32 - record_count * TILE_RECORD_STRIDE_WORDS,
            ],
        },
        lights: gpu_lights,
    }
}

fn hash_depth_samples(depth: &DepthBuffer<'_>) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET ^ ((depth.width() as u64) << 32 | depth.height() as u64);
    for sample in depth.samples() {
        hash ^= sample.to_bits() as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn quantize_matrix(mat: Mat4) -> [i32; 16] {
    let mut key = [0i32; 16];
    let cols = mat.to_cols_array();
    for (dst, value) in key.iter_mut().zip(cols.iter()) {
        *dst = (value / CACHE_QUANTIZE).round() as i32;
    }
    key
}
