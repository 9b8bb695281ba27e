use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Tunables for the tiled culling pass, loadable from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct CullingConfig {
    /// Tile edge length in pixels. Smaller tiles cull tighter but multiply
    /// tile count; larger tiles cost less overhead but admit more lights
    /// per tile.
    #[serde(default = "CullingConfig::default_tile_size")]
    pub tile_size: u32,
    /// Cap on lights considered per pass; extra lights are dropped with a
    /// warning. Clamped to `cull::MAX_LIGHTS` by the pass.
    #[serde(default = "CullingConfig::default_max_lights")]
    pub max_lights: usize,
    /// Emit the per-tile light-density heatmap for debug rendering.
    #[serde(default)]
    pub heatmap: bool,
}

impl CullingConfig {
    const fn default_tile_size() -> u32 {
        16
    }

    const fn default_max_lights() -> usize {
        crate::cull::MAX_LIGHTS
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("Culling config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            tile_size: Self::default_tile_size(),
            max_lights: Self::default_max_lights(),
            heatmap: false,
        }
    }
}
