use glam::Vec3;

/// Point light volume consumed by the culling pass. `radius` bounds the
/// distance at which the light can still affect geometry; `color` and
/// `intensity` ride along for the GPU mirror and are ignored by culling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub radius: f32,
    pub intensity: f32,
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3, radius: f32, intensity: f32) -> Self {
        Self { position, color, radius, intensity }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightGpu {
    pub position_radius: [f32; 4],
    pub color_intensity: [f32; 4],
}

impl From<&PointLight> for PointLightGpu {
    fn from(light: &PointLight) -> Self {
        Self {
            position_radius: [light.position.x, light.position.y, light.position.z, light.radius],
            color_intensity: [light.color.x, light.color.y, light.color.z, light.intensity],
        }
    }
}

pub(crate) fn hash_point_lights(lights: &[PointLight]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET ^ (lights.len() as u64);
    for light in lights {
        for value in [
            light.position.x.to_bits(),
            light.position.y.to_bits(),
            light.position.z.to_bits(),
            light.color.x.to_bits(),
            light.color.y.to_bits(),
            light.color.z.to_bits(),
            light.radius.to_bits(),
            light.intensity.to_bits(),
        ] {
            hash ^= value as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}
