use glam::{Mat4, Vec2, Vec3, Vec4};
use winit::dpi::PhysicalSize;

use crate::cull::TileGrid;

/// Reversed-depth far plane lands at clip z 0; corner rays are cast out to
/// the frustum's far extent through this value.
const FAR_CLIP_DEPTH: f32 = 0.0;

/// Side planes of one tile's view-space frustum. Every plane passes through
/// the eye, so each is just a unit normal pointing into the frustum
/// interior: a point's signed distance is its dot product with the normal.
/// Order: top, right, bottom, left. Near/far come from `DepthBounds`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TileFrustum {
    pub planes: [Vec3; 4],
}

impl TileFrustum {
    /// Conservative sphere test: rejects only when the sphere lies entirely
    /// behind one plane. May admit spheres near frustum corners that touch
    /// no tile pixel; never rejects a sphere that does.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes.iter().all(|normal| normal.dot(center) >= -radius)
    }
}

/// Maps a screen pixel through the inverse projection onto its view-space
/// ray from the eye. The reversed-infinite far value inverse-projects to
/// w = 0, a point at infinity whose xyz is the direction itself; every
/// plane passes through the eye, so scale does not matter and the
/// homogeneous part is used directly when the divide would blow up.
fn corner_ray(screen: Vec2, viewport: PhysicalSize<u32>, inverse_proj: Mat4) -> Vec3 {
    let ndc_x = (2.0 * screen.x / viewport.width.max(1) as f32) - 1.0;
    let ndc_y = 1.0 - (2.0 * screen.y / viewport.height.max(1) as f32);
    let view = inverse_proj * Vec4::new(ndc_x, ndc_y, FAR_CLIP_DEPTH, 1.0);
    if view.w.abs() > f32::EPSILON {
        view.truncate() / view.w
    } else {
        view.truncate()
    }
}

/// Builds the 4 side planes for one tile. Corners are walked clockwise as
/// seen from the eye (top-left, top-right, bottom-right, bottom-left);
/// crossing each corner ray with the next yields inward normals in
/// right-handed view space, one sign convention for all 4 planes.
pub fn build_tile_frustum(grid: TileGrid, tile_x: u32, tile_y: u32, viewport: PhysicalSize<u32>, inverse_proj: Mat4) -> TileFrustum {
    let x0 = (tile_x * grid.tile_size) as f32;
    let y0 = (tile_y * grid.tile_size) as f32;
    let x1 = x0 + grid.tile_size as f32;
    let y1 = y0 + grid.tile_size as f32;

    let corners = [
        corner_ray(Vec2::new(x0, y0), viewport, inverse_proj),
        corner_ray(Vec2::new(x1, y0), viewport, inverse_proj),
        corner_ray(Vec2::new(x1, y1), viewport, inverse_proj),
        corner_ray(Vec2::new(x0, y1), viewport, inverse_proj),
    ];

    let mut planes = [Vec3::ZERO; 4];
    for (index, plane) in planes.iter_mut().enumerate() {
        *plane = corners[index].cross(corners[(index + 1) % 4]).normalize_or_zero();
    }
    TileFrustum { planes }
}
