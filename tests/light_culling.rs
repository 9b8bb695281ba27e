use forward_cull::{
    build_tile_light_lists, CullingCamera, CullingConfig, CullingScratch, DepthBuffer, PointLight, TileLightLists,
};
use glam::{Mat4, Vec3};
use winit::dpi::PhysicalSize;

const Z_NEAR: f32 = 0.1;

fn test_camera() -> CullingCamera {
    CullingCamera::new(Vec3::ZERO, Vec3::NEG_Z, 90.0_f32.to_radians(), Z_NEAR)
}

/// Runs a pass over a 32x32 viewport with 16px tiles (2x2 grid) and a
/// uniform depth buffer. Light positions are given in view space by using
/// an identity view matrix.
fn run_pass(lights: &[PointLight], clip_depth: f32) -> TileLightLists {
    let camera = test_camera();
    let proj = camera.projection_matrix(1.0);
    let samples = vec![clip_depth; 32 * 32];
    let depth = DepthBuffer::new(32, 32, &samples);
    let config = CullingConfig::default();
    let mut scratch = CullingScratch::default();
    build_tile_light_lists(lights, &depth, Mat4::IDENTITY, proj.inverse(), Z_NEAR, &config, &mut scratch)
}

fn visible_tiles(lists: &TileLightLists, light_index: u32) -> Vec<(u32, u32)> {
    let grid = lists.grid();
    let mut tiles = Vec::new();
    for tile_y in 0..grid.tiles_y {
        for tile_x in 0..grid.tiles_x {
            if lists.tile(tile_x, tile_y).indices.contains(&light_index) {
                tiles.push((tile_x, tile_y));
            }
        }
    }
    tiles
}

#[test]
fn centered_light_lands_in_tiles_sharing_its_projection() {
    let camera = test_camera();
    let light = PointLight::new(Vec3::new(0.0, 0.0, -5.0), Vec3::ONE, 1.0, 1.0);
    let lists = run_pass(&[light], 0.0);
    assert_eq!(lists.grid().tiles_x, 2);
    assert_eq!(lists.grid().tiles_y, 2);

    // The light projects onto the shared corner of all four tiles; the
    // conservative sphere test must keep it in each of them.
    let screen = camera.project_point(light.position, PhysicalSize::new(32, 32)).unwrap();
    assert!((screen.x - 16.0).abs() < 1e-4 && (screen.y - 16.0).abs() < 1e-4);
    assert_eq!(visible_tiles(&lists, 0), vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
}

#[test]
fn offset_light_lands_only_in_its_projected_tile() {
    let camera = test_camera();
    let light = PointLight::new(Vec3::new(2.5, 2.5, -5.0), Vec3::ONE, 0.5, 1.0);
    let lists = run_pass(&[light], 0.0);

    let screen = camera.project_point(light.position, PhysicalSize::new(32, 32)).unwrap();
    let expected = (screen.x as u32 / 16, screen.y as u32 / 16);
    assert_eq!(expected, (1, 0));
    assert_eq!(visible_tiles(&lists, 0), vec![expected]);
    assert_eq!(lists.metrics().light_assignments, 1);
}

#[test]
fn far_lateral_light_is_visible_nowhere() {
    let light = PointLight::new(Vec3::new(1000.0, 0.0, -5.0), Vec3::ONE, 1.0, 1.0);
    let lists = run_pass(&[light], 0.0);
    assert!(visible_tiles(&lists, 0).is_empty());
    assert_eq!(lists.metrics().occupied_tiles, 0);
}

#[test]
fn eye_centered_light_reaches_every_tile() {
    // Radius past the near plane so the depth interval keeps it.
    let light = PointLight::new(Vec3::ZERO, Vec3::ONE, 0.5, 1.0);
    let lists = run_pass(&[light], 0.0);
    assert_eq!(visible_tiles(&lists, 0).len(), lists.grid().tile_count());
}

#[test]
fn empty_light_list_reports_zero_everywhere() {
    let lists = run_pass(&[], 0.0);
    for tile_y in 0..lists.grid().tiles_y {
        for tile_x in 0..lists.grid().tiles_x {
            assert_eq!(lists.visible_count(tile_x, tile_y), 0);
        }
    }
    assert_eq!(lists.metrics().light_assignments, 0);
}

#[test]
fn depth_interval_rejects_lights_behind_geometry() {
    // Uniform geometry at view depth 2 (clip = z_near / 2).
    let clip = Z_NEAR / 2.0;
    let behind = PointLight::new(Vec3::new(0.0, 0.0, -10.0), Vec3::ONE, 1.0, 1.0);
    let overlapping = PointLight::new(Vec3::new(0.0, 0.0, -2.5), Vec3::ONE, 1.0, 1.0);
    let lists = run_pass(&[behind, overlapping], clip);
    assert!(visible_tiles(&lists, 0).is_empty());
    assert!(!visible_tiles(&lists, 1).is_empty());
}

#[test]
fn growing_radius_never_loses_tiles() {
    let position = Vec3::new(3.0, -1.0, -6.0);
    for (small, large) in [(0.5, 1.0), (1.0, 3.0), (3.0, 9.0)] {
        let small_set = visible_tiles(&run_pass(&[PointLight::new(position, Vec3::ONE, small, 1.0)], 0.0), 0);
        let large_set = visible_tiles(&run_pass(&[PointLight::new(position, Vec3::ONE, large, 1.0)], 0.0), 0);
        for tile in &small_set {
            assert!(large_set.contains(tile), "radius {large} lost tile {tile:?} kept at {small}");
        }
    }
}

#[test]
fn identical_inputs_produce_identical_passes() {
    let lights = [
        PointLight::new(Vec3::new(0.7, 0.3, -4.0), Vec3::ONE, 1.5, 1.0),
        PointLight::new(Vec3::new(-2.0, 1.0, -8.0), Vec3::ONE, 2.5, 1.0),
        PointLight::new(Vec3::new(1000.0, 0.0, -5.0), Vec3::ONE, 1.0, 1.0),
    ];
    let first = run_pass(&lights, 0.02);
    let second = run_pass(&lights, 0.02);
    assert_eq!(first.tiles(), second.tiles());
    assert_eq!(first.metrics(), second.metrics());
    assert_eq!(first.heatmap(), second.heatmap());
}
