//! End-to-end tests driving the terrain through the public API only.

use anyhow::Result;
use glam::{Vec2, Vec3};

use relief::{
    DistanceLod, HeightField, MeshBuffers, NullVisualPool, RecyclingPool, Terrain, TerrainConfig,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Ticks until nothing changes, panicking if the terrain keeps churning.
fn settle(terrain: &mut Terrain, reference: Vec2, max_ticks: usize) {
    for _ in 0..max_ticks {
        if terrain.update(reference).is_settled() {
            return;
        }
    }
    panic!("terrain did not settle within {} ticks", max_ticks);
}

fn small_config() -> TerrainConfig {
    TerrainConfig {
        view_distance: 64.0,
        min_node_size: 8.0,
        levels_of_detail: 4,
        lod_exponent: 1.0,
        seed: 7,
        ..TerrainConfig::default()
    }
}

#[test]
fn mesh_vertices_sit_on_the_height_field() -> Result<()> {
    init_logging();
    let config = small_config();
    let origin = config.origin;
    let mut terrain = Terrain::with_defaults(config)?;
    settle(&mut terrain, Vec2::new(12.0, -30.0), 64);

    let mesh = terrain.mesh();
    assert!(mesh.triangle_count() > 0);
    assert_eq!(mesh.indices.len(), mesh.triangle_count() * 3);

    for vertex in &mesh.vertices {
        let world = Vec2::new(vertex.x, vertex.z) + origin;
        let expected = terrain.sample(world)?;
        assert!(
            (vertex.y - expected).abs() < 1e-3,
            "vertex at {:?} has height {}, field says {}",
            world,
            vertex.y,
            expected
        );
    }
    Ok(())
}

#[test]
fn full_scale_scene_grades_detail_outward() -> Result<()> {
    init_logging();
    let config = TerrainConfig {
        view_distance: 1024.0,
        min_node_size: 4.0,
        levels_of_detail: 4,
        ..TerrainConfig::default()
    };
    let mut terrain = Terrain::with_defaults(config)?;
    settle(&mut terrain, Vec2::ZERO, 128);

    let stats = terrain.stats();
    assert!(stats.triangles > 0);
    // node splits carry subdivision past one node's worth of levels
    assert!(
        stats.max_mesh_depth >= 8,
        "max mesh depth {} stayed shallow",
        stats.max_mesh_depth
    );

    let mesh = terrain.mesh();
    let (mut finest_near, mut finest_far) = (f32::INFINITY, f32::INFINITY);
    for triangle in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [
            mesh.vertices[triangle[0] as usize],
            mesh.vertices[triangle[1] as usize],
            mesh.vertices[triangle[2] as usize],
        ];
        let area = ((b.x - a.x) * (c.z - a.z) - (b.z - a.z) * (c.x - a.x)).abs() * 0.5;
        let centroid = (a + b + c) / 3.0;
        let distance = Vec2::new(centroid.x, centroid.z).length();
        if distance < 64.0 {
            finest_near = finest_near.min(area);
        } else if distance > 512.0 {
            finest_far = finest_far.min(area);
        }
        let expected = terrain.sample(Vec2::new(a.x, a.z))?;
        assert!(
            (a.y - expected).abs() < 1e-3,
            "vertex at ({}, {}) off the field",
            a.x,
            a.z
        );
    }
    assert!(
        finest_near < finest_far,
        "finest triangle near the origin ({}) should beat the far field ({})",
        finest_near,
        finest_far
    );
    Ok(())
}

#[test]
fn detail_concentrates_near_the_viewer() -> Result<()> {
    init_logging();
    let mut terrain = Terrain::with_defaults(small_config())?;
    let reference = Vec2::new(40.0, 40.0);
    settle(&mut terrain, reference, 64);

    let mesh = terrain.mesh();
    let (mut near, mut far) = (0usize, 0usize);
    for triangle in mesh.indices.chunks_exact(3) {
        let centroid = triangle
            .iter()
            .map(|&i| mesh.vertices[i as usize])
            .fold(Vec3::ZERO, |acc, v| acc + v)
            / 3.0;
        let distance = (Vec2::new(centroid.x, centroid.z) - reference).length();
        if distance < 16.0 {
            near += 1;
        } else if distance > 48.0 {
            far += 1;
        }
    }
    assert!(near > far, "near {} vs far {} triangles", near, far);
    Ok(())
}

#[test]
fn walking_off_the_edge_grows_the_world() -> Result<()> {
    init_logging();
    let config = TerrainConfig {
        view_distance: 64.0,
        min_node_size: 8.0,
        levels_of_detail: 4,
        lod_exponent: 1.0,
        ..TerrainConfig::default()
    };
    let mut terrain = Terrain::with_defaults(config)?;
    settle(&mut terrain, Vec2::ZERO, 32);
    let initial = terrain.root_bounds();

    // stride east well past the root boundary
    let mut grows = 0;
    for step in 0..40 {
        let reference = Vec2::new(step as f32 * 10.0, 0.0);
        grows += terrain.update(reference).grows;
    }
    assert!(grows > 0);
    assert!(terrain.root_bounds().size().x > initial.size().x);
    assert!(terrain.root_bounds().contains(Vec2::new(390.0, 0.0)));
    Ok(())
}

#[test]
fn revisited_ground_reuses_cached_heights() -> Result<()> {
    init_logging();

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingField(Arc<AtomicUsize>);

    impl HeightField for CountingField {
        fn height(&self, position: Vec2) -> f32 {
            self.0.fetch_add(1, Ordering::Relaxed);
            (position.x * 0.01).sin() * 5.0
        }
    }

    let samples = Arc::new(AtomicUsize::new(0));
    let config = small_config();
    let lod = DistanceLod::from_config(&config);
    let mut terrain = Terrain::new(
        config,
        Box::new(CountingField(samples.clone())),
        Box::new(lod),
        Box::new(NullVisualPool::default()),
    )?;

    settle(&mut terrain, Vec2::ZERO, 64);
    let after_first = samples.load(Ordering::Relaxed);
    assert!(after_first > 0);

    // wander away and come back; corners persist, so the revisit should
    // add far fewer samples than the first visit did
    settle(&mut terrain, Vec2::new(100.0, 0.0), 64);
    let before_return = samples.load(Ordering::Relaxed);
    settle(&mut terrain, Vec2::ZERO, 64);
    let revisit_samples = samples.load(Ordering::Relaxed) - before_return;
    assert!(
        revisit_samples < after_first / 2,
        "revisit resampled too much: {} then {}",
        after_first,
        revisit_samples
    );
    Ok(())
}

#[test]
fn visual_pool_slots_track_leaf_nodes() -> Result<()> {
    init_logging();

    use relief::{VisualHandle, VisualPool};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Forwards to a [`RecyclingPool`] while counting the traffic.
    struct CountingPool {
        inner: RecyclingPool,
        acquired: Arc<AtomicUsize>,
        released: Arc<AtomicUsize>,
    }

    impl VisualPool for CountingPool {
        fn acquire(&mut self) -> VisualHandle {
            self.acquired.fetch_add(1, Ordering::Relaxed);
            self.inner.acquire()
        }
        fn release(&mut self, handle: VisualHandle) {
            self.released.fetch_add(1, Ordering::Relaxed);
            self.inner.release(handle);
        }
        fn set_enabled(&mut self, handle: VisualHandle, enabled: bool) {
            self.inner.set_enabled(handle, enabled);
        }
        fn set_origin(&mut self, handle: VisualHandle, origin: Vec3) {
            self.inner.set_origin(handle, origin);
        }
    }

    let acquired = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicUsize::new(0));
    let config = TerrainConfig {
        view_distance: 64.0,
        min_node_size: 16.0,
        levels_of_detail: 4,
        lod_exponent: 2.0,
        ..TerrainConfig::default()
    };
    let lod = DistanceLod::from_config(&config);
    let mut terrain = Terrain::new(
        config,
        Box::new(FlatField),
        Box::new(lod),
        Box::new(CountingPool {
            inner: RecyclingPool::new(),
            acquired: acquired.clone(),
            released: released.clone(),
        }),
    )?;
    settle(&mut terrain, Vec2::new(-10.0, -10.0), 64);

    let stats = terrain.stats();
    assert!(stats.nodes > 1, "deep detail must split the node tree");

    // every node is a leaf or has exactly four children, so a tree of n
    // nodes carries (3n + 1) / 4 leaves; each leaf owns one visual slot
    let outstanding = acquired.load(Ordering::Relaxed) - released.load(Ordering::Relaxed);
    assert_eq!(outstanding, (3 * stats.nodes + 1) / 4);
    Ok(())
}

struct FlatField;

impl HeightField for FlatField {
    fn height(&self, _position: Vec2) -> f32 {
        0.0
    }
}

#[test]
fn mesh_has_no_degenerate_triangles() -> Result<()> {
    init_logging();
    let mut terrain = Terrain::with_defaults(small_config())?;
    settle(&mut terrain, Vec2::new(-5.0, 17.0), 64);

    let MeshBuffers { vertices, indices } = terrain.mesh();
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [
            vertices[triangle[0] as usize],
            vertices[triangle[1] as usize],
            vertices[triangle[2] as usize],
        ];
        let area = (b - a).cross(c - a).length();
        assert!(area > 0.0, "degenerate triangle {:?} {:?} {:?}", a, b, c);
    }
    Ok(())
}

#[test]
fn config_round_trips_through_toml() -> Result<()> {
    let config = TerrainConfig::from_toml_str(
        r#"
            view_distance = 512.0
            levels_of_detail = 5
            min_node_size = 8.0
            seed = 1234
        "#,
    )?;
    let mut terrain = Terrain::with_defaults(config)?;
    let stats = terrain.update(Vec2::ZERO);
    assert!(stats.triangles > 0);
    Ok(())
}
