use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec2;
use relief::{Terrain, TerrainConfig};

fn config() -> TerrainConfig {
    TerrainConfig {
        view_distance: 512.0,
        min_node_size: 8.0,
        levels_of_detail: 6,
        seed: 99,
        ..TerrainConfig::default()
    }
}

fn settled_terrain(reference: Vec2) -> Terrain {
    let mut terrain = Terrain::with_defaults(config()).expect("valid bench config");
    for _ in 0..64 {
        if terrain.update(reference).is_settled() {
            break;
        }
    }
    terrain
}

fn bench_update(c: &mut Criterion) {
    c.bench_function("update/settled", |b| {
        let mut terrain = settled_terrain(Vec2::ZERO);
        b.iter(|| black_box(terrain.update(black_box(Vec2::ZERO))));
    });

    c.bench_function("update/walking", |b| {
        let mut terrain = settled_terrain(Vec2::ZERO);
        let mut t = 0f32;
        b.iter(|| {
            t += 1.0;
            let reference = Vec2::new((t * 0.05).sin(), (t * 0.05).cos()) * 200.0;
            black_box(terrain.update(black_box(reference)))
        });
    });

    c.bench_function("update/cold_build", |b| {
        b.iter(|| {
            let mut terrain = Terrain::with_defaults(config()).expect("valid bench config");
            for _ in 0..8 {
                terrain.update(black_box(Vec2::new(30.0, -45.0)));
            }
            black_box(terrain.stats().triangles)
        });
    });
}

fn bench_mesh_extract(c: &mut Criterion) {
    c.bench_function("mesh/extract", |b| {
        let terrain = settled_terrain(Vec2::new(15.0, 25.0));
        b.iter(|| black_box(terrain.mesh().triangle_count()));
    });
}

criterion_group!(benches, bench_update, bench_mesh_extract);
criterion_main!(benches);
