//! Large-scene checks for the spatial index. The timing benchmark is
//! ignored; the exactness check runs with the normal suite.

use pretty_assertions::assert_eq;
use std::time::Instant;
use vd_core::{Aabb, KindTag, NodeIndex, NodeKind, QueryFilter, Scene, SceneNode};

fn grid_scene(count: usize) -> (Scene, Vec<NodeIndex>) {
    let mut scene = Scene::new();
    let root = scene.add_node(SceneNode::fresh(NodeKind::group()), None).unwrap();
    let nodes = (0..count)
        .map(|i| {
            let x = (i % 250) as f64 * 40.0;
            let y = (i / 250) as f64 * 40.0;
            scene
                .add_node(SceneNode::fresh(NodeKind::rect(30.0, 30.0)).at(x, y), Some(root))
                .expect("insert failed")
        })
        .collect();
    scene.refresh();
    (scene, nodes)
}

#[test]
fn moves_in_large_scene_keep_index_exact() {
    let (mut scene, nodes) = grid_scene(20_000);

    // Move every 40th rect 5px right, so neighbours never overlap.
    for &idx in nodes.iter().step_by(40) {
        scene.translate_node(idx, 5.0, 0.0);
    }
    scene.refresh();

    let shapes = QueryFilter {
        kind: Some(KindTag::Shape),
        ..QueryFilter::default()
    };
    for (i, &idx) in nodes.iter().enumerate().step_by(40).take(100) {
        let x = (i % 250) as f64 * 40.0;
        let y = (i / 250) as f64 * 40.0;
        let old_strip = Aabb::new(x + 1.0, y + 1.0, 3.0, 3.0);
        let new_strip = Aabb::new(x + 32.0, y + 1.0, 2.0, 3.0);
        assert!(scene.query_region(&old_strip, &shapes).is_empty());
        assert_eq!(scene.query_region(&new_strip, &shapes), vec![idx]);
    }
}

#[test]
#[ignore] // Run manually with `cargo test --test perf_benchmark -- --nocapture --ignored`
fn benchmark_bulk_insert_update_and_query() {
    let start = Instant::now();
    let (mut scene, nodes) = grid_scene(50_000);
    println!("Inserted and indexed 50,000 rects in {:?}", start.elapsed());

    let start = Instant::now();
    for &idx in nodes.iter().step_by(10) {
        scene.translate_node(idx, 3.0, 3.0);
    }
    scene.refresh();
    println!("Moved 5,000 rects in {:?}", start.elapsed());

    let start = Instant::now();
    let mut total = 0;
    for i in 0..1_000 {
        let q = Aabb::new((i % 100) as f64 * 90.0, (i / 100) as f64 * 700.0, 200.0, 200.0);
        total += scene.query_region(&q, &QueryFilter::default()).len();
    }
    println!("1,000 region queries ({total} hits) in {:?}", start.elapsed());
}
