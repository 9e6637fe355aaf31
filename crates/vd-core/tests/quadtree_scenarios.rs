//! QuadTree scenarios against brute-force references.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use vd_core::{Aabb, QuadTree, QuadTreeConfig};

#[test]
fn fifty_points_radius_queries_are_exact() {
    let mut rng = StdRng::seed_from_u64(50);
    let mut tree = QuadTree::new(
        Aabb::new(0.0, 0.0, 1000.0, 1000.0),
        QuadTreeConfig {
            max_objects: 10,
            max_levels: 5,
        },
    );
    let points: Vec<(usize, f64, f64)> = (0..50)
        .map(|i| (i, rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)))
        .collect();
    for &(i, x, y) in &points {
        tree.insert(i, Aabb::new(x, y, 0.0, 0.0));
    }
    assert_eq!(tree.get_stats().total_objects, 50);
    assert!(tree.get_stats().total_nodes > 1);

    for _ in 0..30 {
        let (cx, cy) = (rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0));
        let r = rng.gen_range(10.0..250.0);
        let got: HashSet<usize> = tree.query_radius(cx, cy, r).into_iter().collect();
        let brute: HashSet<usize> = points
            .iter()
            .filter(|(_, x, y)| (x - cx).hypot(y - cy) <= r)
            .map(|(i, _, _)| *i)
            .collect();
        assert!(got.is_subset(&brute));
        assert_eq!(got, brute);
    }
}

#[test]
fn churn_preserves_live_set() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut tree = QuadTree::new(Aabb::new(0.0, 0.0, 512.0, 512.0), QuadTreeConfig::default());
    let mut live: Vec<(u32, Aabb)> = Vec::new();

    for key in 0..400_u32 {
        let b = Aabb::new(
            rng.gen_range(-20.0..500.0),
            rng.gen_range(-20.0..500.0),
            rng.gen_range(0.5..60.0),
            rng.gen_range(0.5..60.0),
        );
        tree.insert(key, b);
        live.push((key, b));
        if rng.gen_bool(0.3) && !live.is_empty() {
            let victim = live.swap_remove(rng.gen_range(0..live.len()));
            assert!(tree.remove(victim.0));
        }
    }
    assert_eq!(tree.len(), live.len());
    assert_eq!(tree.get_stats().total_objects, live.len());

    let everything: HashSet<u32> = tree
        .query_region(&Aabb::new(-100.0, -100.0, 800.0, 800.0))
        .into_iter()
        .collect();
    let expected: HashSet<u32> = live.iter().map(|(k, _)| *k).collect();
    assert_eq!(everything, expected);
}
