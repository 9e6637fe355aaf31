//! Hit testing: point → node lookup.
//!
//! The spatial index narrows candidates to nodes whose painted bounds
//! come within tolerance of the point; each candidate is then tested against its real
//! geometry in local space, front to back in layer paint order.

use crate::paint::geometry_path;
use kurbo::{PathEl, Point, Shape};
use std::collections::HashSet;
use vd_core::model::{NodeKind, ShapeGeometry};
use vd_core::{Aabb, LayerManager, NodeIndex, QueryFilter, Scene, SceneNode};

/// Slack, in local units, for thin geometry like lines and open paths.
pub const HIT_TOLERANCE: f64 = 3.0;

/// Find the topmost unlocked node at (`x`, `y`).
/// Returns `None` for background (the root never counts).
pub fn hit_test(scene: &mut Scene, layers: &mut LayerManager, x: f64, y: f64) -> Option<NodeIndex> {
    hit_test_all(scene, layers, x, y).into_iter().next()
}

/// Every unlocked node under (`x`, `y`), topmost first.
pub fn hit_test_all(scene: &mut Scene, layers: &mut LayerManager, x: f64, y: f64) -> Vec<NodeIndex> {
    let probe = Aabb::new(
        x - HIT_TOLERANCE,
        y - HIT_TOLERANCE,
        2.0 * HIT_TOLERANCE,
        2.0 * HIT_TOLERANCE,
    );
    let candidates: HashSet<NodeIndex> = scene
        .query_region(&probe, &QueryFilter::default())
        .into_iter()
        .collect();
    if candidates.is_empty() {
        return Vec::new();
    }
    let order: Vec<NodeIndex> = layers
        .get_sorted_nodes(scene)
        .iter()
        .flat_map(|layer| layer.nodes.iter().copied())
        .collect();
    let scene: &Scene = scene;
    let layers: &LayerManager = layers;
    let root = scene.root();

    order
        .into_iter()
        .rev()
        .filter(|idx| candidates.contains(idx) && Some(*idx) != root)
        .filter(|&idx| !layers.is_node_locked(scene, idx))
        .filter(|&idx| scene.get(idx).is_some_and(|node| contains_point(node, x, y)))
        .collect()
}

/// Nodes whose own painted area intersects `rect`, in paint order.
/// Used for marquee (box) selection; skips the root, groups and locked nodes.
pub fn hit_test_rect(scene: &mut Scene, layers: &LayerManager, rect: &Aabb) -> Vec<NodeIndex> {
    let hits: HashSet<NodeIndex> = scene
        .query_region(rect, &QueryFilter::default())
        .into_iter()
        .collect();
    let scene: &Scene = scene;
    let root = scene.root();
    scene
        .paint_order()
        .into_iter()
        .filter(|idx| hits.contains(idx) && Some(*idx) != root)
        .filter(|&idx| {
            scene.get(idx).is_some_and(|node| {
                !matches!(node.kind, NodeKind::Group(_)) && node.own_world_bounds().intersects_aabb(rect)
            })
        })
        .filter(|&idx| !layers.is_node_locked(scene, idx))
        .collect()
}

/// Exact containment against the node's geometry. Assumes the node's
/// cached world transform is fresh.
pub fn contains_point(node: &SceneNode, x: f64, y: f64) -> bool {
    let world = node.world_transform();
    if world.determinant().abs() < f64::EPSILON {
        return false;
    }
    let (lx, ly) = world.invert().transform_point(x, y);
    let p = Point::new(lx, ly);

    match &node.kind {
        NodeKind::Shape(props) => {
            let half_stroke = props.stroke.as_ref().map_or(0.0, |s| s.width / 2.0);
            let path = geometry_path(&props.geometry);
            let thin = matches!(props.geometry, ShapeGeometry::Line { .. }) || props.fill.is_none();
            if thin {
                near_outline(&path, p, half_stroke.max(HIT_TOLERANCE))
            } else {
                path.contains(p) || (half_stroke > 0.0 && near_outline(&path, p, half_stroke))
            }
        }
        NodeKind::Group(_) => false,
        other => other.local_bounds().contains_point(lx, ly),
    }
}

/// `true` when `p` lies within `tolerance` of any flattened segment.
fn near_outline(path: &kurbo::BezPath, p: Point, tolerance: f64) -> bool {
    let mut hit = false;
    let mut start: Option<Point> = None;
    let mut last: Option<Point> = None;
    kurbo::flatten(path.iter(), 0.25, |el| {
        if hit {
            return;
        }
        match el {
            PathEl::MoveTo(q) => {
                start = Some(q);
                last = Some(q);
                hit = p.distance(q) <= tolerance;
            }
            PathEl::LineTo(q) => {
                if let Some(a) = last {
                    hit = segment_distance(p, a, q) <= tolerance;
                }
                last = Some(q);
            }
            PathEl::ClosePath => {
                if let (Some(a), Some(s)) = (last, start) {
                    hit = segment_distance(p, a, s) <= tolerance;
                }
                last = start;
            }
            _ => {}
        }
    });
    hit
}

/// Distance from `p` to segment `a–b`. A zero-length segment is a point.
fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.hypot2();
    if len2 <= f64::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vd_core::model::{Color, Paint, Stroke};

    fn scene_with_root() -> (Scene, NodeIndex) {
        let mut scene = Scene::new();
        let root = scene
            .add_node(SceneNode::fresh(NodeKind::artboard(800.0, 600.0)), None)
            .unwrap();
        (scene, root)
    }

    fn filled(kind: NodeKind) -> SceneNode {
        let mut node = SceneNode::fresh(kind);
        if let NodeKind::Shape(props) = &mut node.kind {
            props.fill = Some(Paint::solid(Color::BLACK));
        }
        node
    }

    #[test]
    fn topmost_wins_and_root_is_background() {
        let (mut scene, root) = scene_with_root();
        let mut layers = LayerManager::new();
        let a = scene.add_node(filled(NodeKind::rect(100.0, 100.0)).at(10.0, 10.0), Some(root)).unwrap();
        let b = scene.add_node(filled(NodeKind::rect(50.0, 50.0)).at(50.0, 50.0), Some(root)).unwrap();

        assert_eq!(hit_test(&mut scene, &mut layers, 60.0, 60.0), Some(b));
        assert_eq!(hit_test(&mut scene, &mut layers, 20.0, 20.0), Some(a));
        assert_eq!(hit_test(&mut scene, &mut layers, 700.0, 500.0), None);
        assert_eq!(hit_test_all(&mut scene, &mut layers, 60.0, 60.0), vec![b, a]);
    }

    #[test]
    fn ellipse_corner_misses() {
        let (mut scene, root) = scene_with_root();
        let mut layers = LayerManager::new();
        let e = scene.add_node(filled(NodeKind::ellipse(100.0, 100.0)), Some(root)).unwrap();
        assert_eq!(hit_test(&mut scene, &mut layers, 50.0, 50.0), Some(e));
        assert_eq!(hit_test(&mut scene, &mut layers, 3.0, 3.0), None);
    }

    #[test]
    fn layer_order_beats_document_order() {
        let (mut scene, root) = scene_with_root();
        let mut layers = LayerManager::new();
        let top = layers.create_layer("overlay", 10);
        let low = scene.add_node(filled(NodeKind::rect(40.0, 40.0)), Some(root)).unwrap();
        let high = scene.add_node(filled(NodeKind::rect(40.0, 40.0)), Some(root)).unwrap();
        assert!(layers.assign(&mut scene, low, top));
        assert_eq!(hit_test(&mut scene, &mut layers, 20.0, 20.0), Some(low));
        assert!(layers.set_layer_locked(top, true));
        assert_eq!(hit_test(&mut scene, &mut layers, 20.0, 20.0), Some(high));
    }

    #[test]
    fn lines_hit_within_tolerance() {
        let (mut scene, root) = scene_with_root();
        let mut layers = LayerManager::new();
        let mut node = SceneNode::fresh(NodeKind::Shape(vd_core::ShapeProps {
            geometry: ShapeGeometry::Line {
                x1: 0.0,
                y1: 100.0,
                x2: 200.0,
                y2: 100.0,
            },
            fill: None,
            stroke: Some(Stroke::default()),
        }));
        node.name = "rule".into();
        let line = scene.add_node(node, Some(root)).unwrap();
        scene.refresh();
        assert!(contains_point(scene.get(line).unwrap(), 100.0, 102.0));
        assert!(!contains_point(scene.get(line).unwrap(), 100.0, 110.0));
        assert_eq!(hit_test(&mut scene, &mut layers, 100.0, 101.0), Some(line));
    }

    #[test]
    fn zero_length_segment_is_a_point() {
        let p = Point::new(3.0, 4.0);
        assert_eq!(segment_distance(p, Point::ZERO, Point::ZERO), 5.0);
    }

    #[test]
    fn marquee_collects_intersecting_leaves() {
        let (mut scene, root) = scene_with_root();
        let layers = LayerManager::new();
        let group = scene.add_node(SceneNode::fresh(NodeKind::group()), Some(root)).unwrap();
        let a = scene.add_node(filled(NodeKind::rect(10.0, 10.0)).at(5.0, 5.0), Some(group)).unwrap();
        scene.add_node(filled(NodeKind::rect(10.0, 10.0)).at(300.0, 300.0), Some(group)).unwrap();
        let hits = hit_test_rect(&mut scene, &layers, &Aabb::new(0.0, 0.0, 50.0, 50.0));
        assert_eq!(hits, vec![a]);
    }
}
