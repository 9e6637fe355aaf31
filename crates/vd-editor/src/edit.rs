//! Scene edits.
//!
//! Tools and UI panels describe changes as `SceneEdit` values addressed by
//! `NodeId`, never by arena index, so an edit stays meaningful after an
//! undo snapshot rebuilds the arena. [`apply_edit`] routes every edit
//! through `Scene` methods so dirty flags and the spatial index stay
//! consistent.

use vd_core::{NodeId, NodeKind, Paint, Scene, SceneNode, Transform};

#[derive(Debug, Clone)]
pub enum SceneEdit {
    /// Attach `node` under `parent` (the root when `None`).
    AddNode {
        parent: Option<NodeId>,
        node: Box<SceneNode>,
    },
    /// Remove the node and its whole subtree.
    RemoveNode { id: NodeId },
    /// Translate in parent space.
    MoveNode { id: NodeId, dx: f64, dy: f64 },
    /// Resize the intrinsic box; children follow their constraints.
    ResizeNode { id: NodeId, width: f64, height: f64 },
    /// Place at `(x, y)` in parent space with the given size. Used by the
    /// drawing tools while the pointer drags out a shape.
    SetFrame {
        id: NodeId,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    SetTransform { id: NodeId, transform: Transform },
    SetText { id: NodeId, content: String },
    SetFill { id: NodeId, fill: Option<Paint> },
    SetVisible { id: NodeId, visible: bool },
    SetOpacity { id: NodeId, opacity: f32 },
    /// Deep copy next to the original, offset by `(dx, dy)`.
    DuplicateNode { id: NodeId, dx: f64, dy: f64 },
}

impl SceneEdit {
    /// The node this edit targets (for `AddNode`, the node being added).
    pub fn target(&self) -> NodeId {
        match self {
            Self::AddNode { node, .. } => node.id,
            Self::RemoveNode { id }
            | Self::MoveNode { id, .. }
            | Self::ResizeNode { id, .. }
            | Self::SetFrame { id, .. }
            | Self::SetTransform { id, .. }
            | Self::SetText { id, .. }
            | Self::SetFill { id, .. }
            | Self::SetVisible { id, .. }
            | Self::SetOpacity { id, .. }
            | Self::DuplicateNode { id, .. } => *id,
        }
    }

    /// Short label for the undo history.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AddNode { .. } => "Add",
            Self::RemoveNode { .. } => "Delete",
            Self::MoveNode { .. } => "Move",
            Self::ResizeNode { .. } | Self::SetFrame { .. } => "Resize",
            Self::SetTransform { .. } => "Transform",
            Self::SetText { .. } => "Edit text",
            Self::SetFill { .. } => "Change fill",
            Self::SetVisible { .. } => "Toggle visibility",
            Self::SetOpacity { .. } => "Change opacity",
            Self::DuplicateNode { .. } => "Duplicate",
        }
    }
}

/// Apply `edit` to `scene`. Returns `false` when it changed nothing
/// (unknown node, property the kind doesn't have).
pub fn apply_edit(scene: &mut Scene, edit: &SceneEdit) -> bool {
    if let SceneEdit::AddNode { parent, node } = edit {
        let parent = match parent {
            Some(id) => match scene.index_of(*id) {
                Some(idx) => Some(idx),
                None => {
                    log::warn!("edit: parent {id} not found, {} not added", node.id);
                    return false;
                }
            },
            None => None,
        };
        return match scene.add_node((**node).clone(), parent) {
            Ok(_) => true,
            Err(err) => {
                log::warn!("edit: {err}");
                false
            }
        };
    }

    let Some(idx) = scene.index_of(edit.target()) else {
        log::debug!("edit: {} not in scene, skipped", edit.target());
        return false;
    };
    match edit {
        SceneEdit::AddNode { .. } => false,
        SceneEdit::RemoveNode { .. } => !scene.remove_subtree(idx).is_empty(),
        SceneEdit::MoveNode { dx, dy, .. } => scene.translate_node(idx, *dx, *dy),
        SceneEdit::ResizeNode { width, height, .. } => scene.resize_node(idx, *width, *height),
        SceneEdit::SetFrame {
            x,
            y,
            width,
            height,
            ..
        } => {
            let moved = scene.edit_transform(idx, |t| {
                let (tx, ty) = t.translation();
                t.pre_multiply(&Transform::from_translation(x - tx, y - ty));
            });
            moved && scene.resize_node(idx, width.max(0.0), height.max(0.0))
        }
        SceneEdit::SetTransform { transform, .. } => scene.set_transform(idx, transform.clone()),
        SceneEdit::SetText { content, .. } => {
            let is_text = scene
                .get(idx)
                .is_some_and(|n| matches!(n.kind, NodeKind::Text(_)));
            is_text
                && scene.edit(idx, |n| {
                    if let NodeKind::Text(text) = &mut n.kind {
                        text.content = content.clone();
                    }
                })
        }
        SceneEdit::SetFill { fill, .. } => {
            let paintable = scene
                .get(idx)
                .is_some_and(|n| matches!(n.kind, NodeKind::Shape(_) | NodeKind::Text(_)));
            paintable
                && scene.edit(idx, |n| match &mut n.kind {
                    NodeKind::Shape(props) => props.fill = fill.clone(),
                    NodeKind::Text(text) => text.fill = fill.clone(),
                    _ => {}
                })
        }
        SceneEdit::SetVisible { visible, .. } => scene.set_visible(idx, *visible),
        SceneEdit::SetOpacity { opacity, .. } => scene.edit(idx, |n| n.opacity = opacity.clamp(0.0, 1.0)),
        SceneEdit::DuplicateNode { dx, dy, .. } => {
            let Some(copy) = scene.clone_node(idx, true) else {
                return false;
            };
            match scene.parent(idx) {
                Some(parent) => {
                    scene.add_child(parent, copy);
                }
                None => log::debug!("edit: duplicated a parentless node; copy stays detached"),
            }
            scene.translate_node(copy, *dx, *dy)
        }
    }
}
