//! Undo/Redo command stack.
//!
//! Every command stores MessagePack snapshots of the document (the root
//! subtree) taken before and after the edit, so undo/redo replaces the
//! whole tree in a single step. Node ids survive the round trip; arena
//! indices do not, which is why edits address nodes by id.
//!
//! Drag gestures use **snapshot batching**: the document is captured when
//! the outermost batch opens and compared when it closes; all edits in
//! between are applied live and become one undo step.

use crate::edit::{SceneEdit, apply_edit};
use crate::error::EditorError;
use vd_core::{NodeJson, Scene};

/// A reversible document change.
#[derive(Debug, Clone)]
pub struct Command {
    pub before: Vec<u8>,
    pub after: Vec<u8>,
    /// Human-readable description for UI display.
    pub description: String,
}

/// Encode the document for undo.
pub fn snapshot(scene: &Scene) -> Result<Vec<u8>, EditorError> {
    let doc = scene.root().map(|root| scene.to_json(root)).transpose()?;
    Ok(rmp_serde::to_vec_named(&doc)?)
}

/// Replace the document with a snapshot. Selection is cleared since the
/// restored nodes live at new arena indices.
pub fn restore(scene: &mut Scene, snapshot: &[u8]) -> Result<(), EditorError> {
    let doc: Option<NodeJson> = rmp_serde::from_slice(snapshot)?;
    scene.clear_selection();
    if let Some(root) = scene.root() {
        scene.remove_subtree(root);
    }
    if let Some(doc) = doc {
        scene.from_json(&doc)?;
    }
    Ok(())
}

/// Manages undo/redo stacks with batch grouping for drag gestures.
#[derive(Debug)]
pub struct CommandStack {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    /// Maximum undo depth.
    max_depth: usize,
    /// Batch nesting depth (0 = not batching).
    batch_depth: usize,
    /// Snapshot and description captured when the outermost batch opened.
    batch_snapshot: Option<(Vec<u8>, String)>,
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new(100)
    }
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth.min(256)),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
            batch_depth: 0,
            batch_snapshot: None,
        }
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    /// Start a batch group. All edits until the matching `end_batch()`
    /// are applied live but tracked as one atomic undo step.
    pub fn begin_batch(&mut self, scene: &Scene, description: &str) -> Result<(), EditorError> {
        if self.batch_depth == 0 {
            self.batch_snapshot = Some((snapshot(scene)?, description.to_string()));
        }
        self.batch_depth += 1;
        Ok(())
    }

    /// End a batch group. When the outermost batch closes and the document
    /// changed, one command lands on the undo stack. Returns whether it did.
    pub fn end_batch(&mut self, scene: &Scene) -> Result<bool, EditorError> {
        if self.batch_depth == 0 {
            return Ok(false);
        }
        self.batch_depth -= 1;
        if self.batch_depth > 0 {
            return Ok(false);
        }
        let Some((before, description)) = self.batch_snapshot.take() else {
            return Ok(false);
        };
        let after = snapshot(scene)?;
        if before == after {
            return Ok(false);
        }
        self.push(Command {
            before,
            after,
            description,
        });
        Ok(true)
    }

    /// Apply an edit and record it. Inside a batch the edit is applied
    /// live and folded into the batch. Returns whether the scene changed.
    pub fn execute(&mut self, scene: &mut Scene, edit: &SceneEdit, description: &str) -> Result<bool, EditorError> {
        if self.batch_depth > 0 {
            return Ok(apply_edit(scene, edit));
        }
        let before = snapshot(scene)?;
        if !apply_edit(scene, edit) {
            return Ok(false);
        }
        let after = snapshot(scene)?;
        self.push(Command {
            before,
            after,
            description: description.to_string(),
        });
        Ok(true)
    }

    fn push(&mut self, cmd: Command) {
        log::debug!("commands: recorded {:?}", cmd.description);
        self.undo_stack.push(cmd);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        // Clear redo stack on new action
        self.redo_stack.clear();
    }

    /// Undo the last command. Refused while a batch is open.
    pub fn undo(&mut self, scene: &mut Scene) -> Result<Option<String>, EditorError> {
        if self.batch_depth > 0 {
            return Ok(None);
        }
        let Some(cmd) = self.undo_stack.pop() else {
            return Ok(None);
        };
        if let Err(err) = restore(scene, &cmd.before) {
            self.undo_stack.push(cmd);
            return Err(err);
        }
        let desc = cmd.description.clone();
        self.redo_stack.push(cmd);
        Ok(Some(desc))
    }

    /// Redo the last undone command.
    pub fn redo(&mut self, scene: &mut Scene) -> Result<Option<String>, EditorError> {
        if self.batch_depth > 0 {
            return Ok(None);
        }
        let Some(cmd) = self.redo_stack.pop() else {
            return Ok(None);
        };
        if let Err(err) = restore(scene, &cmd.after) {
            self.redo_stack.push(cmd);
            return Err(err);
        }
        let desc = cmd.description.clone();
        self.undo_stack.push(cmd);
        Ok(Some(desc))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch_depth = 0;
        self.batch_snapshot = None;
    }
}
