pub mod app;
pub mod commands;
pub mod edit;
pub mod error;
pub mod input;
pub mod selection;
pub mod tools;

pub use app::{AppContext, EditorConfig, FrameSummary, SystemStage, UpdateSystem};
pub use commands::{Command, CommandStack};
pub use edit::{SceneEdit, apply_edit};
pub use error::EditorError;
pub use input::{InputEvent, Modifiers};
pub use selection::{Handle, HandleKind, InteractionState, SelectionConfig, SelectionManager};
pub use tools::{Tool, ToolContext, ToolKind, make_tool};
