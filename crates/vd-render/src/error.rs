//! Renderer failures.
//!
//! Only resource acquisition surfaces as an error. Everything a frame can
//! survive (missing texture, unknown target) is a logged no-op.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("hardware context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("hardware context lost")]
    ContextLost,

    #[error("render target incomplete: {0}")]
    IncompleteTarget(String),

    #[error("texture data is {got} bytes, expected {expected} for {width}x{height} rgba8")]
    TextureSize {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },

    #[error("invalid engine config: {0}")]
    Config(#[from] serde_json::Error),
}
