use thiserror::Error;
use vd_core::SceneError;
use vd_render::RenderError;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("snapshot encoding failed: {0}")]
    SnapshotEncode(#[from] rmp_serde::encode::Error),

    #[error("snapshot decoding failed: {0}")]
    SnapshotDecode(#[from] rmp_serde::decode::Error),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("invalid selection config: {0}")]
    Config(#[from] serde_json::Error),
}
