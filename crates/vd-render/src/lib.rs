pub mod backend;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod hit;
pub mod paint;
pub mod perf;
pub mod software;

pub use backend::{BackendKind, BackendStats, GroupShadow, GroupStyle, Quad, RendererBackend, TextureId};
pub use engine::{
    BackendChoice, EngineConfig, EngineState, EngineStatus, FrameOutcome, FrameReport, RenderMode, RenderingEngine,
};
pub use error::RenderError;
pub use hardware::{HardwareContextProvider, HardwareRenderer, HardwareSurface, Headless};
pub use hit::{HIT_TOLERANCE, hit_test, hit_test_all, hit_test_rect};
pub use perf::{PerformanceMetrics, PerformanceMonitor};
pub use software::SoftwareRenderer;
