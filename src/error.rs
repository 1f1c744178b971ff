//! Error types for the etherflow engine
//!
//! Nothing here is fatal to the host: callers log these and skip the feature
//! that failed.

use thiserror::Error;

/// Errors raised while setting up the renderer or loading options
#[derive(Debug, Error)]
pub enum EtherError {
    #[error("failed to create rendering surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no compatible GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to request GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("failed to run the event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("surface reports no supported formats")]
    NoSurfaceFormat,

    #[error("invalid colour stop `{0}`")]
    InvalidColor(String),

    #[error("failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse options: {0}")]
    Options(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EtherError>;
