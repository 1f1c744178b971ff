// src/lib.rs
//! Etherflow
//!
//! A decorative liquid background: a stable-fluids solver stirred by the
//! pointer, or by an idle auto-pilot, and composited through a colour palette
//! with wgpu and winit.

pub mod app;
pub mod config;
pub mod error;
pub mod gfx;
pub mod input;
pub mod performance;
pub mod prelude;
pub mod simulation;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::EtherApp;
pub use config::EtherOptions;
pub use error::{EtherError, Result};

/// Creates an application with default options
pub fn default() -> Result<EtherApp> {
    EtherApp::new(EtherOptions::default())
}
