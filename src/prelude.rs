//! # Etherflow Prelude
//!
//! Commonly used types for driving the fluid headless or embedding it.
//!
//! ```no_run
//! use etherflow::prelude::*;
//! use std::time::Instant;
//!
//! let options = EtherOptions::default();
//! let mut host = SimulationManager::new(&options, (800.0, 600.0), Instant::now());
//! host.start();
//! if let Some(field) = host.tick(Instant::now()) {
//!     let size = field.size();
//!     println!("{}x{}", size.width, size.height);
//! }
//! ```

pub use crate::config::EtherOptions;
pub use crate::error::{EtherError, Result};
pub use crate::input::{AutoPilot, AutoPilotConfig, ContainerRect, PointerSample, PointerTracker};
pub use crate::simulation::{
    field::{GridSize, VelocityField},
    fluid::FluidSimulation,
    gpu::GpuFluidSimulation,
    manager::SimulationManager,
    params::SimulationParams,
    traits::{FieldView, Simulation},
};

pub use cgmath::Vector2;
