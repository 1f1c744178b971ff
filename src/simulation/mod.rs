// src/simulation/mod.rs
//! Simulation system
//!
//! A stable-fluids solver laid out as six full-grid passes. The GPU solver
//! runs them as compute dispatches; the CPU solver runs the same schedule over
//! `Vec` grids and serves as the reference the tests measure. The manager
//! drives either one from window events.

pub mod buffers;
pub mod clock;
pub mod field;
pub mod fluid;
pub mod gpu;
pub mod manager;
pub mod params;
pub mod pass;
pub mod schedule;
pub mod traits;
