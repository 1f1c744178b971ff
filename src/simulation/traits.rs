//! Core simulation trait for the etherflow engine
//!
//! Defines the interface the host drives every frame. Both fluid solvers
//! implement it; the host only talks to them through this trait.

use super::{
    field::{GridSize, VelocityField},
    params::SimulationParams,
};
use crate::input::PointerSample;

/// Velocity field on the GPU, ready to bind as a read-only storage buffer
#[derive(Clone, Copy, Debug)]
pub struct GpuField<'a> {
    pub buffer: &'a wgpu::Buffer,
    pub size: GridSize,
    /// Changes whenever the buffer is reallocated
    pub allocation: u64,
}

/// Where the composited velocity lives after a tick
#[derive(Clone, Copy, Debug)]
pub enum FieldView<'a> {
    Cpu(&'a VelocityField),
    Gpu(GpuField<'a>),
}

impl FieldView<'_> {
    pub fn size(&self) -> GridSize {
        match self {
            FieldView::Cpu(field) => field.size(),
            FieldView::Gpu(field) => field.size,
        }
    }
}

/// A grid simulation that can be ticked, resized and composited
pub trait Simulation {
    /// Advance the simulation by one time step
    ///
    /// # Arguments
    /// * `pointer` - Pointer position and per-frame delta to inject
    /// * `delta_time` - Step size in seconds
    fn update(&mut self, pointer: &PointerSample, delta_time: f32);

    /// Reallocate for a new container size in logical pixels
    ///
    /// All field state is discarded; the simulation restarts cold.
    fn resize(&mut self, container: (f32, f32));

    /// Zero every field while keeping the current size
    fn reset(&mut self);

    fn params(&self) -> &SimulationParams;

    /// Replace the parameters. A resolution change reallocates the grid.
    fn set_params(&mut self, params: SimulationParams);

    fn grid_size(&self) -> GridSize;

    /// Field that should be composited to the screen
    fn output(&self) -> FieldView<'_>;

    /// Get simulation name for logging
    fn name(&self) -> &str;

    /// Whether simulation is currently running
    fn is_running(&self) -> bool;

    /// Start/pause simulation
    fn set_running(&mut self, running: bool);

    /// Optional: release resources when the host is torn down
    fn cleanup(&mut self) {
        // Default: no cleanup needed
    }
}
