//! Solver parameters
//!
//! Fixed at construction, but the host may replace them between ticks.

use cgmath::Vector2;

use super::field::GridSize;

/// Tunables for [`FluidSimulation`](super::fluid::FluidSimulation)
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationParams {
    /// Fixed simulation time step
    pub dt: f32,
    /// Diffusion coefficient used when `is_viscous` is set
    pub viscous: f32,
    pub is_viscous: bool,
    pub iterations_viscous: usize,
    pub iterations_poisson: usize,
    /// Scale applied to the pointer delta before injection
    pub mouse_force: f32,
    /// Force kernel radius in grid cells
    pub cursor_size: f32,
    /// Grid density relative to the container size
    pub resolution: f32,
    /// Open edges (no margin) instead of a one-cell clamped margin
    pub is_bounce: bool,
    /// Error-corrected (back and forth) advection
    pub bfecc: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            dt: 0.014,
            viscous: 30.0,
            is_viscous: false,
            iterations_viscous: 32,
            iterations_poisson: 32,
            mouse_force: 20.0,
            cursor_size: 100.0,
            resolution: 0.5,
            is_bounce: false,
            bfecc: true,
        }
    }
}

impl SimulationParams {
    /// Untouched border in uv units: zero for open edges, one cell when clamped
    pub fn margin(&self, size: GridSize) -> Vector2<f32> {
        if self.is_bounce {
            Vector2::new(0.0, 0.0)
        } else {
            size.cell_scale()
        }
    }
}
