//! Stable-fluids solver, CPU reference
//!
//! Runs the six passes in the order given by [`tick_schedule`]:
//! advection, external force, viscosity (optional), divergence, Poisson
//! pressure solve, pressure projection. After a tick the projected velocity is
//! in velocity slot A, ready for the next tick and for compositing.
//!
//! The interactive background runs [`GpuFluidSimulation`](super::gpu::GpuFluidSimulation);
//! this one is what the tests measure and what `cpu_solver` selects.

use cgmath::Vector2;

use super::{
    buffers::{FieldBufferSet, Slot},
    field::{GridSize, VelocityField},
    params::SimulationParams,
    pass::{Pass, PassContext},
    schedule::{tick_schedule, Dispatch, VelocitySource},
    traits::{FieldView, Simulation},
};
use crate::input::PointerSample;

/// The pointer splat of one tick, all in NDC
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceKernel {
    pub force: Vector2<f32>,
    pub center: Vector2<f32>,
    /// Half extent of the kernel quad
    pub radius: Vector2<f32>,
}

impl ForceKernel {
    pub fn new(params: &SimulationParams, size: GridSize, pointer: &PointerSample) -> Self {
        let cell = size.cell_scale();
        let cursor = cell * params.cursor_size;
        Self {
            force: pointer.diff / 2.0 * params.mouse_force,
            center: Vector2::new(
                clamp_center(pointer.coords.x, cursor.x, cell.x),
                clamp_center(pointer.coords.y, cursor.y, cell.y),
            ),
            radius: cursor,
        }
    }
}

/// Keep the force kernel centre away from the edges.
///
/// When the kernel is wider than the grid the range inverts (`lo > hi`) and
/// the result pins to `hi`. This is the historical behaviour and is kept on
/// purpose; `f32::clamp` would panic here.
pub fn clamp_center(coord: f32, cursor: f32, cell: f32) -> f32 {
    let lo = -1.0 + cursor + cell * 2.0;
    let hi = 1.0 - cursor - cell * 2.0;
    coord.max(lo).min(hi)
}

pub struct FluidSimulation {
    name: String,
    params: SimulationParams,
    container: (f32, f32),
    buffers: FieldBufferSet,
    running: bool,
    step_count: u64,
}

impl FluidSimulation {
    /// Create a simulation sized for a container in logical pixels
    pub fn new(params: SimulationParams, container: (f32, f32)) -> Self {
        let size = GridSize::for_container(params.resolution, container);
        log::info!(
            "Fluid grid {}x{} for container {:.0}x{:.0}",
            size.width,
            size.height,
            container.0,
            container.1
        );
        Self {
            name: "Liquid (CPU)".to_string(),
            params,
            container,
            buffers: FieldBufferSet::new(size),
            running: true,
            step_count: 0,
        }
    }

    pub fn buffers(&self) -> &FieldBufferSet {
        &self.buffers
    }

    pub fn velocity(&self) -> &VelocityField {
        self.buffers.velocity_a()
    }

    /// Mutable access to velocity slot A, used to seed a field
    pub fn velocity_mut(&mut self) -> &mut VelocityField {
        self.buffers.velocity.get_mut(Slot::First)
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    fn step(&mut self, pointer: &PointerSample, dt: f32) {
        let size = self.buffers.size();
        let ctx = PassContext {
            margin: self.params.margin(size),
        };
        let kernel = ForceKernel::new(&self.params, size, pointer);
        let params = &self.params;
        let buffers = &mut self.buffers;

        for dispatch in tick_schedule(params) {
            let pass = match dispatch {
                Dispatch::Advection => {
                    let (velocity, output) = buffers.velocity.split(Slot::First);
                    Pass::Advection {
                        velocity,
                        output,
                        dt,
                        bfecc: params.bfecc,
                    }
                }
                Dispatch::ExternalForce => Pass::ExternalForce {
                    output: buffers.velocity.get_mut(Slot::Second),
                    force: kernel.force,
                    center: kernel.center,
                    radius: kernel.radius,
                },
                Dispatch::Viscous(src) => {
                    let (guess, output) = buffers.viscous.split(src);
                    Pass::Viscous {
                        velocity: buffers.velocity.get(Slot::Second),
                        guess,
                        output,
                        viscosity: params.viscous,
                        dt,
                    }
                }
                Dispatch::Divergence(source) => Pass::Divergence {
                    velocity: match source {
                        VelocitySource::Advected => buffers.velocity.get(Slot::Second),
                        VelocitySource::Viscous(slot) => buffers.viscous.get(slot),
                    },
                    output: &mut buffers.divergence,
                    dt,
                },
                Dispatch::Poisson(src) => {
                    let (pressure, output) = buffers.pressure.split(src);
                    Pass::Poisson {
                        pressure,
                        divergence: &buffers.divergence,
                        output,
                    }
                }
                Dispatch::Pressure(source, slot) => {
                    let (velocity, output) = match source {
                        VelocitySource::Advected => buffers.velocity.split(Slot::Second),
                        VelocitySource::Viscous(viscous) => (
                            buffers.viscous.get(viscous),
                            buffers.velocity.get_mut(Slot::First),
                        ),
                    };
                    Pass::Pressure {
                        velocity,
                        pressure: buffers.pressure.get(slot),
                        output,
                        dt,
                    }
                }
            };
            pass.execute(&ctx);
        }
    }
}

impl Simulation for FluidSimulation {
    fn update(&mut self, pointer: &PointerSample, delta_time: f32) {
        if !self.running {
            return;
        }
        self.step(pointer, delta_time);
        self.step_count += 1;
    }

    fn resize(&mut self, container: (f32, f32)) {
        self.container = container;
        let size = GridSize::for_container(self.params.resolution, container);
        log::debug!("Fluid grid resized to {}x{}", size.width, size.height);
        self.buffers.resize(size);
    }

    fn reset(&mut self) {
        self.buffers.clear();
        self.step_count = 0;
    }

    fn params(&self) -> &SimulationParams {
        &self.params
    }

    fn set_params(&mut self, params: SimulationParams) {
        let resolution_changed = params.resolution != self.params.resolution;
        self.params = params;
        if resolution_changed {
            self.resize(self.container);
        }
    }

    fn grid_size(&self) -> GridSize {
        self.buffers.size()
    }

    fn output(&self) -> FieldView<'_> {
        FieldView::Cpu(self.buffers.velocity_a())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    fn cleanup(&mut self) {
        self.buffers.resize(GridSize::new(1, 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::field::divergence_norm;
    use cgmath::InnerSpace;

    fn still_pointer() -> PointerSample {
        PointerSample {
            coords: Vector2::new(0.0, 0.0),
            diff: Vector2::new(0.0, 0.0),
        }
    }

    #[test]
    fn test_resize_sizes_every_buffer() {
        let params = SimulationParams::default();
        let mut sim = FluidSimulation::new(params, (640.0, 480.0));
        assert_eq!(sim.grid_size(), GridSize::new(320, 240));

        sim.resize((333.0, 1.0));
        for size in sim.buffers().buffer_sizes() {
            assert_eq!(size, GridSize::new(167, 1));
        }
    }

    #[test]
    fn test_still_fluid_stays_still() {
        let mut sim = FluidSimulation::new(SimulationParams::default(), (40.0, 40.0));
        sim.update(&still_pointer(), 0.014);
        assert!(sim.velocity().data().iter().all(|v| v.magnitude() == 0.0));
        assert_eq!(sim.step_count(), 1);
    }

    #[test]
    fn test_pointer_motion_injects_velocity() {
        let params = SimulationParams {
            cursor_size: 4.0,
            ..SimulationParams::default()
        };
        let mut sim = FluidSimulation::new(params, (64.0, 64.0));
        let pointer = PointerSample {
            coords: Vector2::new(0.0, 0.0),
            diff: Vector2::new(0.05, 0.0),
        };
        sim.update(&pointer, 0.014);
        let centre = sim.velocity().get(16, 16);
        assert!(centre.x > 0.0);
        assert!(centre.x.is_finite() && centre.y.is_finite());
    }

    #[test]
    fn test_viscous_path_produces_finite_field() {
        let params = SimulationParams {
            is_viscous: true,
            iterations_viscous: 5,
            cursor_size: 4.0,
            ..SimulationParams::default()
        };
        let mut sim = FluidSimulation::new(params, (48.0, 48.0));
        let pointer = PointerSample {
            coords: Vector2::new(0.1, -0.1),
            diff: Vector2::new(0.0, 0.04),
        };
        for _ in 0..3 {
            sim.update(&pointer, 0.014);
        }
        assert!(sim
            .velocity()
            .data()
            .iter()
            .all(|v| v.x.is_finite() && v.y.is_finite()));
        assert!(sim.velocity().data().iter().any(|v| v.y != 0.0));
    }

    #[test]
    fn test_clamp_center_pins_inverted_range_to_upper_bound() {
        // Normal range: [-0.88, 0.88]
        assert!((clamp_center(0.99, 0.1, 0.01) - 0.88).abs() < 1e-6);
        assert!((clamp_center(-0.99, 0.1, 0.01) + 0.88).abs() < 1e-6);
        assert_eq!(clamp_center(0.25, 0.1, 0.01), 0.25);
        // Kernel wider than the grid: lo = 0.3, hi = -0.3
        assert!((clamp_center(-0.9, 1.2, 0.05) + 0.3).abs() < 1e-6);
        assert!((clamp_center(0.9, 1.2, 0.05) + 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_set_params_reallocates_only_on_resolution_change() {
        let mut sim = FluidSimulation::new(SimulationParams::default(), (64.0, 48.0));
        sim.velocity_mut().set(3, 3, Vector2::new(1.0, 0.0));

        sim.set_params(SimulationParams {
            mouse_force: 40.0,
            ..SimulationParams::default()
        });
        assert_eq!(sim.grid_size(), GridSize::new(32, 24));
        assert_eq!(sim.velocity().get(3, 3), Vector2::new(1.0, 0.0));

        sim.set_params(SimulationParams {
            resolution: 0.25,
            ..SimulationParams::default()
        });
        for size in sim.buffers().buffer_sizes() {
            assert_eq!(size, GridSize::new(16, 12));
        }
        assert_eq!(sim.params().mouse_force, 20.0);
    }

    #[test]
    fn test_force_kernel_scales_delta_and_cursor() {
        let size = GridSize::new(100, 50);
        let pointer = PointerSample {
            coords: Vector2::new(0.0, 0.99),
            diff: Vector2::new(0.1, -0.2),
        };
        let kernel = ForceKernel::new(&SimulationParams::default(), size, &pointer);
        assert!((kernel.force - Vector2::new(1.0, -2.0)).magnitude() < 1e-5);
        assert!((kernel.radius - Vector2::new(1.0, 2.0)).magnitude() < 1e-6);
        // Cursor wider than the grid pins the centre to the upper bound
        assert!((kernel.center.y - (1.0 - 2.0 - 0.04)).abs() < 1e-5);
    }

    #[test]
    fn test_paused_simulation_does_not_step() {
        let mut sim = FluidSimulation::new(SimulationParams::default(), (20.0, 20.0));
        sim.set_running(false);
        sim.update(&still_pointer(), 0.014);
        assert_eq!(sim.step_count(), 0);
    }

    #[test]
    fn test_projection_reduces_divergence() {
        let mut sim = FluidSimulation::new(SimulationParams::default(), (64.0, 64.0));
        *sim.velocity_mut() = VelocityField::from_fn(GridSize::new(32, 32), |x, y| {
            let d = Vector2::new(x as f32 - 15.5, y as f32 - 15.5);
            let weight = (1.0 - d.magnitude2() / 25.0).max(0.0);
            d * (0.01 * weight)
        });
        let before = divergence_norm(sim.velocity());
        sim.update(&still_pointer(), 0.014);
        assert!(divergence_norm(sim.velocity()) < before);
    }
}
