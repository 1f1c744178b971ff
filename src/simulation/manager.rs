//! Simulation manager for the etherflow engine
//!
//! The windowless half of the renderer host. It owns the simulation, the
//! pointer tracker, the auto-pilot and the clock, and decides whether the
//! frame loop should be running. The window layer forwards events here and
//! composites whatever `tick` returns.

use rand::{rngs::StdRng, SeedableRng};
use std::time::Instant;

use super::{
    clock::Clock,
    fluid::FluidSimulation,
    params::SimulationParams,
    traits::{FieldView, Simulation},
};
use crate::config::EtherOptions;
use crate::input::{AutoPilot, ContainerRect, PointerTracker};

/// Drives one simulation from window events and frame callbacks
pub struct SimulationManager {
    simulation: Box<dyn Simulation>,
    pointer: PointerTracker,
    autopilot: Option<AutoPilot>,
    clock: Clock,
    rect: ContainerRect,
    /// Shared by the tracker (writer) and the auto-pilot (reader)
    last_interaction: Instant,
    /// Fingers currently down, in touch order
    active_touches: Vec<u64>,
    running: bool,
    on_screen: bool,
    document_hidden: bool,
    disposed: bool,
    frame_count: u64,
}

impl SimulationManager {
    /// Create a manager around the CPU solver for a container of `container`
    /// logical pixels
    pub fn new(options: &EtherOptions, container: (f32, f32), now: Instant) -> Self {
        Self::with_rng(options, container, now, StdRng::from_os_rng())
    }

    /// Same as [`new`](Self::new) with an explicit random source for the auto-pilot
    pub fn with_rng(
        options: &EtherOptions,
        container: (f32, f32),
        now: Instant,
        rng: StdRng,
    ) -> Self {
        let simulation = FluidSimulation::new(options.simulation_params(), container);
        Self::from_parts(options, container, now, Box::new(simulation), rng)
    }

    /// Drive an already built simulation, such as the GPU solver
    pub fn with_simulation(
        options: &EtherOptions,
        container: (f32, f32),
        now: Instant,
        simulation: Box<dyn Simulation>,
    ) -> Self {
        Self::from_parts(options, container, now, simulation, StdRng::from_os_rng())
    }

    fn from_parts(
        options: &EtherOptions,
        container: (f32, f32),
        now: Instant,
        simulation: Box<dyn Simulation>,
        rng: StdRng,
    ) -> Self {
        let pointer = PointerTracker::new(options.auto_intensity, options.takeover_duration());
        let autopilot = options
            .autopilot_config()
            .map(|config| AutoPilot::new(config, rng, now));
        if autopilot.is_none() {
            log::info!("Auto-pilot disabled");
        }
        log::info!("Driving simulation: {}", simulation.name());

        Self {
            simulation,
            pointer,
            autopilot,
            clock: Clock::new(),
            rect: ContainerRect::from_size(container.0, container.1),
            last_interaction: now,
            active_touches: Vec::new(),
            running: false,
            on_screen: true,
            document_hidden: false,
            disposed: false,
            frame_count: 0,
        }
    }

    /// Start the frame loop.
    ///
    /// Returns `true` only when the loop was actually (re)started, so the caller
    /// never schedules a second frame callback.
    pub fn start(&mut self) -> bool {
        if self.running || self.disposed {
            return false;
        }
        self.running = true;
        self.simulation.set_running(true);
        log::debug!("Frame loop started");
        true
    }

    /// Stop the frame loop. Safe to call repeatedly.
    pub fn pause(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.clock.stop();
        log::debug!("Frame loop paused");
    }

    /// The surface moved on or off screen (minimised, zero-sized)
    pub fn set_on_screen(&mut self, on_screen: bool) -> bool {
        self.on_screen = on_screen;
        self.apply_visibility()
    }

    /// The whole window became hidden or visible (occluded)
    pub fn set_document_hidden(&mut self, hidden: bool) -> bool {
        self.document_hidden = hidden;
        self.apply_visibility()
    }

    fn apply_visibility(&mut self) -> bool {
        if self.on_screen && !self.document_hidden {
            self.start()
        } else {
            self.pause();
            false
        }
    }

    /// Run one frame: auto-pilot, pointer, clock, then the simulation.
    ///
    /// Returns the field to composite, or `None` while paused.
    pub fn tick(&mut self, now: Instant) -> Option<FieldView<'_>> {
        if !self.running {
            return None;
        }
        if let Some(autopilot) = self.autopilot.as_mut() {
            autopilot.update(now, self.last_interaction, &mut self.pointer);
        }
        self.pointer.update(now);
        self.clock.update(now);
        let dt = self.simulation.params().dt;
        self.simulation.update(&self.pointer.sample(), dt);
        self.frame_count += 1;
        Some(self.simulation.output())
    }

    /// New container size in logical pixels; the simulation restarts cold
    pub fn resize(&mut self, width: f32, height: f32) {
        self.rect = ContainerRect {
            width,
            height,
            ..self.rect
        };
        self.simulation.resize((width, height));
    }

    /// Replace the solver parameters between ticks
    pub fn set_params(&mut self, params: SimulationParams) {
        self.simulation.set_params(params);
    }

    /// Apply a new set of options to the running host
    ///
    /// Solver parameters, pointer tuning and the auto-pilot all follow the new
    /// values. Turning `auto_demo` off hands control straight back to the user.
    pub fn set_options(&mut self, options: &EtherOptions, now: Instant) {
        self.set_params(options.simulation_params());
        self.pointer.set_auto_intensity(options.auto_intensity);
        self.pointer
            .set_takeover_duration(options.takeover_duration());
        match options.autopilot_config() {
            Some(config) => match self.autopilot.as_mut() {
                Some(autopilot) => autopilot.set_config(config),
                None => {
                    log::info!("Auto-pilot enabled");
                    self.autopilot = Some(AutoPilot::new(config, StdRng::from_os_rng(), now));
                }
            },
            None => {
                if let Some(mut autopilot) = self.autopilot.take() {
                    autopilot.force_stop(&mut self.pointer);
                    log::info!("Auto-pilot disabled");
                }
            }
        }
    }

    fn register_interaction(&mut self, now: Instant) {
        self.last_interaction = now;
        if let Some(autopilot) = self.autopilot.as_mut() {
            autopilot.force_stop(&mut self.pointer);
        }
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32, now: Instant) {
        // The tracker must see the auto-pilot as active to start a takeover
        self.pointer.on_pointer_move(x, y, &self.rect, now);
        self.register_interaction(now);
    }

    fn single_touch(&self, id: u64) -> bool {
        self.active_touches.as_slice() == [id]
    }

    /// A finger went down. Only a lone finger steers the fluid.
    pub fn touch_started(&mut self, id: u64, x: f32, y: f32, now: Instant) {
        if !self.active_touches.contains(&id) {
            self.active_touches.push(id);
        }
        if self.single_touch(id) {
            self.register_interaction(now);
            self.pointer.on_touch_start(x, y, &self.rect, now);
        }
    }

    pub fn touch_moved(&mut self, id: u64, x: f32, y: f32, now: Instant) {
        if self.single_touch(id) {
            self.register_interaction(now);
            self.pointer.on_touch_move(x, y, &self.rect, now);
        }
    }

    /// A finger lifted or the touch was cancelled
    pub fn touch_ended(&mut self, id: u64) {
        self.active_touches.retain(|touch| *touch != id);
        self.pointer.on_touch_end();
    }

    pub fn pointer_entered(&mut self) {
        self.pointer.on_enter();
        if let Some(autopilot) = self.autopilot.as_mut() {
            autopilot.force_stop(&mut self.pointer);
        }
    }

    pub fn pointer_left(&mut self) {
        self.pointer.on_leave();
    }

    /// Stop the loop and release the simulation. Later calls are no-ops.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.pause();
        self.simulation.cleanup();
        self.disposed = true;
        log::info!("Disposed after {} frames", self.frame_count);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn simulation(&self) -> &dyn Simulation {
        self.simulation.as_ref()
    }

    pub fn pointer(&self) -> &PointerTracker {
        &self.pointer
    }

    pub fn autopilot(&self) -> Option<&AutoPilot> {
        self.autopilot.as_ref()
    }

    pub fn last_interaction(&self) -> Instant {
        self.last_interaction
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::field::GridSize;
    use cgmath::Vector2;
    use std::time::Duration;

    fn manager(now: Instant) -> SimulationManager {
        SimulationManager::with_rng(
            &EtherOptions::default(),
            (64.0, 48.0),
            now,
            StdRng::seed_from_u64(11),
        )
    }

    #[test]
    fn test_start_and_pause_are_idempotent() {
        let now = Instant::now();
        let mut host = manager(now);
        assert!(host.start());
        assert!(!host.start());
        assert!(host.is_running());

        host.pause();
        host.pause();
        assert!(!host.is_running());
        assert!(host.tick(now).is_none());
        assert!(host.start());
    }

    #[test]
    fn test_tick_produces_frames_only_while_running() {
        let now = Instant::now();
        let mut host = manager(now);
        assert!(host.tick(now).is_none());
        host.start();
        let field = host.tick(now).unwrap();
        assert_eq!(field.size(), GridSize::new(32, 24));
        assert!(matches!(field, FieldView::Cpu(_)));
        assert_eq!(host.frame_count(), 1);
    }

    #[test]
    fn test_visibility_gates_the_loop() {
        let now = Instant::now();
        let mut host = manager(now);
        host.start();

        host.set_document_hidden(true);
        assert!(!host.is_running());
        // Coming back on screen is not enough while hidden
        assert!(!host.set_on_screen(true));
        assert!(!host.is_running());

        assert!(host.set_document_hidden(false));
        assert!(host.is_running());

        host.set_on_screen(false);
        assert!(!host.is_running());
    }

    #[test]
    fn test_pointer_move_records_interaction_and_stops_autopilot() {
        let t0 = Instant::now();
        let mut host = manager(t0);
        host.start();
        let idle = t0 + Duration::from_secs(4);
        host.tick(idle);
        assert!(host.autopilot().unwrap().is_active());

        let moved = idle + Duration::from_millis(10);
        host.pointer_moved(10.0, 10.0, moved);
        assert_eq!(host.last_interaction(), moved);
        assert!(!host.autopilot().unwrap().is_active());
        // The auto-pilot was driving, so the user move blends in
        assert!(host.pointer().is_takeover_active());

        host.tick(moved + Duration::from_millis(16));
        assert!(!host.autopilot().unwrap().is_active());
    }

    #[test]
    fn test_pointer_enter_stops_autopilot_immediately() {
        let t0 = Instant::now();
        let mut host = manager(t0);
        host.start();
        host.tick(t0 + Duration::from_secs(4));
        assert!(host.pointer().is_auto_active());

        host.pointer_entered();
        assert!(!host.autopilot().unwrap().is_active());
        assert!(!host.pointer().is_auto_active());
    }

    #[test]
    fn test_dispose_is_final() {
        let now = Instant::now();
        let mut host = manager(now);
        host.start();
        host.dispose();
        host.dispose();
        assert!(host.is_disposed());
        assert!(!host.start());
        assert!(host.tick(now).is_none());
    }

    #[test]
    fn test_resize_restarts_cold() {
        let now = Instant::now();
        let mut host = manager(now);
        host.start();
        host.resize(100.0, 10.0);
        let field = host.tick(now).unwrap();
        assert_eq!(field.size(), GridSize::new(50, 5));
    }

    #[test]
    fn test_single_touch_steers_and_records_interaction() {
        let t0 = Instant::now();
        let mut host = manager(t0);
        let touched = t0 + Duration::from_millis(5);
        host.touch_started(1, 16.0, 12.0, touched);
        assert_eq!(host.last_interaction(), touched);
        assert!(host.pointer().has_user_control());
        assert_eq!(host.pointer().coords(), Vector2::new(-0.5, 0.5));

        let moved = touched + Duration::from_millis(5);
        host.touch_moved(1, 48.0, 36.0, moved);
        assert_eq!(host.last_interaction(), moved);
        assert_eq!(host.pointer().coords(), Vector2::new(0.5, -0.5));

        host.pointer_entered();
        assert!(host.pointer().is_hover_inside());
        host.touch_ended(1);
        assert!(!host.pointer().is_hover_inside());
    }

    #[test]
    fn test_second_finger_is_ignored_until_alone() {
        let t0 = Instant::now();
        let mut host = manager(t0);
        host.touch_started(1, 16.0, 12.0, t0);
        let second = t0 + Duration::from_millis(5);
        host.touch_started(2, 60.0, 40.0, second);
        host.touch_moved(2, 62.0, 44.0, second);
        host.touch_moved(1, 20.0, 12.0, second);
        // Neither finger steers while both are down
        assert_eq!(host.pointer().coords(), Vector2::new(-0.5, 0.5));
        assert_eq!(host.last_interaction(), t0);

        host.touch_ended(1);
        let alone = second + Duration::from_millis(5);
        host.touch_moved(2, 48.0, 36.0, alone);
        assert_eq!(host.pointer().coords(), Vector2::new(0.5, -0.5));
        assert_eq!(host.last_interaction(), alone);
    }

    #[test]
    fn test_touch_stops_a_running_autopilot() {
        let t0 = Instant::now();
        let mut host = manager(t0);
        host.start();
        let idle = t0 + Duration::from_secs(4);
        host.tick(idle);
        assert!(host.autopilot().unwrap().is_active());

        host.touch_started(7, 32.0, 24.0, idle);
        assert!(!host.autopilot().unwrap().is_active());
        assert!(!host.pointer().is_auto_active());
    }

    #[test]
    fn test_set_params_with_new_resolution_resizes_the_grid() {
        let now = Instant::now();
        let mut host = manager(now);
        host.start();
        host.set_params(SimulationParams {
            resolution: 0.25,
            ..SimulationParams::default()
        });
        assert_eq!(host.simulation().grid_size(), GridSize::new(16, 12));
        let field = host.tick(now).unwrap();
        assert_eq!(field.size(), GridSize::new(16, 12));

        host.set_params(SimulationParams {
            resolution: 0.25,
            dt: 0.02,
            ..SimulationParams::default()
        });
        assert_eq!(host.simulation().grid_size(), GridSize::new(16, 12));
        assert_eq!(host.simulation().params().dt, 0.02);
    }

    #[test]
    fn test_set_options_retunes_the_running_host() {
        let t0 = Instant::now();
        let mut host = manager(t0);
        host.start();
        host.tick(t0 + Duration::from_secs(4));
        assert!(host.pointer().is_auto_active());

        let options = EtherOptions {
            auto_demo: false,
            resolution: 1.0,
            ..EtherOptions::default()
        };
        host.set_options(&options, t0 + Duration::from_secs(5));
        assert!(host.autopilot().is_none());
        assert!(!host.pointer().is_auto_active());
        assert_eq!(host.simulation().grid_size(), GridSize::new(64, 48));

        let options = EtherOptions {
            auto_speed: 0.9,
            ..EtherOptions::default()
        };
        host.set_options(&options, t0 + Duration::from_secs(6));
        assert_eq!(host.autopilot().unwrap().config().speed, 0.9);
    }
}
