//! Idle auto-pilot
//!
//! When nobody has touched the surface for a while, wander the pointer between
//! random targets so the background keeps moving.

use cgmath::{InnerSpace, Vector2};
use rand::{rngs::StdRng, Rng};
use std::time::{Duration, Instant};

use super::pointer::{smoothstep, PointerTracker};

/// Distance at which the current target counts as reached
const ARRIVAL_DISTANCE: f32 = 0.01;
/// Frame gaps longer than this are treated as a hitch, not real elapsed time
const MAX_FRAME_GAP: f32 = 0.2;
const HITCH_FRAME: f32 = 0.016;

#[derive(Clone, Debug, PartialEq)]
pub struct AutoPilotConfig {
    pub enabled: bool,
    /// Travel speed in normalized units per second
    pub speed: f32,
    /// Idle time after the last user interaction before taking over
    pub resume_delay: Duration,
    /// Ease-in time after activation; zero disables the ramp
    pub ramp_duration: Duration,
    /// Inset from the `[-1, 1]` square for random targets
    pub margin: f32,
}

impl Default for AutoPilotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            speed: 0.5,
            resume_delay: Duration::from_millis(3000),
            ramp_duration: Duration::from_millis(600),
            margin: 0.2,
        }
    }
}

pub struct AutoPilot {
    config: AutoPilotConfig,
    active: bool,
    current: Vector2<f32>,
    target: Vector2<f32>,
    last_time: Instant,
    activation_time: Instant,
    rng: StdRng,
}

impl AutoPilot {
    pub fn new(config: AutoPilotConfig, rng: StdRng, now: Instant) -> Self {
        let mut pilot = Self {
            config,
            active: false,
            current: Vector2::new(0.0, 0.0),
            target: Vector2::new(0.0, 0.0),
            last_time: now,
            activation_time: now,
            rng,
        };
        pilot.pick_new_target();
        pilot
    }

    fn pick_new_target(&mut self) {
        let extent = 1.0 - self.config.margin;
        let x = (self.rng.random::<f32>() * 2.0 - 1.0) * extent;
        let y = (self.rng.random::<f32>() * 2.0 - 1.0) * extent;
        self.target = Vector2::new(x, y);
    }

    /// Hand control back to the user immediately
    pub fn force_stop(&mut self, pointer: &mut PointerTracker) {
        self.active = false;
        pointer.set_auto_active(false);
    }

    /// Per-frame update
    ///
    /// # Arguments
    /// * `now` - Frame timestamp
    /// * `last_interaction` - Time of the last real user interaction
    /// * `pointer` - Tracker to drive while active
    pub fn update(&mut self, now: Instant, last_interaction: Instant, pointer: &mut PointerTracker) {
        if !self.config.enabled {
            return;
        }
        let idle = now.saturating_duration_since(last_interaction);
        if idle < self.config.resume_delay || pointer.is_hover_inside() {
            if self.active {
                self.force_stop(pointer);
            }
            return;
        }

        if !self.active {
            self.active = true;
            self.current = pointer.coords();
            self.last_time = now;
            self.activation_time = now;
            log::debug!(
                "Auto-pilot engaged at ({:.2}, {:.2})",
                self.current.x,
                self.current.y
            );
        }
        pointer.set_auto_active(true);

        let mut dt = now.saturating_duration_since(self.last_time).as_secs_f32();
        self.last_time = now;
        if dt > MAX_FRAME_GAP {
            dt = HITCH_FRAME;
        }

        let offset = self.target - self.current;
        let distance = offset.magnitude();
        if distance < ARRIVAL_DISTANCE {
            self.pick_new_target();
            return;
        }

        let ramp = if self.config.ramp_duration.is_zero() {
            1.0
        } else {
            let since = now.saturating_duration_since(self.activation_time);
            smoothstep(since.as_secs_f32() / self.config.ramp_duration.as_secs_f32())
        };
        let step = self.config.speed * dt * ramp;
        self.current += offset / distance * step.min(distance);
        pointer.set_normalized(self.current);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current(&self) -> Vector2<f32> {
        self.current
    }

    pub fn target(&self) -> Vector2<f32> {
        self.target
    }

    pub fn config(&self) -> &AutoPilotConfig {
        &self.config
    }

    /// Takes effect on the next update; an active run keeps its position
    pub fn set_config(&mut self, config: AutoPilotConfig) {
        self.config = config;
    }
}
