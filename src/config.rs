//! User-facing options
//!
//! Everything is optional. Missing values take their defaults, and invalid
//! values (non-finite, zero, negative or absurdly large) are replaced with the
//! default and logged. Both snake_case and the historical camelCase keys are
//! accepted.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::input::AutoPilotConfig;
use crate::simulation::params::SimulationParams;

pub const DEFAULT_COLORS: [&str; 3] = ["#5227FF", "#FF9FFC", "#B19EEF"];

/// Upper bound for every duration option, in seconds
const MAX_DURATION_SECS: f32 = 3600.0;
/// Upper bound for the Jacobi iteration counts
const MAX_ITERATIONS: usize = 1000;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EtherOptions {
    #[serde(alias = "mouseForce")]
    pub mouse_force: f32,
    #[serde(alias = "cursorSize")]
    pub cursor_size: f32,
    #[serde(alias = "isViscous")]
    pub is_viscous: bool,
    pub viscous: f32,
    #[serde(alias = "iterationsViscous")]
    pub iterations_viscous: usize,
    #[serde(alias = "iterationsPoisson")]
    pub iterations_poisson: usize,
    pub dt: f32,
    #[serde(alias = "BFECC")]
    pub bfecc: bool,
    pub resolution: f32,
    #[serde(alias = "isBounce")]
    pub is_bounce: bool,
    pub colors: Vec<String>,
    #[serde(alias = "autoDemo")]
    pub auto_demo: bool,
    #[serde(alias = "autoSpeed")]
    pub auto_speed: f32,
    #[serde(alias = "autoIntensity")]
    pub auto_intensity: f32,
    /// Seconds
    #[serde(alias = "takeoverDuration")]
    pub takeover_duration: f32,
    /// Milliseconds
    #[serde(alias = "autoResumeDelay")]
    pub auto_resume_delay: f32,
    /// Seconds
    #[serde(alias = "autoRampDuration")]
    pub auto_ramp_duration: f32,
    /// Run the solver on the CPU instead of the GPU
    #[serde(alias = "cpuSolver")]
    pub cpu_solver: bool,
}

impl Default for EtherOptions {
    fn default() -> Self {
        Self {
            mouse_force: 20.0,
            cursor_size: 100.0,
            is_viscous: false,
            viscous: 30.0,
            iterations_viscous: 32,
            iterations_poisson: 32,
            dt: 0.014,
            bfecc: true,
            resolution: 0.5,
            is_bounce: false,
            colors: DEFAULT_COLORS.iter().map(|c| c.to_string()).collect(),
            auto_demo: true,
            auto_speed: 0.5,
            auto_intensity: 2.2,
            takeover_duration: 0.25,
            auto_resume_delay: 3000.0,
            auto_ramp_duration: 0.6,
            cpu_solver: false,
        }
    }
}

impl EtherOptions {
    /// Parse options from a JSON document and sanitize them
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        Ok(options.sanitize())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Replace every invalid value with its default
    pub fn sanitize(mut self) -> Self {
        let defaults = Self::default();

        fn bounded(name: &str, value: &mut f32, max: f32, default: f32) {
            if !value.is_finite() || *value <= 0.0 || *value > max {
                log::warn!("Option `{}` = {} is invalid, using {}", name, value, default);
                *value = default;
            }
        }
        fn positive(name: &str, value: &mut f32, default: f32) {
            bounded(name, value, f32::MAX, default);
        }
        fn iterations(name: &str, value: &mut usize, default: usize) {
            if *value == 0 || *value > MAX_ITERATIONS {
                log::warn!("Option `{}` = {} is invalid, using {}", name, value, default);
                *value = default;
            }
        }

        positive("mouse_force", &mut self.mouse_force, defaults.mouse_force);
        positive("cursor_size", &mut self.cursor_size, defaults.cursor_size);
        positive("viscous", &mut self.viscous, defaults.viscous);
        positive("dt", &mut self.dt, defaults.dt);
        positive("auto_speed", &mut self.auto_speed, defaults.auto_speed);
        positive("auto_intensity", &mut self.auto_intensity, defaults.auto_intensity);
        if self.resolution.is_finite() && self.resolution > 1.0 {
            log::warn!("Option `resolution` = {} is above 1, using 1", self.resolution);
            self.resolution = 1.0;
        }
        positive("resolution", &mut self.resolution, defaults.resolution);
        bounded(
            "takeover_duration",
            &mut self.takeover_duration,
            MAX_DURATION_SECS,
            defaults.takeover_duration,
        );
        bounded(
            "auto_resume_delay",
            &mut self.auto_resume_delay,
            MAX_DURATION_SECS * 1000.0,
            defaults.auto_resume_delay,
        );
        bounded(
            "auto_ramp_duration",
            &mut self.auto_ramp_duration,
            MAX_DURATION_SECS,
            defaults.auto_ramp_duration,
        );
        iterations(
            "iterations_viscous",
            &mut self.iterations_viscous,
            defaults.iterations_viscous,
        );
        iterations(
            "iterations_poisson",
            &mut self.iterations_poisson,
            defaults.iterations_poisson,
        );
        self
    }

    pub fn simulation_params(&self) -> SimulationParams {
        SimulationParams {
            dt: self.dt,
            viscous: self.viscous,
            is_viscous: self.is_viscous,
            iterations_viscous: self.iterations_viscous,
            iterations_poisson: self.iterations_poisson,
            mouse_force: self.mouse_force,
            cursor_size: self.cursor_size,
            resolution: self.resolution,
            is_bounce: self.is_bounce,
            bfecc: self.bfecc,
        }
    }

    /// Auto-pilot settings, or `None` when the demo mode is off
    pub fn autopilot_config(&self) -> Option<AutoPilotConfig> {
        let defaults = AutoPilotConfig::default();
        self.auto_demo.then(|| AutoPilotConfig {
            enabled: true,
            speed: self.auto_speed,
            resume_delay: seconds(self.auto_resume_delay / 1000.0, defaults.resume_delay),
            ramp_duration: seconds(self.auto_ramp_duration, defaults.ramp_duration),
            ..defaults
        })
    }

    pub fn takeover_duration(&self) -> Duration {
        seconds(self.takeover_duration, Duration::from_millis(250))
    }
}

/// Duration from float seconds; unrepresentable values take `fallback`
fn seconds(secs: f32, fallback: Duration) -> Duration {
    Duration::try_from_secs_f32(secs).unwrap_or(fallback)
}
