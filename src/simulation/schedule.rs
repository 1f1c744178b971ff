//! Per-tick dispatch order
//!
//! Both solvers walk the same list: the CPU reference turns each entry into a
//! [`Pass`](super::pass::Pass), the GPU solver into a compute dispatch. The
//! list also decides which ping-pong slot holds each intermediate result.

use super::{buffers::Slot, params::SimulationParams};

/// Where the divergence and projection passes read velocity from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VelocitySource {
    /// Velocity slot B, after advection and the external force
    Advected,
    /// One of the viscous scratch slots
    Viscous(Slot),
}

impl VelocitySource {
    pub fn index(self) -> usize {
        match self {
            VelocitySource::Advected => 0,
            VelocitySource::Viscous(Slot::First) => 1,
            VelocitySource::Viscous(Slot::Second) => 2,
        }
    }
}

/// One full-grid pass; slots name the *source* of a ping-pong read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Velocity A to velocity B
    Advection,
    /// Added into velocity B
    ExternalForce,
    Viscous(Slot),
    Divergence(VelocitySource),
    Poisson(Slot),
    /// Velocity source and pressure slot, written into velocity A
    Pressure(VelocitySource, Slot),
}

impl Dispatch {
    pub fn name(&self) -> &'static str {
        match self {
            Dispatch::Advection => "advection",
            Dispatch::ExternalForce => "external_force",
            Dispatch::Viscous(_) => "viscous",
            Dispatch::Divergence(_) => "divergence",
            Dispatch::Poisson(_) => "poisson",
            Dispatch::Pressure(..) => "pressure",
        }
    }
}

/// Every pass of one tick, in execution order
pub fn tick_schedule(params: &SimulationParams) -> Vec<Dispatch> {
    let viscous_iterations = if params.is_viscous {
        params.iterations_viscous
    } else {
        0
    };
    let mut schedule =
        Vec::with_capacity(4 + viscous_iterations + params.iterations_poisson);
    schedule.push(Dispatch::Advection);
    schedule.push(Dispatch::ExternalForce);

    let mut velocity = VelocitySource::Advected;
    for i in 0..viscous_iterations {
        let src = Slot::for_iteration(i);
        schedule.push(Dispatch::Viscous(src));
        velocity = VelocitySource::Viscous(src.other());
    }
    schedule.push(Dispatch::Divergence(velocity));

    // Zero iterations project with pressure slot A untouched
    let mut pressure = Slot::First;
    for i in 0..params.iterations_poisson {
        let src = Slot::for_iteration(i);
        schedule.push(Dispatch::Poisson(src));
        pressure = src.other();
    }
    schedule.push(Dispatch::Pressure(velocity, pressure));
    schedule
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tick_skips_viscosity() {
        let schedule = tick_schedule(&SimulationParams::default());
        assert_eq!(schedule.len(), 2 + 1 + 32 + 1);
        assert_eq!(schedule[0], Dispatch::Advection);
        assert_eq!(schedule[1], Dispatch::ExternalForce);
        assert_eq!(schedule[2], Dispatch::Divergence(VelocitySource::Advected));
        assert_eq!(schedule[3], Dispatch::Poisson(Slot::First));
        assert_eq!(schedule[4], Dispatch::Poisson(Slot::Second));
        // 32 sweeps end in slot A
        assert_eq!(
            schedule.last(),
            Some(&Dispatch::Pressure(VelocitySource::Advected, Slot::First))
        );
    }

    #[test]
    fn test_odd_iteration_counts_end_in_slot_b() {
        let params = SimulationParams {
            is_viscous: true,
            iterations_viscous: 5,
            iterations_poisson: 3,
            ..SimulationParams::default()
        };
        let schedule = tick_schedule(&params);
        let viscous: Vec<_> = schedule
            .iter()
            .filter(|d| matches!(d, Dispatch::Viscous(_)))
            .collect();
        assert_eq!(viscous.len(), 5);
        let result = VelocitySource::Viscous(Slot::Second);
        assert!(schedule.contains(&Dispatch::Divergence(result)));
        assert_eq!(schedule.last(), Some(&Dispatch::Pressure(result, Slot::Second)));
    }

    #[test]
    fn test_zero_poisson_iterations_project_from_slot_a() {
        let params = SimulationParams {
            iterations_poisson: 0,
            ..SimulationParams::default()
        };
        let schedule = tick_schedule(&params);
        assert_eq!(schedule.len(), 4);
        assert_eq!(
            schedule[3],
            Dispatch::Pressure(VelocitySource::Advected, Slot::First)
        );
    }
}
