//! End-to-end behaviour of the solver, the pointer and the host, no GPU needed

use std::time::{Duration, Instant};

use cgmath::{InnerSpace, Vector2};
use etherflow::prelude::*;
use etherflow::simulation::field::divergence_norm;
use rand::{rngs::StdRng, SeedableRng};

fn still_pointer() -> PointerSample {
    PointerSample {
        coords: Vector2::new(0.0, 0.0),
        diff: Vector2::new(0.0, 0.0),
    }
}

fn approx(a: Vector2<f32>, b: Vector2<f32>) -> bool {
    (a - b).magnitude() < 1e-5
}

#[test]
fn test_resize_matches_rounded_resolution_for_all_buffers() {
    for (resolution, width, height) in [
        (0.5, 640.0, 480.0),
        (0.25, 1001.0, 3.0),
        (1.0, 0.2, 17.0),
        (0.1, 4.0, 4.0),
    ] {
        let params = SimulationParams {
            resolution,
            ..SimulationParams::default()
        };
        let mut sim = FluidSimulation::new(params, (10.0, 10.0));
        sim.resize((width, height));

        let expected = GridSize::new(
            ((resolution * width).round() as usize).max(1),
            ((resolution * height).round() as usize).max(1),
        );
        for size in sim.buffers().buffer_sizes() {
            assert_eq!(size, expected, "resolution {} at {}x{}", resolution, width, height);
        }
    }
}

#[test]
fn test_more_poisson_iterations_leave_less_divergence() {
    let blob = |x: usize, y: usize| {
        let d = Vector2::new(x as f32 - 15.5, y as f32 - 15.5);
        let weight = (1.0 - d.magnitude2() / 25.0).max(0.0);
        d * (0.01 * weight)
    };

    let residuals: Vec<f32> = [1usize, 10, 100]
        .into_iter()
        .map(|iterations| {
            let params = SimulationParams {
                iterations_poisson: iterations,
                ..SimulationParams::default()
            };
            let mut sim = FluidSimulation::new(params, (64.0, 64.0));
            *sim.velocity_mut() = VelocityField::from_fn(GridSize::new(32, 32), blob);
            sim.update(&still_pointer(), 0.014);
            divergence_norm(sim.velocity())
        })
        .collect();

    assert!(residuals[0] > residuals[1], "{:?}", residuals);
    assert!(residuals[1] > residuals[2], "{:?}", residuals);
}

#[test]
fn test_takeover_samples_follow_smoothstep() {
    let start = Instant::now();
    let rect = ContainerRect::from_size(2.0, 2.0);
    let mut tracker = PointerTracker::new(2.2, Duration::from_millis(250));
    tracker.set_auto_active(true);
    tracker.set_normalized(Vector2::new(0.0, 0.0));
    tracker.on_pointer_move(2.0, 0.0, &rect, start);

    tracker.update(start);
    assert!(approx(tracker.coords(), Vector2::new(0.0, 0.0)));
    tracker.update(start + Duration::from_millis(125));
    assert!(approx(tracker.coords(), Vector2::new(0.5, 0.5)));
    tracker.update(start + Duration::from_millis(250));
    assert!(approx(tracker.coords(), Vector2::new(1.0, 1.0)));
    assert!(!tracker.is_takeover_active());
    tracker.update(start + Duration::from_millis(300));
    assert!(!tracker.is_takeover_active());
}

#[test]
fn test_autopilot_waits_for_resume_delay_then_snapshots_pointer() {
    let t0 = Instant::now();
    let rect = ContainerRect::from_size(200.0, 100.0);
    let mut tracker = PointerTracker::new(2.2, Duration::from_millis(250));
    tracker.on_pointer_move(50.0, 75.0, &rect, t0);
    let mut pilot = AutoPilot::new(AutoPilotConfig::default(), StdRng::seed_from_u64(5), t0);

    let mut frame = t0;
    while frame.duration_since(t0) < Duration::from_millis(3000) {
        pilot.update(frame, t0, &mut tracker);
        assert!(!pilot.is_active());
        frame += Duration::from_millis(16);
    }

    let snapshot = tracker.coords();
    pilot.update(frame, t0, &mut tracker);
    assert!(pilot.is_active());
    assert_eq!(pilot.current(), snapshot);
    assert!(approx(snapshot, Vector2::new(-0.5, -0.5)));
}

#[test]
fn test_autopilot_picks_new_target_on_arrival_without_moving() {
    let t0 = Instant::now();
    let mut tracker = PointerTracker::new(2.2, Duration::from_millis(250));
    let config = AutoPilotConfig {
        speed: 100.0,
        ramp_duration: Duration::ZERO,
        ..AutoPilotConfig::default()
    };
    let mut pilot = AutoPilot::new(config, StdRng::seed_from_u64(9), t0);

    let start = t0 + Duration::from_secs(5);
    pilot.update(start, t0, &mut tracker);
    pilot.update(start + Duration::from_millis(100), t0, &mut tracker);
    let reached = pilot.current();
    let old_target = pilot.target();
    assert!((reached - old_target).magnitude() < 0.01);

    pilot.update(start + Duration::from_millis(116), t0, &mut tracker);
    assert_eq!(pilot.current(), reached);
    assert_ne!(pilot.target(), old_target);
    let target = pilot.target();
    assert!(target.x.abs() <= 0.8 && target.y.abs() <= 0.8);
}

#[test]
fn test_pause_and_resume_are_idempotent() {
    let now = Instant::now();
    let mut host = SimulationManager::with_rng(
        &EtherOptions::default(),
        (320.0, 200.0),
        now,
        StdRng::seed_from_u64(1),
    );
    host.pause();
    host.pause();
    assert!(host.start());
    assert!(!host.start());

    assert!(host.tick(now).is_some());
    assert_eq!(host.frame_count(), 1);
    host.pause();
    host.pause();
    assert!(host.tick(now).is_none());
    assert_eq!(host.frame_count(), 1);
}

#[test]
fn test_two_finger_gestures_inject_no_force() {
    let t0 = Instant::now();
    let mut host = SimulationManager::with_rng(
        &EtherOptions::default(),
        (400.0, 300.0),
        t0,
        StdRng::seed_from_u64(3),
    );
    host.start();
    host.touch_started(1, 10.0, 10.0, t0);
    host.touch_started(2, 390.0, 290.0, t0);

    let mut frame = t0;
    for i in 0..6 {
        frame += Duration::from_millis(16);
        let (id, x, y) = if i % 2 == 0 {
            (1, 12.0, 10.0)
        } else {
            (2, 380.0, 280.0)
        };
        host.touch_moved(id, x, y, frame);
        host.tick(frame);
        assert!(host.pointer().diff().magnitude() < 1e-6, "frame {}", i);
    }
}

#[test]
fn test_oversized_options_run_without_panicking() {
    let options = EtherOptions::from_json_str(
        r#"{ "autoResumeDelay": 1e30, "resolution": 1e30, "takeoverDuration": 1e20 }"#,
    )
    .unwrap();
    let now = Instant::now();
    let mut host =
        SimulationManager::with_rng(&options, (64.0, 32.0), now, StdRng::seed_from_u64(8));
    host.start();
    let field = host.tick(now).unwrap();
    assert_eq!(field.size(), GridSize::new(64, 32));
}
