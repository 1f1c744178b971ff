//! Pointer tracking
//!
//! Maps raw window coordinates to normalized device space, derives the
//! per-frame delta the solver injects, and blends from auto-pilot to user
//! control without a visual jump.

use cgmath::Vector2;
use std::time::{Duration, Instant};

/// How long a real move keeps the "recently moved" flag up
const MOVE_FLAG_DURATION: Duration = Duration::from_millis(100);

/// Bounding rectangle of the host surface in logical pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContainerRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ContainerRect {
    pub fn from_size(width: f32, height: f32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width,
            height,
        }
    }

    /// Map a client position to `[-1, 1]` on both axes, y pointing up
    pub fn normalize(&self, x: f32, y: f32) -> Vector2<f32> {
        let nx = (x - self.left) / self.width.max(1.0);
        let ny = (y - self.top) / self.height.max(1.0);
        Vector2::new(nx * 2.0 - 1.0, -(ny * 2.0 - 1.0))
    }
}

/// What the solver sees of the pointer on one frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    pub coords: Vector2<f32>,
    pub diff: Vector2<f32>,
}

#[derive(Clone, Copy, Debug)]
struct Takeover {
    from: Vector2<f32>,
    to: Vector2<f32>,
    start: Instant,
}

/// Smoothstep ease, `t^2 (3 - 2t)`
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub struct PointerTracker {
    coords: Vector2<f32>,
    coords_old: Vector2<f32>,
    diff: Vector2<f32>,
    last_move: Option<Instant>,
    hover_inside: bool,
    has_user_control: bool,
    auto_active: bool,
    auto_intensity: f32,
    takeover: Option<Takeover>,
    takeover_duration: Duration,
}

impl PointerTracker {
    pub fn new(auto_intensity: f32, takeover_duration: Duration) -> Self {
        Self {
            coords: Vector2::new(0.0, 0.0),
            coords_old: Vector2::new(0.0, 0.0),
            diff: Vector2::new(0.0, 0.0),
            last_move: None,
            hover_inside: false,
            has_user_control: false,
            auto_active: false,
            auto_intensity,
            takeover: None,
            takeover_duration,
        }
    }

    fn set_coords(&mut self, x: f32, y: f32, rect: &ContainerRect, now: Instant) {
        self.coords = rect.normalize(x, y);
        self.last_move = Some(now);
    }

    /// A real pointer move inside the surface
    ///
    /// While the auto-pilot is driving, the first user move starts a takeover
    /// blend instead of snapping to the new position.
    pub fn on_pointer_move(&mut self, x: f32, y: f32, rect: &ContainerRect, now: Instant) {
        if self.auto_active && !self.has_user_control && self.takeover.is_none() {
            self.takeover = Some(Takeover {
                from: self.coords,
                to: rect.normalize(x, y),
                start: now,
            });
            self.has_user_control = true;
            self.auto_active = false;
            return;
        }
        self.set_coords(x, y, rect, now);
        self.has_user_control = true;
    }

    pub fn on_touch_start(&mut self, x: f32, y: f32, rect: &ContainerRect, now: Instant) {
        self.set_coords(x, y, rect, now);
        self.has_user_control = true;
    }

    pub fn on_touch_move(&mut self, x: f32, y: f32, rect: &ContainerRect, now: Instant) {
        self.set_coords(x, y, rect, now);
    }

    pub fn on_touch_end(&mut self) {
        self.hover_inside = false;
    }

    pub fn on_enter(&mut self) {
        self.hover_inside = true;
    }

    pub fn on_leave(&mut self) {
        self.hover_inside = false;
    }

    /// Auto-pilot write path; never starts a takeover
    pub fn set_normalized(&mut self, coords: Vector2<f32>) {
        self.coords = coords;
    }

    /// Mark whether the auto-pilot is the active driver.
    ///
    /// Handing control to the auto-pilot revokes user control, so the next
    /// real move blends back in.
    pub fn set_auto_active(&mut self, active: bool) {
        if active && !self.auto_active {
            self.has_user_control = false;
        }
        self.auto_active = active;
    }

    /// Per-frame update: advance any takeover, then derive the delta
    pub fn update(&mut self, now: Instant) {
        if let Some(takeover) = self.takeover {
            let elapsed = now.saturating_duration_since(takeover.start).as_secs_f32();
            let duration = self.takeover_duration.as_secs_f32();
            let t = if duration > 0.0 { elapsed / duration } else { 1.0 };
            if t >= 1.0 {
                self.takeover = None;
                self.coords = takeover.to;
                self.coords_old = self.coords;
            } else {
                let k = smoothstep(t);
                self.coords = takeover.from + (takeover.to - takeover.from) * k;
            }
        }

        let previous = self.coords_old;
        self.diff = if previous == Vector2::new(0.0, 0.0) {
            Vector2::new(0.0, 0.0)
        } else {
            self.coords - previous
        };
        self.coords_old = self.coords;

        if self.auto_active && self.takeover.is_none() {
            self.diff = self.diff * self.auto_intensity;
        }
    }

    pub fn sample(&self) -> PointerSample {
        PointerSample {
            coords: self.coords,
            diff: self.diff,
        }
    }

    pub fn coords(&self) -> Vector2<f32> {
        self.coords
    }

    pub fn diff(&self) -> Vector2<f32> {
        self.diff
    }

    pub fn is_hover_inside(&self) -> bool {
        self.hover_inside
    }

    pub fn is_auto_active(&self) -> bool {
        self.auto_active
    }

    pub fn is_takeover_active(&self) -> bool {
        self.takeover.is_some()
    }

    pub fn has_user_control(&self) -> bool {
        self.has_user_control
    }

    /// Whether a real move happened within the last 100ms
    pub fn recently_moved(&self, now: Instant) -> bool {
        self.last_move
            .is_some_and(|at| now.saturating_duration_since(at) < MOVE_FLAG_DURATION)
    }

    pub fn set_auto_intensity(&mut self, intensity: f32) {
        self.auto_intensity = intensity;
    }

    pub fn set_takeover_duration(&mut self, duration: Duration) {
        self.takeover_duration = duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vector2<f32>, b: Vector2<f32>) -> bool {
        (a.x - b.x).abs() < 1e-5 && (a.y - b.y).abs() < 1e-5
    }

    #[test]
    fn test_normalize_inverts_vertical_axis() {
        let rect = ContainerRect {
            left: 100.0,
            top: 50.0,
            width: 200.0,
            height: 100.0,
        };
        assert!(approx(rect.normalize(100.0, 50.0), Vector2::new(-1.0, 1.0)));
        assert!(approx(rect.normalize(300.0, 150.0), Vector2::new(1.0, -1.0)));
        assert!(approx(rect.normalize(200.0, 100.0), Vector2::new(0.0, 0.0)));
    }

    #[test]
    fn test_takeover_blends_with_smoothstep() {
        let start = Instant::now();
        let rect = ContainerRect::from_size(2.0, 2.0);
        let mut tracker = PointerTracker::new(2.2, Duration::from_millis(250));
        tracker.set_auto_active(true);
        tracker.set_normalized(Vector2::new(0.0, 0.0));

        // Client (2, 0) maps to (1, 1)
        tracker.on_pointer_move(2.0, 0.0, &rect, start);
        assert!(tracker.is_takeover_active());
        assert!(!tracker.is_auto_active());

        tracker.update(start);
        assert!(approx(tracker.coords(), Vector2::new(0.0, 0.0)));

        tracker.update(start + Duration::from_millis(125));
        assert!(approx(tracker.coords(), Vector2::new(0.5, 0.5)));
        assert!(tracker.is_takeover_active());

        tracker.update(start + Duration::from_millis(250));
        assert!(approx(tracker.coords(), Vector2::new(1.0, 1.0)));
        assert!(!tracker.is_takeover_active());
        assert_eq!(tracker.diff(), Vector2::new(0.0, 0.0));

        tracker.update(start + Duration::from_millis(400));
        assert!(!tracker.is_takeover_active());
    }

    #[test]
    fn test_moves_without_autopilot_snap_directly() {
        let now = Instant::now();
        let rect = ContainerRect::from_size(100.0, 100.0);
        let mut tracker = PointerTracker::new(2.2, Duration::from_millis(250));
        tracker.on_pointer_move(75.0, 25.0, &rect, now);
        assert!(!tracker.is_takeover_active());
        assert!(approx(tracker.coords(), Vector2::new(0.5, 0.5)));
        assert!(tracker.has_user_control());
    }

    #[test]
    fn test_delta_is_zero_when_previous_is_origin() {
        let now = Instant::now();
        let rect = ContainerRect::from_size(100.0, 100.0);
        let mut tracker = PointerTracker::new(2.2, Duration::from_millis(250));
        tracker.on_pointer_move(75.0, 25.0, &rect, now);
        tracker.update(now);
        assert_eq!(tracker.diff(), Vector2::new(0.0, 0.0));

        tracker.on_pointer_move(80.0, 25.0, &rect, now);
        tracker.update(now);
        assert!(approx(tracker.diff(), Vector2::new(0.1, 0.0)));
    }

    #[test]
    fn test_autopilot_delta_is_amplified() {
        let mut tracker = PointerTracker::new(2.0, Duration::from_millis(250));
        let now = Instant::now();
        tracker.set_auto_active(true);
        tracker.set_normalized(Vector2::new(0.2, 0.2));
        tracker.update(now);
        tracker.set_normalized(Vector2::new(0.3, 0.2));
        tracker.update(now);
        assert!(approx(tracker.diff(), Vector2::new(0.2, 0.0)));
    }

    #[test]
    fn test_recently_moved_expires_after_100ms() {
        let now = Instant::now();
        let rect = ContainerRect::from_size(10.0, 10.0);
        let mut tracker = PointerTracker::new(2.2, Duration::from_millis(250));
        assert!(!tracker.recently_moved(now));
        tracker.on_touch_start(1.0, 1.0, &rect, now);
        assert!(tracker.recently_moved(now + Duration::from_millis(50)));
        assert!(!tracker.recently_moved(now + Duration::from_millis(100)));
    }

    #[test]
    fn test_hover_flags() {
        let mut tracker = PointerTracker::new(2.2, Duration::from_millis(250));
        tracker.on_enter();
        assert!(tracker.is_hover_inside());
        tracker.on_touch_end();
        assert!(!tracker.is_hover_inside());
        tracker.on_enter();
        tracker.on_leave();
        assert!(!tracker.is_hover_inside());
    }
}
