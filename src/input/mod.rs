//! Pointer input
//!
//! The tracker turns window events into solver-space coordinates; the
//! auto-pilot feeds it synthetic input while the user is idle.

pub mod autopilot;
pub mod pointer;

pub use autopilot::{AutoPilot, AutoPilotConfig};
pub use pointer::{ContainerRect, PointerSample, PointerTracker};
