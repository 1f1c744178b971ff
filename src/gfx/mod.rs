//! # Graphics Module
//!
//! Presents the fluid on a wgpu surface. A single full-screen pass reads the
//! velocity field straight from the solver's storage buffer and maps its
//! magnitude through the colour palette. A CPU-side field is uploaded into a
//! buffer of the same layout first.
//!
//! - **Render Engine** ([`render_engine`]) - device, surface, composite pipeline
//! - **Palette** ([`palette`]) - colour stops and their lookup texture data
//! - **Resources** ([`resources`]) - the palette lookup texture

pub mod palette;
pub mod render_engine;
pub mod resources;

pub use palette::Palette;
pub use render_engine::RenderEngine;
