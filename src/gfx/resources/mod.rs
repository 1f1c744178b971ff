// src/gfx/resources/mod.rs
//! GPU resource management
//!
//! Textures feeding the composite pass.

pub mod texture_resource;

pub use texture_resource::TextureResource;
