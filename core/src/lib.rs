//! # Aether Core
//!
//! CPU-side building blocks for the Aether renderer. Nothing in this crate
//! touches the GPU, so every type here may be produced on a worker thread.
//!
//! - [`math`] - nalgebra aliases and projection helpers
//! - [`registry`] - stable asset ids and the name → id registrar
//! - [`model`] - flattened model interchange produced by parsers
//! - [`gltf`] - glTF 2.0 parser (feature `gltf`)
//! - [`jobs`] - worker pool and the parse-result queue

#[cfg(feature = "gltf")]
pub mod gltf;
pub mod jobs;
pub mod math;
pub mod model;
pub mod registry;

pub use registry::{AssetId, AssetRegistry};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
