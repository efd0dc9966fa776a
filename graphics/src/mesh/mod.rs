//! Mesh types for GPU rendering.
//!
//! - [`Mesh`] - one vertex array plus index buffer, split into [`SubMesh`] ranges
//! - [`MeshLayout`] - interleaved layout presets
//! - [`generators`] - cube, screen quad and skybox geometry

mod data;
pub mod generators;
mod layout;

pub use data::{Mesh, MeshSpec, SubMesh, VertexStream};
pub use generators::MeshData;
pub use layout::MeshLayout;
