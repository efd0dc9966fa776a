//! GPU resources.
//!
//! This module contains the GPU resource types created against a
//! [`GraphicsContext`]:
//! - [`VertexBuffer`], [`IndexBuffer`], [`UniformBuffer`] - fixed-capacity GPU buffers
//! - [`VertexArray`] - attribute wiring plus one index buffer
//! - [`FrameBuffer`] - off-screen render target
//! - [`Texture2D`], [`TextureCube`] - sampled images
//!
//! Every resource holds a clone of the context and deletes its GPU object on
//! drop. Resources are `!Send`: they must stay on the thread owning the GL
//! context.
//!
//! [`GraphicsContext`]: crate::GraphicsContext

mod buffer;
mod framebuffer;
mod texture;
mod vertex_array;

pub use buffer::{IndexBuffer, UniformBuffer, VertexBuffer};
pub use framebuffer::{FrameBuffer, FramebufferSpec, MAX_FRAMEBUFFER_SIZE};
pub use texture::{extract_cross_faces, Texture2D, TextureCube};
pub use vertex_array::VertexArray;
