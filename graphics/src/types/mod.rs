//! Common types and descriptors for graphics resources.
//!
//! This module contains format enums, usage flags, layouts and descriptor
//! structs used throughout the graphics system.

mod buffer;
mod common;
mod layout;
mod texture;

pub use buffer::{BufferDescriptor, BufferTarget, BufferUsage, DrawIndexedArgs};
pub use common::{
    ClearFlags, DepthFunc, PrimitiveMode, ShaderStage, UniformValue, Viewport,
};
pub use layout::{
    AttributeBaseType, BufferElement, BufferLayout, ShaderDataType, VertexAttributeBinding,
};
pub use texture::{
    CubeFace, FramebufferTextureFormat, ImageFormat, TextureDescriptor, TextureFormat,
    TextureKind, TextureSpec, TextureWrap,
};
