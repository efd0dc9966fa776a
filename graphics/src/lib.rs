//! # Aether Graphics
//!
//! GPU side of the Aether renderer: an OpenGL-style resource and command
//! layer with a headless backend for tests, plus the shadow → scene →
//! post-process frame built on top of it.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsContext`] - explicit owner of the backend and the current bindings
//! - [`resources`] - buffers, vertex arrays, framebuffers and textures
//! - [`Shader`] and [`Material`] - programs and their uniform/texture state
//! - [`Mesh`] - shared geometry split into submeshes
//! - [`library`] - id-keyed asset caches with fallback resources
//! - [`RenderCommand`] - state changes and draw submission
//! - [`passes`] - the per-frame render orchestration
//!
//! All GPU types are `!Send`; only [`aether_core`] data crosses threads.
//!
//! ## Example
//!
//! ```ignore
//! use aether_graphics::{EngineContext, FramePipeline, RendererConfig};
//!
//! let mut engine = EngineContext::from_config(&config, &mut |name| window.get_proc_address(name));
//! let mut pipeline = FramePipeline::with_builtin_materials(&mut engine, &config, textures)?;
//! loop {
//!     pipeline.render(&engine, &frame, &scene);
//! }
//! ```

pub mod backend;
pub mod command;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod library;
pub mod loader;
pub mod materials;
pub mod mesh;
pub mod passes;
pub mod resources;
pub mod shader;
pub mod types;

// Re-export main types for convenience
pub use backend::{GpuBackend, RendererApi};
pub use command::RenderCommand;
pub use config::{FogSettings, LightSettings, PostProcessSettings, RendererConfig, ShadowSettings};
pub use context::{BindingState, GraphicsContext};
pub use engine::EngineContext;
pub use error::GraphicsError;
pub use library::{AssetLibrary, MaterialLibrary, MeshLibrary, ShaderLibrary, TextureLibrary};
pub use loader::{upload_model, AsyncModelLoader};
pub use materials::{Material, MaterialFlags, MaterialProperty, MaterialTexture};
pub use mesh::{Mesh, MeshLayout, MeshSpec, SubMesh, VertexStream};
pub use passes::{
    Camera, FrameParams, FramePipeline, InstanceBuffer, PostProcessPass, RenderScene, ScenePass,
    ShadowPass,
};
pub use resources::{
    FrameBuffer, FramebufferSpec, IndexBuffer, Texture2D, TextureCube, UniformBuffer, VertexArray,
    VertexBuffer,
};
pub use shader::{Shader, ShaderSource};
pub use types::{
    BufferElement, BufferLayout, FramebufferTextureFormat, ImageFormat, ShaderDataType,
    TextureSpec, TextureWrap,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
