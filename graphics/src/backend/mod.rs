//! GPU backend abstraction layer.
//!
//! Every GPU operation the renderer issues goes through the [`GpuBackend`]
//! trait, so application code never depends on a specific graphics API.
//!
//! # Available Backends
//!
//! - `opengl` (default): OpenGL 4.5 core via the `gl` crate
//! - `dummy` (default): headless backend for tests; records every call and
//!   keeps resource contents in memory
//!
//! # Threading
//!
//! Like the GL context it wraps, a backend is bound to the thread that
//! created it. The trait carries no `Send`/`Sync` bounds and the
//! [`GraphicsContext`](crate::GraphicsContext) that owns it is `!Send`.

#[cfg(feature = "dummy")]
pub mod dummy;

#[cfg(feature = "opengl")]
pub mod opengl;

use std::ffi::c_void;

use crate::error::GraphicsError;
use crate::types::{
    BufferDescriptor, BufferTarget, ClearFlags, CubeFace, DepthFunc, DrawIndexedArgs,
    PrimitiveMode, ShaderStage, TextureDescriptor, TextureKind, UniformValue,
    VertexAttributeBinding,
};

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Backend object name (the GL name for the OpenGL backend).
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

gpu_handle!(
    /// Handle to a GPU buffer.
    BufferHandle
);
gpu_handle!(
    /// Handle to a vertex array object.
    VertexArrayHandle
);
gpu_handle!(
    /// Handle to a texture (2D or cube).
    TextureHandle
);
gpu_handle!(
    /// Handle to an off-screen framebuffer object.
    FramebufferHandle
);
gpu_handle!(
    /// Handle to a linked shader program.
    ProgramHandle
);

/// Framebuffer attachment point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferAttachment {
    Color(u32),
    DepthStencil,
}

/// Graphics API selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RendererApi {
    /// Placeholder; selecting it is a programming error.
    None,
    #[default]
    OpenGl,
    /// Headless recording backend.
    #[cfg(feature = "dummy")]
    Dummy,
}

impl RendererApi {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::OpenGl => "opengl",
            #[cfg(feature = "dummy")]
            Self::Dummy => "dummy",
        }
    }
}

/// GPU backend trait for abstracting different GPU APIs.
///
/// Methods mirror the state-machine model of OpenGL: binding calls mutate
/// backend-global state, and attribute wiring or uniform uploads act on
/// whatever is currently bound.
pub trait GpuBackend: 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// One-time pipeline state setup (blending, depth test).
    fn init(&self);

    // --- Buffers ---

    /// Create a buffer, optionally filled with `data`. Leaves all bindings untouched.
    fn create_buffer(&self, descriptor: &BufferDescriptor, data: Option<&[u8]>) -> BufferHandle;

    /// Write `data` at byte `offset`. Bounds are checked by the caller.
    fn write_buffer(&self, target: BufferTarget, buffer: BufferHandle, offset: usize, data: &[u8]);

    /// Read back `size` bytes at `offset`. Blocks until the GPU is done with the buffer.
    fn read_buffer(
        &self,
        target: BufferTarget,
        buffer: BufferHandle,
        offset: usize,
        size: usize,
    ) -> Vec<u8>;

    /// Bind (or unbind with `None`) a buffer to its target.
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferHandle>);

    /// Attach a uniform buffer to an indexed binding point.
    fn bind_uniform_buffer_base(&self, buffer: BufferHandle, binding: u32);

    fn destroy_buffer(&self, buffer: BufferHandle);

    // --- Vertex arrays ---

    fn create_vertex_array(&self) -> VertexArrayHandle;

    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayHandle>);

    /// Enable and wire one attribute location of the bound vertex array,
    /// sourcing from the bound vertex buffer.
    fn enable_vertex_attribute(&self, binding: &VertexAttributeBinding);

    fn destroy_vertex_array(&self, vertex_array: VertexArrayHandle);

    // --- Textures ---

    /// Allocate texture storage (contents undefined).
    fn create_texture(&self, descriptor: &TextureDescriptor) -> TextureHandle;

    /// Upload a full image (or one cube face). Size is checked by the caller.
    fn upload_texture(&self, texture: TextureHandle, face: Option<CubeFace>, data: &[u8]);

    fn generate_mipmaps(&self, texture: TextureHandle);

    /// Bind a texture to a sampler slot, or clear the slot with `None`.
    fn bind_texture(&self, slot: u32, kind: TextureKind, texture: Option<TextureHandle>);

    /// Fill an integer texture with one value.
    fn clear_texture_i32(&self, texture: TextureHandle, value: i32);

    fn destroy_texture(&self, texture: TextureHandle);

    // --- Framebuffers ---

    fn create_framebuffer(&self) -> FramebufferHandle;

    fn attach_texture(
        &self,
        framebuffer: FramebufferHandle,
        attachment: FramebufferAttachment,
        texture: TextureHandle,
    );

    /// Enable `color_count` draw buffers (0 = depth-only).
    fn set_draw_buffers(&self, framebuffer: FramebufferHandle, color_count: u32);

    fn is_framebuffer_complete(&self, framebuffer: FramebufferHandle) -> bool;

    /// Bind a framebuffer for drawing, `None` for the default (swapchain) target.
    fn bind_framebuffer(&self, framebuffer: Option<FramebufferHandle>);

    /// Read one pixel of an integer color attachment. Stalls until the GPU is done.
    fn read_pixel(&self, framebuffer: FramebufferHandle, attachment_index: u32, x: i32, y: i32)
        -> i32;

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle);

    // --- Programs ---

    /// Compile and link a program from per-stage sources.
    fn compile_program(
        &self,
        stages: &[(ShaderStage, &str)],
    ) -> Result<ProgramHandle, GraphicsError>;

    fn use_program(&self, program: Option<ProgramHandle>);

    /// Location of a named uniform, `-1` if the program has no such active uniform.
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> i32;

    /// Upload to a location of the program in use.
    fn set_uniform(&self, location: i32, value: UniformValue<'_>);

    fn destroy_program(&self, program: ProgramHandle);

    // --- State ---

    fn set_viewport(&self, x: i32, y: i32, width: u32, height: u32);

    fn set_clear_color(&self, color: [f32; 4]);

    fn clear(&self, flags: ClearFlags);

    fn set_depth_func(&self, func: DepthFunc);

    fn set_line_width(&self, width: f32);

    // --- Draws ---

    /// Indexed draw from the bound vertex array's index buffer.
    fn draw_elements(&self, mode: PrimitiveMode, args: &DrawIndexedArgs);

    /// Non-indexed draw of `count` vertices starting at `first`.
    fn draw_arrays(&self, mode: PrimitiveMode, first: u32, count: u32);
}

/// Proc-address loader supplied by the windowing layer for the current GL context.
pub type ProcLoader<'a> = &'a mut dyn FnMut(&str) -> *const c_void;

/// Construct the backend for `api`.
///
/// # Panics
///
/// Panics for [`RendererApi::None`], and for APIs whose feature is disabled.
pub fn create_backend(api: RendererApi, loader: ProcLoader<'_>) -> Box<dyn GpuBackend> {
    let backend: Box<dyn GpuBackend> = match api {
        RendererApi::None => panic!("RendererApi::None is currently not supported!"),
        #[cfg(feature = "opengl")]
        RendererApi::OpenGl => Box::new(opengl::OpenGlBackend::load_with(loader)),
        #[cfg(not(feature = "opengl"))]
        RendererApi::OpenGl => {
            let _ = loader;
            panic!("RendererApi::OpenGl requires the `opengl` feature")
        }
        #[cfg(feature = "dummy")]
        RendererApi::Dummy => {
            let _ = loader;
            Box::new(dummy::DummyBackend::new())
        }
    };
    log::info!("Using {} backend", backend.name());
    backend
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "RendererApi::None is currently not supported")]
    fn test_none_api_panics() {
        let mut loader = |_: &str| std::ptr::null();
        let _ = create_backend(RendererApi::None, &mut loader);
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_create_dummy() {
        let mut loader = |_: &str| std::ptr::null();
        let backend = create_backend(RendererApi::Dummy, &mut loader);
        assert_eq!(backend.name(), "dummy");
    }

    #[test]
    fn test_handle_raw() {
        assert_eq!(BufferHandle(7).raw(), 7);
        assert_eq!(RendererApi::default(), RendererApi::OpenGl);
    }
}
