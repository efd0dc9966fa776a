//! The graphics context.
//!
//! OpenGL keeps its bindings in one global state machine. [`GraphicsContext`]
//! makes that state explicit: it owns the backend, every bind goes through
//! one of its methods, and [`GraphicsContext::bindings`] returns a snapshot of
//! what is currently bound so tests can assert on it.
//!
//! The context is reference counted with `Rc`, which keeps it and every GPU
//! resource holding a clone on the thread that created it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::backend::{
    self, BufferHandle, FramebufferHandle, GpuBackend, ProcLoader, ProgramHandle, RendererApi,
    TextureHandle, VertexArrayHandle,
};
use crate::types::{BufferTarget, DepthFunc, TextureKind, Viewport};

/// Snapshot of the context's current bindings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BindingState {
    pub vertex_array: Option<VertexArrayHandle>,
    pub program: Option<ProgramHandle>,
    /// `None` is the default (swapchain) framebuffer.
    pub framebuffer: Option<FramebufferHandle>,
    /// Sampler slot → texture.
    pub textures: BTreeMap<u32, TextureHandle>,
    /// Uniform block binding point → buffer.
    pub uniform_buffers: BTreeMap<u32, BufferHandle>,
    pub viewport: Viewport,
    pub clear_color: [f32; 4],
    pub depth_func: DepthFunc,
}

struct ContextInner {
    api: RendererApi,
    backend: Box<dyn GpuBackend>,
    state: RefCell<BindingState>,
}

/// Shared handle to the backend and its binding state.
#[derive(Clone)]
pub struct GraphicsContext {
    inner: Rc<ContextInner>,
}

static_assertions::assert_not_impl_any!(GraphicsContext: Send, Sync);

impl std::fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("api", &self.inner.api)
            .field("backend", &self.inner.backend.name())
            .finish()
    }
}

impl GraphicsContext {
    /// Create the backend for `api` on the current GL context.
    ///
    /// # Panics
    ///
    /// Panics for [`RendererApi::None`].
    pub fn new(api: RendererApi, loader: ProcLoader<'_>) -> Self {
        Self::with_backend(api, backend::create_backend(api, loader))
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(api: RendererApi, backend: Box<dyn GpuBackend>) -> Self {
        log::info!("Graphics context initialized ({})", backend.name());
        Self {
            inner: Rc::new(ContextInner {
                api,
                backend,
                state: RefCell::new(BindingState::default()),
            }),
        }
    }

    /// Context over a fresh dummy backend, plus an inspector sharing its state.
    #[cfg(feature = "dummy")]
    pub fn headless() -> (Self, backend::dummy::DummyBackend) {
        let dummy = backend::dummy::DummyBackend::new();
        let ctx = Self::with_backend(RendererApi::Dummy, Box::new(dummy.clone()));
        (ctx, dummy)
    }

    pub fn api(&self) -> RendererApi {
        self.inner.api
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend.name()
    }

    pub(crate) fn backend(&self) -> &dyn GpuBackend {
        self.inner.backend.as_ref()
    }

    /// Current bindings.
    pub fn bindings(&self) -> BindingState {
        self.inner.state.borrow().clone()
    }

    /// Whether two handles refer to the same context.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // --- Binds ---

    pub fn bind_vertex_array(&self, vertex_array: Option<VertexArrayHandle>) {
        self.inner.state.borrow_mut().vertex_array = vertex_array;
        self.backend().bind_vertex_array(vertex_array);
    }

    pub fn use_program(&self, program: Option<ProgramHandle>) {
        self.inner.state.borrow_mut().program = program;
        self.backend().use_program(program);
    }

    pub fn bind_framebuffer(&self, framebuffer: Option<FramebufferHandle>) {
        self.inner.state.borrow_mut().framebuffer = framebuffer;
        self.backend().bind_framebuffer(framebuffer);
    }

    pub fn bind_texture(&self, slot: u32, kind: TextureKind, texture: Option<TextureHandle>) {
        {
            let mut state = self.inner.state.borrow_mut();
            match texture {
                Some(t) => state.textures.insert(slot, t),
                None => state.textures.remove(&slot),
            };
        }
        self.backend().bind_texture(slot, kind, texture);
    }

    pub fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferHandle>) {
        self.backend().bind_buffer(target, buffer);
    }

    pub fn bind_uniform_buffer_base(&self, buffer: BufferHandle, binding: u32) {
        self.inner
            .state
            .borrow_mut()
            .uniform_buffers
            .insert(binding, buffer);
        self.backend().bind_uniform_buffer_base(buffer, binding);
    }

    // --- Fixed-function state ---

    pub fn set_viewport(&self, x: i32, y: i32, width: u32, height: u32) {
        self.inner.state.borrow_mut().viewport = Viewport::new(x, y, width, height);
        self.backend().set_viewport(x, y, width, height);
    }

    pub fn set_clear_color(&self, color: [f32; 4]) {
        self.inner.state.borrow_mut().clear_color = color;
        self.backend().set_clear_color(color);
    }

    pub fn set_depth_func(&self, func: DepthFunc) {
        self.inner.state.borrow_mut().depth_func = func;
        self.backend().set_depth_func(func);
    }

    // --- Destruction (drops stale bindings) ---

    pub(crate) fn destroy_buffer(&self, buffer: BufferHandle) {
        self.inner
            .state
            .borrow_mut()
            .uniform_buffers
            .retain(|_, b| *b != buffer);
        self.backend().destroy_buffer(buffer);
    }

    pub(crate) fn destroy_vertex_array(&self, vertex_array: VertexArrayHandle) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.vertex_array == Some(vertex_array) {
                state.vertex_array = None;
            }
        }
        self.backend().destroy_vertex_array(vertex_array);
    }

    pub(crate) fn destroy_texture(&self, texture: TextureHandle) {
        self.inner
            .state
            .borrow_mut()
            .textures
            .retain(|_, t| *t != texture);
        self.backend().destroy_texture(texture);
    }

    pub(crate) fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.framebuffer == Some(framebuffer) {
                state.framebuffer = None;
            }
        }
        self.backend().destroy_framebuffer(framebuffer);
    }

    pub(crate) fn destroy_program(&self, program: ProgramHandle) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.program == Some(program) {
                state.program = None;
            }
        }
        self.backend().destroy_program(program);
    }
}
