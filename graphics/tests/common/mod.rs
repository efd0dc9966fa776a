//! Common utilities for renderer integration tests.
//!
//! Tests are parameterised over [`Backend`] so the same scenario can run on
//! every backend that is available in the current environment.

#![allow(dead_code)]

use std::rc::Rc;

use aether_graphics::backend::dummy::{BackendCommand, DummyBackend};
use aether_graphics::mesh::generators;
use aether_graphics::{
    BufferLayout, EngineContext, GraphicsContext, Mesh, RenderCommand, Shader, ShaderDataType,
    VertexBuffer,
};

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Backends the integration tests know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Headless recording backend.
    Dummy,
    /// OpenGL; needs a window with a current context.
    OpenGl,
}

impl Backend {
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Dummy => true,
            // No windowing layer in the test harness.
            Backend::OpenGl => false,
        }
    }
}

/// Route `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Test Context
// ============================================================================

/// Engine plus an inspector over the backend's recorded state.
pub struct TestContext {
    pub engine: EngineContext,
    pub dummy: DummyBackend,
}

impl TestContext {
    /// Create a context, or `None` when `backend` is unavailable.
    pub fn new(backend: Backend) -> Option<Self> {
        init_logging();
        if !backend.is_available() {
            return None;
        }
        match backend {
            Backend::Dummy => {
                let (engine, dummy) = EngineContext::headless();
                Some(Self { engine, dummy })
            }
            Backend::OpenGl => None,
        }
    }

    pub fn ctx(&self) -> &GraphicsContext {
        &self.engine.graphics
    }

    pub fn command(&self) -> &RenderCommand {
        &self.engine.command
    }

    /// Compile a shader, panicking on failure.
    pub fn shader(&self, name: &str, source: &str) -> Rc<Shader> {
        match Shader::from_source(self.ctx(), name, source) {
            Ok(shader) => Rc::new(shader),
            Err(e) => panic!("shader '{name}' failed to compile: {e}"),
        }
    }

    /// Unit cube with the phong layout.
    pub fn cube(&self) -> Rc<Mesh> {
        Rc::new(generators::cube_vertices().upload(self.ctx()))
    }

    /// Dynamic vertex buffer of `size` bytes with a one-element layout.
    pub fn vertex_buffer(&self, size: usize, data_type: ShaderDataType, name: &str) -> VertexBuffer {
        let mut buffer = VertexBuffer::with_capacity(self.ctx(), size);
        buffer.set_layout(BufferLayout::from_pairs(&[(data_type, name)]));
        buffer
    }

    /// Draw calls recorded since the last [`DummyBackend::clear_commands`].
    pub fn draw_calls(&self) -> Vec<BackendCommand> {
        self.dummy.draw_calls()
    }
}
