//! Shader programs.
//!
//! A [`Shader`] is one linked program built from a multi-stage source file
//! (see [`ShaderSource`] for the `#shader` marker format). Uniform locations
//! are looked up lazily and cached per name; names the program does not
//! expose are tolerated so materials can carry values a shader ignores.
//!
//! # Example
//!
//! ```ignore
//! let shader = Shader::from_file(&ctx, "assets/shaders/lighting.glsl")?;
//! shader.bind();
//! shader.set_float("u_FogStart", 10.0);
//! shader.set_mat4("u_Model", &model);
//! ```

pub mod builtin;
mod source;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use aether_core::math::{mat4_to_cols_array, Mat4};

use crate::backend::ProgramHandle;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::types::UniformValue;

pub use source::ShaderSource;

/// A linked shader program.
pub struct Shader {
    ctx: GraphicsContext,
    name: String,
    path: Option<PathBuf>,
    program: ProgramHandle,
    locations: RefCell<HashMap<String, i32>>,
}

impl Shader {
    /// Compile a program from multi-stage shader text.
    pub fn from_source(
        ctx: &GraphicsContext,
        name: impl Into<String>,
        text: &str,
    ) -> Result<Self, GraphicsError> {
        Self::compile(ctx, name.into(), None, &ShaderSource::parse(text))
    }

    /// Read and compile a multi-stage shader file. The name is the file stem.
    pub fn from_file(ctx: &GraphicsContext, path: impl AsRef<Path>) -> Result<Self, GraphicsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            log::error!("Could not open file '{}': {e}", path.display());
            GraphicsError::Io(format!("{}: {e}", path.display()))
        })?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::compile(ctx, name, Some(path.to_path_buf()), &ShaderSource::parse(&text))
    }

    /// Compile a program from separate stage sources.
    pub fn from_stages(
        ctx: &GraphicsContext,
        name: impl Into<String>,
        vertex: &str,
        fragment: &str,
        geometry: Option<&str>,
    ) -> Result<Self, GraphicsError> {
        let source = ShaderSource::from_stages(vertex, fragment, geometry);
        Self::compile(ctx, name.into(), None, &source)
    }

    /// The built-in solid magenta program used as a load-failure fallback.
    ///
    /// # Panics
    ///
    /// Panics if the built-in source fails to compile, which means the
    /// driver cannot run any program at all.
    pub fn error_shader(ctx: &GraphicsContext) -> Self {
        Self::from_source(ctx, "Error", builtin::ERROR_SHADER)
            .unwrap_or_else(|e| panic!("Built-in error shader failed to compile: {e}"))
    }

    fn compile(
        ctx: &GraphicsContext,
        name: String,
        path: Option<PathBuf>,
        source: &ShaderSource,
    ) -> Result<Self, GraphicsError> {
        let stages = source.stages().inspect_err(|e| {
            log::error!("Shader '{name}': {e}");
        })?;

        let program = ctx.backend().compile_program(&stages).inspect_err(|e| match e {
            GraphicsError::ShaderCompilationFailed { stage, log } => {
                log::error!("Failed to compile {stage} shader!\n{log}");
            }
            other => log::error!("Shader '{name}': {other}"),
        })?;

        log::trace!("Compiled shader '{name}' ({program:?})");
        Ok(Self {
            ctx: ctx.clone(),
            name,
            path,
            program,
            locations: RefCell::new(HashMap::new()),
        })
    }

    /// Make this the program in use. Uniform setters act on the program in use.
    pub fn bind(&self) {
        self.ctx.use_program(Some(self.program));
    }

    pub fn unbind(&self) {
        self.ctx.use_program(None);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Whether the program exposes an active uniform called `name`.
    pub fn has_uniform(&self, name: &str) -> bool {
        self.location(name) != -1
    }

    pub fn set_int(&self, name: &str, value: i32) {
        self.upload(name, UniformValue::Int(value));
    }

    pub fn set_int_array(&self, name: &str, values: &[i32]) {
        self.upload(name, UniformValue::IntArray(values));
    }

    pub fn set_float(&self, name: &str, value: f32) {
        self.upload(name, UniformValue::Float(value));
    }

    pub fn set_float2(&self, name: &str, value: [f32; 2]) {
        self.upload(name, UniformValue::Float2(value));
    }

    pub fn set_float3(&self, name: &str, value: [f32; 3]) {
        self.upload(name, UniformValue::Float3(value));
    }

    pub fn set_float4(&self, name: &str, value: [f32; 4]) {
        self.upload(name, UniformValue::Float4(value));
    }

    pub fn set_mat4(&self, name: &str, value: &Mat4) {
        let columns = mat4_to_cols_array(value);
        self.upload(name, UniformValue::Mat4(&columns));
    }

    fn upload(&self, name: &str, value: UniformValue<'_>) {
        let location = self.location(name);
        if location == -1 {
            return;
        }
        self.ctx.backend().set_uniform(location, value);
    }

    fn location(&self, name: &str) -> i32 {
        if let Some(&location) = self.locations.borrow().get(name) {
            return location;
        }
        let location = self.ctx.backend().uniform_location(self.program, name);
        if location == -1 {
            log::trace!("Warning: uniform '{name}' doesn't exist!");
        }
        self.locations.borrow_mut().insert(name.to_string(), location);
        location
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.ctx.destroy_program(self.program);
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("name", &self.name)
            .field("program", &self.program)
            .field("path", &self.path)
            .finish()
    }
}

static_assertions::assert_not_impl_any!(Shader: Send, Sync);
