//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't talk to a GPU. It keeps every resource in memory,
//! follows the OpenGL binding rules (index buffers belong to the bound vertex
//! array, uniforms go to the program in use), records each call as a
//! [`BackendCommand`], and exposes inspection methods so tests can assert on
//! what the renderer did.
//!
//! Indexed triangle draws are additionally rasterized depth-only into the
//! bound framebuffer's depth attachment. Positions come from attribute
//! location 0 and are transformed by the program's `u_LightSpaceMatrix` (or
//! `u_ViewProjection`) times `u_Model`, so a shadow pass produces a real,
//! inspectable depth map.
//!
//! Shader "compilation" succeeds unless a stage contains `#error` or lacks
//! `main`; active uniforms are the `uniform` declarations found in the
//! sources.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use aether_core::math::{self, Mat4, Vec3};

use crate::error::GraphicsError;
use crate::types::{
    BufferDescriptor, BufferTarget, ClearFlags, CubeFace, DepthFunc, DrawIndexedArgs,
    PrimitiveMode, ShaderStage, TextureDescriptor, TextureFormat, TextureKind, UniformValue,
    VertexAttributeBinding, Viewport,
};

use super::{
    BufferHandle, FramebufferAttachment, FramebufferHandle, GpuBackend, ProgramHandle,
    TextureHandle, VertexArrayHandle,
};

/// Owned copy of an uploaded uniform value.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedUniform {
    Int(i32),
    IntArray(Vec<i32>),
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Mat4([f32; 16]),
}

impl From<UniformValue<'_>> for RecordedUniform {
    fn from(value: UniformValue<'_>) -> Self {
        match value {
            UniformValue::Int(v) => Self::Int(v),
            UniformValue::IntArray(v) => Self::IntArray(v.to_vec()),
            UniformValue::Float(v) => Self::Float(v),
            UniformValue::Float2(v) => Self::Float2(v),
            UniformValue::Float3(v) => Self::Float3(v),
            UniformValue::Float4(v) => Self::Float4(v),
            UniformValue::Mat4(v) => Self::Mat4(*v),
        }
    }
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    Init,
    CreateBuffer {
        buffer: BufferHandle,
        target: BufferTarget,
        size: u64,
        dynamic: bool,
    },
    WriteBuffer {
        buffer: BufferHandle,
        offset: usize,
        size: usize,
    },
    BindBuffer {
        target: BufferTarget,
        buffer: Option<BufferHandle>,
    },
    BindUniformBufferBase {
        buffer: BufferHandle,
        binding: u32,
    },
    DestroyBuffer(BufferHandle),
    CreateVertexArray(VertexArrayHandle),
    BindVertexArray(Option<VertexArrayHandle>),
    EnableVertexAttribute(VertexAttributeBinding),
    DestroyVertexArray(VertexArrayHandle),
    CreateTexture {
        texture: TextureHandle,
        kind: TextureKind,
        width: u32,
        height: u32,
        format: TextureFormat,
    },
    UploadTexture {
        texture: TextureHandle,
        face: Option<CubeFace>,
        size: usize,
    },
    GenerateMipmaps(TextureHandle),
    BindTexture {
        slot: u32,
        kind: TextureKind,
        texture: Option<TextureHandle>,
    },
    ClearTexture {
        texture: TextureHandle,
        value: i32,
    },
    DestroyTexture(TextureHandle),
    CreateFramebuffer(FramebufferHandle),
    AttachTexture {
        framebuffer: FramebufferHandle,
        attachment: FramebufferAttachment,
        texture: TextureHandle,
    },
    SetDrawBuffers {
        framebuffer: FramebufferHandle,
        count: u32,
    },
    BindFramebuffer(Option<FramebufferHandle>),
    ReadPixel {
        framebuffer: FramebufferHandle,
        attachment_index: u32,
        x: i32,
        y: i32,
    },
    DestroyFramebuffer(FramebufferHandle),
    CompileProgram(ProgramHandle),
    UseProgram(Option<ProgramHandle>),
    SetUniform {
        program: Option<ProgramHandle>,
        location: i32,
        value: RecordedUniform,
    },
    DestroyProgram(ProgramHandle),
    SetViewport(Viewport),
    SetClearColor([f32; 4]),
    Clear(ClearFlags),
    SetDepthFunc(DepthFunc),
    SetLineWidth(f32),
    DrawElements {
        mode: PrimitiveMode,
        vertex_array: Option<VertexArrayHandle>,
        program: Option<ProgramHandle>,
        framebuffer: Option<FramebufferHandle>,
        args: DrawIndexedArgs,
    },
    DrawArrays {
        mode: PrimitiveMode,
        vertex_array: Option<VertexArrayHandle>,
        first: u32,
        count: u32,
    },
}

impl BackendCommand {
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::DrawElements { .. } | Self::DrawArrays { .. })
    }
}

#[derive(Debug)]
struct DummyBuffer {
    target: BufferTarget,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct DummyVertexArray {
    /// location → (wiring, source buffer)
    attributes: BTreeMap<u32, (VertexAttributeBinding, u32)>,
    index_buffer: Option<u32>,
}

#[derive(Debug)]
struct DummyTexture {
    descriptor: TextureDescriptor,
    /// One entry for 2D textures, six for cubes. Empty for depth formats.
    faces: Vec<Vec<u8>>,
    /// Depth values in [0, 1], rows bottom to top. Depth formats only.
    depth: Vec<f32>,
}

#[derive(Debug, Default)]
struct DummyFramebuffer {
    colors: BTreeMap<u32, u32>,
    depth: Option<u32>,
    draw_buffers: u32,
}

#[derive(Debug, Default)]
struct DummyProgram {
    uniforms: Vec<String>,
    values: HashMap<i32, RecordedUniform>,
}

#[derive(Debug, Default)]
struct DummyState {
    next_id: u32,
    commands: Vec<BackendCommand>,
    buffers: HashMap<u32, DummyBuffer>,
    vertex_arrays: HashMap<u32, DummyVertexArray>,
    textures: HashMap<u32, DummyTexture>,
    framebuffers: HashMap<u32, DummyFramebuffer>,
    programs: HashMap<u32, DummyProgram>,
    bound_array_buffer: Option<u32>,
    bound_vertex_array: Option<u32>,
    bound_framebuffer: Option<u32>,
    current_program: Option<u32>,
    texture_slots: BTreeMap<u32, u32>,
    viewport: Viewport,
    clear_color: [f32; 4],
    depth_func: DepthFunc,
}

impl DummyState {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, command: BackendCommand) {
        self.commands.push(command);
    }
}

/// Dummy GPU backend.
///
/// Cloning yields another handle to the same in-memory device, which is how
/// tests keep an inspector after handing the backend to a context.
#[derive(Debug, Clone, Default)]
pub struct DummyBackend {
    state: Rc<RefCell<DummyState>>,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// All recorded commands, oldest first.
    pub fn commands(&self) -> Vec<BackendCommand> {
        self.state.borrow().commands.clone()
    }

    /// Recorded draw commands only.
    pub fn draw_calls(&self) -> Vec<BackendCommand> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|c| c.is_draw())
            .cloned()
            .collect()
    }

    /// Forget recorded commands (resources are kept).
    pub fn clear_commands(&self) {
        self.state.borrow_mut().commands.clear();
    }

    /// Current contents of a buffer.
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .buffers
            .get(&buffer.0)
            .map(|b| b.data.clone())
    }

    /// Attribute wiring of a vertex array, ordered by location, with the source buffer.
    pub fn vertex_array_attributes(
        &self,
        vertex_array: VertexArrayHandle,
    ) -> Vec<(VertexAttributeBinding, BufferHandle)> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array.0)
            .map(|va| {
                va.attributes
                    .values()
                    .map(|&(binding, buffer)| (binding, BufferHandle(buffer)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Index buffer captured by a vertex array.
    pub fn vertex_array_index_buffer(&self, vertex_array: VertexArrayHandle) -> Option<BufferHandle> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array.0)
            .and_then(|va| va.index_buffer)
            .map(BufferHandle)
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<TextureDescriptor> {
        self.state
            .borrow()
            .textures
            .get(&texture.0)
            .map(|t| t.descriptor.clone())
    }

    /// Pixel data of a texture (or one cube face).
    pub fn texture_data(&self, texture: TextureHandle, face: Option<CubeFace>) -> Option<Vec<u8>> {
        let state = self.state.borrow();
        let tex = state.textures.get(&texture.0)?;
        tex.faces.get(face.map_or(0, |f| f.index())).cloned()
    }

    /// Depth value of a depth texture at pixel `(x, y)`, origin bottom-left.
    pub fn depth_at(&self, texture: TextureHandle, x: u32, y: u32) -> Option<f32> {
        let state = self.state.borrow();
        let tex = state.textures.get(&texture.0)?;
        let d = &tex.descriptor;
        if x >= d.width || y >= d.height {
            return None;
        }
        tex.depth.get((y * d.width + x) as usize).copied()
    }

    /// Last value uploaded to `name` on `program`.
    pub fn uniform_value(&self, program: ProgramHandle, name: &str) -> Option<RecordedUniform> {
        let state = self.state.borrow();
        let p = state.programs.get(&program.0)?;
        let location = p.uniforms.iter().position(|u| u == name)? as i32;
        p.values.get(&location).cloned()
    }

    /// Texture currently bound to a sampler slot.
    pub fn bound_texture(&self, slot: u32) -> Option<TextureHandle> {
        self.state
            .borrow()
            .texture_slots
            .get(&slot)
            .copied()
            .map(TextureHandle)
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.state.borrow().vertex_arrays.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.state.borrow().framebuffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }
}

// ============================================================================
// Depth rasterization
// ============================================================================

impl DummyState {
    fn program_mat4(&self, program: Option<u32>, names: &[&str]) -> Mat4 {
        let Some(p) = program.and_then(|p| self.programs.get(&p)) else {
            return Mat4::identity();
        };
        for name in names {
            let Some(location) = p.uniforms.iter().position(|u| u == name) else {
                continue;
            };
            if let Some(RecordedUniform::Mat4(m)) = p.values.get(&(location as i32)) {
                return math::mat4_from_cols_array(m);
            }
        }
        Mat4::identity()
    }

    fn fetch_position(&self, vertex_array: &DummyVertexArray, vertex: i64) -> Option<Vec3> {
        let (binding, buffer) = vertex_array.attributes.get(&0)?;
        if vertex < 0 || binding.components < 2 {
            return None;
        }
        let data = &self.buffers.get(buffer)?.data;
        let base = binding.offset as usize + vertex as usize * binding.stride as usize;
        let read = |i: usize| -> Option<f32> {
            let start = base + i * 4;
            let bytes = data.get(start..start + 4)?;
            Some(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        };
        let z = if binding.components >= 3 { read(2)? } else { 0.0 };
        Some(Vec3::new(read(0)?, read(1)?, z))
    }

    fn rasterize_depth(&mut self, args: &DrawIndexedArgs) {
        let Some(fb) = self.bound_framebuffer.and_then(|f| self.framebuffers.get(&f)) else {
            return;
        };
        let Some(depth_texture) = fb.depth else {
            return;
        };
        let Some(va) = self.bound_vertex_array.and_then(|v| self.vertex_arrays.get(&v)) else {
            return;
        };
        let Some(index_data) = va
            .index_buffer
            .and_then(|ib| self.buffers.get(&ib))
            .map(|b| &b.data)
        else {
            return;
        };

        let view_projection =
            self.program_mat4(self.current_program, &["u_LightSpaceMatrix", "u_ViewProjection"]);
        let model = self.program_mat4(self.current_program, &["u_Model"]);
        let mvp = view_projection * model;
        let viewport = self.viewport;

        let mut triangles = Vec::new();
        let index_count = args.index_count as usize;
        for tri in 0..index_count / 3 {
            let mut window = [[0.0f32; 3]; 3];
            let mut valid = true;
            for (corner, out) in window.iter_mut().enumerate() {
                let at = args.index_byte_offset + (tri * 3 + corner) * 4;
                let Some(bytes) = index_data.get(at..at + 4) else {
                    valid = false;
                    break;
                };
                let index = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let Some(p) = self.fetch_position(va, index as i64 + args.base_vertex as i64)
                else {
                    valid = false;
                    break;
                };
                let clip = math::transform_point4(&mvp, &p);
                if clip.w <= 0.0 {
                    valid = false;
                    break;
                }
                let ndc = clip.xyz() / clip.w;
                *out = [
                    viewport.x as f32 + (ndc.x + 1.0) * 0.5 * viewport.width as f32,
                    viewport.y as f32 + (ndc.y + 1.0) * 0.5 * viewport.height as f32,
                    ndc.z * 0.5 + 0.5,
                ];
            }
            if valid {
                triangles.push(window);
            }
        }

        let depth_func = self.depth_func;
        let Some(target) = self.textures.get_mut(&depth_texture) else {
            return;
        };
        let (width, height) = (target.descriptor.width, target.descriptor.height);
        for tri in triangles {
            rasterize_triangle(&tri, width, height, depth_func, &mut target.depth);
        }
    }
}

fn edge(a: [f32; 3], b: [f32; 3], px: f32, py: f32) -> f32 {
    (b[0] - a[0]) * (py - a[1]) - (b[1] - a[1]) * (px - a[0])
}

fn rasterize_triangle(
    tri: &[[f32; 3]; 3],
    width: u32,
    height: u32,
    depth_func: DepthFunc,
    depth: &mut [f32],
) {
    let [a, b, c] = *tri;
    let area = edge(a, b, c[0], c[1]);
    if area.abs() < f32::EPSILON {
        return;
    }

    let min_x = a[0].min(b[0]).min(c[0]).floor().max(0.0) as u32;
    let min_y = a[1].min(b[1]).min(c[1]).floor().max(0.0) as u32;
    let max_x = (a[0].max(b[0]).max(c[0]).ceil().max(0.0) as u32).min(width);
    let max_y = (a[1].max(b[1]).max(c[1]).ceil().max(0.0) as u32).min(height);

    for y in min_y..max_y {
        for x in min_x..max_x {
            let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(b, c, px, py) / area;
            let w1 = edge(c, a, px, py) / area;
            let w2 = edge(a, b, px, py) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let z = w0 * a[2] + w1 * b[2] + w2 * c[2];
            if !(0.0..=1.0).contains(&z) {
                continue;
            }
            let Some(stored) = depth.get_mut((y * width + x) as usize) else {
                continue;
            };
            let pass = match depth_func {
                DepthFunc::Less => z < *stored,
                DepthFunc::LessEqual => z <= *stored,
            };
            if pass {
                *stored = z;
            }
        }
    }
}

// ============================================================================
// Shader source scanning
// ============================================================================

fn active_uniforms(stages: &[(ShaderStage, &str)]) -> Vec<String> {
    let mut names = Vec::new();
    for (_, source) in stages {
        for line in source.lines() {
            let line = line.trim();
            let Some(rest) = line.strip_prefix("uniform ") else {
                continue;
            };
            // Uniform blocks are bound by index, not by location.
            if line.contains('{') || !line.contains(';') {
                continue;
            }
            let decl = rest.trim_end_matches(';');
            let mut parts = decl.splitn(2, char::is_whitespace);
            let _ty = parts.next();
            let Some(declarators) = parts.next() else {
                continue;
            };
            for declarator in declarators.split(',') {
                let declarator = declarator.split('=').next().unwrap_or_default().trim();
                let (name, is_array) = match declarator.find('[') {
                    Some(bracket) => (declarator[..bracket].trim(), true),
                    None => (declarator, false),
                };
                if name.is_empty() {
                    continue;
                }
                let mut push = |n: String| {
                    if !names.contains(&n) {
                        names.push(n);
                    }
                };
                push(name.to_string());
                if is_array {
                    push(format!("{name}[0]"));
                }
            }
        }
    }
    names
}

fn compile_stage(stage: ShaderStage, source: &str) -> Result<(), GraphicsError> {
    for (line_no, line) in source.lines().enumerate() {
        if let Some(message) = line.trim().strip_prefix("#error") {
            return Err(GraphicsError::ShaderCompilationFailed {
                stage,
                log: format!("ERROR: 0:{}: '#error' :{message}", line_no + 1),
            });
        }
    }
    if !source.contains("main") {
        return Err(GraphicsError::ShaderCompilationFailed {
            stage,
            log: "ERROR: 0:0: missing function: main".to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// GpuBackend implementation
// ============================================================================

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn init(&self) {
        self.state.borrow_mut().record(BackendCommand::Init);
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor, data: Option<&[u8]>) -> BufferHandle {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        let mut bytes = vec![0u8; descriptor.size as usize];
        if let Some(data) = data {
            let n = data.len().min(bytes.len());
            bytes[..n].copy_from_slice(&data[..n]);
        }
        let target = descriptor.target();
        state.buffers.insert(
            id,
            DummyBuffer {
                target,
                data: bytes,
            },
        );
        state.record(BackendCommand::CreateBuffer {
            buffer: BufferHandle(id),
            target,
            size: descriptor.size,
            dynamic: descriptor.is_dynamic(),
        });
        BufferHandle(id)
    }

    fn write_buffer(&self, _target: BufferTarget, buffer: BufferHandle, offset: usize, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        match state.buffers.get_mut(&buffer.0) {
            Some(b) if offset + data.len() <= b.data.len() => {
                b.data[offset..offset + data.len()].copy_from_slice(data);
            }
            Some(_) => log::error!("DummyBackend: write past end of buffer {buffer:?}"),
            None => log::error!("DummyBackend: write to unknown buffer {buffer:?}"),
        }
        state.record(BackendCommand::WriteBuffer {
            buffer,
            offset,
            size: data.len(),
        });
    }

    fn read_buffer(
        &self,
        _target: BufferTarget,
        buffer: BufferHandle,
        offset: usize,
        size: usize,
    ) -> Vec<u8> {
        self.state
            .borrow()
            .buffers
            .get(&buffer.0)
            .and_then(|b| b.data.get(offset..offset + size))
            .map(<[u8]>::to_vec)
            .unwrap_or_else(|| vec![0; size])
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferHandle>) {
        let mut state = self.state.borrow_mut();
        match target {
            BufferTarget::Vertex => state.bound_array_buffer = buffer.map(|b| b.0),
            BufferTarget::Index => {
                if let Some(va) = state.bound_vertex_array {
                    if let Some(va) = state.vertex_arrays.get_mut(&va) {
                        va.index_buffer = buffer.map(|b| b.0);
                    }
                }
            }
            BufferTarget::Uniform => {}
        }
        state.record(BackendCommand::BindBuffer { target, buffer });
    }

    fn bind_uniform_buffer_base(&self, buffer: BufferHandle, binding: u32) {
        self.state
            .borrow_mut()
            .record(BackendCommand::BindUniformBufferBase { buffer, binding });
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state.borrow_mut();
        if let Some(b) = state.buffers.remove(&buffer.0) {
            log::trace!("DummyBackend: destroying {:?} buffer {}", b.target, buffer.0);
        }
        if state.bound_array_buffer == Some(buffer.0) {
            state.bound_array_buffer = None;
        }
        state.record(BackendCommand::DestroyBuffer(buffer));
    }

    fn create_vertex_array(&self) -> VertexArrayHandle {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.vertex_arrays.insert(id, DummyVertexArray::default());
        state.record(BackendCommand::CreateVertexArray(VertexArrayHandle(id)));
        VertexArrayHandle(id)
    }

    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayHandle>) {
        let mut state = self.state.borrow_mut();
        state.bound_vertex_array = vertex_array.map(|v| v.0);
        state.record(BackendCommand::BindVertexArray(vertex_array));
    }

    fn enable_vertex_attribute(&self, binding: &VertexAttributeBinding) {
        let mut state = self.state.borrow_mut();
        let (Some(va), Some(buffer)) = (state.bound_vertex_array, state.bound_array_buffer) else {
            log::error!(
                "DummyBackend: attribute {} wired without a bound vertex array and buffer",
                binding.location
            );
            return;
        };
        if let Some(va) = state.vertex_arrays.get_mut(&va) {
            va.attributes.insert(binding.location, (*binding, buffer));
        }
        state.record(BackendCommand::EnableVertexAttribute(*binding));
    }

    fn destroy_vertex_array(&self, vertex_array: VertexArrayHandle) {
        let mut state = self.state.borrow_mut();
        state.vertex_arrays.remove(&vertex_array.0);
        if state.bound_vertex_array == Some(vertex_array.0) {
            state.bound_vertex_array = None;
        }
        state.record(BackendCommand::DestroyVertexArray(vertex_array));
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> TextureHandle {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{} {:?})",
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.format
        );
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        let (faces, depth) = if descriptor.format.is_depth_stencil() {
            let texels = descriptor.width as usize * descriptor.height as usize;
            (Vec::new(), vec![1.0; texels])
        } else {
            let face_count = match descriptor.kind {
                TextureKind::D2 => 1,
                TextureKind::Cube => 6,
            };
            (vec![vec![0u8; descriptor.face_size()]; face_count], Vec::new())
        };
        state.textures.insert(
            id,
            DummyTexture {
                descriptor: descriptor.clone(),
                faces,
                depth,
            },
        );
        state.record(BackendCommand::CreateTexture {
            texture: TextureHandle(id),
            kind: descriptor.kind,
            width: descriptor.width,
            height: descriptor.height,
            format: descriptor.format,
        });
        TextureHandle(id)
    }

    fn upload_texture(&self, texture: TextureHandle, face: Option<CubeFace>, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        if let Some(tex) = state.textures.get_mut(&texture.0) {
            let index = face.map_or(0, |f| f.index());
            match tex.faces.get_mut(index) {
                Some(dst) if dst.len() == data.len() => dst.copy_from_slice(data),
                _ => log::error!("DummyBackend: upload size mismatch for texture {}", texture.0),
            }
        }
        state.record(BackendCommand::UploadTexture {
            texture,
            face,
            size: data.len(),
        });
    }

    fn generate_mipmaps(&self, texture: TextureHandle) {
        self.state
            .borrow_mut()
            .record(BackendCommand::GenerateMipmaps(texture));
    }

    fn bind_texture(&self, slot: u32, kind: TextureKind, texture: Option<TextureHandle>) {
        let mut state = self.state.borrow_mut();
        match texture {
            Some(t) => state.texture_slots.insert(slot, t.0),
            None => state.texture_slots.remove(&slot),
        };
        state.record(BackendCommand::BindTexture {
            slot,
            kind,
            texture,
        });
    }

    fn clear_texture_i32(&self, texture: TextureHandle, value: i32) {
        let mut state = self.state.borrow_mut();
        if let Some(tex) = state.textures.get_mut(&texture.0) {
            for face in &mut tex.faces {
                for texel in face.chunks_exact_mut(4) {
                    texel.copy_from_slice(&value.to_le_bytes());
                }
            }
        }
        state.record(BackendCommand::ClearTexture { texture, value });
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        let mut state = self.state.borrow_mut();
        state.textures.remove(&texture.0);
        state.texture_slots.retain(|_, t| *t != texture.0);
        state.record(BackendCommand::DestroyTexture(texture));
    }

    fn create_framebuffer(&self) -> FramebufferHandle {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.framebuffers.insert(id, DummyFramebuffer::default());
        state.record(BackendCommand::CreateFramebuffer(FramebufferHandle(id)));
        FramebufferHandle(id)
    }

    fn attach_texture(
        &self,
        framebuffer: FramebufferHandle,
        attachment: FramebufferAttachment,
        texture: TextureHandle,
    ) {
        let mut state = self.state.borrow_mut();
        if let Some(fb) = state.framebuffers.get_mut(&framebuffer.0) {
            match attachment {
                FramebufferAttachment::Color(i) => {
                    fb.colors.insert(i, texture.0);
                }
                FramebufferAttachment::DepthStencil => fb.depth = Some(texture.0),
            }
        }
        state.record(BackendCommand::AttachTexture {
            framebuffer,
            attachment,
            texture,
        });
    }

    fn set_draw_buffers(&self, framebuffer: FramebufferHandle, count: u32) {
        let mut state = self.state.borrow_mut();
        if let Some(fb) = state.framebuffers.get_mut(&framebuffer.0) {
            fb.draw_buffers = count;
        }
        state.record(BackendCommand::SetDrawBuffers { framebuffer, count });
    }

    fn is_framebuffer_complete(&self, framebuffer: FramebufferHandle) -> bool {
        let state = self.state.borrow();
        let Some(fb) = state.framebuffers.get(&framebuffer.0) else {
            return false;
        };
        let mut sizes = fb
            .colors
            .values()
            .chain(fb.depth.iter())
            .filter_map(|t| state.textures.get(t))
            .map(|t| (t.descriptor.width, t.descriptor.height));
        match sizes.next() {
            Some(first) => sizes.all(|s| s == first),
            None => false,
        }
    }

    fn bind_framebuffer(&self, framebuffer: Option<FramebufferHandle>) {
        let mut state = self.state.borrow_mut();
        state.bound_framebuffer = framebuffer.map(|f| f.0);
        state.record(BackendCommand::BindFramebuffer(framebuffer));
    }

    fn read_pixel(
        &self,
        framebuffer: FramebufferHandle,
        attachment_index: u32,
        x: i32,
        y: i32,
    ) -> i32 {
        let mut state = self.state.borrow_mut();
        state.record(BackendCommand::ReadPixel {
            framebuffer,
            attachment_index,
            x,
            y,
        });
        let Some(tex) = state
            .framebuffers
            .get(&framebuffer.0)
            .and_then(|fb| fb.colors.get(&attachment_index))
            .and_then(|t| state.textures.get(t))
        else {
            return 0;
        };
        let d = &tex.descriptor;
        if x < 0 || y < 0 || x as u32 >= d.width || y as u32 >= d.height {
            return 0;
        }
        let bpp = d.format.bytes_per_pixel() as usize;
        let at = (y as usize * d.width as usize + x as usize) * bpp;
        let Some(texel) = tex.faces.first().and_then(|f| f.get(at..at + bpp)) else {
            return 0;
        };
        if d.format.is_integer() {
            i32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]])
        } else {
            texel[0] as i32
        }
    }

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) {
        let mut state = self.state.borrow_mut();
        state.framebuffers.remove(&framebuffer.0);
        if state.bound_framebuffer == Some(framebuffer.0) {
            state.bound_framebuffer = None;
        }
        state.record(BackendCommand::DestroyFramebuffer(framebuffer));
    }

    fn compile_program(
        &self,
        stages: &[(ShaderStage, &str)],
    ) -> Result<ProgramHandle, GraphicsError> {
        for &(stage, source) in stages {
            compile_stage(stage, source)?;
        }
        let has = |s: ShaderStage| stages.iter().any(|&(stage, _)| stage == s);
        if !has(ShaderStage::Vertex) || !has(ShaderStage::Fragment) {
            return Err(GraphicsError::ShaderLinkFailed(
                "program needs both a vertex and a fragment stage".to_string(),
            ));
        }

        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.programs.insert(
            id,
            DummyProgram {
                uniforms: active_uniforms(stages),
                values: HashMap::new(),
            },
        );
        state.record(BackendCommand::CompileProgram(ProgramHandle(id)));
        Ok(ProgramHandle(id))
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        let mut state = self.state.borrow_mut();
        state.current_program = program.map(|p| p.0);
        state.record(BackendCommand::UseProgram(program));
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> i32 {
        self.state
            .borrow()
            .programs
            .get(&program.0)
            .and_then(|p| p.uniforms.iter().position(|u| u == name))
            .map_or(-1, |i| i as i32)
    }

    fn set_uniform(&self, location: i32, value: UniformValue<'_>) {
        let mut state = self.state.borrow_mut();
        let program = state.current_program;
        let value = RecordedUniform::from(value);
        if location >= 0 {
            if let Some(p) = program.and_then(|p| state.programs.get_mut(&p)) {
                p.values.insert(location, value.clone());
            }
        }
        state.record(BackendCommand::SetUniform {
            program: program.map(ProgramHandle),
            location,
            value,
        });
    }

    fn destroy_program(&self, program: ProgramHandle) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program.0);
        if state.current_program == Some(program.0) {
            state.current_program = None;
        }
        state.record(BackendCommand::DestroyProgram(program));
    }

    fn set_viewport(&self, x: i32, y: i32, width: u32, height: u32) {
        let mut state = self.state.borrow_mut();
        let viewport = Viewport::new(x, y, width, height);
        state.viewport = viewport;
        state.record(BackendCommand::SetViewport(viewport));
    }

    fn set_clear_color(&self, color: [f32; 4]) {
        let mut state = self.state.borrow_mut();
        state.clear_color = color;
        state.record(BackendCommand::SetClearColor(color));
    }

    fn clear(&self, flags: ClearFlags) {
        let mut state = self.state.borrow_mut();
        state.record(BackendCommand::Clear(flags));

        let Some(fb) = state.bound_framebuffer else {
            return;
        };
        let Some((colors, depth)) = state
            .framebuffers
            .get(&fb)
            .map(|fb| (fb.colors.values().copied().collect::<Vec<_>>(), fb.depth))
        else {
            return;
        };

        if flags.contains(ClearFlags::DEPTH) {
            if let Some(tex) = depth.and_then(|d| state.textures.get_mut(&d)) {
                tex.depth.fill(1.0);
            }
        }
        if flags.contains(ClearFlags::COLOR) {
            let rgba = state.clear_color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            for id in colors {
                if let Some(tex) = state.textures.get_mut(&id) {
                    if tex.descriptor.format == TextureFormat::Rgba8 {
                        for face in &mut tex.faces {
                            for texel in face.chunks_exact_mut(4) {
                                texel.copy_from_slice(&rgba);
                            }
                        }
                    }
                }
            }
        }
    }

    fn set_depth_func(&self, func: DepthFunc) {
        let mut state = self.state.borrow_mut();
        state.depth_func = func;
        state.record(BackendCommand::SetDepthFunc(func));
    }

    fn set_line_width(&self, width: f32) {
        self.state
            .borrow_mut()
            .record(BackendCommand::SetLineWidth(width));
    }

    fn draw_elements(&self, mode: PrimitiveMode, args: &DrawIndexedArgs) {
        let mut state = self.state.borrow_mut();
        let command = BackendCommand::DrawElements {
            mode,
            vertex_array: state.bound_vertex_array.map(VertexArrayHandle),
            program: state.current_program.map(ProgramHandle),
            framebuffer: state.bound_framebuffer.map(FramebufferHandle),
            args: *args,
        };
        state.record(command);
        if mode == PrimitiveMode::Triangles {
            state.rasterize_depth(args);
        }
    }

    fn draw_arrays(&self, mode: PrimitiveMode, first: u32, count: u32) {
        let mut state = self.state.borrow_mut();
        let command = BackendCommand::DrawArrays {
            mode,
            vertex_array: state.bound_vertex_array.map(VertexArrayHandle),
            first,
            count,
        };
        state.record(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferUsage, TextureFormat};

    #[test]
    fn test_buffer_roundtrip() {
        let backend = DummyBackend::new();
        let buffer = backend.create_buffer(&BufferDescriptor::new(8, BufferUsage::VERTEX), None);
        backend.write_buffer(BufferTarget::Vertex, buffer, 4, &[1, 2, 3, 4]);
        assert_eq!(
            backend.read_buffer(BufferTarget::Vertex, buffer, 0, 8),
            vec![0, 0, 0, 0, 1, 2, 3, 4]
        );
        backend.destroy_buffer(buffer);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn test_index_buffer_binding_is_vertex_array_state() {
        let backend = DummyBackend::new();
        let va = backend.create_vertex_array();
        backend.bind_vertex_array(Some(va));
        let ib = backend.create_buffer(
            &BufferDescriptor::new(12, BufferUsage::INDEX),
            Some(&[0; 12]),
        );
        // Creation alone does not attach.
        assert_eq!(backend.vertex_array_index_buffer(va), None);
        backend.bind_buffer(BufferTarget::Index, Some(ib));
        assert_eq!(backend.vertex_array_index_buffer(va), Some(ib));

        // Binding with no vertex array bound does not leak into `va`.
        backend.bind_vertex_array(None);
        backend.bind_buffer(BufferTarget::Index, None);
        assert_eq!(backend.vertex_array_index_buffer(va), Some(ib));
    }

    #[test]
    fn test_active_uniforms() {
        let vs = "uniform mat4 u_Model;\nlayout(std140, binding = 0) uniform Camera {\nvoid main() {}";
        let fs = "uniform sampler2D u_Textures[4];\nuniform float u_A, u_B;\nvoid main() {}";
        let names = active_uniforms(&[(ShaderStage::Vertex, vs), (ShaderStage::Fragment, fs)]);
        assert_eq!(
            names,
            vec!["u_Model", "u_Textures", "u_Textures[0]", "u_A", "u_B"]
        );
    }

    #[test]
    fn test_compile_error_directive() {
        let backend = DummyBackend::new();
        let err = backend
            .compile_program(&[
                (ShaderStage::Vertex, "void main() {}"),
                (ShaderStage::Fragment, "#error broken\nvoid main() {}"),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            GraphicsError::ShaderCompilationFailed {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn test_rasterize_triangle_covers_center() {
        let mut depth = vec![1.0; 16];
        let tri = [[0.0, 0.0, 0.25], [4.0, 0.0, 0.25], [0.0, 4.0, 0.25]];
        rasterize_triangle(&tri, 4, 4, DepthFunc::Less, &mut depth);
        assert_eq!(depth[0], 0.25);
        // Top-right corner lies outside the triangle.
        assert_eq!(depth[15], 1.0);
    }

    #[test]
    fn test_clear_resets_depth() {
        let backend = DummyBackend::new();
        let fb = backend.create_framebuffer();
        let depth =
            backend.create_texture(&TextureDescriptor::new_2d(2, 2, TextureFormat::Depth24Stencil8));
        backend.attach_texture(fb, FramebufferAttachment::DepthStencil, depth);
        assert!(backend.is_framebuffer_complete(fb));

        backend.bind_framebuffer(Some(fb));
        backend.clear(ClearFlags::DEPTH);
        assert_eq!(backend.depth_at(depth, 1, 1), Some(1.0));
        assert_eq!(backend.depth_at(depth, 2, 0), None);
    }
}
