//! OpenGL 4.5 core backend.
//!
//! Thin translation of [`GpuBackend`] calls into `gl` crate calls. The GL
//! context must be current on the calling thread; function pointers are
//! resolved once through the loader handed over by the windowing layer.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_void, CStr, CString};
use std::sync::Once;

use gl::types::{GLenum, GLint, GLsizei, GLsizeiptr, GLuint};

use crate::error::GraphicsError;
use crate::types::{
    AttributeBaseType, BufferDescriptor, BufferTarget, ClearFlags, CubeFace, DepthFunc,
    DrawIndexedArgs, PrimitiveMode, ShaderStage, TextureDescriptor, TextureFormat, TextureKind,
    TextureWrap, UniformValue, VertexAttributeBinding,
};

use super::{
    BufferHandle, FramebufferAttachment, FramebufferHandle, GpuBackend, ProcLoader,
    ProgramHandle, TextureHandle, VertexArrayHandle,
};

static GL_LOADED: Once = Once::new();

/// OpenGL backend.
#[derive(Debug, Default)]
pub struct OpenGlBackend {
    /// Texture allocations, needed to pick upload targets and formats.
    textures: RefCell<HashMap<u32, TextureDescriptor>>,
}

impl OpenGlBackend {
    /// Resolve GL entry points through `loader` and create the backend.
    ///
    /// Entry points are loaded only the first time this is called.
    pub fn load_with(loader: ProcLoader<'_>) -> Self {
        GL_LOADED.call_once(|| {
            gl::load_with(|symbol| loader(symbol));
        });

        if gl::GetString::is_loaded() {
            // SAFETY: the context is current and glGetString returns static strings.
            unsafe {
                log::info!("OpenGL Info:");
                log::info!("  Vendor: {}", gl_string(gl::VENDOR));
                log::info!("  Renderer: {}", gl_string(gl::RENDERER));
                log::info!("  Version: {}", gl_string(gl::VERSION));
            }
        } else {
            log::error!("Failed to load OpenGL entry points");
        }

        Self::default()
    }
}

unsafe fn gl_string(name: GLenum) -> String {
    let ptr = gl::GetString(name);
    if ptr.is_null() {
        return String::from("<unknown>");
    }
    CStr::from_ptr(ptr.cast()).to_string_lossy().into_owned()
}

fn buffer_target(target: BufferTarget) -> GLenum {
    match target {
        BufferTarget::Vertex => gl::ARRAY_BUFFER,
        BufferTarget::Index => gl::ELEMENT_ARRAY_BUFFER,
        BufferTarget::Uniform => gl::UNIFORM_BUFFER,
    }
}

fn texture_target(kind: TextureKind) -> GLenum {
    match kind {
        TextureKind::D2 => gl::TEXTURE_2D,
        TextureKind::Cube => gl::TEXTURE_CUBE_MAP,
    }
}

/// (internal format, pixel format, pixel type)
fn texture_format(format: TextureFormat) -> (GLenum, GLenum, GLenum) {
    match format {
        TextureFormat::Rgb8 => (gl::RGB8, gl::RGB, gl::UNSIGNED_BYTE),
        TextureFormat::Rgba8 => (gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE),
        TextureFormat::Rgba16Float => (gl::RGBA16F, gl::RGBA, gl::FLOAT),
        TextureFormat::Rgba32Float => (gl::RGBA32F, gl::RGBA, gl::FLOAT),
        TextureFormat::R32Sint => (gl::R32I, gl::RED_INTEGER, gl::INT),
        TextureFormat::Depth24Stencil8 => (
            gl::DEPTH24_STENCIL8,
            gl::DEPTH_STENCIL,
            gl::UNSIGNED_INT_24_8,
        ),
    }
}

fn primitive_mode(mode: PrimitiveMode) -> GLenum {
    match mode {
        PrimitiveMode::Triangles => gl::TRIANGLES,
        PrimitiveMode::Lines => gl::LINES,
    }
}

/// Component type of an integer attribute. `Bool` is one byte per value.
fn integer_attribute_type(base: AttributeBaseType) -> GLenum {
    match base {
        AttributeBaseType::Bool => gl::UNSIGNED_BYTE,
        AttributeBaseType::Int | AttributeBaseType::Float => gl::INT,
    }
}

fn shader_kind(stage: ShaderStage) -> GLenum {
    match stage {
        ShaderStage::Vertex => gl::VERTEX_SHADER,
        ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        ShaderStage::Geometry => gl::GEOMETRY_SHADER,
    }
}

fn cube_face_target(face: CubeFace) -> GLenum {
    gl::TEXTURE_CUBE_MAP_POSITIVE_X + face.index() as GLenum
}

unsafe fn shader_info_log(shader: GLuint) -> String {
    let mut len: GLint = 0;
    gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len);
    let mut buf = vec![0u8; len.max(1) as usize];
    gl::GetShaderInfoLog(shader, len, std::ptr::null_mut(), buf.as_mut_ptr().cast());
    String::from_utf8_lossy(&buf)
        .trim_end_matches('\0')
        .to_string()
}

unsafe fn program_info_log(program: GLuint) -> String {
    let mut len: GLint = 0;
    gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len);
    let mut buf = vec![0u8; len.max(1) as usize];
    gl::GetProgramInfoLog(program, len, std::ptr::null_mut(), buf.as_mut_ptr().cast());
    String::from_utf8_lossy(&buf)
        .trim_end_matches('\0')
        .to_string()
}

// Uploads and readbacks go through GL_COPY_WRITE_BUFFER so they never disturb
// the array buffer binding or the bound vertex array's index buffer.
//
// SAFETY (all methods below): the owning GraphicsContext is !Send, so every
// call happens on the thread whose GL context was current at creation.
impl GpuBackend for OpenGlBackend {
    fn name(&self) -> &'static str {
        "opengl"
    }

    fn init(&self) {
        unsafe {
            gl::Enable(gl::BLEND);
            gl::BlendFunc(gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA);
            gl::Enable(gl::DEPTH_TEST);
            gl::Enable(gl::LINE_SMOOTH);
            gl::Enable(gl::TEXTURE_CUBE_MAP_SEAMLESS);
            gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
        }
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor, data: Option<&[u8]>) -> BufferHandle {
        let usage = if descriptor.is_dynamic() {
            gl::DYNAMIC_DRAW
        } else {
            gl::STATIC_DRAW
        };
        let ptr = data.map_or(std::ptr::null(), |d| d.as_ptr().cast::<c_void>());
        let mut id: GLuint = 0;
        unsafe {
            gl::GenBuffers(1, &mut id);
            gl::BindBuffer(gl::COPY_WRITE_BUFFER, id);
            gl::BufferData(gl::COPY_WRITE_BUFFER, descriptor.size as GLsizeiptr, ptr, usage);
        }
        BufferHandle(id)
    }

    fn write_buffer(&self, _target: BufferTarget, buffer: BufferHandle, offset: usize, data: &[u8]) {
        unsafe {
            gl::BindBuffer(gl::COPY_WRITE_BUFFER, buffer.0);
            gl::BufferSubData(
                gl::COPY_WRITE_BUFFER,
                offset as isize,
                data.len() as GLsizeiptr,
                data.as_ptr().cast(),
            );
        }
    }

    fn read_buffer(
        &self,
        _target: BufferTarget,
        buffer: BufferHandle,
        offset: usize,
        size: usize,
    ) -> Vec<u8> {
        let mut out = vec![0u8; size];
        unsafe {
            gl::BindBuffer(gl::COPY_WRITE_BUFFER, buffer.0);
            gl::GetBufferSubData(
                gl::COPY_WRITE_BUFFER,
                offset as isize,
                size as GLsizeiptr,
                out.as_mut_ptr().cast(),
            );
        }
        out
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferHandle>) {
        unsafe { gl::BindBuffer(buffer_target(target), buffer.map_or(0, |b| b.0)) }
    }

    fn bind_uniform_buffer_base(&self, buffer: BufferHandle, binding: u32) {
        unsafe { gl::BindBufferBase(gl::UNIFORM_BUFFER, binding, buffer.0) }
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        unsafe { gl::DeleteBuffers(1, &buffer.0) }
    }

    fn create_vertex_array(&self) -> VertexArrayHandle {
        let mut id: GLuint = 0;
        unsafe { gl::GenVertexArrays(1, &mut id) };
        VertexArrayHandle(id)
    }

    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayHandle>) {
        unsafe { gl::BindVertexArray(vertex_array.map_or(0, |v| v.0)) }
    }

    fn enable_vertex_attribute(&self, binding: &VertexAttributeBinding) {
        let offset = binding.offset as usize as *const c_void;
        unsafe {
            gl::EnableVertexAttribArray(binding.location);
            match binding.base_type {
                AttributeBaseType::Float => gl::VertexAttribPointer(
                    binding.location,
                    binding.components as GLint,
                    gl::FLOAT,
                    if binding.normalized { gl::TRUE } else { gl::FALSE },
                    binding.stride as GLsizei,
                    offset,
                ),
                AttributeBaseType::Int | AttributeBaseType::Bool => gl::VertexAttribIPointer(
                    binding.location,
                    binding.components as GLint,
                    integer_attribute_type(binding.base_type),
                    binding.stride as GLsizei,
                    offset,
                ),
            }
            if binding.divisor != 0 {
                gl::VertexAttribDivisor(binding.location, binding.divisor);
            }
        }
    }

    fn destroy_vertex_array(&self, vertex_array: VertexArrayHandle) {
        unsafe { gl::DeleteVertexArrays(1, &vertex_array.0) }
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> TextureHandle {
        let target = texture_target(descriptor.kind);
        let (internal, format, ty) = texture_format(descriptor.format);
        let min_filter = match (descriptor.linear, descriptor.mipmapped) {
            (true, true) => gl::LINEAR_MIPMAP_LINEAR,
            (true, false) => gl::LINEAR,
            (false, true) => gl::NEAREST_MIPMAP_NEAREST,
            (false, false) => gl::NEAREST,
        };
        let mag_filter = if descriptor.linear { gl::LINEAR } else { gl::NEAREST };
        let wrap = match descriptor.wrap {
            TextureWrap::Repeat => gl::REPEAT,
            TextureWrap::ClampToEdge => gl::CLAMP_TO_EDGE,
        };

        let mut id: GLuint = 0;
        unsafe {
            gl::GenTextures(1, &mut id);
            gl::BindTexture(target, id);
            let faces: Vec<GLenum> = match descriptor.kind {
                TextureKind::D2 => vec![gl::TEXTURE_2D],
                TextureKind::Cube => CubeFace::ALL.iter().map(|f| cube_face_target(*f)).collect(),
            };
            for face in faces {
                gl::TexImage2D(
                    face,
                    0,
                    internal as GLint,
                    descriptor.width as GLsizei,
                    descriptor.height as GLsizei,
                    0,
                    format,
                    ty,
                    std::ptr::null(),
                );
            }
            gl::TexParameteri(target, gl::TEXTURE_MIN_FILTER, min_filter as GLint);
            gl::TexParameteri(target, gl::TEXTURE_MAG_FILTER, mag_filter as GLint);
            gl::TexParameteri(target, gl::TEXTURE_WRAP_S, wrap as GLint);
            gl::TexParameteri(target, gl::TEXTURE_WRAP_T, wrap as GLint);
            if descriptor.kind == TextureKind::Cube {
                gl::TexParameteri(target, gl::TEXTURE_WRAP_R, wrap as GLint);
            }
        }
        self.textures.borrow_mut().insert(id, descriptor.clone());
        TextureHandle(id)
    }

    fn upload_texture(&self, texture: TextureHandle, face: Option<CubeFace>, data: &[u8]) {
        let textures = self.textures.borrow();
        let Some(descriptor) = textures.get(&texture.0) else {
            log::error!("Upload to unknown texture {}", texture.0);
            return;
        };
        let (_, format, ty) = texture_format(descriptor.format);
        let image_target = face.map_or(gl::TEXTURE_2D, cube_face_target);
        unsafe {
            gl::BindTexture(texture_target(descriptor.kind), texture.0);
            gl::TexSubImage2D(
                image_target,
                0,
                0,
                0,
                descriptor.width as GLsizei,
                descriptor.height as GLsizei,
                format,
                ty,
                data.as_ptr().cast(),
            );
        }
    }

    fn generate_mipmaps(&self, texture: TextureHandle) {
        let textures = self.textures.borrow();
        let Some(descriptor) = textures.get(&texture.0) else {
            return;
        };
        let target = texture_target(descriptor.kind);
        unsafe {
            gl::BindTexture(target, texture.0);
            gl::GenerateMipmap(target);
        }
    }

    fn bind_texture(&self, slot: u32, kind: TextureKind, texture: Option<TextureHandle>) {
        unsafe {
            gl::ActiveTexture(gl::TEXTURE0 + slot);
            gl::BindTexture(texture_target(kind), texture.map_or(0, |t| t.0));
        }
    }

    fn clear_texture_i32(&self, texture: TextureHandle, value: i32) {
        unsafe {
            gl::ClearTexImage(
                texture.0,
                0,
                gl::RED_INTEGER,
                gl::INT,
                (&value as *const i32).cast(),
            );
        }
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        self.textures.borrow_mut().remove(&texture.0);
        unsafe { gl::DeleteTextures(1, &texture.0) }
    }

    fn create_framebuffer(&self) -> FramebufferHandle {
        let mut id: GLuint = 0;
        unsafe { gl::GenFramebuffers(1, &mut id) };
        FramebufferHandle(id)
    }

    fn attach_texture(
        &self,
        framebuffer: FramebufferHandle,
        attachment: FramebufferAttachment,
        texture: TextureHandle,
    ) {
        let attachment = match attachment {
            FramebufferAttachment::Color(i) => gl::COLOR_ATTACHMENT0 + i,
            FramebufferAttachment::DepthStencil => gl::DEPTH_STENCIL_ATTACHMENT,
        };
        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer.0);
            gl::FramebufferTexture2D(gl::FRAMEBUFFER, attachment, gl::TEXTURE_2D, texture.0, 0);
        }
    }

    fn set_draw_buffers(&self, framebuffer: FramebufferHandle, color_count: u32) {
        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer.0);
            if color_count == 0 {
                gl::DrawBuffer(gl::NONE);
                gl::ReadBuffer(gl::NONE);
            } else {
                let buffers: Vec<GLenum> =
                    (0..color_count).map(|i| gl::COLOR_ATTACHMENT0 + i).collect();
                gl::DrawBuffers(buffers.len() as GLsizei, buffers.as_ptr());
            }
        }
    }

    fn is_framebuffer_complete(&self, framebuffer: FramebufferHandle) -> bool {
        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer.0);
            gl::CheckFramebufferStatus(gl::FRAMEBUFFER) == gl::FRAMEBUFFER_COMPLETE
        }
    }

    fn bind_framebuffer(&self, framebuffer: Option<FramebufferHandle>) {
        unsafe { gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer.map_or(0, |f| f.0)) }
    }

    fn read_pixel(
        &self,
        framebuffer: FramebufferHandle,
        attachment_index: u32,
        x: i32,
        y: i32,
    ) -> i32 {
        let mut value: i32 = 0;
        unsafe {
            gl::BindFramebuffer(gl::READ_FRAMEBUFFER, framebuffer.0);
            gl::ReadBuffer(gl::COLOR_ATTACHMENT0 + attachment_index);
            gl::ReadPixels(
                x,
                y,
                1,
                1,
                gl::RED_INTEGER,
                gl::INT,
                (&mut value as *mut i32).cast(),
            );
        }
        value
    }

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) {
        unsafe { gl::DeleteFramebuffers(1, &framebuffer.0) }
    }

    fn compile_program(
        &self,
        stages: &[(ShaderStage, &str)],
    ) -> Result<ProgramHandle, GraphicsError> {
        let mut shaders = Vec::with_capacity(stages.len());
        let delete_all = |shaders: &[GLuint]| unsafe {
            for &s in shaders {
                gl::DeleteShader(s);
            }
        };

        for &(stage, source) in stages {
            let source = CString::new(source).map_err(|_| GraphicsError::ShaderCompilationFailed {
                stage,
                log: "source contains a NUL byte".to_string(),
            })?;
            unsafe {
                let shader = gl::CreateShader(shader_kind(stage));
                gl::ShaderSource(shader, 1, &source.as_ptr(), std::ptr::null());
                gl::CompileShader(shader);

                let mut status: GLint = 0;
                gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status);
                if status == gl::FALSE as GLint {
                    let log = shader_info_log(shader);
                    gl::DeleteShader(shader);
                    delete_all(&shaders);
                    return Err(GraphicsError::ShaderCompilationFailed { stage, log });
                }
                shaders.push(shader);
            }
        }

        unsafe {
            let program = gl::CreateProgram();
            for &s in &shaders {
                gl::AttachShader(program, s);
            }
            gl::LinkProgram(program);

            let mut status: GLint = 0;
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);
            if status == gl::FALSE as GLint {
                let log = program_info_log(program);
                gl::DeleteProgram(program);
                delete_all(&shaders);
                return Err(GraphicsError::ShaderLinkFailed(log));
            }

            for &s in &shaders {
                gl::DetachShader(program, s);
            }
            delete_all(&shaders);
            Ok(ProgramHandle(program))
        }
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        unsafe { gl::UseProgram(program.map_or(0, |p| p.0)) }
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> i32 {
        let Ok(name) = CString::new(name) else {
            return -1;
        };
        unsafe { gl::GetUniformLocation(program.0, name.as_ptr()) }
    }

    fn set_uniform(&self, location: i32, value: UniformValue<'_>) {
        unsafe {
            match value {
                UniformValue::Int(v) => gl::Uniform1i(location, v),
                UniformValue::IntArray(v) => {
                    gl::Uniform1iv(location, v.len() as GLsizei, v.as_ptr())
                }
                UniformValue::Float(v) => gl::Uniform1f(location, v),
                UniformValue::Float2([x, y]) => gl::Uniform2f(location, x, y),
                UniformValue::Float3([x, y, z]) => gl::Uniform3f(location, x, y, z),
                UniformValue::Float4([x, y, z, w]) => gl::Uniform4f(location, x, y, z, w),
                UniformValue::Mat4(m) => gl::UniformMatrix4fv(location, 1, gl::FALSE, m.as_ptr()),
            }
        }
    }

    fn destroy_program(&self, program: ProgramHandle) {
        unsafe { gl::DeleteProgram(program.0) }
    }

    fn set_viewport(&self, x: i32, y: i32, width: u32, height: u32) {
        unsafe { gl::Viewport(x, y, width as GLsizei, height as GLsizei) }
    }

    fn set_clear_color(&self, color: [f32; 4]) {
        unsafe { gl::ClearColor(color[0], color[1], color[2], color[3]) }
    }

    fn clear(&self, flags: ClearFlags) {
        let mut mask = 0;
        if flags.contains(ClearFlags::COLOR) {
            mask |= gl::COLOR_BUFFER_BIT;
        }
        if flags.contains(ClearFlags::DEPTH) {
            mask |= gl::DEPTH_BUFFER_BIT;
        }
        if flags.contains(ClearFlags::STENCIL) {
            mask |= gl::STENCIL_BUFFER_BIT;
        }
        unsafe { gl::Clear(mask) }
    }

    fn set_depth_func(&self, func: DepthFunc) {
        let func = match func {
            DepthFunc::Less => gl::LESS,
            DepthFunc::LessEqual => gl::LEQUAL,
        };
        unsafe { gl::DepthFunc(func) }
    }

    fn set_line_width(&self, width: f32) {
        unsafe { gl::LineWidth(width) }
    }

    fn draw_elements(&self, mode: PrimitiveMode, args: &DrawIndexedArgs) {
        let offset = args.index_byte_offset as *const c_void;
        unsafe {
            if args.instance_count != 1 {
                gl::DrawElementsInstancedBaseVertex(
                    primitive_mode(mode),
                    args.index_count as GLsizei,
                    gl::UNSIGNED_INT,
                    offset,
                    args.instance_count as GLsizei,
                    args.base_vertex,
                );
            } else {
                gl::DrawElementsBaseVertex(
                    primitive_mode(mode),
                    args.index_count as GLsizei,
                    gl::UNSIGNED_INT,
                    offset,
                    args.base_vertex,
                );
            }
        }
    }

    fn draw_arrays(&self, mode: PrimitiveMode, first: u32, count: u32) {
        unsafe { gl::DrawArrays(primitive_mode(mode), first as GLint, count as GLsizei) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ShaderDataType;

    #[test]
    fn test_format_mapping() {
        assert_eq!(
            texture_format(TextureFormat::R32Sint),
            (gl::R32I, gl::RED_INTEGER, gl::INT)
        );
        assert_eq!(texture_format(TextureFormat::Rgba16Float).0, gl::RGBA16F);
        assert_eq!(
            cube_face_target(CubeFace::NegativeZ),
            gl::TEXTURE_CUBE_MAP_NEGATIVE_Z
        );
    }

    #[test]
    fn test_integer_attribute_width_matches_layout() {
        assert_eq!(ShaderDataType::Bool.size(), 1);
        assert_eq!(
            integer_attribute_type(AttributeBaseType::Bool),
            gl::UNSIGNED_BYTE
        );
        assert_eq!(ShaderDataType::Int.size(), 4);
        assert_eq!(integer_attribute_type(AttributeBaseType::Int), gl::INT);
    }
}
