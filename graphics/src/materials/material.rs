//! Material definition.

use std::rc::Rc;

use aether_core::math::Mat4;
use bitflags::bitflags;

use crate::backend::TextureHandle;
use crate::resources::{Texture2D, TextureCube};
use crate::shader::Shader;

bitflags! {
    /// Render state a material expects from the pass drawing it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MaterialFlags: u32 {
        const DEPTH_TEST = 1 << 0;
        const DEPTH_WRITE = 1 << 1;
        const BLEND = 1 << 2;
        const TWO_SIDED = 1 << 3;
        const WIREFRAME = 1 << 4;
        /// Skipped by the shadow pass.
        const DISABLE_SHADOW_CASTING = 1 << 5;
        const DISABLE_SHADOW_RECEIVING = 1 << 6;
    }
}

impl Default for MaterialFlags {
    fn default() -> Self {
        Self::DEPTH_TEST | Self::DEPTH_WRITE
    }
}

/// A uniform value stored on a material.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialProperty {
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Int(i32),
    IntArray(Vec<i32>),
    /// Uploaded as an int (0 or 1).
    Bool(bool),
    Mat4(Mat4),
}

impl MaterialProperty {
    fn upload(&self, shader: &Shader, name: &str) {
        match self {
            Self::Float(v) => shader.set_float(name, *v),
            Self::Float2(v) => shader.set_float2(name, *v),
            Self::Float3(v) => shader.set_float3(name, *v),
            Self::Float4(v) => shader.set_float4(name, *v),
            Self::Int(v) => shader.set_int(name, *v),
            Self::IntArray(v) => shader.set_int_array(name, v),
            Self::Bool(v) => shader.set_int(name, i32::from(*v)),
            Self::Mat4(v) => shader.set_mat4(name, v),
        }
    }
}

/// A texture bound by a material.
#[derive(Debug, Clone)]
pub enum MaterialTexture {
    Texture2D(Rc<Texture2D>),
    TextureCube(Rc<TextureCube>),
}

impl MaterialTexture {
    pub fn bind(&self, slot: u32) {
        match self {
            Self::Texture2D(texture) => texture.bind(slot),
            Self::TextureCube(texture) => texture.bind(slot),
        }
    }

    pub fn renderer_id(&self) -> TextureHandle {
        match self {
            Self::Texture2D(texture) => texture.renderer_id(),
            Self::TextureCube(texture) => texture.renderer_id(),
        }
    }

    pub fn as_texture_2d(&self) -> Option<&Rc<Texture2D>> {
        match self {
            Self::Texture2D(texture) => Some(texture),
            Self::TextureCube(_) => None,
        }
    }
}

/// A shader plus the uniform values and textures it is drawn with.
///
/// Values and textures keep the order in which each name was first set;
/// setting an existing name replaces the value in place. Texture `i` is bound
/// to slot `start_slot + i` and its sampler uniform is set to that slot.
#[derive(Debug)]
pub struct Material {
    name: String,
    shader: Rc<Shader>,
    properties: Vec<(String, MaterialProperty)>,
    textures: Vec<(String, MaterialTexture)>,
    flags: MaterialFlags,
}

impl Material {
    /// Create a material named after its shader.
    pub fn new(shader: Rc<Shader>) -> Self {
        Self {
            name: shader.name().to_string(),
            shader,
            properties: Vec::new(),
            textures: Vec::new(),
            flags: MaterialFlags::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bind the shader, then bind textures to consecutive slots from `start_slot`.
    pub fn bind(&self, start_slot: u32) {
        self.shader.bind();
        for (slot, (name, texture)) in (start_slot..).zip(&self.textures) {
            texture.bind(slot);
            self.shader.set_int(name, slot as i32);
        }
    }

    pub fn unbind(&self) {
        self.shader.unbind();
    }

    /// Bind the shader and push every stored value to it.
    pub fn upload(&self) {
        self.shader.bind();
        for (name, property) in &self.properties {
            property.upload(&self.shader, name);
        }
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.set_property(name, MaterialProperty::Float(value));
    }

    pub fn set_float2(&mut self, name: &str, value: [f32; 2]) {
        self.set_property(name, MaterialProperty::Float2(value));
    }

    pub fn set_float3(&mut self, name: &str, value: [f32; 3]) {
        self.set_property(name, MaterialProperty::Float3(value));
    }

    pub fn set_float4(&mut self, name: &str, value: [f32; 4]) {
        self.set_property(name, MaterialProperty::Float4(value));
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.set_property(name, MaterialProperty::Int(value));
    }

    pub fn set_int_array(&mut self, name: &str, values: &[i32]) {
        self.set_property(name, MaterialProperty::IntArray(values.to_vec()));
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.set_property(name, MaterialProperty::Bool(value));
    }

    pub fn set_mat4(&mut self, name: &str, value: Mat4) {
        self.set_property(name, MaterialProperty::Mat4(value));
    }

    pub fn set_property(&mut self, name: &str, property: MaterialProperty) {
        match self.properties.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = property,
            None => self.properties.push((name.to_string(), property)),
        }
    }

    pub fn set_texture(&mut self, name: &str, texture: Rc<Texture2D>) {
        self.set_material_texture(name, MaterialTexture::Texture2D(texture));
    }

    pub fn set_texture_cube(&mut self, name: &str, texture: Rc<TextureCube>) {
        self.set_material_texture(name, MaterialTexture::TextureCube(texture));
    }

    fn set_material_texture(&mut self, name: &str, texture: MaterialTexture) {
        match self.textures.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = texture,
            None => self.textures.push((name.to_string(), texture)),
        }
    }

    /// Texture stored under `name`. Logs a warning on a miss.
    pub fn texture(&self, name: &str) -> Option<&MaterialTexture> {
        let found = self.textures.iter().find(|(n, _)| n == name).map(|(_, t)| t);
        if found.is_none() {
            log::warn!("No texture '{name}' in material '{}'", self.name);
        }
        found
    }

    /// Sampler names in slot order.
    pub fn texture_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.textures.iter().map(|(name, _)| name.as_str())
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn property(&self, name: &str) -> Option<&MaterialProperty> {
        self.properties.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn shader(&self) -> &Rc<Shader> {
        &self.shader
    }

    pub fn set_shader(&mut self, shader: Rc<Shader>) {
        self.shader = shader;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> MaterialFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: MaterialFlags) {
        self.flags = flags;
    }

    pub fn set_flag(&mut self, flag: MaterialFlags, on: bool) {
        self.flags.set(flag, on);
    }

    pub fn has_flag(&self, flag: MaterialFlags) -> bool {
        self.flags.contains(flag)
    }
}

static_assertions::assert_not_impl_any!(Material: Send, Sync);

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::dummy::RecordedUniform;
    use crate::context::GraphicsContext;
    use crate::types::TextureSpec;

    const SHADER: &str = "#shader vertex
void main() {}
#shader fragment
uniform sampler2D u_Albedo;
uniform sampler2D u_Normal;
uniform samplerCube u_Environment;
uniform float u_Roughness;
uniform int u_HasNormalMap;
uniform vec4 u_Color;
void main() {}
";

    fn material(ctx: &GraphicsContext) -> Material {
        Material::new(Rc::new(Shader::from_source(ctx, "Surface", SHADER).unwrap()))
    }

    fn texture(ctx: &GraphicsContext) -> Rc<Texture2D> {
        Rc::new(Texture2D::from_spec(ctx, TextureSpec::default()))
    }

    #[test]
    fn test_texture_slots_follow_insertion_order() {
        let (ctx, dummy) = GraphicsContext::headless();
        let mut mat = material(&ctx);
        let normal = texture(&ctx);
        let albedo = texture(&ctx);
        mat.set_texture("u_Normal", normal.clone());
        mat.set_texture("u_Albedo", albedo.clone());
        // Replacing keeps the original slot.
        let normal2 = texture(&ctx);
        mat.set_texture("u_Normal", normal2.clone());

        mat.bind(2);

        let program = mat.shader().program();
        assert_eq!(dummy.bound_texture(2), Some(normal2.renderer_id()));
        assert_eq!(dummy.bound_texture(3), Some(albedo.renderer_id()));
        assert_eq!(dummy.uniform_value(program, "u_Normal"), Some(RecordedUniform::Int(2)));
        assert_eq!(dummy.uniform_value(program, "u_Albedo"), Some(RecordedUniform::Int(3)));
        assert_eq!(mat.texture_names().collect::<Vec<_>>(), vec!["u_Normal", "u_Albedo"]);
    }

    #[test]
    fn test_upload_last_write_wins() {
        let (ctx, dummy) = GraphicsContext::headless();
        let mut mat = material(&ctx);
        mat.set_float("u_Roughness", 0.2);
        mat.set_bool("u_HasNormalMap", true);
        mat.set_float4("u_Color", [1.0; 4]);
        mat.set_float("u_Roughness", 0.8);
        mat.set_float("u_NotInShader", 1.0);

        mat.upload();

        let program = mat.shader().program();
        assert_eq!(ctx.bindings().program, Some(program));
        assert_eq!(dummy.uniform_value(program, "u_Roughness"), Some(RecordedUniform::Float(0.8)));
        assert_eq!(dummy.uniform_value(program, "u_HasNormalMap"), Some(RecordedUniform::Int(1)));
        assert_eq!(mat.property("u_Color"), Some(&MaterialProperty::Float4([1.0; 4])));
    }

    #[test]
    fn test_cube_texture_binding() {
        let (ctx, dummy) = GraphicsContext::headless();
        let mut mat = material(&ctx);
        let faces: [Vec<u8>; 6] = std::array::from_fn(|_| vec![0u8; 4]);
        let cube = Rc::new(TextureCube::from_faces(
            &ctx,
            1,
            crate::types::ImageFormat::Rgba8,
            &faces,
        ));
        mat.set_texture_cube("u_Environment", cube.clone());
        mat.bind(0);
        assert_eq!(dummy.bound_texture(0), Some(cube.renderer_id()));
        assert!(mat.texture("u_Environment").unwrap().as_texture_2d().is_none());
        assert!(mat.texture("u_Missing").is_none());
    }

    #[test]
    fn test_flags() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let mut mat = material(&ctx);
        assert_eq!(mat.flags(), MaterialFlags::DEPTH_TEST | MaterialFlags::DEPTH_WRITE);
        mat.set_flag(MaterialFlags::DISABLE_SHADOW_CASTING, true);
        mat.set_flag(MaterialFlags::DEPTH_WRITE, false);
        assert!(mat.has_flag(MaterialFlags::DISABLE_SHADOW_CASTING));
        assert!(!mat.has_flag(MaterialFlags::DEPTH_WRITE));
        assert_eq!(mat.name(), "Surface");
        assert_eq!(mat.with_name("Wood").name(), "Wood");
    }
}
