//! Main colour pass.

use aether_core::math::{mat4_from_translation_scale, Mat4};

use super::{FrameParams, InstanceBuffer, RenderScene, ShadowPass};
use crate::context::GraphicsContext;
use crate::engine::EngineContext;
use crate::error::GraphicsError;
use crate::materials::Material;
use crate::mesh::{generators, Mesh};
use crate::resources::{FrameBuffer, FramebufferSpec};
use crate::types::FramebufferTextureFormat;

/// Texture slot the shadow map is sampled from in the lighting material,
/// unless the material's own textures reach past it.
pub const SHADOW_MAP_SLOT: u32 = 1;

/// First slot after `material`'s textures when bound from 0, never below
/// [`SHADOW_MAP_SLOT`].
pub fn shadow_map_slot(material: &Material) -> u32 {
    SHADOW_MAP_SLOT.max(material.texture_count() as u32)
}

const LIGHT_MARKER_SCALE: f32 = 0.2;
const LIGHT_MARKER_COLOR: [f32; 3] = [1.0, 1.0, 0.0];

/// Materials drawn by the [`ScenePass`].
pub struct SceneMaterials {
    /// Sky material; its cube texture is bound at slot 0.
    pub skybox: Option<Material>,
    pub lighting: Material,
}

/// Lit scene into an off-screen RGBA8 + depth framebuffer.
pub struct ScenePass {
    framebuffer: FrameBuffer,
    clear_color: [f32; 4],
    skybox_mesh: Mesh,
    light_marker: Mesh,
}

impl ScenePass {
    pub fn new(
        ctx: &GraphicsContext,
        width: u32,
        height: u32,
        clear_color: [f32; 4],
    ) -> Result<Self, GraphicsError> {
        let spec = FramebufferSpec::new(
            width,
            height,
            [
                FramebufferTextureFormat::Rgba8,
                FramebufferTextureFormat::Depth24Stencil8,
            ],
        );
        Ok(Self {
            framebuffer: FrameBuffer::new(ctx, spec)?,
            clear_color,
            skybox_mesh: generators::skybox_cube().upload(ctx),
            light_marker: generators::cube_vertices().upload(ctx),
        })
    }

    pub fn execute(
        &self,
        engine: &EngineContext,
        materials: &mut SceneMaterials,
        shadow: &ShadowPass,
        frame: &FrameParams,
        scene: &RenderScene,
        instances: Option<&mut InstanceBuffer>,
    ) {
        let command = &engine.command;
        let (width, height) = (self.framebuffer.width(), self.framebuffer.height());

        self.framebuffer.bind();
        command.set_viewport(0, 0, width, height);
        let clear_color = if frame.fog.enabled {
            let c = frame.fog.color;
            [c.x, c.y, c.z, 1.0]
        } else {
            self.clear_color
        };
        command.set_clear_color(clear_color);
        command.clear();

        let camera = &frame.camera;
        engine.update_camera(&camera.projection, &camera.view, &camera.position);

        if let Some(skybox) = &materials.skybox {
            skybox.bind(0);
            skybox.upload();
            command.set_depth_func_equal(true);
            command.draw_indexed(self.skybox_mesh.vertex_array(), 0);
            command.set_depth_func_equal(false);
        }

        let lighting = &mut materials.lighting;
        lighting.bind(0);
        let shadow_slot = shadow_map_slot(lighting);
        shadow.bind_depth_texture(shadow_slot);
        lighting.shader().set_int("u_ShadowMap", shadow_slot as i32);

        let light = &frame.light;
        let (cut_off, outer_cut_off) = light.cutoff_cosines();
        lighting.set_float3("u_LightPos", light.position.into());
        lighting.set_float3("u_LightDir", light.direction.into());
        lighting.set_float("u_CutOff", cut_off);
        lighting.set_float("u_OuterCutOff", outer_cut_off);
        lighting.set_mat4("u_LightSpaceMatrix", shadow.light_space_matrix(light));
        lighting.set_int("u_IsLightSource", 0);
        lighting.set_bool("u_FogEnabled", frame.fog.enabled);
        lighting.set_float3("u_FogColor", frame.fog.color.into());
        lighting.set_float("u_FogStart", frame.fog.start);
        lighting.set_float("u_FogEnd", frame.fog.end);
        lighting.upload();

        let shader = lighting.shader();
        scene.draw(command, shader, instances);

        let model: Mat4 = mat4_from_translation_scale(light.position, LIGHT_MARKER_SCALE);
        shader.set_mat4("u_Model", &model);
        shader.set_int("u_IsLightSource", 1);
        shader.set_float3("u_FlatColor", LIGHT_MARKER_COLOR);
        command.draw_indexed(self.light_marker.vertex_array(), 0);
        shader.set_int("u_IsLightSource", 0);

        self.framebuffer.unbind();
    }

    /// Recreate the colour and depth attachments.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.framebuffer.resize(width, height);
    }

    /// Bind the scene colour for sampling at `slot`.
    pub fn bind_color_texture(&self, slot: u32) {
        self.framebuffer.bind_color_texture(slot, 0);
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::backend::dummy::{BackendCommand, RecordedUniform};
    use crate::config::{FogSettings, ShadowSettings};
    use crate::resources::Texture2D;
    use crate::shader::{builtin, Shader};
    use crate::types::{DepthFunc, TextureSpec};

    fn lighting_material(engine: &EngineContext) -> Material {
        let shader =
            Shader::from_source(&engine.graphics, "Lighting", builtin::LIGHTING_SHADER).unwrap();
        Material::new(Rc::new(shader))
    }

    #[test]
    fn test_fog_selects_clear_color() {
        let (engine, dummy) = EngineContext::headless();
        let pass = ScenePass::new(&engine.graphics, 32, 32, [0.2, 0.2, 0.2, 1.0]).unwrap();
        let shadow = ShadowPass::new(&engine.graphics, ShadowSettings::default()).unwrap();
        let mut materials = SceneMaterials {
            skybox: None,
            lighting: lighting_material(&engine),
        };

        let mut frame = FrameParams::default();
        pass.execute(&engine, &mut materials, &shadow, &frame, &RenderScene::new(), None);
        assert!(dummy
            .commands()
            .contains(&BackendCommand::SetClearColor([0.2, 0.2, 0.2, 1.0])));

        frame.fog = FogSettings {
            enabled: true,
            color: [0.5, 0.6, 0.7].into(),
            ..Default::default()
        };
        pass.execute(&engine, &mut materials, &shadow, &frame, &RenderScene::new(), None);
        assert_eq!(engine.graphics.bindings().clear_color, [0.5, 0.6, 0.7, 1.0]);

        let program = materials.lighting.shader().program();
        assert_eq!(
            dummy.uniform_value(program, "u_FogEnabled"),
            Some(RecordedUniform::Int(1))
        );
        assert_eq!(
            dummy.uniform_value(program, "u_ShadowMap"),
            Some(RecordedUniform::Int(1))
        );
        assert_eq!(dummy.bound_texture(SHADOW_MAP_SLOT), shadow.depth_texture());
    }

    #[test]
    fn test_shadow_map_follows_material_textures() {
        let (engine, dummy) = EngineContext::headless();
        let pass = ScenePass::new(&engine.graphics, 32, 32, [0.0; 4]).unwrap();
        let shadow = ShadowPass::new(&engine.graphics, ShadowSettings::default()).unwrap();
        let mut lighting = lighting_material(&engine);
        let albedo = Rc::new(Texture2D::from_spec(&engine.graphics, TextureSpec::new(2, 2)));
        let normal = Rc::new(Texture2D::from_spec(&engine.graphics, TextureSpec::new(2, 2)));
        lighting.set_texture("u_Texture", albedo.clone());
        lighting.set_texture("u_NormalMap", normal.clone());
        assert_eq!(shadow_map_slot(&lighting), 2);

        let mut materials = SceneMaterials {
            skybox: None,
            lighting,
        };
        pass.execute(
            &engine,
            &mut materials,
            &shadow,
            &FrameParams::default(),
            &RenderScene::new(),
            None,
        );

        let program = materials.lighting.shader().program();
        assert_eq!(dummy.bound_texture(0), Some(albedo.renderer_id()));
        assert_eq!(dummy.bound_texture(1), Some(normal.renderer_id()));
        assert_eq!(dummy.bound_texture(2), shadow.depth_texture());
        assert_eq!(
            dummy.uniform_value(program, "u_ShadowMap"),
            Some(RecordedUniform::Int(2))
        );
        assert_eq!(
            dummy.uniform_value(program, "u_Texture"),
            Some(RecordedUniform::Int(0))
        );
    }

    #[test]
    fn test_skybox_drawn_with_depth_equal() {
        let (engine, dummy) = EngineContext::headless();
        let pass = ScenePass::new(&engine.graphics, 16, 16, [0.0; 4]).unwrap();
        let shadow = ShadowPass::new(&engine.graphics, ShadowSettings::default()).unwrap();
        let sky_shader =
            Shader::from_source(&engine.graphics, "Skybox", builtin::SKYBOX_SHADER).unwrap();
        let mut materials = SceneMaterials {
            skybox: Some(Material::new(Rc::new(sky_shader))),
            lighting: lighting_material(&engine),
        };

        dummy.clear_commands();
        pass.execute(
            &engine,
            &mut materials,
            &shadow,
            &FrameParams::default(),
            &RenderScene::new(),
            None,
        );

        let commands = dummy.commands();
        let equal = commands
            .iter()
            .position(|c| *c == BackendCommand::SetDepthFunc(DepthFunc::LessEqual))
            .unwrap();
        let less = commands
            .iter()
            .position(|c| *c == BackendCommand::SetDepthFunc(DepthFunc::Less))
            .unwrap();
        let sky_draw = commands.iter().position(|c| c.is_draw()).unwrap();
        assert!(equal < sky_draw && sky_draw < less);

        // Sky then light marker.
        let draws = dummy.draw_calls();
        assert_eq!(draws.len(), 2);
        let skybox_program = materials.skybox.as_ref().unwrap().shader().program();
        assert!(matches!(
            &draws[0],
            BackendCommand::DrawElements { program, .. } if *program == Some(skybox_program)
        ));
    }

    #[test]
    fn test_light_marker_flag_restored() {
        let (engine, dummy) = EngineContext::headless();
        let pass = ScenePass::new(&engine.graphics, 16, 16, [0.0; 4]).unwrap();
        let shadow = ShadowPass::new(&engine.graphics, ShadowSettings::default()).unwrap();
        let mut materials = SceneMaterials {
            skybox: None,
            lighting: lighting_material(&engine),
        };
        pass.execute(
            &engine,
            &mut materials,
            &shadow,
            &FrameParams::default(),
            &RenderScene::new(),
            None,
        );
        let program = materials.lighting.shader().program();
        assert_eq!(
            dummy.uniform_value(program, "u_IsLightSource"),
            Some(RecordedUniform::Int(0))
        );
        assert_eq!(
            dummy.uniform_value(program, "u_FlatColor"),
            Some(RecordedUniform::Float3(LIGHT_MARKER_COLOR))
        );
        assert_eq!(engine.graphics.bindings().framebuffer, None);
    }
}
