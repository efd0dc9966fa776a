//! Shadow map pass.

use aether_core::math::{look_at_rh, perspective_gl, Mat4, Vec3};

use super::{InstanceBuffer, RenderScene};
use crate::backend::TextureHandle;
use crate::command::RenderCommand;
use crate::config::{LightSettings, ShadowSettings};
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::materials::Material;
use crate::resources::{FrameBuffer, FramebufferSpec};
use crate::types::FramebufferTextureFormat;

/// Renders scene depth from the light into a square depth-only framebuffer.
pub struct ShadowPass {
    framebuffer: FrameBuffer,
    settings: ShadowSettings,
}

impl ShadowPass {
    pub fn new(ctx: &GraphicsContext, settings: ShadowSettings) -> Result<Self, GraphicsError> {
        let framebuffer = FrameBuffer::new(ctx, Self::spec(settings.resolution))?;
        Ok(Self {
            framebuffer,
            settings,
        })
    }

    fn spec(resolution: u32) -> FramebufferSpec {
        FramebufferSpec::new(
            resolution,
            resolution,
            [FramebufferTextureFormat::Depth24Stencil8],
        )
    }

    /// Projection × view of the light's perspective frustum.
    pub fn light_space_matrix(&self, light: &LightSettings) -> Mat4 {
        let s = &self.settings;
        let projection = perspective_gl(s.fov_degrees.to_radians(), 1.0, s.near, s.far);
        let view = look_at_rh(
            &light.position,
            &(light.position + light.direction),
            &Vec3::y(),
        );
        projection * view
    }

    /// Draw `scene` with `material` into the depth map.
    pub fn execute(
        &self,
        command: &RenderCommand,
        material: &mut Material,
        light_space: &Mat4,
        scene: &RenderScene,
        instances: Option<&mut InstanceBuffer>,
    ) {
        let resolution = self.settings.resolution;
        self.framebuffer.bind();
        command.set_viewport(0, 0, resolution, resolution);
        command.clear();

        material.bind(0);
        material.set_mat4("u_LightSpaceMatrix", *light_space);
        material.upload();

        scene.draw(command, material.shader(), instances);

        self.framebuffer.unbind();
    }

    /// Recreate the depth map at `resolution` × `resolution`.
    pub fn set_resolution(&mut self, resolution: u32) {
        self.framebuffer.resize(resolution, resolution);
        self.settings.resolution = self.framebuffer.width();
    }

    pub fn resolution(&self) -> u32 {
        self.settings.resolution
    }

    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    /// Bind the depth map for sampling at `slot`.
    pub fn bind_depth_texture(&self, slot: u32) {
        self.framebuffer.bind_depth_texture(slot);
    }

    pub fn depth_texture(&self) -> Option<TextureHandle> {
        self.framebuffer.depth_attachment_id()
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use std::rc::Rc;

    use aether_core::math::transform_point4;

    use super::*;
    use crate::backend::dummy::BackendCommand;
    use crate::shader::{builtin, Shader};

    #[test]
    fn test_light_space_matrix_centers_light_target() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let pass = ShadowPass::new(&ctx, ShadowSettings::default()).unwrap();
        let light = LightSettings::default();
        let m = pass.light_space_matrix(&light);

        // A point straight below the light projects to the centre of the map.
        let clip = transform_point4(&m, &Vec3::new(0.0, 0.0, 0.0));
        let ndc = clip.xyz() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > -1.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_execute_state_sequence() {
        let (ctx, dummy) = GraphicsContext::headless();
        let command = RenderCommand::new(&ctx);
        let settings = ShadowSettings {
            resolution: 64,
            ..Default::default()
        };
        let pass = ShadowPass::new(&ctx, settings).unwrap();
        let shader =
            Rc::new(Shader::from_source(&ctx, "ShadowDepth", builtin::SHADOW_DEPTH_SHADER).unwrap());
        let mut material = Material::new(shader.clone());
        let light_space = pass.light_space_matrix(&LightSettings::default());

        dummy.clear_commands();
        pass.execute(&command, &mut material, &light_space, &RenderScene::new(), None);

        let commands = dummy.commands();
        let fb = pass.framebuffer().handle();
        let bind = commands
            .iter()
            .position(|c| *c == BackendCommand::BindFramebuffer(Some(fb)))
            .unwrap();
        let unbind = commands
            .iter()
            .rposition(|c| *c == BackendCommand::BindFramebuffer(None))
            .unwrap();
        assert!(bind < unbind);
        assert!(commands[bind..unbind]
            .iter()
            .any(|c| matches!(c, BackendCommand::Clear(_))));
        assert_eq!(ctx.bindings().viewport.width, 64);
        assert_eq!(ctx.bindings().framebuffer, None);
        assert!(dummy
            .uniform_value(shader.program(), "u_LightSpaceMatrix")
            .is_some());
    }

    #[test]
    fn test_set_resolution() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let mut pass = ShadowPass::new(&ctx, ShadowSettings::default()).unwrap();
        let before = pass.depth_texture();
        pass.set_resolution(512);
        assert_eq!(pass.resolution(), 512);
        assert_ne!(pass.depth_texture(), before);

        pass.set_resolution(0);
        assert_eq!(pass.resolution(), 512);
    }
}
