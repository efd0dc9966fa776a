//! Colour-grading post-process pass.

use super::ScenePass;
use crate::command::RenderCommand;
use crate::config::PostProcessSettings;
use crate::context::GraphicsContext;
use crate::materials::Material;
use crate::mesh::{generators, Mesh};

/// Background of the default framebuffer behind the graded quad.
const SWAPCHAIN_CLEAR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

/// Draws the scene colour through a LUT material onto the default framebuffer.
///
/// The scene colour is sampled at slot 0; the material's own textures (the
/// LUT) start at slot 1.
pub struct PostProcessPass {
    ctx: GraphicsContext,
    quad: Mesh,
}

impl PostProcessPass {
    pub fn new(ctx: &GraphicsContext) -> Self {
        Self {
            ctx: ctx.clone(),
            quad: generators::fullscreen_quad().upload(ctx),
        }
    }

    pub fn execute(
        &self,
        command: &RenderCommand,
        material: &mut Material,
        scene: &ScenePass,
        viewport: (u32, u32),
        settings: &PostProcessSettings,
    ) {
        self.ctx.bind_framebuffer(None);
        command.set_clear_color(SWAPCHAIN_CLEAR);
        command.clear();
        command.set_viewport(0, 0, viewport.0, viewport.1);

        scene.bind_color_texture(0);
        material.bind(1);
        material.shader().set_int("u_SceneTexture", 0);
        material.set_float("u_LutIntensity", settings.lut_intensity);
        material.upload();

        command.draw_indexed(self.quad.vertex_array(), 0);
    }

    pub fn quad(&self) -> &Mesh {
        &self.quad
    }
}
