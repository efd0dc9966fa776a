//! Per-frame render orchestration.
//!
//! A frame runs three passes strictly in order:
//!
//! 1. [`ShadowPass`] - scene depth from the light into a depth-only framebuffer
//! 2. [`ScenePass`] - skybox and lit scene into an off-screen colour target,
//!    sampling the shadow map at slot 1
//! 3. [`PostProcessPass`] - scene colour through a LUT onto the default framebuffer
//!
//! [`FramePipeline`] owns the passes and their materials. The scene itself is
//! a flat [`RenderScene`] rebuilt by the caller each frame.
//!
//! # Example
//!
//! ```ignore
//! let mut pipeline = FramePipeline::with_builtin_materials(&mut engine, &config, assets)?;
//! pipeline.set_instanced_mesh(&engine, &cube);
//!
//! let mut scene = RenderScene::new();
//! scene.push(cube.clone(), model);
//! pipeline.render(&engine, &frame, &scene);
//! ```

mod instancing;
mod post;
mod scene;
mod shadow;

use std::rc::Rc;

use aether_core::math::{Mat4, Vec3};

pub use instancing::{InstanceBuffer, INSTANCE_LOCATION};
pub use post::PostProcessPass;
pub use scene::{shadow_map_slot, SceneMaterials, ScenePass, SHADOW_MAP_SLOT};
pub use shadow::ShadowPass;

use crate::command::RenderCommand;
use crate::config::{FogSettings, LightSettings, PostProcessSettings, RendererConfig};
use crate::engine::EngineContext;
use crate::error::GraphicsError;
use crate::materials::Material;
use crate::mesh::Mesh;
use crate::resources::{Texture2D, TextureCube};
use crate::shader::{builtin, Shader};

/// One mesh placed in the world.
#[derive(Debug, Clone)]
pub struct SceneDraw {
    pub mesh: Rc<Mesh>,
    pub model: Mat4,
}

/// Flat list of draws plus the matrices of one instanced batch.
#[derive(Debug, Clone, Default)]
pub struct RenderScene {
    draws: Vec<SceneDraw>,
    instances: Vec<Mat4>,
}

impl RenderScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mesh: Rc<Mesh>, model: Mat4) {
        self.draws.push(SceneDraw { mesh, model });
    }

    /// Per-instance model matrices for the pipeline's instanced mesh.
    pub fn set_instances(&mut self, models: Vec<Mat4>) {
        self.instances = models;
    }

    pub fn draws(&self) -> &[SceneDraw] {
        &self.draws
    }

    pub fn instances(&self) -> &[Mat4] {
        &self.instances
    }

    pub fn clear(&mut self) {
        self.draws.clear();
        self.instances.clear();
    }

    /// Issue every draw with `shader` already bound and its material uploaded.
    ///
    /// Each submesh gets `u_Model` = model × local transform and is drawn
    /// with its own index range and base vertex. The instanced batch runs
    /// last with `u_UseInstancing` raised for its duration.
    pub fn draw(
        &self,
        command: &RenderCommand,
        shader: &Shader,
        instances: Option<&mut InstanceBuffer>,
    ) {
        shader.set_int("u_UseInstancing", 0);
        for draw in &self.draws {
            let vertex_array = draw.mesh.vertex_array();
            for submesh in draw.mesh.submeshes() {
                shader.set_mat4("u_Model", &(draw.model * submesh.local_transform));
                command.draw_indexed_base_vertex(
                    vertex_array,
                    submesh.index_count,
                    submesh.index_byte_offset(),
                    submesh.base_vertex as i32,
                );
            }
        }

        if let Some(buffer) = instances {
            if !self.instances.is_empty() {
                shader.set_int("u_UseInstancing", 1);
                buffer.draw(command, &self.instances);
                shader.set_int("u_UseInstancing", 0);
            }
        }
    }
}

/// Camera state written to the camera uniform block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub projection: Mat4,
    pub view: Mat4,
    pub position: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::identity(),
            view: Mat4::identity(),
            position: Vec3::zeros(),
        }
    }
}

/// Everything that may change from one frame to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameParams {
    pub camera: Camera,
    pub light: LightSettings,
    pub fog: FogSettings,
    pub post: PostProcessSettings,
}

/// Materials owned by the pipeline, one per pass role.
pub struct PipelineMaterials {
    pub shadow: Material,
    pub skybox: Option<Material>,
    pub lighting: Material,
    pub post: Material,
}

/// Textures the built-in materials sample.
pub struct PipelineTextures {
    /// Albedo of the lit scene, `u_Texture`.
    pub albedo: Rc<Texture2D>,
    /// Colour-grading lookup, `u_Lut`.
    pub lut: Rc<Texture2D>,
    /// Sky cube map, `u_Skybox`. No sky is drawn without it.
    pub skybox: Option<Rc<TextureCube>>,
}

/// Shadow, scene and post-process passes run in order once per frame.
pub struct FramePipeline {
    shadow: ShadowPass,
    scene: ScenePass,
    post: PostProcessPass,
    scene_materials: SceneMaterials,
    shadow_material: Material,
    post_material: Material,
    instances: Option<InstanceBuffer>,
    viewport: (u32, u32),
    instance_capacity: usize,
}

impl FramePipeline {
    pub fn new(
        engine: &EngineContext,
        config: &RendererConfig,
        materials: PipelineMaterials,
    ) -> Result<Self, GraphicsError> {
        let ctx = &engine.graphics;
        let (width, height) = config.viewport;
        Ok(Self {
            shadow: ShadowPass::new(ctx, config.shadow)?,
            scene: ScenePass::new(ctx, width, height, config.clear_color)?,
            post: PostProcessPass::new(ctx),
            scene_materials: SceneMaterials {
                skybox: materials.skybox,
                lighting: materials.lighting,
            },
            shadow_material: materials.shadow,
            post_material: materials.post,
            instances: None,
            viewport: config.viewport,
            instance_capacity: config.instance_capacity,
        })
    }

    /// Build the pipeline over the built-in shaders, registering them in the
    /// engine's shader library.
    pub fn with_builtin_materials(
        engine: &mut EngineContext,
        config: &RendererConfig,
        textures: PipelineTextures,
    ) -> Result<Self, GraphicsError> {
        let mut shader = |name: &str, source: &str| -> Rc<Shader> {
            let id = engine.registry.register(&format!("Shader_{name}"));
            engine.shaders.load_source(id, name, source)
        };
        let shadow_shader = shader("ShadowDepth", builtin::SHADOW_DEPTH_SHADER);
        let skybox_shader = shader("Skybox", builtin::SKYBOX_SHADER);
        let lighting_shader = shader("Lighting", builtin::LIGHTING_SHADER);
        let post_shader = shader("PostLut", builtin::POST_LUT_SHADER);

        let skybox = textures.skybox.map(|cube| {
            let mut material = Material::new(skybox_shader);
            material.set_texture_cube("u_Skybox", cube);
            material
        });
        let mut lighting = Material::new(lighting_shader);
        lighting.set_texture("u_Texture", textures.albedo);
        let mut post = Material::new(post_shader);
        post.set_texture("u_Lut", textures.lut);

        let materials = PipelineMaterials {
            shadow: Material::new(shadow_shader),
            skybox,
            lighting,
            post,
        };
        Self::new(engine, config, materials)
    }

    /// Use `mesh` for the scene's instanced batch.
    pub fn set_instanced_mesh(&mut self, engine: &EngineContext, mesh: &Mesh) {
        let instances = InstanceBuffer::new(&engine.graphics, mesh, self.instance_capacity);
        if instances.location() != INSTANCE_LOCATION {
            log::warn!(
                "Instanced mesh is too wide for the built-in shaders; a_InstanceModel is at location {}",
                instances.location()
            );
        }
        self.instances = Some(instances);
    }

    /// Render one frame: shadow, then scene, then post-process.
    pub fn render(&mut self, engine: &EngineContext, frame: &FrameParams, scene: &RenderScene) {
        let command = &engine.command;

        let light_space = self.shadow.light_space_matrix(&frame.light);
        self.shadow.execute(
            command,
            &mut self.shadow_material,
            &light_space,
            scene,
            self.instances.as_mut(),
        );

        self.scene.execute(
            engine,
            &mut self.scene_materials,
            &self.shadow,
            frame,
            scene,
            self.instances.as_mut(),
        );

        self.post.execute(
            command,
            &mut self.post_material,
            &self.scene,
            self.viewport,
            &frame.post,
        );
    }

    /// Follow a window resize: scene target and final viewport.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.viewport = (width, height);
        self.scene.resize(width, height);
    }

    pub fn shadow(&self) -> &ShadowPass {
        &self.shadow
    }

    pub fn shadow_mut(&mut self) -> &mut ShadowPass {
        &mut self.shadow
    }

    pub fn scene(&self) -> &ScenePass {
        &self.scene
    }

    pub fn post(&self) -> &PostProcessPass {
        &self.post
    }

    pub fn materials(&self) -> &SceneMaterials {
        &self.scene_materials
    }

    pub fn materials_mut(&mut self) -> &mut SceneMaterials {
        &mut self.scene_materials
    }

    pub fn shadow_material(&self) -> &Material {
        &self.shadow_material
    }

    pub fn post_material(&self) -> &Material {
        &self.post_material
    }

    pub fn instances(&self) -> Option<&InstanceBuffer> {
        self.instances.as_ref()
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::dummy::{BackendCommand, RecordedUniform};
    use crate::mesh::generators;
    use crate::resources::Texture2D;
    use crate::types::{ImageFormat, TextureSpec};

    fn textures(engine: &EngineContext) -> PipelineTextures {
        let ctx = &engine.graphics;
        let faces: [Vec<u8>; 6] = std::array::from_fn(|_| vec![0; 4]);
        PipelineTextures {
            albedo: Rc::new(Texture2D::from_spec(ctx, TextureSpec::new(4, 4))),
            lut: Rc::new(Texture2D::from_spec(ctx, TextureSpec::new(16, 16))),
            skybox: Some(Rc::new(TextureCube::from_faces(
                ctx,
                1,
                ImageFormat::Rgba8,
                &faces,
            ))),
        }
    }

    fn small_config() -> RendererConfig {
        RendererConfig::default()
            .with_viewport(64, 48)
            .with_shadow(crate::config::ShadowSettings {
                resolution: 32,
                ..Default::default()
            })
    }

    #[test]
    fn test_submesh_draws_use_ranges() {
        let (ctx, dummy) = crate::context::GraphicsContext::headless();
        let command = RenderCommand::new(&ctx);
        let shader = Shader::from_source(&ctx, "Shadow", builtin::SHADOW_DEPTH_SHADER).unwrap();
        shader.bind();

        let data = generators::cube_vertices();
        let submeshes = vec![
            crate::mesh::SubMesh {
                index_count: 18,
                vertex_count: 12,
                ..Default::default()
            },
            crate::mesh::SubMesh {
                base_index: 18,
                base_vertex: 0,
                index_count: 18,
                vertex_count: 24,
                local_transform: Mat4::new_scaling(2.0),
                ..Default::default()
            },
        ];
        let mesh = Rc::new(crate::mesh::Mesh::new(
            &ctx,
            data.spec().with_submeshes(submeshes),
        ));

        let mut scene = RenderScene::new();
        scene.push(mesh.clone(), Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0)));
        scene.draw(&command, &shader, None);

        let args: Vec<_> = dummy
            .draw_calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCommand::DrawElements { args, .. } => Some(args),
                _ => None,
            })
            .collect();
        assert_eq!(args.len(), 2);
        assert_eq!((args[0].index_count, args[0].index_byte_offset), (18, 0));
        assert_eq!((args[1].index_count, args[1].index_byte_offset), (18, 72));

        let expected = Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0)) * Mat4::new_scaling(2.0);
        assert_eq!(
            dummy.uniform_value(shader.program(), "u_Model"),
            Some(RecordedUniform::Mat4(aether_core::math::mat4_to_cols_array(&expected)))
        );
    }

    #[test]
    fn test_passes_run_in_order() {
        let (mut engine, dummy) = EngineContext::headless();
        let config = small_config();
        let textures = textures(&engine);
        let mut pipeline =
            FramePipeline::with_builtin_materials(&mut engine, &config, textures).unwrap();

        let cube = Rc::new(generators::cube_vertices().upload(&engine.graphics));
        let mut scene = RenderScene::new();
        scene.push(cube, Mat4::identity());

        dummy.clear_commands();
        pipeline.render(&engine, &FrameParams::default(), &scene);

        let shadow_fb = pipeline.shadow().framebuffer().handle();
        let scene_fb = pipeline.scene().framebuffer().handle();
        let targets: Vec<_> = dummy
            .draw_calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCommand::DrawElements { framebuffer, .. } => Some(framebuffer),
                _ => None,
            })
            .collect();
        // cube → shadow; sky, cube, light marker → scene; quad → default.
        assert_eq!(
            targets,
            vec![
                Some(shadow_fb),
                Some(scene_fb),
                Some(scene_fb),
                Some(scene_fb),
                None
            ]
        );
        assert_eq!(engine.graphics.bindings().viewport.width, 64);
    }

    #[test]
    fn test_instanced_batch_in_both_geometry_passes() {
        let (mut engine, dummy) = EngineContext::headless();
        let config = small_config().with_instance_capacity(2);
        let textures = textures(&engine);
        let mut pipeline =
            FramePipeline::with_builtin_materials(&mut engine, &config, textures).unwrap();
        let cube = generators::cube_vertices().upload(&engine.graphics);
        pipeline.set_instanced_mesh(&engine, &cube);
        assert_eq!(pipeline.instances().unwrap().capacity(), 2);

        let mut scene = RenderScene::new();
        scene.set_instances(vec![Mat4::identity(); 5]);
        dummy.clear_commands();
        pipeline.render(&engine, &FrameParams::default(), &scene);

        let instanced = dummy
            .draw_calls()
            .into_iter()
            .filter(|c| {
                matches!(c, BackendCommand::DrawElements { args, .. } if args.instance_count == 5)
            })
            .count();
        assert_eq!(instanced, 2);
        assert_eq!(pipeline.instances().unwrap().capacity(), 10);

        let lighting = pipeline.materials().lighting.shader().program();
        assert_eq!(
            dummy.uniform_value(lighting, "u_UseInstancing"),
            Some(RecordedUniform::Int(0))
        );
    }

    #[test]
    fn test_wide_instanced_mesh_renders() {
        let (mut engine, dummy) = EngineContext::headless();
        let config = small_config();
        let textures = textures(&engine);
        let mut pipeline =
            FramePipeline::with_builtin_materials(&mut engine, &config, textures).unwrap();

        let layout = crate::mesh::MeshLayout::pbr();
        let vertices = vec![0u8; 3 * layout.stride() as usize];
        let mesh = crate::mesh::Mesh::new(
            &engine.graphics,
            crate::mesh::MeshSpec::new(&vertices, 3, &[0, 1, 2], layout),
        );
        pipeline.set_instanced_mesh(&engine, &mesh);
        assert_eq!(pipeline.instances().unwrap().location(), 5);

        let mut scene = RenderScene::new();
        scene.set_instances(vec![Mat4::identity(); 3]);
        dummy.clear_commands();
        pipeline.render(&engine, &FrameParams::default(), &scene);

        let instanced = dummy
            .draw_calls()
            .into_iter()
            .filter(|c| {
                matches!(c, BackendCommand::DrawElements { args, .. } if args.instance_count == 3)
            })
            .count();
        assert_eq!(instanced, 2);
    }

    #[test]
    fn test_resize_ignores_zero() {
        let (mut engine, _dummy) = EngineContext::headless();
        let config = small_config();
        let textures = textures(&engine);
        let mut pipeline =
            FramePipeline::with_builtin_materials(&mut engine, &config, textures).unwrap();
        pipeline.resize(0, 10);
        assert_eq!(pipeline.viewport(), (64, 48));
        pipeline.resize(128, 96);
        assert_eq!(pipeline.viewport(), (128, 96));
        assert_eq!(pipeline.scene().framebuffer().width(), 128);
    }
}
