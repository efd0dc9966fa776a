//! Engine context.
//!
//! [`EngineContext`] bundles everything frame code needs to reach: the
//! graphics context, the render command, the name registrar, the four asset
//! libraries and the camera uniform block. It is created once on the main
//! thread and passed by reference.

use aether_core::math::{mat4_to_cols_array, Mat4, Vec3};
use aether_core::AssetRegistry;

use crate::backend::ProcLoader;
use crate::command::RenderCommand;
use crate::context::GraphicsContext;
use crate::library::{MaterialLibrary, MeshLibrary, ShaderLibrary, TextureLibrary};
use crate::resources::UniformBuffer;

/// Binding point of the camera uniform block.
pub const CAMERA_BINDING: u32 = 0;

/// `mat4 u_Projection`, `mat4 u_View`, `vec4 u_CameraPosition`.
pub const CAMERA_BLOCK_SIZE: usize = 2 * 64 + 16;

/// Per-process renderer state.
pub struct EngineContext {
    pub graphics: GraphicsContext,
    pub command: RenderCommand,
    pub registry: AssetRegistry,
    pub textures: TextureLibrary,
    pub shaders: ShaderLibrary,
    pub materials: MaterialLibrary,
    pub meshes: MeshLibrary,
    camera: UniformBuffer,
}

impl EngineContext {
    /// Build the engine over an existing graphics context and run one-time
    /// state setup.
    pub fn new(graphics: GraphicsContext) -> Self {
        let command = RenderCommand::new(&graphics);
        command.init();

        let textures = TextureLibrary::new(&graphics);
        let shaders = ShaderLibrary::new(&graphics);
        let materials = MaterialLibrary::new(&shaders);
        let meshes = MeshLibrary::new(&graphics);
        let camera = UniformBuffer::new(&graphics, CAMERA_BLOCK_SIZE, CAMERA_BINDING);

        log::info!("Engine initialized on {} backend", graphics.backend_name());

        Self {
            graphics,
            command,
            registry: AssetRegistry::new(),
            textures,
            shaders,
            materials,
            meshes,
            camera,
        }
    }

    /// Create the backend for `config.api` on the current GL context.
    pub fn from_config(config: &crate::config::RendererConfig, loader: ProcLoader<'_>) -> Self {
        Self::new(GraphicsContext::new(config.api, loader))
    }

    /// Engine over a fresh dummy backend, plus an inspector sharing its state.
    #[cfg(feature = "dummy")]
    pub fn headless() -> (Self, crate::backend::dummy::DummyBackend) {
        let (graphics, dummy) = GraphicsContext::headless();
        (Self::new(graphics), dummy)
    }

    /// Write projection, view and eye position into the camera block.
    pub fn update_camera(&self, projection: &Mat4, view: &Mat4, position: &Vec3) {
        self.camera
            .set_data(bytemuck::cast_slice(&mat4_to_cols_array(projection)), 0);
        self.camera
            .set_data(bytemuck::cast_slice(&mat4_to_cols_array(view)), 64);
        let eye = [position.x, position.y, position.z, 1.0];
        self.camera.set_data(bytemuck::cast_slice(&eye), 128);
    }

    pub fn camera_buffer(&self) -> &UniformBuffer {
        &self.camera
    }
}
