//! Model upload and background parsing.
//!
//! Parsing a model is CPU-only and runs on worker threads, producing a
//! [`ModelLoadResult`]. Everything that touches the GPU happens in
//! [`upload_model`] on the main thread.
//!
//! # Example
//!
//! ```ignore
//! let mut loader = AsyncModelLoader::new(2);
//! loader.request("assets/models/robot.glb");
//!
//! // every frame
//! if let Some(meshes) = loader.poll(&mut engine, pbr_shader) {
//!     scene_meshes = meshes;
//! }
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use aether_core::jobs::{panic_message, JobSystem, ParseQueue};
use aether_core::math::{Mat4, Vec3};
use aether_core::model::{ModelError, ModelLoadResult};
use aether_core::AssetId;

use crate::engine::EngineContext;
use crate::materials::Material;
use crate::mesh::{Mesh, SubMesh, VertexStream};
use crate::types::{BufferLayout, ImageFormat, ShaderDataType, TextureSpec};

/// Upload a parsed model and return the ids of its meshes.
///
/// Every texture, material and mesh is registered under its debug name.
/// Materials use `shader_id`; submeshes refer to them by id.
pub fn upload_model(
    engine: &mut EngineContext,
    model: &ModelLoadResult,
    shader_id: AssetId,
) -> Vec<AssetId> {
    let texture_ids: Vec<AssetId> = model
        .textures
        .iter()
        .map(|info| {
            let id = engine.registry.register(&info.debug_name);
            let spec = TextureSpec::new(info.width, info.height).with_format(ImageFormat::Rgba8);
            let texture = engine.textures.load_spec(id, spec);
            if texture.is_loaded() {
                return id;
            }
            if info.pixels.len() == spec.data_size() {
                texture.set_data(&info.pixels);
            } else {
                log::error!(
                    "Texture '{}' has {} bytes, expected {}",
                    info.debug_name,
                    info.pixels.len(),
                    spec.data_size()
                );
            }
            id
        })
        .collect();

    let shader = engine.shaders.get(shader_id);
    let texture_at = |index: Option<usize>| index.and_then(|i| texture_ids.get(i)).copied();

    let mut material_ids = Vec::with_capacity(model.materials.len());
    for info in &model.materials {
        let id = engine.registry.register(&info.debug_name);
        material_ids.push(id);
        if engine.materials.exists(id) {
            continue;
        }

        let mut material = Material::new(shader.clone()).with_name(info.debug_name.clone());
        if let Some(texture) = texture_at(info.albedo_map) {
            material.set_texture("u_AlbedoMap", engine.textures.get(texture));
        }
        match texture_at(info.normal_map) {
            Some(texture) => {
                material.set_texture("u_NormalMap", engine.textures.get(texture));
                material.set_int("u_HasNormalMap", 1);
            }
            None => material.set_int("u_HasNormalMap", 0),
        }
        if let Some(texture) = texture_at(info.metallic_roughness_map) {
            material.set_texture("u_MetallicRoughnessMap", engine.textures.get(texture));
        }
        material.set_float4("u_AlbedoColor", info.albedo_color);
        material.set_float("u_Metallic", info.metallic);
        material.set_float("u_Roughness", info.roughness);

        engine.materials.insert(id, Rc::new(material));
    }

    let mut mesh_ids = Vec::with_capacity(model.meshes.len());
    for info in &model.meshes {
        if info.vertex_count() == 0 || info.index_count() == 0 {
            log::warn!("Skipping empty mesh '{}'", info.debug_name);
            continue;
        }
        let id = engine.registry.register(&info.debug_name);
        mesh_ids.push(id);
        if engine.meshes.exists(id) {
            continue;
        }

        let submeshes = info
            .submeshes
            .iter()
            .map(|sub| SubMesh {
                base_vertex: sub.base_vertex,
                base_index: sub.base_index,
                vertex_count: sub.vertex_count,
                index_count: sub.index_count,
                bounds_min: Vec3::from(sub.bounds_min),
                bounds_max: Vec3::from(sub.bounds_max),
                node_name: sub.node_name.clone(),
                local_transform: Mat4::identity(),
                material_id: sub
                    .material_index
                    .and_then(|i| material_ids.get(i))
                    .copied()
                    .unwrap_or(AssetId::INVALID),
            })
            .collect();

        let stream = |data_type, name, data: &[f32]| {
            VertexStream::from_f32(BufferLayout::from_pairs(&[(data_type, name)]), data)
        };
        let streams = vec![
            stream(ShaderDataType::Float3, "a_Position", &info.positions),
            stream(ShaderDataType::Float3, "a_Normal", &info.normals),
            stream(ShaderDataType::Float4, "a_Tangent", &info.tangents),
            stream(ShaderDataType::Float2, "a_TexCoord", &info.tex_coords),
        ];

        let mesh = Mesh::from_streams(&engine.graphics, streams, &info.indices, submeshes);
        engine.meshes.insert(id, Rc::new(mesh));
    }

    log::info!(
        "Uploaded model '{}': {} meshes, {} materials, {} textures",
        model.file_path,
        mesh_ids.len(),
        material_ids.len(),
        texture_ids.len()
    );

    mesh_ids
}

type ParseOutcome = (String, Result<ModelLoadResult, ModelError>);

/// Parses models on worker threads and uploads them on the main thread.
pub struct AsyncModelLoader {
    jobs: JobSystem,
    completed: ParseQueue<ParseOutcome>,
    in_flight: usize,
}

impl AsyncModelLoader {
    pub fn new(worker_count: usize) -> Self {
        Self {
            jobs: JobSystem::new(worker_count),
            completed: ParseQueue::new(),
            in_flight: 0,
        }
    }

    /// Parse a glTF file in the background.
    pub fn request(&mut self, path: impl AsRef<Path>) {
        let path: PathBuf = path.as_ref().to_path_buf();
        let label = path.display().to_string();
        self.submit(label, move || aether_core::gltf::parse_model(&path));
    }

    /// Parse an in-memory glTF document in the background.
    pub fn request_bytes(&mut self, data: Vec<u8>, label: impl Into<String>) {
        let label = label.into();
        let name = label.clone();
        self.submit(label, move || aether_core::gltf::parse_model_bytes(&data, name));
    }

    fn submit(
        &mut self,
        label: String,
        parse: impl FnOnce() -> Result<ModelLoadResult, ModelError> + Send + 'static,
    ) {
        let completed = self.completed.clone();
        self.in_flight += 1;
        self.jobs.submit(move || {
            log::info!("Worker thread: parsing {label}");
            let outcome = panic::catch_unwind(AssertUnwindSafe(parse)).unwrap_or_else(|payload| {
                Err(ModelError::Parse(format!(
                    "parser panicked: {}",
                    panic_message(&*payload)
                )))
            });
            completed.push((label, outcome));
        });
    }

    /// Upload at most one finished parse.
    ///
    /// Returns the uploaded mesh ids, or `None` when nothing finished or the
    /// parse failed.
    pub fn poll(&mut self, engine: &mut EngineContext, shader_id: AssetId) -> Option<Vec<AssetId>> {
        let (label, outcome) = self.completed.pop()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        match outcome {
            Ok(model) => {
                log::info!("Main thread: uploading {label}");
                Some(upload_model(engine, &model, shader_id))
            }
            Err(e) => {
                log::error!("Failed to load model '{label}': {e}");
                None
            }
        }
    }

    /// Requests not yet handed back by [`poll`](Self::poll).
    pub fn pending(&self) -> usize {
        self.in_flight
    }
}
