//! glTF 2.0 parsing into a [`ModelLoadResult`].
//!
//! Parsing is CPU-only and safe to run on a worker thread. Images are decoded
//! to RGBA8, every primitive becomes one submesh, and all primitives of a
//! glTF mesh share one set of vertex streams.
//!
//! # Example
//!
//! ```ignore
//! use aether_core::gltf::parse_model;
//!
//! let result = parse_model("Assets/Models/Sponza/Sponza.gltf").unwrap();
//! println!("{} meshes, {} materials", result.meshes.len(), result.materials.len());
//! ```

mod loader;

use std::path::Path;

use crate::model::{ModelError, ModelLoadResult};

/// Parse a `.gltf`/`.glb` file from disk.
///
/// External buffer and image URIs are resolved relative to the file's directory.
pub fn parse_model(path: impl AsRef<Path>) -> Result<ModelLoadResult, ModelError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let label = path.to_string_lossy().into_owned();
    parse_model_with_base(&data, label, path.parent())
}

/// Parse a model from bytes already in memory.
///
/// Only embedded (`.glb` blob or data URI) buffers and images are supported.
pub fn parse_model_bytes(
    data: &[u8],
    label: impl Into<String>,
) -> Result<ModelLoadResult, ModelError> {
    parse_model_with_base(data, label.into(), None)
}

fn parse_model_with_base(
    data: &[u8],
    label: String,
    base_dir: Option<&Path>,
) -> Result<ModelLoadResult, ModelError> {
    let gltf = gltf_dep::Gltf::from_slice(data).map_err(|e| ModelError::Parse(e.to_string()))?;
    let blob = gltf.blob.clone();

    let buffers = loader::resolve_buffers(&gltf.document, blob, base_dir)?;
    let ctx = loader::ParseContext::new(&gltf.document, &buffers, base_dir);

    let mut result = ModelLoadResult::new(label);
    result.textures = ctx.load_textures()?;
    result.materials = ctx.load_materials();
    result.meshes = ctx.load_meshes()?;

    log::info!(
        "Parsed model '{}': {} meshes, {} materials, {} textures",
        result.file_path,
        result.meshes.len(),
        result.materials.len(),
        result.textures.len()
    );
    Ok(result)
}
