//! CPU-side model interchange.
//!
//! A [`ModelLoadResult`] is the flattened, scene-graph-free description of a
//! model that a parser produces on a worker thread and the graphics layer
//! uploads on the main thread. It is plain data and `Send`.
//!
//! Textures, materials and submeshes refer to each other by index into the
//! lists of the same result.

/// Raw RGBA8 pixels for one texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureCreateInfo {
    /// Human-readable name, used as the registry key suffix.
    pub debug_name: String,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

/// PBR parameters for one material.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialCreateInfo {
    pub debug_name: String,
    pub albedo_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    /// Index into [`ModelLoadResult::textures`].
    pub albedo_map: Option<usize>,
    pub normal_map: Option<usize>,
    pub metallic_roughness_map: Option<usize>,
}

impl Default for MaterialCreateInfo {
    fn default() -> Self {
        Self {
            debug_name: String::new(),
            albedo_color: [1.0; 4],
            metallic: 0.0,
            roughness: 1.0,
            albedo_map: None,
            normal_map: None,
            metallic_roughness_map: None,
        }
    }
}

/// One primitive range inside a [`MeshCreateInfo`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubMeshCreateInfo {
    pub node_name: String,
    pub base_vertex: u32,
    pub base_index: u32,
    pub vertex_count: u32,
    pub index_count: u32,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
    /// Index into [`ModelLoadResult::materials`].
    pub material_index: Option<usize>,
}

/// Structure-of-arrays vertex streams plus indices for one mesh.
///
/// All primitives of a source mesh are concatenated; indices are local to
/// their primitive and offset by `base_vertex` at draw time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshCreateInfo {
    pub debug_name: String,
    /// 3 floats per vertex.
    pub positions: Vec<f32>,
    /// 3 floats per vertex, defaults to (0, 1, 0).
    pub normals: Vec<f32>,
    /// 4 floats per vertex, defaults to (1, 0, 0, 1).
    pub tangents: Vec<f32>,
    /// 2 floats per vertex, defaults to (0, 0).
    pub tex_coords: Vec<f32>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<SubMeshCreateInfo>,
}

impl MeshCreateInfo {
    /// Total vertex count across all submeshes.
    pub fn vertex_count(&self) -> u32 {
        (self.positions.len() / 3) as u32
    }

    /// Total index count across all submeshes.
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Append one primitive's streams and record its submesh range.
    ///
    /// Missing optional streams are filled with defaults so every stream
    /// keeps one entry per vertex.
    #[allow(clippy::too_many_arguments)]
    pub fn push_primitive(
        &mut self,
        node_name: String,
        positions: &[[f32; 3]],
        normals: Option<&[[f32; 3]]>,
        tangents: Option<&[[f32; 4]]>,
        tex_coords: Option<&[[f32; 2]]>,
        indices: &[u32],
        material_index: Option<usize>,
    ) {
        let base_vertex = self.vertex_count();
        let base_index = self.index_count();

        let mut bounds_min = [f32::MAX; 3];
        let mut bounds_max = [f32::MIN; 3];
        for p in positions {
            for axis in 0..3 {
                bounds_min[axis] = bounds_min[axis].min(p[axis]);
                bounds_max[axis] = bounds_max[axis].max(p[axis]);
            }
        }

        for (i, p) in positions.iter().enumerate() {
            self.positions.extend_from_slice(p);
            let n = normals.and_then(|n| n.get(i)).copied().unwrap_or([0.0, 1.0, 0.0]);
            self.normals.extend_from_slice(&n);
            let t = tangents
                .and_then(|t| t.get(i))
                .copied()
                .unwrap_or([1.0, 0.0, 0.0, 1.0]);
            self.tangents.extend_from_slice(&t);
            let uv = tex_coords.and_then(|uv| uv.get(i)).copied().unwrap_or([0.0, 0.0]);
            self.tex_coords.extend_from_slice(&uv);
        }
        self.indices.extend_from_slice(indices);

        self.submeshes.push(SubMeshCreateInfo {
            node_name,
            base_vertex,
            base_index,
            vertex_count: positions.len() as u32,
            index_count: indices.len() as u32,
            bounds_min,
            bounds_max,
            material_index,
        });
    }
}

/// Everything parsed from one model file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelLoadResult {
    pub file_path: String,
    pub textures: Vec<TextureCreateInfo>,
    pub materials: Vec<MaterialCreateInfo>,
    pub meshes: Vec<MeshCreateInfo>,
}

impl ModelLoadResult {
    /// Create an empty result for `file_path`.
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Default::default()
        }
    }
}

static_assertions::assert_impl_all!(ModelLoadResult: Send);

/// Errors produced while parsing a model file.
#[derive(Debug)]
pub enum ModelError {
    /// Reading the file failed.
    Io(std::io::Error),
    /// The document could not be parsed.
    Parse(String),
    /// An embedded image could not be decoded.
    ImageDecode(String),
    /// A primitive has no position stream.
    MissingPositions {
        /// Mesh index in the source document.
        mesh: usize,
        /// Primitive index within the mesh.
        primitive: usize,
    },
    /// A primitive uses something other than triangle lists.
    UnsupportedTopology(String),
    /// Error resolving buffer data.
    BufferError(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Parse(msg) => write!(f, "model parse error: {msg}"),
            Self::ImageDecode(msg) => write!(f, "image decode error: {msg}"),
            Self::MissingPositions { mesh, primitive } => {
                write!(
                    f,
                    "mesh {mesh} primitive {primitive} has no POSITION attribute"
                )
            }
            Self::UnsupportedTopology(msg) => write!(f, "unsupported topology: {msg}"),
            Self::BufferError(msg) => write!(f, "buffer error: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ModelError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_defaults() {
        let m = MaterialCreateInfo::default();
        assert_eq!(m.albedo_color, [1.0; 4]);
        assert_eq!(m.metallic, 0.0);
        assert_eq!(m.roughness, 1.0);
        assert!(m.albedo_map.is_none());
    }

    #[test]
    fn test_push_primitive_fills_missing_streams() {
        let mut mesh = MeshCreateInfo::default();
        mesh.push_primitive(
            "Mesh_0_Prim0".into(),
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 2.0, -1.0]],
            None,
            None,
            None,
            &[0, 1, 2],
            Some(0),
        );

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.normals.len(), 9);
        assert_eq!(&mesh.normals[0..3], &[0.0, 1.0, 0.0]);
        assert_eq!(&mesh.tangents[0..4], &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(mesh.tex_coords, vec![0.0; 6]);

        let sub = &mesh.submeshes[0];
        assert_eq!(sub.bounds_min, [0.0, 0.0, -1.0]);
        assert_eq!(sub.bounds_max, [1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_push_primitive_offsets_second_range() {
        let mut mesh = MeshCreateInfo::default();
        let tri = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        mesh.push_primitive("a".into(), &tri, None, None, None, &[0, 1, 2], None);
        mesh.push_primitive("b".into(), &tri, None, None, None, &[2, 1, 0], None);

        let second = &mesh.submeshes[1];
        assert_eq!(second.base_vertex, 3);
        assert_eq!(second.base_index, 3);
        // Indices stay local to the primitive.
        assert_eq!(&mesh.indices[3..], &[2, 1, 0]);
    }

    #[test]
    fn test_error_display() {
        let err = ModelError::MissingPositions {
            mesh: 1,
            primitive: 2,
        };
        assert_eq!(
            err.to_string(),
            "mesh 1 primitive 2 has no POSITION attribute"
        );
    }
}
