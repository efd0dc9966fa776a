//! Internal glTF parsing logic.
//!
//! The [`ParseContext`] holds the parsed document and the resolved buffer
//! data while textures, materials and meshes are extracted.

use std::path::Path;

use crate::model::{
    MaterialCreateInfo, MeshCreateInfo, ModelError, TextureCreateInfo,
};

/// Internal parsing context.
pub(crate) struct ParseContext<'a> {
    document: &'a gltf_dep::Document,
    /// Resolved buffer data (one Vec<u8> per glTF buffer).
    buffers: &'a [Vec<u8>],
    base_dir: Option<&'a Path>,
}

impl<'a> ParseContext<'a> {
    pub fn new(
        document: &'a gltf_dep::Document,
        buffers: &'a [Vec<u8>],
        base_dir: Option<&'a Path>,
    ) -> Self {
        Self {
            document,
            buffers,
            base_dir,
        }
    }

    /// Decode every image to RGBA8.
    ///
    /// Texture indices in the result follow glTF image indices, so materials
    /// refer to images through `texture.source()`.
    pub fn load_textures(&self) -> Result<Vec<TextureCreateInfo>, ModelError> {
        let mut textures = Vec::new();

        for (i, image) in self.document.images().enumerate() {
            let bytes = match image.source() {
                gltf_dep::image::Source::View { view, .. } => {
                    let buffer_index = view.buffer().index();
                    let buffer_data = self.buffers.get(buffer_index).ok_or_else(|| {
                        ModelError::BufferError(format!(
                            "image buffer index {buffer_index} out of range"
                        ))
                    })?;
                    let start = view.offset();
                    let end = start + view.length();
                    buffer_data
                        .get(start..end)
                        .ok_or_else(|| {
                            ModelError::BufferError(format!(
                                "image view {start}..{end} exceeds buffer {buffer_index}"
                            ))
                        })?
                        .to_vec()
                }
                gltf_dep::image::Source::Uri { uri, .. } => self.read_uri(uri)?,
            };

            let decoded = image::load_from_memory(&bytes)
                .map_err(|e| ModelError::ImageDecode(format!("image {i}: {e}")))?
                .to_rgba8();
            let (width, height) = decoded.dimensions();

            textures.push(TextureCreateInfo {
                debug_name: match image.name() {
                    Some(name) => format!("Tex_{name}"),
                    None => format!("Tex_{i}"),
                },
                width,
                height,
                pixels: decoded.into_raw(),
            });
        }

        Ok(textures)
    }

    /// Extract PBR metallic-roughness parameters.
    pub fn load_materials(&self) -> Vec<MaterialCreateInfo> {
        self.document
            .materials()
            .enumerate()
            .map(|(i, mat)| {
                let pbr = mat.pbr_metallic_roughness();
                MaterialCreateInfo {
                    debug_name: match mat.name() {
                        Some(name) => format!("Mat_{name}"),
                        None => format!("Mat_{i}"),
                    },
                    albedo_color: pbr.base_color_factor(),
                    metallic: pbr.metallic_factor(),
                    roughness: pbr.roughness_factor(),
                    albedo_map: pbr
                        .base_color_texture()
                        .map(|t| t.texture().source().index()),
                    normal_map: mat.normal_texture().map(|t| t.texture().source().index()),
                    metallic_roughness_map: pbr
                        .metallic_roughness_texture()
                        .map(|t| t.texture().source().index()),
                }
            })
            .collect()
    }

    /// Load every mesh, concatenating its primitives into shared streams.
    pub fn load_meshes(&self) -> Result<Vec<MeshCreateInfo>, ModelError> {
        let mut result = Vec::new();

        for (mesh_idx, mesh) in self.document.meshes().enumerate() {
            let mut info = MeshCreateInfo {
                debug_name: match mesh.name() {
                    Some(name) => name.to_string(),
                    None => format!("Mesh_{mesh_idx}"),
                },
                ..Default::default()
            };

            for (prim_idx, primitive) in mesh.primitives().enumerate() {
                if primitive.mode() != gltf_dep::mesh::Mode::Triangles {
                    return Err(ModelError::UnsupportedTopology(format!(
                        "mesh {mesh_idx} primitive {prim_idx} uses {:?}",
                        primitive.mode()
                    )));
                }

                let reader = primitive
                    .reader(|buffer| self.buffers.get(buffer.index()).map(Vec::as_slice));

                let positions: Vec<[f32; 3]> = reader
                    .read_positions()
                    .ok_or(ModelError::MissingPositions {
                        mesh: mesh_idx,
                        primitive: prim_idx,
                    })?
                    .collect();
                let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
                let tangents: Option<Vec<[f32; 4]>> =
                    reader.read_tangents().map(Iterator::collect);
                let tex_coords: Option<Vec<[f32; 2]>> =
                    reader.read_tex_coords(0).map(|uv| uv.into_f32().collect());
                let indices: Vec<u32> = match reader.read_indices() {
                    Some(indices) => indices.into_u32().collect(),
                    None => (0..positions.len() as u32).collect(),
                };

                if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
                    return Err(ModelError::BufferError(format!(
                        "mesh {mesh_idx} primitive {prim_idx} index {bad} exceeds vertex count {}",
                        positions.len()
                    )));
                }

                let node_name = format!("{}_Prim{prim_idx}", info.debug_name);
                info.push_primitive(
                    node_name,
                    &positions,
                    normals.as_deref(),
                    tangents.as_deref(),
                    tex_coords.as_deref(),
                    &indices,
                    primitive.material().index(),
                );
            }

            result.push(info);
        }

        Ok(result)
    }

    fn read_uri(&self, uri: &str) -> Result<Vec<u8>, ModelError> {
        read_uri(uri, self.base_dir)
    }
}

// -- Helper functions --

/// Resolve a buffer or image URI to bytes: data URIs are decoded in place,
/// anything else is read relative to `base_dir`.
fn read_uri(uri: &str, base_dir: Option<&Path>) -> Result<Vec<u8>, ModelError> {
    if let Some(data) = parse_data_uri(uri) {
        return Ok(data);
    }
    match base_dir {
        Some(dir) => Ok(std::fs::read(dir.join(uri))?),
        None => Err(ModelError::BufferError(format!(
            "external URI '{uri}' cannot be resolved without a base directory"
        ))),
    }
}

/// Parse a data URI (e.g., `data:image/png;base64,...`) and return the decoded bytes.
fn parse_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let base64_start = rest.find(";base64,")?;
    base64_decode(&rest[base64_start + 8..])
}

/// Minimal base64 decoder for embedded data URIs.
fn base64_decode(input: &str) -> Option<Vec<u8>> {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    fn decode_char(c: u8) -> Option<u8> {
        TABLE.iter().position(|&b| b == c).map(|p| p as u8)
    }

    let input: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let mut result = Vec::with_capacity(input.len() * 3 / 4);

    for chunk in input.chunks(4) {
        let mut buf = [0u8; 4];
        let mut pad = 0;

        for (i, &byte) in chunk.iter().enumerate() {
            if byte == b'=' {
                pad += 1;
            } else {
                buf[i] = decode_char(byte)?;
            }
        }
        pad += 4 - chunk.len();

        result.push((buf[0] << 2) | (buf[1] >> 4));
        if pad < 2 {
            result.push((buf[1] << 4) | (buf[2] >> 2));
        }
        if pad < 1 {
            result.push((buf[2] << 6) | buf[3]);
        }
    }

    Some(result)
}

/// Resolve all buffer data from the glTF document.
///
/// For binary glTF (.glb), the `Bin` buffer is the embedded blob.
pub(crate) fn resolve_buffers(
    document: &gltf_dep::Document,
    blob: Option<Vec<u8>>,
    base_dir: Option<&Path>,
) -> Result<Vec<Vec<u8>>, ModelError> {
    let mut buffers = Vec::new();

    for buffer in document.buffers() {
        match buffer.source() {
            gltf_dep::buffer::Source::Bin => {
                let data = blob.as_ref().ok_or_else(|| {
                    ModelError::BufferError("binary buffer referenced but no blob present".into())
                })?;
                buffers.push(data.clone());
            }
            gltf_dep::buffer::Source::Uri(uri) => buffers.push(read_uri(uri, base_dir)?),
        }
    }

    Ok(buffers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf::parse_model_bytes;

    fn base64_encode(bytes: &[u8]) -> String {
        const TABLE: &[u8; 64] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
        let mut out = String::new();
        for chunk in bytes.chunks(3) {
            let b = [
                chunk[0],
                chunk.get(1).copied().unwrap_or(0),
                chunk.get(2).copied().unwrap_or(0),
            ];
            out.push(TABLE[(b[0] >> 2) as usize] as char);
            out.push(TABLE[(((b[0] & 0x03) << 4) | (b[1] >> 4)) as usize] as char);
            if chunk.len() > 1 {
                out.push(TABLE[(((b[1] & 0x0f) << 2) | (b[2] >> 6)) as usize] as char);
            } else {
                out.push('=');
            }
            if chunk.len() > 2 {
                out.push(TABLE[(b[2] & 0x3f) as usize] as char);
            } else {
                out.push('=');
            }
        }
        out
    }

    /// One triangle, one material, embedded buffer.
    fn triangle_gltf() -> String {
        let mut bin = Vec::new();
        for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        let uri = format!("data:application/octet-stream;base64,{}", base64_encode(&bin));

        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "buffers": [{{ "byteLength": {len}, "uri": "{uri}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ],
  "materials": [{{ "name": "Wood", "pbrMetallicRoughness": {{ "metallicFactor": 0.25 }} }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 0 }}] }}]
}}"#,
            len = bin.len(),
        )
    }

    #[test]
    fn test_base64_decode() {
        assert_eq!(base64_decode("SGVsbG8gV29ybGQ=").unwrap(), b"Hello World");
        assert_eq!(base64_decode("YQ==").unwrap(), b"a");
    }

    #[test]
    fn test_base64_encode_matches_decoder() {
        let bytes = b"Aether renderer";
        assert_eq!(base64_decode(&base64_encode(bytes)).unwrap(), bytes);
    }

    #[test]
    fn test_parse_data_uri() {
        let uri = "data:application/octet-stream;base64,AQID";
        assert_eq!(parse_data_uri(uri).unwrap(), vec![1, 2, 3]);
        assert!(parse_data_uri("file://some/path").is_none());
    }

    #[test]
    fn test_external_uri_without_base_dir_fails() {
        assert!(matches!(
            read_uri("mesh.bin", None),
            Err(ModelError::BufferError(_))
        ));
    }

    #[test]
    fn test_parse_triangle() {
        let json = triangle_gltf();
        let result = parse_model_bytes(json.as_bytes(), "triangle.gltf").unwrap();

        assert_eq!(result.file_path, "triangle.gltf");
        assert_eq!(result.materials.len(), 1);
        assert_eq!(result.materials[0].debug_name, "Mat_Wood");
        assert_eq!(result.materials[0].metallic, 0.25);

        assert_eq!(result.meshes.len(), 1);
        let mesh = &result.meshes[0];
        assert_eq!(mesh.debug_name, "Mesh_0");
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        // Missing normals fall back to +Y.
        assert_eq!(&mesh.normals[0..3], &[0.0, 1.0, 0.0]);

        let sub = &mesh.submeshes[0];
        assert_eq!(sub.node_name, "Mesh_0_Prim0");
        assert_eq!(sub.material_index, Some(0));
        assert_eq!(sub.bounds_max, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(matches!(
            parse_model_bytes(b"not a model", "bad"),
            Err(ModelError::Parse(_))
        ));
    }
}
