//! Vertex layout presets for meshes.
//!
//! Each preset is an interleaved [`BufferLayout`] whose first element is the
//! position, which is what mesh bounds are computed from.

use crate::types::{BufferLayout, ShaderDataType};

/// Common interleaved vertex layouts.
///
/// | Preset | Elements | Stride |
/// |--------|----------|--------|
/// | [`pbr`](Self::pbr) | position, normal, tangent, bitangent, uv | 56 |
/// | [`phong`](Self::phong) | position, normal, uv | 32 |
/// | [`pbr_skinned`](Self::pbr_skinned) | pbr + bone ids, bone weights | 88 |
/// | [`quad`](Self::quad) | 2D position, uv | 16 |
/// | [`position_only`](Self::position_only) | position | 12 |
pub struct MeshLayout;

impl MeshLayout {
    pub fn pbr() -> BufferLayout {
        BufferLayout::from_pairs(&[
            (ShaderDataType::Float3, "a_Position"),
            (ShaderDataType::Float3, "a_Normal"),
            (ShaderDataType::Float3, "a_Tangent"),
            (ShaderDataType::Float3, "a_Bitangent"),
            (ShaderDataType::Float2, "a_TexCoord"),
        ])
    }

    pub fn phong() -> BufferLayout {
        BufferLayout::from_pairs(&[
            (ShaderDataType::Float3, "a_Position"),
            (ShaderDataType::Float3, "a_Normal"),
            (ShaderDataType::Float2, "a_TexCoord"),
        ])
    }

    pub fn pbr_skinned() -> BufferLayout {
        BufferLayout::from_pairs(&[
            (ShaderDataType::Float3, "a_Position"),
            (ShaderDataType::Float3, "a_Normal"),
            (ShaderDataType::Float3, "a_Tangent"),
            (ShaderDataType::Float3, "a_Bitangent"),
            (ShaderDataType::Float2, "a_TexCoord"),
            (ShaderDataType::Int4, "a_BoneIDs"),
            (ShaderDataType::Float4, "a_BoneWeights"),
        ])
    }

    /// Screen-space quad: 2D position plus texture coordinates.
    pub fn quad() -> BufferLayout {
        BufferLayout::from_pairs(&[
            (ShaderDataType::Float2, "a_Position"),
            (ShaderDataType::Float2, "a_TexCoord"),
        ])
    }

    pub fn position_only() -> BufferLayout {
        BufferLayout::from_pairs(&[(ShaderDataType::Float3, "a_Position")])
    }
}
