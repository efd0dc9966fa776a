//! Mesh generators for the shapes the frame passes draw.

use super::data::{Mesh, MeshSpec};
use super::layout::MeshLayout;
use crate::context::GraphicsContext;
use crate::types::BufferLayout;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PnuVertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct QuadVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

/// CPU-side interleaved geometry ready for [`Mesh::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub layout: BufferLayout,
}

impl MeshData {
    pub fn vertex_count(&self) -> u32 {
        let floats_per_vertex = self.layout.stride() as usize / std::mem::size_of::<f32>();
        (self.vertices.len() / floats_per_vertex) as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn spec(&self) -> MeshSpec<'_> {
        MeshSpec::new(
            bytemuck::cast_slice(&self.vertices),
            self.vertex_count(),
            &self.indices,
            self.layout.clone(),
        )
    }

    pub fn upload(&self, ctx: &GraphicsContext) -> Mesh {
        Mesh::new(ctx, self.spec())
    }
}

/// Unit cube centred on the origin with per-face normals and uvs.
///
/// 24 vertices (four per face) and 36 indices, [`MeshLayout::phong`].
pub fn cube_vertices() -> MeshData {
    // (normal, tangent u, tangent v) per face
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    const CORNERS: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (face, (normal, u, v)) in FACES.iter().enumerate() {
        for [cu, cv] in CORNERS {
            let position = std::array::from_fn(|i| 0.5 * (normal[i] + cu * u[i] + cv * v[i]));
            vertices.push(PnuVertex {
                position,
                normal: *normal,
                uv: [(cu + 1.0) * 0.5, (cv + 1.0) * 0.5],
            });
        }
        let base = face as u32 * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    MeshData {
        vertices: bytemuck::cast_slice(&vertices).to_vec(),
        indices,
        layout: MeshLayout::phong(),
    }
}

/// Two triangles covering clip space, [`MeshLayout::quad`].
pub fn fullscreen_quad() -> MeshData {
    let vertices = [
        QuadVertex {
            position: [-1.0, 1.0],
            uv: [0.0, 1.0],
        },
        QuadVertex {
            position: [-1.0, -1.0],
            uv: [0.0, 0.0],
        },
        QuadVertex {
            position: [1.0, -1.0],
            uv: [1.0, 0.0],
        },
        QuadVertex {
            position: [1.0, 1.0],
            uv: [1.0, 1.0],
        },
    ];

    MeshData {
        vertices: bytemuck::cast_slice(&vertices).to_vec(),
        indices: vec![0, 1, 2, 2, 3, 0],
        layout: MeshLayout::quad(),
    }
}

/// Eight-corner cube spanning [-1, 1], positions only, faces wound inward.
pub fn skybox_cube() -> MeshData {
    #[rustfmt::skip]
    let vertices = vec![
        -1.0, -1.0,  1.0,
         1.0, -1.0,  1.0,
         1.0, -1.0, -1.0,
        -1.0, -1.0, -1.0,
        -1.0,  1.0,  1.0,
         1.0,  1.0,  1.0,
         1.0,  1.0, -1.0,
        -1.0,  1.0, -1.0,
    ];
    #[rustfmt::skip]
    let indices = vec![
        1, 2, 6, 6, 5, 1,
        0, 4, 7, 7, 3, 0,
        4, 5, 6, 6, 7, 4,
        0, 3, 2, 2, 1, 0,
        0, 1, 5, 5, 4, 0,
        3, 7, 6, 6, 2, 3,
    ];

    MeshData {
        vertices,
        indices,
        layout: MeshLayout::position_only(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_counts() {
        let cube = cube_vertices();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.index_count(), 36);
        assert!(cube.indices.iter().all(|&i| i < 24));
    }

    #[test]
    fn test_cube_faces_lie_on_their_normal() {
        let cube = cube_vertices();
        for vertex in cube.vertices.chunks_exact(8) {
            let (position, normal) = (&vertex[0..3], &vertex[3..6]);
            let along: f32 = position.iter().zip(normal).map(|(p, n)| p * n).sum();
            assert!((along - 0.5).abs() < 1e-6);
            assert!(position.iter().all(|p| p.abs() <= 0.5 + 1e-6));
        }
    }

    #[test]
    fn test_cube_winding_faces_outward() {
        let cube = cube_vertices();
        let p = |i: u32| {
            let v = &cube.vertices[i as usize * 8..i as usize * 8 + 6];
            ([v[0], v[1], v[2]], [v[3], v[4], v[5]])
        };
        for tri in cube.indices.chunks_exact(3) {
            let (a, n) = p(tri[0]);
            let (b, _) = p(tri[1]);
            let (c, _) = p(tri[2]);
            let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let cross = [
                e1[1] * e2[2] - e1[2] * e2[1],
                e1[2] * e2[0] - e1[0] * e2[2],
                e1[0] * e2[1] - e1[1] * e2[0],
            ];
            let dot: f32 = cross.iter().zip(n).map(|(c, n)| c * n).sum();
            assert!(dot > 0.0);
        }
    }

    #[test]
    fn test_quad_and_skybox() {
        let quad = fullscreen_quad();
        assert_eq!((quad.vertex_count(), quad.index_count()), (4, 6));
        let sky = skybox_cube();
        assert_eq!((sky.vertex_count(), sky.index_count()), (8, 36));
    }
}
