//! GPU meshes with submesh ranges.
//!
//! A [`Mesh`] owns one [`VertexArray`] built either from a single
//! interleaved buffer ([`Mesh::new`]) or from several per-attribute streams
//! ([`Mesh::from_streams`]), plus one index buffer. [`SubMesh`] entries carve
//! that shared geometry into separately drawn ranges, each with its own
//! material.
//!
//! # Example
//!
//! ```ignore
//! let cube = generators::cube_vertices();
//! let mesh = cube.upload(&ctx);
//! for submesh in mesh.submeshes() {
//!     command.draw_indexed_base_vertex(
//!         mesh.vertex_array(),
//!         submesh.index_count,
//!         submesh.base_index as usize * 4,
//!         submesh.base_vertex as i32,
//!     );
//! }
//! ```

use std::rc::Rc;

use aether_core::math::{Mat4, Vec3};
use aether_core::AssetId;

use crate::context::GraphicsContext;
use crate::resources::{IndexBuffer, VertexArray, VertexBuffer};
use crate::types::BufferLayout;

/// A drawable range of a mesh's shared buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct SubMesh {
    /// Added to every index of the range.
    pub base_vertex: u32,
    /// First index of the range.
    pub base_index: u32,
    pub vertex_count: u32,
    pub index_count: u32,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub node_name: String,
    pub local_transform: Mat4,
    pub material_id: AssetId,
}

impl Default for SubMesh {
    fn default() -> Self {
        Self {
            base_vertex: 0,
            base_index: 0,
            vertex_count: 0,
            index_count: 0,
            bounds_min: Vec3::zeros(),
            bounds_max: Vec3::zeros(),
            node_name: String::new(),
            local_transform: Mat4::identity(),
            material_id: AssetId::INVALID,
        }
    }
}

impl SubMesh {
    /// Byte offset of the first index in a `u32` index buffer.
    pub fn index_byte_offset(&self) -> usize {
        self.base_index as usize * std::mem::size_of::<u32>()
    }
}

/// Interleaved mesh creation parameters.
#[derive(Debug, Clone)]
pub struct MeshSpec<'a> {
    /// `vertex_count * layout.stride()` bytes.
    pub vertex_data: &'a [u8],
    pub vertex_count: u32,
    pub index_data: &'a [u32],
    pub index_count: u32,
    pub layout: BufferLayout,
    /// A single "Default" submesh covering everything is created when empty.
    pub submeshes: Vec<SubMesh>,
}

impl<'a> MeshSpec<'a> {
    pub fn new(
        vertex_data: &'a [u8],
        vertex_count: u32,
        index_data: &'a [u32],
        layout: BufferLayout,
    ) -> Self {
        Self {
            vertex_data,
            vertex_count,
            index_data,
            index_count: index_data.len() as u32,
            layout,
            submeshes: Vec::new(),
        }
    }

    pub fn with_submeshes(mut self, submeshes: Vec<SubMesh>) -> Self {
        self.submeshes = submeshes;
        self
    }
}

/// One attribute stream of a structure-of-arrays mesh.
#[derive(Debug, Clone)]
pub struct VertexStream {
    pub layout: BufferLayout,
    pub data: Vec<u8>,
}

impl VertexStream {
    pub fn new(layout: BufferLayout, data: Vec<u8>) -> Self {
        Self { layout, data }
    }

    /// Stream of `f32` components.
    pub fn from_f32(layout: BufferLayout, data: &[f32]) -> Self {
        Self::new(layout, bytemuck::cast_slice(data).to_vec())
    }
}

/// A mesh uploaded to the GPU.
pub struct Mesh {
    vertex_array: VertexArray,
    layouts: Vec<BufferLayout>,
    submeshes: Vec<SubMesh>,
    vertex_count: u32,
    index_count: u32,
    bounds_min: Vec3,
    bounds_max: Vec3,
}

impl Mesh {
    /// Upload one interleaved vertex buffer and its indices.
    ///
    /// # Panics
    ///
    /// Panics if the vertex or index data is empty or shorter than the
    /// declared counts, or if a submesh range lies outside the buffers.
    pub fn new(ctx: &GraphicsContext, spec: MeshSpec<'_>) -> Self {
        assert!(spec.vertex_count > 0, "Vertex count is zero!");
        assert!(spec.index_count > 0, "Index count is zero!");
        assert!(!spec.layout.is_empty(), "Vertex Buffer has no layout!");
        let vertex_bytes = spec.vertex_count as usize * spec.layout.stride() as usize;
        assert!(
            spec.vertex_data.len() >= vertex_bytes,
            "Vertex data holds {} bytes, {} vertices need {vertex_bytes}",
            spec.vertex_data.len(),
            spec.vertex_count
        );
        assert!(
            spec.index_data.len() >= spec.index_count as usize,
            "Index data holds {} indices, expected {}",
            spec.index_data.len(),
            spec.index_count
        );

        let stream = VertexStream::new(spec.layout, spec.vertex_data[..vertex_bytes].to_vec());
        Self::build(
            ctx,
            vec![stream],
            spec.vertex_count,
            &spec.index_data[..spec.index_count as usize],
            spec.submeshes,
        )
    }

    /// Upload several vertex streams, each wired at the next free attribute
    /// location. The first stream must start with the position.
    ///
    /// # Panics
    ///
    /// Panics if there are no streams, a stream's vertex count differs from
    /// the first, the indices are empty, or a submesh is out of range.
    pub fn from_streams(
        ctx: &GraphicsContext,
        streams: Vec<VertexStream>,
        indices: &[u32],
        submeshes: Vec<SubMesh>,
    ) -> Self {
        let Some(first) = streams.first() else {
            panic!("Mesh needs at least one vertex stream");
        };
        assert!(first.layout.stride() > 0, "Vertex Buffer has no layout!");
        let vertex_count = (first.data.len() / first.layout.stride() as usize) as u32;
        assert!(vertex_count > 0, "Vertex count is zero!");
        assert!(!indices.is_empty(), "Index count is zero!");
        for stream in &streams[1..] {
            let stride = stream.layout.stride() as usize;
            assert!(
                stride > 0 && stream.data.len() / stride == vertex_count as usize,
                "Vertex stream {:?} does not hold {vertex_count} vertices",
                stream.layout.elements().first().map(|e| e.name.as_str())
            );
        }
        Self::build(ctx, streams, vertex_count, indices, submeshes)
    }

    fn build(
        ctx: &GraphicsContext,
        streams: Vec<VertexStream>,
        vertex_count: u32,
        indices: &[u32],
        mut submeshes: Vec<SubMesh>,
    ) -> Self {
        let index_count = indices.len() as u32;
        if submeshes.is_empty() {
            submeshes.push(SubMesh {
                vertex_count,
                index_count,
                node_name: "Default".to_string(),
                ..SubMesh::default()
            });
        }
        for submesh in &submeshes {
            assert!(
                submesh.base_vertex + submesh.vertex_count <= vertex_count
                    && submesh.base_index + submesh.index_count <= index_count,
                "SubMesh '{}' is out of range ({} vertices, {} indices)",
                submesh.node_name,
                vertex_count,
                index_count
            );
        }

        let (bounds_min, bounds_max) =
            compute_bounds(&streams[0].data, streams[0].layout.stride(), vertex_count);

        let mut vertex_array = VertexArray::new(ctx);
        let mut layouts = Vec::with_capacity(streams.len());
        for stream in streams {
            let mut buffer = VertexBuffer::with_data(ctx, &stream.data);
            buffer.set_layout(stream.layout.clone());
            vertex_array.add_vertex_buffer(Rc::new(buffer));
            layouts.push(stream.layout);
        }
        vertex_array.set_index_buffer(Rc::new(IndexBuffer::new(ctx, indices)));

        Self {
            vertex_array,
            layouts,
            submeshes,
            vertex_count,
            index_count,
            bounds_min,
            bounds_max,
        }
    }

    /// Recompute the mesh bounds from the first three floats of each vertex
    /// in `vertex_data`, laid out like the first vertex stream.
    ///
    /// Bounds are never refreshed automatically after a buffer update.
    pub fn recompute_bounds(&mut self, vertex_data: &[u8]) {
        let (min, max) = compute_bounds(vertex_data, self.layouts[0].stride(), self.vertex_count);
        self.bounds_min = min;
        self.bounds_max = max;
    }

    pub fn vertex_array(&self) -> &VertexArray {
        &self.vertex_array
    }

    pub fn submeshes(&self) -> &[SubMesh] {
        &self.submeshes
    }

    /// Layout of the first (position) stream.
    pub fn layout(&self) -> &BufferLayout {
        &self.layouts[0]
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn bounds_min(&self) -> Vec3 {
        self.bounds_min
    }

    pub fn bounds_max(&self) -> Vec3 {
        self.bounds_max
    }

    pub fn bounds_center(&self) -> Vec3 {
        (self.bounds_min + self.bounds_max) * 0.5
    }

    pub fn bounds_extents(&self) -> Vec3 {
        (self.bounds_max - self.bounds_min) * 0.5
    }
}

fn compute_bounds(vertex_data: &[u8], stride: u32, vertex_count: u32) -> (Vec3, Vec3) {
    // Needs three leading floats per vertex.
    if stride < 12 {
        return (Vec3::zeros(), Vec3::zeros());
    }
    let mut min = Vec3::repeat(f32::MAX);
    let mut max = Vec3::repeat(f32::MIN);
    for vertex in vertex_data
        .chunks_exact(stride as usize)
        .take(vertex_count as usize)
    {
        let p: [f32; 3] = bytemuck::pod_read_unaligned(&vertex[..12]);
        let p = Vec3::from(p);
        min = min.inf(&p);
        max = max.sup(&p);
    }
    (min, max)
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("vertex_count", &self.vertex_count)
            .field("index_count", &self.index_count)
            .field("submeshes", &self.submeshes.len())
            .finish()
    }
}

static_assertions::assert_not_impl_any!(Mesh: Send, Sync);

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::mesh::MeshLayout;
    use crate::types::ShaderDataType;

    fn triangle() -> (Vec<f32>, Vec<u32>) {
        #[rustfmt::skip]
        let vertices = vec![
            -1.0, 0.0, 2.0,
             3.0, 1.0, 0.0,
             0.0, -4.0, 1.0,
        ];
        (vertices, vec![0, 1, 2])
    }

    #[test]
    fn test_default_submesh_and_bounds() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let (vertices, indices) = triangle();
        let mesh = Mesh::new(
            &ctx,
            MeshSpec::new(bytemuck::cast_slice(&vertices), 3, &indices, MeshLayout::position_only()),
        );

        let submesh = &mesh.submeshes()[0];
        assert_eq!(mesh.submeshes().len(), 1);
        assert_eq!(submesh.node_name, "Default");
        assert_eq!((submesh.vertex_count, submesh.index_count), (3, 3));
        assert_eq!(submesh.local_transform, Mat4::identity());

        assert_eq!(mesh.bounds_min(), Vec3::new(-1.0, -4.0, 0.0));
        assert_eq!(mesh.bounds_max(), Vec3::new(3.0, 1.0, 2.0));
        assert_eq!(mesh.bounds_center(), Vec3::new(1.0, -1.5, 1.0));
        assert_eq!(mesh.bounds_extents(), Vec3::new(2.0, 2.5, 1.0));
    }

    #[test]
    fn test_bounds_use_first_three_floats_of_stride() {
        let (ctx, _dummy) = GraphicsContext::headless();
        // position + uv; the uv values must not leak into bounds
        #[rustfmt::skip]
        let vertices: Vec<f32> = vec![
            0.0, 0.0, 0.0, 100.0, 100.0,
            1.0, 1.0, 1.0, -100.0, -100.0,
        ];
        let layout = BufferLayout::from_pairs(&[
            (ShaderDataType::Float3, "a_Position"),
            (ShaderDataType::Float2, "a_TexCoord"),
        ]);
        let mesh = Mesh::new(&ctx, MeshSpec::new(bytemuck::cast_slice(&vertices), 2, &[0, 1, 1], layout));
        assert_eq!(mesh.bounds_max(), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(mesh.bounds_min(), Vec3::zeros());
    }

    #[test]
    fn test_recompute_bounds_is_explicit() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let (vertices, indices) = triangle();
        let mut mesh = Mesh::new(
            &ctx,
            MeshSpec::new(bytemuck::cast_slice(&vertices), 3, &indices, MeshLayout::position_only()),
        );
        let moved: Vec<f32> = vertices.iter().map(|v| v * 2.0).collect();
        let vb = mesh.vertex_array().vertex_buffers().next().unwrap().clone();
        vb.set_data(bytemuck::cast_slice(&moved), 0);
        assert_eq!(mesh.bounds_max(), Vec3::new(3.0, 1.0, 2.0));

        mesh.recompute_bounds(bytemuck::cast_slice(&moved));
        assert_eq!(mesh.bounds_max(), Vec3::new(6.0, 2.0, 4.0));
    }

    #[test]
    fn test_from_streams_wires_consecutive_locations() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let positions = [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let normals = [0.0f32, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        let uvs = [0.0f32, 0.0, 1.0, 0.0, 0.0, 1.0];
        let mesh = Mesh::from_streams(
            &ctx,
            vec![
                VertexStream::from_f32(BufferLayout::from_pairs(&[(ShaderDataType::Float3, "a_Position")]), &positions),
                VertexStream::from_f32(BufferLayout::from_pairs(&[(ShaderDataType::Float3, "a_Normal")]), &normals),
                VertexStream::from_f32(BufferLayout::from_pairs(&[(ShaderDataType::Float2, "a_TexCoord")]), &uvs),
            ],
            &[0, 1, 2],
            Vec::new(),
        );
        let locations: Vec<u32> = mesh.vertex_array().attributes().iter().map(|a| a.location).collect();
        assert_eq!(locations, vec![0, 1, 2]);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.bounds_max(), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_submesh_index_byte_offset() {
        let submesh = SubMesh {
            base_index: 6,
            ..SubMesh::default()
        };
        assert_eq!(submesh.index_byte_offset(), 24);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_submesh_out_of_range_panics() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let (vertices, indices) = triangle();
        let spec = MeshSpec::new(bytemuck::cast_slice(&vertices), 3, &indices, MeshLayout::position_only())
            .with_submeshes(vec![SubMesh {
                base_index: 2,
                index_count: 3,
                vertex_count: 3,
                node_name: "Overflow".to_string(),
                ..SubMesh::default()
            }]);
        Mesh::new(&ctx, spec);
    }

    #[test]
    #[should_panic(expected = "Vertex count is zero!")]
    fn test_empty_vertices_panics() {
        let (ctx, _dummy) = GraphicsContext::headless();
        Mesh::new(&ctx, MeshSpec::new(&[], 0, &[0], MeshLayout::position_only()));
    }
}
