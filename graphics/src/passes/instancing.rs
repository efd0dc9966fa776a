//! Growable per-instance model matrices.

use std::rc::Rc;

use aether_core::math::{mat4_to_cols_array, Mat4};

use crate::command::RenderCommand;
use crate::context::GraphicsContext;
use crate::mesh::Mesh;
use crate::resources::{VertexArray, VertexBuffer};
use crate::types::{BufferLayout, ShaderDataType};

/// Preferred first attribute location of `a_InstanceModel`; the built-in
/// lighting and shadow shaders declare it here.
pub const INSTANCE_LOCATION: u32 = 3;

const MATRIX_SIZE: usize = std::mem::size_of::<[f32; 16]>();

/// Instanced draws of one mesh with a per-instance `mat4`.
///
/// Holds its own vertex array sharing the mesh's vertex and index buffers,
/// so the mesh itself is never rewired. The matrix occupies four locations
/// from [`INSTANCE_LOCATION`], or from the first location past the mesh's
/// own attributes when the mesh is wider; see [`InstanceBuffer::location`].
pub struct InstanceBuffer {
    ctx: GraphicsContext,
    vertex_array: VertexArray,
    buffer: Option<Rc<VertexBuffer>>,
    location: u32,
    /// Attachment index of the instance buffer once attached.
    attachment: usize,
}

impl InstanceBuffer {
    /// Capacity is in matrices; 0 defers allocation to the first draw.
    pub fn new(ctx: &GraphicsContext, mesh: &Mesh, capacity: usize) -> Self {
        let source = mesh.vertex_array();
        let mut vertex_array = VertexArray::new(ctx);
        for buffer in source.vertex_buffers() {
            vertex_array.add_vertex_buffer(buffer.clone());
        }
        if let Some(index_buffer) = source.index_buffer() {
            vertex_array.set_index_buffer(index_buffer.clone());
        }

        let location = INSTANCE_LOCATION.max(source.next_location());
        if location != INSTANCE_LOCATION {
            log::debug!(
                "Mesh uses {} attribute locations; instance matrix moved to location {location}",
                source.next_location()
            );
        }

        let attachment = source.vertex_buffers().count();
        let mut instances = Self {
            ctx: ctx.clone(),
            vertex_array,
            buffer: None,
            location,
            attachment,
        };
        if capacity > 0 {
            instances.allocate(capacity);
        }
        instances
    }

    /// Matrices that fit without reallocating.
    pub fn capacity(&self) -> usize {
        self.buffer.as_ref().map_or(0, |b| b.size() / MATRIX_SIZE)
    }

    /// First of the four locations holding the instance matrix.
    pub fn location(&self) -> u32 {
        self.location
    }

    pub fn buffer(&self) -> Option<&Rc<VertexBuffer>> {
        self.buffer.as_ref()
    }

    pub fn vertex_array(&self) -> &VertexArray {
        &self.vertex_array
    }

    /// Make room for `required` matrices, doubling past the requirement.
    pub fn reserve(&mut self, required: usize) {
        if self.capacity() < required {
            self.allocate(required * 2);
        }
    }

    /// Write `models` to the front of the buffer, growing it if needed.
    pub fn upload(&mut self, models: &[Mat4]) {
        self.reserve(models.len());
        let Some(buffer) = &self.buffer else {
            return;
        };
        let data: Vec<f32> = models.iter().flat_map(mat4_to_cols_array).collect();
        buffer.set_data(bytemuck::cast_slice(&data), 0);
    }

    /// Upload `models` and draw the mesh once per matrix.
    pub fn draw(&mut self, command: &RenderCommand, models: &[Mat4]) {
        if models.is_empty() {
            return;
        }
        self.upload(models);
        command.draw_instanced(&self.vertex_array, models.len() as u32);
    }

    fn allocate(&mut self, capacity: usize) {
        let mut buffer = VertexBuffer::with_capacity(&self.ctx, capacity * MATRIX_SIZE);
        buffer.set_layout(BufferLayout::from_pairs(&[(
            ShaderDataType::Mat4,
            "a_InstanceModel",
        )]));
        let buffer = Rc::new(buffer);

        if self.buffer.is_some() {
            self.vertex_array
                .replace_vertex_buffer(self.attachment, buffer.clone());
        } else {
            self.vertex_array
                .add_instance_buffer_at(buffer.clone(), self.location);
        }
        log::debug!("Instance buffer grown to {capacity} matrices");
        self.buffer = Some(buffer);
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use aether_core::math::Vec3;

    use super::*;
    use crate::backend::dummy::BackendCommand;
    use crate::mesh::{generators, MeshLayout, MeshSpec};

    #[test]
    fn test_lazy_allocation_and_growth() {
        let (ctx, dummy) = GraphicsContext::headless();
        let command = RenderCommand::new(&ctx);
        let cube = generators::cube_vertices().upload(&ctx);
        let mut instances = InstanceBuffer::new(&ctx, &cube, 0);
        assert_eq!(instances.capacity(), 0);
        assert_eq!(instances.vertex_array().next_location(), INSTANCE_LOCATION);

        let models: Vec<Mat4> = (0..3)
            .map(|i| Mat4::new_translation(&Vec3::new(i as f32, 0.0, 0.0)))
            .collect();
        instances.draw(&command, &models);
        assert_eq!(instances.capacity(), 6);
        let first = instances.buffer().unwrap().handle();

        // Fits: no reallocation.
        instances.draw(&command, &models[..2]);
        assert_eq!(instances.buffer().unwrap().handle(), first);

        let many = vec![Mat4::identity(); 10];
        instances.draw(&command, &many);
        assert_eq!(instances.capacity(), 20);
        let grown = instances.buffer().unwrap().handle();
        assert_ne!(grown, first);

        let va = instances.vertex_array();
        let wired: Vec<_> = dummy
            .vertex_array_attributes(va.handle())
            .into_iter()
            .filter(|(a, _)| a.location >= INSTANCE_LOCATION)
            .collect();
        assert_eq!(wired.len(), 4);
        assert!(wired
            .iter()
            .all(|(a, buffer)| a.divisor == 1 && *buffer == grown));
        assert_eq!(va.attributes().len(), 7);

        match dummy.draw_calls().last() {
            Some(BackendCommand::DrawElements {
                vertex_array, args, ..
            }) => {
                assert_eq!(*vertex_array, Some(va.handle()));
                assert_eq!((args.index_count, args.instance_count), (36, 10));
            }
            other => panic!("expected an instanced draw, got {other:?}"),
        }
    }

    #[test]
    fn test_upload_writes_column_major() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let cube = generators::cube_vertices().upload(&ctx);
        let mut instances = InstanceBuffer::new(&ctx, &cube, 4);
        assert_eq!(instances.capacity(), 4);

        let model = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        instances.upload(&[model]);
        let bytes = instances.buffer().unwrap().read_data(0, MATRIX_SIZE);
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
        assert_eq!(&floats[12..15], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_empty_draw_is_skipped() {
        let (ctx, dummy) = GraphicsContext::headless();
        let command = RenderCommand::new(&ctx);
        let cube = generators::cube_vertices().upload(&ctx);
        let mut instances = InstanceBuffer::new(&ctx, &cube, 0);
        instances.draw(&command, &[]);
        assert!(dummy.draw_calls().is_empty());
        assert!(instances.buffer().is_none());
    }

    #[test]
    fn test_wide_mesh_moves_instance_matrix() {
        let (ctx, dummy) = GraphicsContext::headless();
        let command = RenderCommand::new(&ctx);
        let layout = MeshLayout::pbr();
        let vertices = vec![0u8; 3 * layout.stride() as usize];
        let mesh = Mesh::new(&ctx, MeshSpec::new(&vertices, 3, &[0, 1, 2], layout));
        assert_eq!(mesh.vertex_array().next_location(), 5);

        let mut instances = InstanceBuffer::new(&ctx, &mesh, 0);
        assert_eq!(instances.location(), 5);
        instances.draw(&command, &[Mat4::identity(); 2]);
        instances.draw(&command, &[Mat4::identity(); 8]);

        let va = instances.vertex_array();
        let matrix: Vec<_> = dummy
            .vertex_array_attributes(va.handle())
            .into_iter()
            .filter(|(a, _)| a.divisor == 1)
            .map(|(a, _)| a.location)
            .collect();
        assert_eq!(matrix, vec![5, 6, 7, 8]);
        assert_eq!(va.next_location(), 9);

        match dummy.draw_calls().last() {
            Some(BackendCommand::DrawElements { args, .. }) => {
                assert_eq!(args.instance_count, 8);
            }
            other => panic!("expected an instanced draw, got {other:?}"),
        }
    }

    #[test]
    fn test_narrow_mesh_keeps_default_location() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let cube = generators::cube_vertices().upload(&ctx);
        let instances = InstanceBuffer::new(&ctx, &cube, 1);
        assert_eq!(instances.location(), INSTANCE_LOCATION);
    }
}
