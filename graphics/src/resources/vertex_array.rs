//! Vertex array objects.

use std::rc::Rc;

use crate::backend::VertexArrayHandle;
use crate::context::GraphicsContext;
use crate::types::VertexAttributeBinding;

use super::buffer::{IndexBuffer, VertexBuffer};

struct AttachedBuffer {
    buffer: Rc<VertexBuffer>,
    first_location: u32,
    divisor: u32,
}

/// Wires vertex buffers to attribute locations and owns one index buffer.
///
/// Buffers are attached at the next free location unless pinned; a pinned
/// location may never reach back into locations already wired. Matrix
/// elements consume one location per column.
pub struct VertexArray {
    ctx: GraphicsContext,
    handle: VertexArrayHandle,
    vertex_buffers: Vec<AttachedBuffer>,
    index_buffer: Option<Rc<IndexBuffer>>,
    attributes: Vec<VertexAttributeBinding>,
    next_location: u32,
}

impl VertexArray {
    pub fn new(ctx: &GraphicsContext) -> Self {
        Self {
            ctx: ctx.clone(),
            handle: ctx.backend().create_vertex_array(),
            vertex_buffers: Vec::new(),
            index_buffer: None,
            attributes: Vec::new(),
            next_location: 0,
        }
    }

    pub fn bind(&self) {
        self.ctx.bind_vertex_array(Some(self.handle));
    }

    pub fn unbind(&self) {
        self.ctx.bind_vertex_array(None);
    }

    /// Attach a per-vertex buffer at the next free location.
    pub fn add_vertex_buffer(&mut self, buffer: Rc<VertexBuffer>) {
        let location = self.next_location;
        self.attach(buffer, location, 0);
    }

    /// Attach a per-vertex buffer starting at `location`.
    ///
    /// # Panics
    ///
    /// Panics if `location` is below the next free location.
    pub fn add_vertex_buffer_at(&mut self, buffer: Rc<VertexBuffer>, location: u32) {
        self.attach(buffer, location, 0);
    }

    /// Attach a per-instance buffer (divisor 1) at the next free location.
    pub fn add_instance_buffer(&mut self, buffer: Rc<VertexBuffer>) {
        let location = self.next_location;
        self.attach(buffer, location, 1);
    }

    /// Attach a per-instance buffer (divisor 1) starting at `location`.
    pub fn add_instance_buffer_at(&mut self, buffer: Rc<VertexBuffer>, location: u32) {
        self.attach(buffer, location, 1);
    }

    /// Swap the buffer at attachment `index`, re-wiring the same locations.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or the new layout consumes a
    /// different number of locations.
    pub fn replace_vertex_buffer(&mut self, index: usize, buffer: Rc<VertexBuffer>) {
        let count = self.vertex_buffers.len();
        let Some(slot) = self.vertex_buffers.get(index) else {
            panic!("Vertex buffer index {index} out of range ({count} attached)");
        };
        let (first, divisor) = (slot.first_location, slot.divisor);
        let old_slots = slot.buffer.layout().slot_count();
        assert_eq!(
            buffer.layout().slot_count(),
            old_slots,
            "Replacement vertex buffer must consume the same attribute locations"
        );

        self.attributes
            .retain(|a| a.location < first || a.location >= first + old_slots);
        self.wire(&buffer, first, divisor);
        self.vertex_buffers[index] = AttachedBuffer {
            buffer,
            first_location: first,
            divisor,
        };
    }

    /// Attach the index buffer, replacing any previous one.
    pub fn set_index_buffer(&mut self, buffer: Rc<IndexBuffer>) {
        self.bind();
        buffer.bind();
        self.index_buffer = Some(buffer);
    }

    pub fn index_buffer(&self) -> Option<&Rc<IndexBuffer>> {
        self.index_buffer.as_ref()
    }

    /// Attached vertex buffers in attachment order.
    pub fn vertex_buffers(&self) -> impl Iterator<Item = &Rc<VertexBuffer>> + '_ {
        self.vertex_buffers.iter().map(|a| &a.buffer)
    }

    /// Resolved attribute table, one entry per wired location.
    pub fn attributes(&self) -> &[VertexAttributeBinding] {
        &self.attributes
    }

    /// First location not yet wired.
    pub fn next_location(&self) -> u32 {
        self.next_location
    }

    pub fn handle(&self) -> VertexArrayHandle {
        self.handle
    }

    fn attach(&mut self, buffer: Rc<VertexBuffer>, location: u32, divisor: u32) {
        assert!(
            location >= self.next_location,
            "Attribute location {location} overlaps wired locations (next free is {})",
            self.next_location
        );
        self.wire(&buffer, location, divisor);
        self.next_location = location + buffer.layout().slot_count();
        self.vertex_buffers.push(AttachedBuffer {
            buffer,
            first_location: location,
            divisor,
        });
    }

    fn wire(&mut self, buffer: &VertexBuffer, first_location: u32, divisor: u32) {
        let layout = buffer.layout();
        assert!(!layout.is_empty(), "Vertex Buffer has no layout!");

        self.bind();
        buffer.bind();

        let mut location = first_location;
        for element in layout {
            let data_type = element.data_type;
            let components = data_type.component_count();
            for slot in 0..data_type.slot_count() {
                let binding = VertexAttributeBinding {
                    location,
                    components,
                    base_type: data_type.base_type(),
                    normalized: element.normalized,
                    stride: layout.stride(),
                    offset: element.offset + 4 * components * slot,
                    divisor,
                };
                self.ctx.backend().enable_vertex_attribute(&binding);
                self.attributes.push(binding);
                location += 1;
            }
        }
        self.attributes.sort_by_key(|a| a.location);
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        self.ctx.destroy_vertex_array(self.handle);
    }
}

impl std::fmt::Debug for VertexArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexArray")
            .field("handle", &self.handle)
            .field("vertex_buffers", &self.vertex_buffers.len())
            .field("index_count", &self.index_buffer.as_ref().map(|ib| ib.count()))
            .field("next_location", &self.next_location)
            .finish()
    }
}

static_assertions::assert_not_impl_any!(VertexArray: Send, Sync);

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::types::{AttributeBaseType, BufferLayout, ShaderDataType};

    fn buffer(ctx: &GraphicsContext, pairs: &[(ShaderDataType, &str)]) -> Rc<VertexBuffer> {
        let mut vb = VertexBuffer::with_capacity(ctx, 256);
        vb.set_layout(BufferLayout::from_pairs(pairs));
        Rc::new(vb)
    }

    #[test]
    fn test_consecutive_locations() {
        let (ctx, dummy) = GraphicsContext::headless();
        let mut va = VertexArray::new(&ctx);
        va.add_vertex_buffer(buffer(
            &ctx,
            &[(ShaderDataType::Float3, "a_Position"), (ShaderDataType::Float2, "a_TexCoord")],
        ));
        va.add_vertex_buffer(buffer(&ctx, &[(ShaderDataType::Int, "a_EntityId")]));

        let locations: Vec<u32> = va.attributes().iter().map(|a| a.location).collect();
        assert_eq!(locations, vec![0, 1, 2]);
        assert_eq!(va.next_location(), 3);
        assert_eq!(va.attributes()[1].offset, 12);
        assert_eq!(va.attributes()[2].base_type, AttributeBaseType::Int);
        assert_eq!(dummy.vertex_array_attributes(va.handle()).len(), 3);
    }

    #[test]
    fn test_mat4_consumes_four_locations() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let mut va = VertexArray::new(&ctx);
        va.add_vertex_buffer(buffer(&ctx, &[(ShaderDataType::Float3, "a_Position")]));
        va.add_instance_buffer(buffer(&ctx, &[(ShaderDataType::Mat4, "a_Transform")]));

        let rows: Vec<(u32, u32, u32, u32)> = va.attributes()[1..]
            .iter()
            .map(|a| (a.location, a.offset, a.stride, a.divisor))
            .collect();
        assert_eq!(
            rows,
            vec![(1, 0, 64, 1), (2, 16, 64, 1), (3, 32, 64, 1), (4, 48, 64, 1)]
        );
    }

    #[test]
    fn test_pinned_location() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let mut va = VertexArray::new(&ctx);
        va.add_vertex_buffer(buffer(&ctx, &[(ShaderDataType::Float3, "a_Position")]));
        va.add_instance_buffer_at(buffer(&ctx, &[(ShaderDataType::Mat4, "a_Model")]), 3);
        assert_eq!(va.attributes()[1].location, 3);
        assert_eq!(va.next_location(), 7);
    }

    #[test]
    #[should_panic(expected = "overlaps wired locations")]
    fn test_pinned_location_conflict_panics() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let mut va = VertexArray::new(&ctx);
        va.add_vertex_buffer(buffer(
            &ctx,
            &[(ShaderDataType::Float3, "a_Position"), (ShaderDataType::Float3, "a_Normal")],
        ));
        va.add_vertex_buffer_at(buffer(&ctx, &[(ShaderDataType::Float2, "a_Uv")]), 1);
    }

    #[test]
    #[should_panic(expected = "Vertex Buffer has no layout!")]
    fn test_empty_layout_panics() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let mut va = VertexArray::new(&ctx);
        va.add_vertex_buffer(Rc::new(VertexBuffer::with_capacity(&ctx, 16)));
    }

    #[test]
    fn test_index_buffer_attaches_to_array() {
        let (ctx, dummy) = GraphicsContext::headless();
        let mut va = VertexArray::new(&ctx);
        let ib = Rc::new(IndexBuffer::new(&ctx, &[0, 1, 2]));
        va.set_index_buffer(ib.clone());
        assert_eq!(dummy.vertex_array_index_buffer(va.handle()), Some(ib.handle()));
        assert_eq!(va.index_buffer().map(|ib| ib.count()), Some(3));
    }

    #[test]
    fn test_replace_rewires_same_locations() {
        let (ctx, dummy) = GraphicsContext::headless();
        let mut va = VertexArray::new(&ctx);
        va.add_vertex_buffer(buffer(&ctx, &[(ShaderDataType::Float3, "a_Position")]));
        va.add_instance_buffer_at(buffer(&ctx, &[(ShaderDataType::Mat4, "a_Model")]), 3);

        let replacement = buffer(&ctx, &[(ShaderDataType::Mat4, "a_Model")]);
        va.replace_vertex_buffer(1, replacement.clone());

        assert_eq!(va.attributes().len(), 5);
        assert_eq!(va.next_location(), 7);
        let wired: Vec<_> = dummy
            .vertex_array_attributes(va.handle())
            .into_iter()
            .filter(|(binding, _)| binding.location >= 3)
            .map(|(_, buffer)| buffer)
            .collect();
        assert_eq!(wired, vec![replacement.handle(); 4]);
    }
}
