//! GPU buffer resources.
//!
//! All three buffer kinds have a fixed capacity chosen at creation. Writes
//! past the end are programming errors and panic.

use crate::backend::BufferHandle;
use crate::context::GraphicsContext;
use crate::types::{BufferDescriptor, BufferLayout, BufferTarget, BufferUsage};

fn check_bounds(kind: &str, capacity: usize, offset: usize, size: usize) {
    assert!(
        offset
            .checked_add(size)
            .is_some_and(|end| end <= capacity),
        "Trying to write out of bounds! {kind} capacity {capacity}, write of {size} bytes at offset {offset}"
    );
}

// ============================================================================
// VertexBuffer
// ============================================================================

/// A vertex buffer with an attached [`BufferLayout`].
///
/// # Example
///
/// ```ignore
/// let mut vb = VertexBuffer::from_slice(&ctx, &positions);
/// vb.set_layout(BufferLayout::from_pairs(&[(ShaderDataType::Float3, "a_Position")]));
/// vertex_array.add_vertex_buffer(Rc::new(vb));
/// ```
pub struct VertexBuffer {
    ctx: GraphicsContext,
    handle: BufferHandle,
    size: usize,
    layout: BufferLayout,
}

impl VertexBuffer {
    /// Uninitialised buffer of `size` bytes for contents that change often.
    pub fn with_capacity(ctx: &GraphicsContext, size: usize) -> Self {
        let descriptor = BufferDescriptor::new(size as u64, BufferUsage::VERTEX | BufferUsage::DYNAMIC);
        Self::create(ctx, &descriptor, None)
    }

    /// Buffer initialised with `data` for contents that rarely change.
    pub fn with_data(ctx: &GraphicsContext, data: &[u8]) -> Self {
        let descriptor = BufferDescriptor::new(data.len() as u64, BufferUsage::VERTEX);
        Self::create(ctx, &descriptor, Some(data))
    }

    /// [`with_data`](Self::with_data) over any plain-old-data slice.
    pub fn from_slice<T: bytemuck::Pod>(ctx: &GraphicsContext, data: &[T]) -> Self {
        Self::with_data(ctx, bytemuck::cast_slice(data))
    }

    fn create(ctx: &GraphicsContext, descriptor: &BufferDescriptor, data: Option<&[u8]>) -> Self {
        let handle = ctx.backend().create_buffer(descriptor, data);
        Self {
            ctx: ctx.clone(),
            handle,
            size: descriptor.size as usize,
            layout: BufferLayout::default(),
        }
    }

    /// Overwrite `data.len()` bytes starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the write extends past the buffer's capacity.
    pub fn set_data(&self, data: &[u8], offset: usize) {
        check_bounds("vertex buffer", self.size, offset, data.len());
        self.ctx
            .backend()
            .write_buffer(BufferTarget::Vertex, self.handle, offset, data);
    }

    /// Read back `size` bytes at `offset`. Stalls the pipeline.
    pub fn read_data(&self, offset: usize, size: usize) -> Vec<u8> {
        self.ctx
            .backend()
            .read_buffer(BufferTarget::Vertex, self.handle, offset, size)
    }

    pub fn set_layout(&mut self, layout: BufferLayout) {
        self.layout = layout;
    }

    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    /// Capacity in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn bind(&self) {
        self.ctx.bind_buffer(BufferTarget::Vertex, Some(self.handle));
    }

    pub fn unbind(&self) {
        self.ctx.bind_buffer(BufferTarget::Vertex, None);
    }
}

impl Drop for VertexBuffer {
    fn drop(&mut self) {
        self.ctx.destroy_buffer(self.handle);
    }
}

impl std::fmt::Debug for VertexBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexBuffer")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .field("stride", &self.layout.stride())
            .finish()
    }
}

// ============================================================================
// IndexBuffer
// ============================================================================

/// A buffer of `u32` indices.
pub struct IndexBuffer {
    ctx: GraphicsContext,
    handle: BufferHandle,
    count: u32,
}

impl IndexBuffer {
    pub fn new(ctx: &GraphicsContext, indices: &[u32]) -> Self {
        let data: &[u8] = bytemuck::cast_slice(indices);
        let descriptor = BufferDescriptor::new(data.len() as u64, BufferUsage::INDEX);
        let handle = ctx.backend().create_buffer(&descriptor, Some(data));
        Self {
            ctx: ctx.clone(),
            handle,
            count: indices.len() as u32,
        }
    }

    /// Overwrite indices starting at index `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the write extends past the buffer's capacity.
    pub fn set_data(&self, indices: &[u32], offset: usize) {
        let byte_offset = offset * std::mem::size_of::<u32>();
        let data: &[u8] = bytemuck::cast_slice(indices);
        check_bounds("index buffer", self.size(), byte_offset, data.len());
        self.ctx
            .backend()
            .write_buffer(BufferTarget::Index, self.handle, byte_offset, data);
    }

    /// Read back `count` indices starting at index `offset`.
    pub fn read_data(&self, offset: usize, count: usize) -> Vec<u32> {
        let bytes = self.ctx.backend().read_buffer(
            BufferTarget::Index,
            self.handle,
            offset * std::mem::size_of::<u32>(),
            count * std::mem::size_of::<u32>(),
        );
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Number of indices.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Capacity in bytes.
    pub fn size(&self) -> usize {
        self.count as usize * std::mem::size_of::<u32>()
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Bind to the element target. Attaches to the bound vertex array, if any.
    pub fn bind(&self) {
        self.ctx.bind_buffer(BufferTarget::Index, Some(self.handle));
    }

    /// Detaches from the bound vertex array, if any.
    pub fn unbind(&self) {
        self.ctx.bind_buffer(BufferTarget::Index, None);
    }
}

impl Drop for IndexBuffer {
    fn drop(&mut self) {
        self.ctx.destroy_buffer(self.handle);
    }
}

impl std::fmt::Debug for IndexBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuffer")
            .field("handle", &self.handle)
            .field("count", &self.count)
            .finish()
    }
}

// ============================================================================
// UniformBuffer
// ============================================================================

/// A uniform block buffer attached to a fixed binding point.
pub struct UniformBuffer {
    ctx: GraphicsContext,
    handle: BufferHandle,
    size: usize,
    binding: u32,
}

impl UniformBuffer {
    /// Create a `size`-byte buffer and attach it to `binding`.
    pub fn new(ctx: &GraphicsContext, size: usize, binding: u32) -> Self {
        let descriptor = BufferDescriptor::new(size as u64, BufferUsage::UNIFORM | BufferUsage::DYNAMIC);
        let handle = ctx.backend().create_buffer(&descriptor, None);
        ctx.bind_uniform_buffer_base(handle, binding);
        Self {
            ctx: ctx.clone(),
            handle,
            size,
            binding,
        }
    }

    /// # Panics
    ///
    /// Panics if the write extends past the buffer's capacity.
    pub fn set_data(&self, data: &[u8], offset: usize) {
        check_bounds("uniform buffer", self.size, offset, data.len());
        self.ctx
            .backend()
            .write_buffer(BufferTarget::Uniform, self.handle, offset, data);
    }

    pub fn read_data(&self, offset: usize, size: usize) -> Vec<u8> {
        self.ctx
            .backend()
            .read_buffer(BufferTarget::Uniform, self.handle, offset, size)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn binding(&self) -> u32 {
        self.binding
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }
}

impl Drop for UniformBuffer {
    fn drop(&mut self) {
        self.ctx.destroy_buffer(self.handle);
    }
}

impl std::fmt::Debug for UniformBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniformBuffer")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .field("binding", &self.binding)
            .finish()
    }
}

static_assertions::assert_not_impl_any!(VertexBuffer: Send, Sync);
static_assertions::assert_not_impl_any!(IndexBuffer: Send, Sync);
static_assertions::assert_not_impl_any!(UniformBuffer: Send, Sync);

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::dummy::BackendCommand;
    use crate::types::ShaderDataType;

    #[test]
    fn test_vertex_buffer_usage() {
        let (ctx, dummy) = GraphicsContext::headless();
        let _dynamic = VertexBuffer::with_capacity(&ctx, 64);
        let _static = VertexBuffer::from_slice(&ctx, &[1.0f32, 2.0, 3.0]);

        let dynamic_flags: Vec<bool> = dummy
            .commands()
            .iter()
            .filter_map(|c| match c {
                BackendCommand::CreateBuffer { dynamic, .. } => Some(*dynamic),
                _ => None,
            })
            .collect();
        assert_eq!(dynamic_flags, vec![true, false]);
    }

    #[test]
    fn test_set_data_roundtrip() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let vb = VertexBuffer::with_capacity(&ctx, 16);
        vb.set_data(&[9, 8, 7, 6], 12);
        assert_eq!(vb.read_data(12, 4), vec![9, 8, 7, 6]);
    }

    #[test]
    fn test_set_data_at_exact_end() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let ub = UniformBuffer::new(&ctx, 8, 0);
        ub.set_data(&[1; 8], 0);
        ub.set_data(&[2; 4], 4);
        assert_eq!(ub.read_data(0, 8), vec![1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    #[should_panic(expected = "Trying to write out of bounds!")]
    fn test_set_data_overflow_panics() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let vb = VertexBuffer::with_capacity(&ctx, 16);
        vb.set_data(&[0; 8], 12);
    }

    #[test]
    #[should_panic(expected = "Trying to write out of bounds!")]
    fn test_index_overflow_panics() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let ib = IndexBuffer::new(&ctx, &[0, 1, 2]);
        ib.set_data(&[3, 4], 2);
    }

    #[test]
    fn test_index_buffer_count_and_readback() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let ib = IndexBuffer::new(&ctx, &[0, 1, 2, 2, 3, 0]);
        assert_eq!(ib.count(), 6);
        ib.set_data(&[7], 5);
        assert_eq!(ib.read_data(3, 3), vec![2, 3, 7]);
    }

    #[test]
    fn test_uniform_buffer_binding() {
        let (ctx, _dummy) = GraphicsContext::headless();
        let ub = UniformBuffer::new(&ctx, 144, 0);
        assert_eq!(ctx.bindings().uniform_buffers.get(&0), Some(&ub.handle()));
    }

    #[test]
    fn test_drop_releases_buffer() {
        let (ctx, dummy) = GraphicsContext::headless();
        {
            let mut vb = VertexBuffer::with_capacity(&ctx, 16);
            vb.set_layout(BufferLayout::from_pairs(&[(ShaderDataType::Float4, "a_Color")]));
            assert_eq!(vb.layout().stride(), 16);
            assert_eq!(dummy.live_buffers(), 1);
        }
        assert_eq!(dummy.live_buffers(), 0);
    }
}
