//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Contents are rewritten often (maps to `GL_DYNAMIC_DRAW`).
        const DYNAMIC = 1 << 3;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Binding target a buffer is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
    Uniform,
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Binding target implied by the usage flags.
    ///
    /// Index wins over uniform, uniform over vertex.
    pub fn target(&self) -> BufferTarget {
        if self.usage.contains(BufferUsage::INDEX) {
            BufferTarget::Index
        } else if self.usage.contains(BufferUsage::UNIFORM) {
            BufferTarget::Uniform
        } else {
            BufferTarget::Vertex
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.usage.contains(BufferUsage::DYNAMIC)
    }
}

/// Arguments of one indexed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawIndexedArgs {
    /// Number of indices to read.
    pub index_count: u32,
    /// Byte offset of the first index in the bound index buffer.
    pub index_byte_offset: usize,
    /// Value added to every fetched index before vertex lookup.
    pub base_vertex: i32,
    /// 1 for a regular draw.
    pub instance_count: u32,
}
