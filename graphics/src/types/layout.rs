//! Vertex buffer layouts.
//!
//! A [`BufferLayout`] describes the shape of one vertex record: an ordered
//! list of named, typed elements with byte offsets derived from declaration
//! order. Matrix elements occupy one attribute location per column.

/// Data type of one layout element or shader attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderDataType {
    Float,
    Float2,
    Float3,
    Float4,
    Mat3,
    Mat4,
    Int,
    Int2,
    Int3,
    Int4,
    Bool,
}

/// Scalar type the GPU reads for an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeBaseType {
    Float,
    Int,
    Bool,
}

impl ShaderDataType {
    /// Size in bytes.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float => 4,
            Self::Float2 => 4 * 2,
            Self::Float3 => 4 * 3,
            Self::Float4 => 4 * 4,
            Self::Mat3 => 4 * 3 * 3,
            Self::Mat4 => 4 * 4 * 4,
            Self::Int => 4,
            Self::Int2 => 4 * 2,
            Self::Int3 => 4 * 3,
            Self::Int4 => 4 * 4,
            Self::Bool => 1,
        }
    }

    /// Components per attribute slot (a mat4 is 4 slots of 4 components).
    pub fn component_count(&self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::Bool => 1,
            Self::Float2 | Self::Int2 => 2,
            Self::Float3 | Self::Int3 | Self::Mat3 => 3,
            Self::Float4 | Self::Int4 | Self::Mat4 => 4,
        }
    }

    /// Attribute locations this type consumes.
    pub fn slot_count(&self) -> u32 {
        match self {
            Self::Mat3 => 3,
            Self::Mat4 => 4,
            _ => 1,
        }
    }

    pub fn base_type(&self) -> AttributeBaseType {
        match self {
            Self::Float | Self::Float2 | Self::Float3 | Self::Float4 | Self::Mat3 | Self::Mat4 => {
                AttributeBaseType::Float
            }
            Self::Int | Self::Int2 | Self::Int3 | Self::Int4 => AttributeBaseType::Int,
            Self::Bool => AttributeBaseType::Bool,
        }
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, Self::Mat3 | Self::Mat4)
    }
}

/// One named element of a [`BufferLayout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferElement {
    pub name: String,
    pub data_type: ShaderDataType,
    pub size: u32,
    pub offset: u32,
    pub normalized: bool,
}

impl BufferElement {
    /// Create an element. The offset is assigned when the layout is built.
    pub fn new(data_type: ShaderDataType, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type,
            size: data_type.size(),
            offset: 0,
            normalized: false,
        }
    }

    /// Mark integer data as normalized to [0, 1] when read as float.
    pub fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }
}

/// Ordered vertex record description with derived offsets and stride.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferLayout {
    elements: Vec<BufferElement>,
    stride: u32,
}

impl BufferLayout {
    /// Build a layout; offsets are the running sum of prior element sizes.
    pub fn new(elements: impl IntoIterator<Item = BufferElement>) -> Self {
        let mut elements: Vec<BufferElement> = elements.into_iter().collect();
        let mut offset = 0;
        for element in &mut elements {
            element.offset = offset;
            offset += element.size;
        }
        Self {
            elements,
            stride: offset,
        }
    }

    /// Shorthand for a layout of non-normalized `(type, name)` pairs.
    pub fn from_pairs(pairs: &[(ShaderDataType, &str)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|&(data_type, name)| BufferElement::new(data_type, name)),
        )
    }

    pub fn elements(&self) -> &[BufferElement] {
        &self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BufferElement> {
        self.elements.iter()
    }

    /// Bytes per vertex record.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Total attribute locations consumed when attached to a vertex array.
    pub fn slot_count(&self) -> u32 {
        self.elements.iter().map(|e| e.data_type.slot_count()).sum()
    }

    /// Find an element by name.
    pub fn element(&self, name: &str) -> Option<&BufferElement> {
        self.elements.iter().find(|e| e.name == name)
    }
}

impl<'a> IntoIterator for &'a BufferLayout {
    type Item = &'a BufferElement;
    type IntoIter = std::slice::Iter<'a, BufferElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// Fully resolved wiring for one attribute location.
///
/// Produced by the vertex array from a layout element; a mat4 element yields
/// four of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttributeBinding {
    pub location: u32,
    pub components: u32,
    pub base_type: AttributeBaseType,
    pub normalized: bool,
    pub stride: u32,
    pub offset: u32,
    /// 0 = per vertex, 1 = per instance.
    pub divisor: u32,
}
