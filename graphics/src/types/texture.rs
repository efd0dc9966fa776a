//! Texture types and descriptors.

/// GPU storage format of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// 8-bit RGB, unsigned normalized.
    Rgb8,
    /// 8-bit RGBA, unsigned normalized.
    #[default]
    Rgba8,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float RGBA.
    Rgba32Float,
    /// Single 32-bit signed integer channel (entity/picking ids).
    R32Sint,
    /// 24-bit depth with 8-bit stencil.
    Depth24Stencil8,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(self, Self::Depth24Stencil8)
    }

    /// Returns true if this format stores integers.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::R32Sint)
    }

    /// Returns true if uploads to this format are `f32` texels.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Rgba16Float | Self::Rgba32Float)
    }

    /// Bytes per texel as uploaded from the CPU.
    ///
    /// Float formats are always uploaded as `f32` components.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 | Self::R32Sint | Self::Depth24Stencil8 => 4,
            Self::Rgba16Float | Self::Rgba32Float => 16,
        }
    }
}

/// Pixel format of a sampled image texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    None,
    Rgb8,
    #[default]
    Rgba8,
    Rgba16F,
    Rgba32F,
}

impl ImageFormat {
    /// Storage format, or `None` for [`ImageFormat::None`].
    pub fn texture_format(&self) -> Option<TextureFormat> {
        match self {
            Self::None => None,
            Self::Rgb8 => Some(TextureFormat::Rgb8),
            Self::Rgba8 => Some(TextureFormat::Rgba8),
            Self::Rgba16F => Some(TextureFormat::Rgba16Float),
            Self::Rgba32F => Some(TextureFormat::Rgba32Float),
        }
    }

    /// Bytes per pixel of CPU-side data for this format.
    pub fn bytes_per_pixel(&self) -> u32 {
        self.texture_format().map_or(0, |f| f.bytes_per_pixel())
    }
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureWrap {
    #[default]
    Repeat,
    ClampToEdge,
}

/// Texture dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    Cube,
}

/// One face of a cube texture, in GL target order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    /// All faces in GL target order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Face position `(column, row)` in a 4x3 horizontal-cross image.
    pub fn cross_cell(&self) -> (u32, u32) {
        match self {
            Self::PositiveX => (2, 1),
            Self::NegativeX => (0, 1),
            Self::PositiveY => (1, 0),
            Self::NegativeY => (1, 2),
            Self::PositiveZ => (1, 1),
            Self::NegativeZ => (3, 1),
        }
    }

    /// Index in [`CubeFace::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// User-facing texture creation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSpec {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub generate_mips: bool,
    pub wrap: TextureWrap,
}

impl Default for TextureSpec {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            format: ImageFormat::Rgba8,
            generate_mips: true,
            wrap: TextureWrap::Repeat,
        }
    }
}

impl TextureSpec {
    /// Create a spec of the given size with default format and sampling.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_wrap(mut self, wrap: TextureWrap) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn with_mips(mut self, generate_mips: bool) -> Self {
        self.generate_mips = generate_mips;
        self
    }

    /// Size in bytes of a full image of this spec.
    pub fn data_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel() as usize
    }
}

/// Backend-level texture allocation descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub wrap: TextureWrap,
    /// Linear filtering (`false` = nearest).
    pub linear: bool,
    pub mipmapped: bool,
}

impl TextureDescriptor {
    /// Create a 2D descriptor with linear filtering and no mips.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            kind: TextureKind::D2,
            width,
            height,
            format,
            wrap: TextureWrap::Repeat,
            linear: true,
            mipmapped: false,
        }
    }

    /// Create a cube descriptor; `size` is the edge length of one face.
    pub fn new_cube(size: u32, format: TextureFormat) -> Self {
        Self {
            kind: TextureKind::Cube,
            wrap: TextureWrap::ClampToEdge,
            ..Self::new_2d(size, size, format)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_wrap(mut self, wrap: TextureWrap) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn with_linear(mut self, linear: bool) -> Self {
        self.linear = linear;
        self
    }

    pub fn with_mips(mut self, mipmapped: bool) -> Self {
        self.mipmapped = mipmapped;
        self
    }

    /// Bytes in one full face/image.
    pub fn face_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel() as usize
    }
}

/// Framebuffer attachment format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferTextureFormat {
    Rgba8,
    Rgba16F,
    Rgba32F,
    Rgb8,
    RedInteger,
    Depth24Stencil8,
}

impl FramebufferTextureFormat {
    /// Alias used by shadow-map setups.
    pub const DEPTH: Self = Self::Depth24Stencil8;

    pub fn is_depth(&self) -> bool {
        matches!(self, Self::Depth24Stencil8)
    }

    pub fn texture_format(&self) -> TextureFormat {
        match self {
            Self::Rgba8 => TextureFormat::Rgba8,
            Self::Rgba16F => TextureFormat::Rgba16Float,
            Self::Rgba32F => TextureFormat::Rgba32Float,
            Self::Rgb8 => TextureFormat::Rgb8,
            Self::RedInteger => TextureFormat::R32Sint,
            Self::Depth24Stencil8 => TextureFormat::Depth24Stencil8,
        }
    }
}
