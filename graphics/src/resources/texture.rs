//! Sampled textures: [`Texture2D`] and [`TextureCube`].
//!
//! Images are decoded with the `image` crate. A texture created from a spec
//! has storage but no contents; [`Texture2D::is_loaded`] stays false until
//! pixels are committed with [`Texture2D::set_data`].

use std::cell::Cell;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::backend::TextureHandle;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::types::{
    CubeFace, ImageFormat, TextureDescriptor, TextureFormat, TextureKind, TextureSpec, TextureWrap,
};

/// Decoded pixels ready for upload.
struct DecodedImage {
    width: u32,
    height: u32,
    format: ImageFormat,
    pixels: Vec<u8>,
}

impl DecodedImage {
    fn from_dynamic(image: DynamicImage, hdr: bool) -> Self {
        let (width, height) = (image.width(), image.height());
        if hdr {
            let pixels = image.to_rgba32f().into_raw();
            return Self {
                width,
                height,
                format: ImageFormat::Rgba16F,
                pixels: bytemuck::cast_slice(&pixels).to_vec(),
            };
        }
        match image.color().channel_count() {
            3 => Self {
                width,
                height,
                format: ImageFormat::Rgb8,
                pixels: image.to_rgb8().into_raw(),
            },
            _ => Self {
                width,
                height,
                format: ImageFormat::Rgba8,
                pixels: image.to_rgba8().into_raw(),
            },
        }
    }

    fn decode(bytes: &[u8], flip: bool) -> Result<Self, GraphicsError> {
        let hdr = matches!(image::guess_format(bytes), Ok(image::ImageFormat::Hdr));
        let mut image = image::load_from_memory(bytes)?;
        if flip {
            image = image.flipv();
        }
        Ok(Self::from_dynamic(image, hdr))
    }
}

// ============================================================================
// Texture2D
// ============================================================================

/// A 2D texture.
pub struct Texture2D {
    ctx: GraphicsContext,
    handle: TextureHandle,
    spec: TextureSpec,
    path: Option<PathBuf>,
    loaded: Cell<bool>,
}

impl Texture2D {
    /// Allocate an empty texture. Not loaded until [`set_data`](Self::set_data).
    pub fn from_spec(ctx: &GraphicsContext, spec: TextureSpec) -> Self {
        let mut spec = spec;
        if spec.format == ImageFormat::None {
            log::warn!("Texture spec without a format, using RGBA8");
            spec.format = ImageFormat::Rgba8;
        }
        let format = spec.format.texture_format().unwrap_or(TextureFormat::Rgba8);
        let descriptor = TextureDescriptor::new_2d(spec.width, spec.height, format)
            .with_wrap(spec.wrap)
            .with_mips(spec.generate_mips);
        Self {
            ctx: ctx.clone(),
            handle: ctx.backend().create_texture(&descriptor),
            spec,
            path: None,
            loaded: Cell::new(false),
        }
    }

    /// Decode an image file. HDR files become RGBA16F textures.
    pub fn from_file(
        ctx: &GraphicsContext,
        path: impl AsRef<Path>,
        flip: bool,
    ) -> Result<Self, GraphicsError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| GraphicsError::Io(format!("{}: {e}", path.display())))?;
        let decoded = DecodedImage::decode(&bytes, flip)?;
        let mut texture = Self::from_decoded(ctx, decoded, TextureWrap::Repeat);
        texture.path = Some(path.to_path_buf());
        Ok(texture)
    }

    /// Decode an encoded image held in memory.
    ///
    /// The format follows the channel count: 4 → RGBA8, 3 → RGB8, anything
    /// else is expanded to RGBA8.
    pub fn from_memory(ctx: &GraphicsContext, bytes: &[u8]) -> Result<Self, GraphicsError> {
        let decoded = DecodedImage::decode(bytes, false)?;
        Ok(Self::from_decoded(ctx, decoded, TextureWrap::Repeat))
    }

    fn from_decoded(ctx: &GraphicsContext, decoded: DecodedImage, wrap: TextureWrap) -> Self {
        let spec = TextureSpec::new(decoded.width, decoded.height)
            .with_format(decoded.format)
            .with_wrap(wrap);
        let texture = Self::from_spec(ctx, spec);
        texture.set_data(&decoded.pixels);
        texture
    }

    /// 2×2 magenta/black checker used when a texture is missing.
    pub fn error_texture(ctx: &GraphicsContext) -> Self {
        const MAGENTA: [u8; 4] = [255, 0, 255, 255];
        const BLACK: [u8; 4] = [0, 0, 0, 255];
        let spec = TextureSpec::new(2, 2).with_mips(false);
        let texture = Self::from_spec(ctx, spec);
        texture.set_data(&[MAGENTA, BLACK, BLACK, MAGENTA].concat());
        texture
    }

    /// Replace the whole image.
    ///
    /// # Panics
    ///
    /// Panics unless `data` covers exactly width × height × bytes-per-pixel.
    pub fn set_data(&self, data: &[u8]) {
        assert_eq!(
            data.len(),
            self.spec.data_size(),
            "Data must be entire texture!"
        );
        self.ctx.backend().upload_texture(self.handle, None, data);
        if self.spec.generate_mips {
            self.ctx.backend().generate_mipmaps(self.handle);
        }
        self.loaded.set(true);
    }

    /// [`set_data`](Self::set_data) for float formats.
    pub fn set_data_f32(&self, data: &[f32]) {
        self.set_data(bytemuck::cast_slice(data));
    }

    pub fn bind(&self, slot: u32) {
        self.ctx.bind_texture(slot, TextureKind::D2, Some(self.handle));
    }

    pub fn width(&self) -> u32 {
        self.spec.width
    }

    pub fn height(&self) -> u32 {
        self.spec.height
    }

    pub fn format(&self) -> ImageFormat {
        self.spec.format
    }

    pub fn spec(&self) -> &TextureSpec {
        &self.spec
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    /// Source file, for textures loaded from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn renderer_id(&self) -> TextureHandle {
        self.handle
    }
}

impl Drop for Texture2D {
    fn drop(&mut self) {
        self.ctx.destroy_texture(self.handle);
    }
}

impl std::fmt::Debug for Texture2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture2D")
            .field("handle", &self.handle)
            .field("size", &(self.spec.width, self.spec.height))
            .field("format", &self.spec.format)
            .field("loaded", &self.loaded.get())
            .field("path", &self.path)
            .finish()
    }
}

// ============================================================================
// TextureCube
// ============================================================================

/// Split a 4×3 horizontal-cross image into six faces in [`CubeFace::ALL`] order.
///
/// The face size is `width / 4`.
pub fn extract_cross_faces(
    pixels: &[u8],
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
) -> Result<[Vec<u8>; 6], GraphicsError> {
    let face = width / 4;
    if face == 0 || height < face * 3 {
        return Err(GraphicsError::InvalidParameter(format!(
            "{width}x{height} image is not a 4x3 cube cross"
        )));
    }
    let (face, width, bpp) = (face as usize, width as usize, bytes_per_pixel as usize);
    if pixels.len() < width * height as usize * bpp {
        return Err(GraphicsError::InvalidParameter(
            "cube cross pixel data is truncated".to_string(),
        ));
    }

    Ok(CubeFace::ALL.map(|f| {
        let (cx, cy) = f.cross_cell();
        let mut out = Vec::with_capacity(face * face * bpp);
        for y in 0..face {
            let row_start = ((cy as usize * face + y) * width + cx as usize * face) * bpp;
            out.extend_from_slice(&pixels[row_start..row_start + face * bpp]);
        }
        out
    }))
}

/// A cube map built from a horizontal-cross image.
pub struct TextureCube {
    ctx: GraphicsContext,
    handle: TextureHandle,
    face_size: u32,
    format: ImageFormat,
    path: Option<PathBuf>,
}

impl TextureCube {
    pub fn from_file(ctx: &GraphicsContext, path: impl AsRef<Path>) -> Result<Self, GraphicsError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| GraphicsError::Io(format!("{}: {e}", path.display())))?;
        let mut cube = Self::from_memory(ctx, &bytes).inspect_err(|e| {
            log::error!("Cubemap load failed: {}: {e}", path.display());
        })?;
        cube.path = Some(path.to_path_buf());
        Ok(cube)
    }

    pub fn from_memory(ctx: &GraphicsContext, bytes: &[u8]) -> Result<Self, GraphicsError> {
        let image = image::load_from_memory(bytes)?;
        let decoded = DecodedImage::from_dynamic(image, false);
        let faces = extract_cross_faces(
            &decoded.pixels,
            decoded.width,
            decoded.height,
            decoded.format.bytes_per_pixel(),
        )?;
        log::debug!(
            "Loading cubemap: {}x{}, face size: {}",
            decoded.width,
            decoded.height,
            decoded.width / 4
        );
        Ok(Self::from_faces(ctx, decoded.width / 4, decoded.format, &faces))
    }

    /// Build from six face images in [`CubeFace::ALL`] order.
    ///
    /// # Panics
    ///
    /// Panics if a face is not `face_size² × bytes-per-pixel` bytes.
    pub fn from_faces(
        ctx: &GraphicsContext,
        face_size: u32,
        format: ImageFormat,
        faces: &[Vec<u8>; 6],
    ) -> Self {
        let texture_format = format.texture_format().unwrap_or(TextureFormat::Rgba8);
        let descriptor = TextureDescriptor::new_cube(face_size, texture_format);
        let handle = ctx.backend().create_texture(&descriptor);
        for (face, data) in CubeFace::ALL.iter().zip(faces) {
            assert_eq!(data.len(), descriptor.face_size(), "Data must be entire face!");
            ctx.backend().upload_texture(handle, Some(*face), data);
        }
        Self {
            ctx: ctx.clone(),
            handle,
            face_size,
            format,
            path: None,
        }
    }

    pub fn bind(&self, slot: u32) {
        self.ctx
            .bind_texture(slot, TextureKind::Cube, Some(self.handle));
    }

    pub fn face_size(&self) -> u32 {
        self.face_size
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn renderer_id(&self) -> TextureHandle {
        self.handle
    }
}

impl Drop for TextureCube {
    fn drop(&mut self) {
        self.ctx.destroy_texture(self.handle);
    }
}

impl std::fmt::Debug for TextureCube {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureCube")
            .field("handle", &self.handle)
            .field("face_size", &self.face_size)
            .field("format", &self.format)
            .finish()
    }
}

static_assertions::assert_not_impl_any!(Texture2D: Send, Sync);
static_assertions::assert_not_impl_any!(TextureCube: Send, Sync);
