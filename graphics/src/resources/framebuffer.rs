//! Off-screen framebuffers.

use crate::backend::{FramebufferAttachment, FramebufferHandle, TextureHandle};
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::types::{FramebufferTextureFormat, TextureDescriptor, TextureKind, TextureWrap};

/// Largest edge a framebuffer may be resized to.
pub const MAX_FRAMEBUFFER_SIZE: u32 = 8192;

/// Framebuffer creation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferSpec {
    pub width: u32,
    pub height: u32,
    /// Attachment formats in order; colour attachments are numbered in the
    /// order they appear, at most one depth format is used.
    pub attachments: Vec<FramebufferTextureFormat>,
    pub samples: u32,
    /// Whether this stands in for the default framebuffer.
    pub swap_chain_target: bool,
}

impl FramebufferSpec {
    pub fn new(
        width: u32,
        height: u32,
        attachments: impl IntoIterator<Item = FramebufferTextureFormat>,
    ) -> Self {
        Self {
            width,
            height,
            attachments: attachments.into_iter().collect(),
            samples: 1,
            swap_chain_target: false,
        }
    }
}

/// A framebuffer with colour attachments and an optional depth-stencil attachment.
///
/// All attachments share the framebuffer's dimensions; resizing recreates
/// every attachment with the same formats.
pub struct FrameBuffer {
    ctx: GraphicsContext,
    spec: FramebufferSpec,
    handle: FramebufferHandle,
    color_attachments: Vec<TextureHandle>,
    depth_attachment: Option<TextureHandle>,
}

impl FrameBuffer {
    pub fn new(ctx: &GraphicsContext, spec: FramebufferSpec) -> Result<Self, GraphicsError> {
        let (handle, color_attachments, depth_attachment) = Self::create_attachments(ctx, &spec)?;
        Ok(Self {
            ctx: ctx.clone(),
            spec,
            handle,
            color_attachments,
            depth_attachment,
        })
    }

    #[allow(clippy::type_complexity)]
    fn create_attachments(
        ctx: &GraphicsContext,
        spec: &FramebufferSpec,
    ) -> Result<(FramebufferHandle, Vec<TextureHandle>, Option<TextureHandle>), GraphicsError> {
        let backend = ctx.backend();
        let handle = backend.create_framebuffer();
        let mut colors = Vec::new();
        let mut depth = None;

        for &format in &spec.attachments {
            let texture_format = format.texture_format();
            let descriptor = TextureDescriptor::new_2d(spec.width, spec.height, texture_format)
                .with_wrap(TextureWrap::ClampToEdge)
                .with_linear(!texture_format.is_integer());

            if format.is_depth() {
                if depth.is_some() {
                    log::warn!("Framebuffer spec lists more than one depth attachment, ignoring extra");
                    continue;
                }
                let texture = backend.create_texture(&descriptor);
                backend.attach_texture(handle, FramebufferAttachment::DepthStencil, texture);
                depth = Some(texture);
            } else {
                let texture = backend.create_texture(&descriptor);
                backend.attach_texture(handle, FramebufferAttachment::Color(colors.len() as u32), texture);
                colors.push(texture);
            }
        }

        backend.set_draw_buffers(handle, colors.len() as u32);
        let complete = backend.is_framebuffer_complete(handle);
        ctx.bind_framebuffer(None);

        if !complete {
            for &texture in colors.iter().chain(depth.iter()) {
                ctx.destroy_texture(texture);
            }
            ctx.destroy_framebuffer(handle);
            return Err(GraphicsError::IncompleteFramebuffer(format!(
                "{}x{} with {:?}",
                spec.width, spec.height, spec.attachments
            )));
        }
        Ok((handle, colors, depth))
    }

    fn release(&mut self) {
        for &texture in self.color_attachments.iter().chain(self.depth_attachment.iter()) {
            self.ctx.destroy_texture(texture);
        }
        self.ctx.destroy_framebuffer(self.handle);
        self.color_attachments.clear();
        self.depth_attachment = None;
    }

    /// Bind for drawing and set the viewport to the framebuffer size.
    pub fn bind(&self) {
        self.ctx.bind_framebuffer(Some(self.handle));
        self.ctx
            .set_viewport(0, 0, self.spec.width, self.spec.height);
    }

    /// Bind the default framebuffer.
    pub fn unbind(&self) {
        self.ctx.bind_framebuffer(None);
    }

    /// Recreate all attachments at the new size.
    ///
    /// Sizes of 0 or above [`MAX_FRAMEBUFFER_SIZE`] are ignored with a warning.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || width > MAX_FRAMEBUFFER_SIZE || height > MAX_FRAMEBUFFER_SIZE
        {
            log::warn!("Attempted to resize framebuffer to {width}, {height}");
            return;
        }
        let mut spec = self.spec.clone();
        spec.width = width;
        spec.height = height;

        match Self::create_attachments(&self.ctx, &spec) {
            Ok((handle, colors, depth)) => {
                self.release();
                self.handle = handle;
                self.color_attachments = colors;
                self.depth_attachment = depth;
                self.spec = spec;
            }
            Err(e) => log::error!("Framebuffer resize failed: {e}"),
        }
    }

    /// Read one texel of an integer colour attachment. Stalls the pipeline.
    ///
    /// # Panics
    ///
    /// Panics if `attachment_index` is out of range.
    pub fn read_pixel(&self, attachment_index: u32, x: i32, y: i32) -> i32 {
        self.check_index(attachment_index);
        self.ctx
            .backend()
            .read_pixel(self.handle, attachment_index, x, y)
    }

    /// Fill an integer colour attachment with `value`.
    pub fn clear_attachment(&self, attachment_index: u32, value: i32) {
        let texture = self.color_attachment_id(attachment_index);
        self.ctx.backend().clear_texture_i32(texture, value);
    }

    /// Bind colour attachment `index` for sampling at `slot`.
    pub fn bind_color_texture(&self, slot: u32, index: u32) {
        let texture = self.color_attachment_id(index);
        self.ctx.bind_texture(slot, TextureKind::D2, Some(texture));
    }

    /// Bind the depth attachment for sampling at `slot`.
    ///
    /// # Panics
    ///
    /// Panics if the framebuffer has no depth attachment.
    pub fn bind_depth_texture(&self, slot: u32) {
        let Some(depth) = self.depth_attachment else {
            panic!("Framebuffer has no depth attachment");
        };
        self.ctx.bind_texture(slot, TextureKind::D2, Some(depth));
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn color_attachment_id(&self, index: u32) -> TextureHandle {
        self.check_index(index);
        self.color_attachments[index as usize]
    }

    pub fn depth_attachment_id(&self) -> Option<TextureHandle> {
        self.depth_attachment
    }

    pub fn color_attachment_count(&self) -> usize {
        self.color_attachments.len()
    }

    pub fn spec(&self) -> &FramebufferSpec {
        &self.spec
    }

    pub fn width(&self) -> u32 {
        self.spec.width
    }

    pub fn height(&self) -> u32 {
        self.spec.height
    }

    pub fn handle(&self) -> FramebufferHandle {
        self.handle
    }

    fn check_index(&self, index: u32) {
        assert!(
            (index as usize) < self.color_attachments.len(),
            "Color attachment index {index} out of range ({} attachments)",
            self.color_attachments.len()
        );
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("handle", &self.handle)
            .field("size", &(self.spec.width, self.spec.height))
            .field("attachments", &self.spec.attachments)
            .finish()
    }
}

static_assertions::assert_not_impl_any!(FrameBuffer: Send, Sync);
