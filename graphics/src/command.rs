//! Render commands.
//!
//! [`RenderCommand`] is the single point through which frame code reaches the
//! backend for pipeline state and draw submission. It holds a
//! [`GraphicsContext`] so the active backend is chosen once at startup.

use crate::context::GraphicsContext;
use crate::resources::VertexArray;
use crate::types::{ClearFlags, DepthFunc, DrawIndexedArgs, PrimitiveMode};

/// Pipeline state and draw submission.
#[derive(Debug, Clone)]
pub struct RenderCommand {
    ctx: GraphicsContext,
}

impl RenderCommand {
    pub fn new(ctx: &GraphicsContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// One-time state setup: blending and depth testing.
    pub fn init(&self) {
        self.ctx.backend().init();
    }

    pub fn set_viewport(&self, x: i32, y: i32, width: u32, height: u32) {
        self.ctx.set_viewport(x, y, width, height);
    }

    pub fn set_clear_color(&self, color: [f32; 4]) {
        self.ctx.set_clear_color(color);
    }

    /// Clear colour and depth of the bound framebuffer.
    pub fn clear(&self) {
        self.ctx.backend().clear(ClearFlags::COLOR | ClearFlags::DEPTH);
    }

    /// Switch the depth test between `LESS` and `LEQUAL`.
    ///
    /// `LEQUAL` lets geometry written at the far plane (the skybox) pass
    /// against a cleared depth buffer.
    pub fn set_depth_func_equal(&self, enabled: bool) {
        let func = if enabled {
            DepthFunc::LessEqual
        } else {
            DepthFunc::Less
        };
        self.ctx.set_depth_func(func);
    }

    pub fn set_line_width(&self, width: f32) {
        self.ctx.backend().set_line_width(width);
    }

    /// Draw `index_count` indices of the array's index buffer, all of them when 0.
    ///
    /// # Panics
    ///
    /// Panics if the vertex array has no index buffer.
    pub fn draw_indexed(&self, vertex_array: &VertexArray, index_count: u32) {
        let count = match index_count {
            0 => Self::full_count(vertex_array),
            n => n,
        };
        self.submit(vertex_array, count, 0, 0, 1);
    }

    /// Draw the whole index buffer `instance_count` times. Zero instances draw nothing.
    pub fn draw_instanced(&self, vertex_array: &VertexArray, instance_count: u32) {
        let count = Self::full_count(vertex_array);
        self.submit(vertex_array, count, 0, 0, instance_count);
    }

    /// Draw a sub-range: `index_byte_offset` into the index buffer, with
    /// `base_vertex` added to every index.
    pub fn draw_indexed_base_vertex(
        &self,
        vertex_array: &VertexArray,
        index_count: u32,
        index_byte_offset: usize,
        base_vertex: i32,
    ) {
        self.submit(vertex_array, index_count, index_byte_offset, base_vertex, 1);
    }

    /// Non-indexed line list of `vertex_count` vertices.
    pub fn draw_lines(&self, vertex_array: &VertexArray, vertex_count: u32) {
        vertex_array.bind();
        self.ctx
            .backend()
            .draw_arrays(PrimitiveMode::Lines, 0, vertex_count);
    }

    fn full_count(vertex_array: &VertexArray) -> u32 {
        match vertex_array.index_buffer() {
            Some(index_buffer) => index_buffer.count(),
            None => panic!("Vertex array {:?} has no index buffer", vertex_array.handle()),
        }
    }

    fn submit(
        &self,
        vertex_array: &VertexArray,
        index_count: u32,
        index_byte_offset: usize,
        base_vertex: i32,
        instance_count: u32,
    ) {
        if instance_count == 0 {
            log::trace!("Skipping draw of {:?} with no instances", vertex_array.handle());
            return;
        }
        vertex_array.bind();
        self.ctx.backend().draw_elements(
            PrimitiveMode::Triangles,
            &DrawIndexedArgs {
                index_count,
                index_byte_offset,
                base_vertex,
                instance_count,
            },
        );
    }
}
