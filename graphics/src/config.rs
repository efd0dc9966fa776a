//! Renderer configuration.
//!
//! Plain data structs with defaults matching the reference scene: a spot
//! light hanging above the origin, a 2048² perspective shadow map and a dark
//! grey background.

use aether_core::math::Vec3;

use crate::backend::RendererApi;

/// Shadow map parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    /// Edge length of the square depth map in pixels.
    pub resolution: u32,
    /// Vertical field of view of the light frustum.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            resolution: 2048,
            fov_degrees: 90.0,
            near: 1.0,
            far: 50.0,
        }
    }
}

/// Spot light used for lighting and the shadow pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSettings {
    pub position: Vec3,
    /// Need not be normalized.
    pub direction: Vec3,
    pub inner_cutoff_degrees: f32,
    pub outer_cutoff_degrees: f32,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 8.0, 0.0),
            direction: Vec3::new(0.0, -1.0, 0.0),
            inner_cutoff_degrees: 20.0,
            outer_cutoff_degrees: 30.0,
        }
    }
}

impl LightSettings {
    /// Cosines of the cutoff angles, as the lighting shader expects them.
    pub fn cutoff_cosines(&self) -> (f32, f32) {
        (
            self.inner_cutoff_degrees.to_radians().cos(),
            self.outer_cutoff_degrees.to_radians().cos(),
        )
    }
}

/// Linear distance fog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogSettings {
    pub enabled: bool,
    pub color: Vec3,
    pub start: f32,
    pub end: f32,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            color: Vec3::new(0.1, 0.1, 0.1),
            start: 10.0,
            end: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessSettings {
    /// Blend factor between the graded and ungraded scene colour.
    pub lut_intensity: f32,
}

impl Default for PostProcessSettings {
    fn default() -> Self {
        Self { lut_intensity: 1.0 }
    }
}

/// Top-level renderer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub api: RendererApi,
    /// Window (swapchain) size in pixels.
    pub viewport: (u32, u32),
    /// Background colour when fog is off.
    pub clear_color: [f32; 4],
    pub shadow: ShadowSettings,
    /// Initial instance buffer capacity in matrices (0 = allocate on first use).
    pub instance_capacity: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            api: RendererApi::default(),
            viewport: (1280, 720),
            clear_color: [0.1, 0.1, 0.1, 1.0],
            shadow: ShadowSettings::default(),
            instance_capacity: 0,
        }
    }
}

impl RendererConfig {
    pub fn with_api(mut self, api: RendererApi) -> Self {
        self.api = api;
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_shadow(mut self, shadow: ShadowSettings) -> Self {
        self.shadow = shadow;
        self
    }

    pub fn with_instance_capacity(mut self, capacity: usize) -> Self {
        self.instance_capacity = capacity;
        self
    }
}
