//! Built-in shader programs.
//!
//! The sources are stored as `.glsl` files in `shaders/` and embedded at
//! compile time. Each file uses `#shader` stage markers.
//!
//! | Constant | Used by |
//! |----------|---------|
//! | [`ERROR_SHADER`] | fallback for failed shader loads |
//! | [`SHADOW_DEPTH_SHADER`] | shadow pass |
//! | [`SKYBOX_SHADER`] | scene pass, skybox |
//! | [`LIGHTING_SHADER`] | scene pass, lit geometry |
//! | [`POST_LUT_SHADER`] | post-process pass |
//! | [`PBR_SHADER`] | uploaded models |

/// Solid magenta.
pub const ERROR_SHADER: &str = include_str!("../../shaders/error.glsl");

/// Depth-only pass from the light's point of view.
pub const SHADOW_DEPTH_SHADER: &str = include_str!("../../shaders/shadow_depth.glsl");

/// Cube-map background drawn at the far plane.
pub const SKYBOX_SHADER: &str = include_str!("../../shaders/skybox.glsl");

/// Spot light with shadow map and linear fog.
pub const LIGHTING_SHADER: &str = include_str!("../../shaders/lighting.glsl");

/// Colour grading through a 512x512 lookup texture.
pub const POST_LUT_SHADER: &str = include_str!("../../shaders/post_lut.glsl");

/// Metallic-roughness shading for glTF materials.
pub const PBR_SHADER: &str = include_str!("../../shaders/pbr.glsl");

/// `(name, source)` pairs of every built-in program.
pub fn all() -> [(&'static str, &'static str); 6] {
    [
        ("Error", ERROR_SHADER),
        ("ShadowDepth", SHADOW_DEPTH_SHADER),
        ("Skybox", SKYBOX_SHADER),
        ("Lighting", LIGHTING_SHADER),
        ("PostLut", POST_LUT_SHADER),
        ("Pbr", PBR_SHADER),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ShaderSource;

    #[test]
    fn test_builtins_have_both_stages() {
        for (name, text) in all() {
            let source = ShaderSource::parse(text);
            assert!(source.stages().is_ok(), "{name} is missing a stage");
        }
    }

    #[test]
    fn test_shadow_shader_instancing_location() {
        let source = ShaderSource::parse(SHADOW_DEPTH_SHADER);
        let vertex = source.vertex.unwrap();
        assert!(vertex.contains("layout(location = 3) in mat4 a_InstanceModel"));
        assert!(vertex.contains("uniform mat4 u_LightSpaceMatrix;"));
    }
}
