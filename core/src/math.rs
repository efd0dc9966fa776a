//! Math type aliases and helper functions.
//!
//! All rendering math is `f32`. Matrices are stored column-major, which is the
//! layout OpenGL expects for `glUniformMatrix4fv` with `transpose = false`.

pub use nalgebra;

/// 2D vector (f32).
pub type Vec2 = nalgebra::Vector2<f32>;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4D vector (f32).
pub type Vec4 = nalgebra::Vector4<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

// ===== Helper functions =====

/// Build a right-handed perspective projection with clip depth in [-1, 1] (OpenGL convention).
///
/// `yfov` is in radians.
pub fn perspective_gl(yfov: f32, aspect: f32, znear: f32, zfar: f32) -> Mat4 {
    let f = 1.0 / (yfov / 2.0).tan();
    let nf = 1.0 / (znear - zfar);
    #[rustfmt::skip]
    let result = Mat4::new(
        f / aspect, 0.0, 0.0,                   0.0,
        0.0,        f,   0.0,                   0.0,
        0.0,        0.0, (zfar + znear) * nf,   2.0 * zfar * znear * nf,
        0.0,        0.0, -1.0,                  0.0,
    );
    result
}

/// Right-handed look-at view matrix.
///
/// Falls back to the Z axis as "up" when `up` is parallel to the view direction,
/// which happens for lights pointing straight down.
pub fn look_at_rh(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
    let dir = target - eye;
    let up = if dir.cross(up).norm_squared() < 1e-8 {
        Vec3::z()
    } else {
        *up
    };
    let eye_point = nalgebra::Point3::from(*eye);
    let target_point = nalgebra::Point3::from(*target);
    nalgebra::Isometry3::look_at_rh(&eye_point, &target_point, &up).to_homogeneous()
}

/// Build a translation-only 4x4 matrix.
pub fn mat4_from_translation(t: Vec3) -> Mat4 {
    Mat4::new_translation(&t)
}

/// Build a translation + uniform scale matrix.
pub fn mat4_from_translation_scale(t: Vec3, scale: f32) -> Mat4 {
    Mat4::new_translation(&t) * Mat4::new_scaling(scale)
}

/// Convert a 4x4 matrix to a column-major `[f32; 16]` array.
pub fn mat4_to_cols_array(m: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(m.as_slice());
    out
}

/// Build a matrix from a column-major `[f32; 16]` array.
pub fn mat4_from_cols_array(a: &[f32; 16]) -> Mat4 {
    Mat4::from_column_slice(a)
}

/// Transform a point by a 4x4 matrix and return clip-space coordinates (x, y, z, w).
pub fn transform_point4(m: &Mat4, p: &Vec3) -> Vec4 {
    m * Vec4::new(p.x, p.y, p.z, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perspective_maps_near_and_far_planes() {
        let proj = perspective_gl(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 50.0);

        let near = transform_point4(&proj, &Vec3::new(0.0, 0.0, -1.0));
        assert!((near.z / near.w + 1.0).abs() < 1e-5);

        let far = transform_point4(&proj, &Vec3::new(0.0, 0.0, -50.0));
        assert!((far.z / far.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_look_at_down_does_not_degenerate() {
        let eye = Vec3::new(0.0, 8.0, 0.0);
        let target = Vec3::new(0.0, 7.0, 0.0);
        let view = look_at_rh(&eye, &target, &Vec3::y());
        assert!(view.iter().all(|v| v.is_finite()));

        // The eye sits at the origin of view space.
        let p = transform_point4(&view, &eye);
        assert!(p.xyz().norm() < 1e-5);
    }

    #[test]
    fn test_cols_array_roundtrip_is_column_major() {
        let m = mat4_from_translation(Vec3::new(1.0, 2.0, 3.0));
        let a = mat4_to_cols_array(&m);
        assert_eq!(&a[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(mat4_from_cols_array(&a), m);
    }
}
