// SPDX-License-Identifier: CEPL-1.0
//! Camera and transform helpers over glam.
//!
//! Matrices are column-major and right-handed. Projections target Vulkan's
//! 0..1 clip depth.

pub use glam::{Mat4, Quat, Vec3, Vec4};

/// World up used by camera `look_at`.
pub const UP: Vec3 = Vec3::Y;

pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(eye, target, up)
}

pub fn perspective(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(fov_y_radians, aspect, near, far)
}

/// Post-multiplies `m` by a rotation of `radians` about `axis`.
/// A zero axis leaves `m` unchanged.
pub fn rotate(m: Mat4, radians: f32, axis: Vec3) -> Mat4 {
    match axis.try_normalize() {
        Some(axis) => m * Mat4::from_axis_angle(axis, radians),
        None => m,
    }
}

pub fn approx_eq(a: &Mat4, b: &Mat4, eps: f32) -> bool {
    a.abs_diff_eq(*b, eps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_rotations_compose_into_one() {
        let axis = Vec3::new(0.0, 1.0, 0.0);
        let r = 0.3_f32;
        let twice = rotate(rotate(Mat4::IDENTITY, r, axis), r, axis);
        let once = rotate(Mat4::IDENTITY, 2.0 * r, axis);
        assert!(approx_eq(&twice, &once, 1e-6));
    }

    #[test]
    fn zero_axis_is_identity() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(rotate(m, 1.0, Vec3::ZERO), m);
    }

    #[test]
    fn accumulated_cube_rotation_matches_closed_form() {
        let dt = 1.0_f32 / 60.0;
        let step = 30.0_f32.to_radians() * dt;
        let mut model = Mat4::IDENTITY;
        for _ in 0..720 {
            model = rotate(model, step, Vec3::Y);
            model = rotate(model, step, Vec3::X);
        }

        let mut expected = Mat4::IDENTITY;
        let y = Mat4::from_axis_angle(Vec3::Y, step);
        let x = Mat4::from_axis_angle(Vec3::X, step);
        for _ in 0..720 {
            expected = expected * y * x;
        }
        assert!(approx_eq(&model, &expected, 1e-3));
    }

    #[test]
    fn look_at_moves_eye_to_origin() {
        let eye = Vec3::new(0.0, 0.0, 5.0);
        let view = look_at(eye, Vec3::ZERO, UP);
        let p = view.transform_point3(eye);
        assert!(p.length() < 1e-5);
    }

    #[test]
    fn perspective_depth_is_zero_to_one() {
        let proj = perspective(106.0_f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
        let near = proj.project_point3(Vec3::new(0.0, 0.0, -0.1));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -100.0));
        assert!(near.z.abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }
}
