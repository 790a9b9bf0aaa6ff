use crate::{Mat4, Vec3, camera::Camera};

/// Combined projection * view * model matrix applied to one object.
///
/// The matrix is mutated in place: translations accumulate and there is no
/// separate model state to reset to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    combined: Mat4,
}

impl Transform {
    #[inline]
    pub const fn identity() -> Self {
        Self {
            combined: Mat4::IDENTITY,
        }
    }

    /// Projection * View * Model with an identity model.
    pub fn from_camera(camera: &Camera) -> Self {
        Self::from_camera_and_model(camera, Mat4::IDENTITY)
    }

    pub fn from_camera_and_model(camera: &Camera, model: Mat4) -> Self {
        Self {
            combined: camera.proj_view() * model,
        }
    }

    /// Compose a translation into the combined matrix (`M = M * T(v)`).
    #[inline]
    pub fn translate(&mut self, v: Vec3) {
        self.combined *= Mat4::from_translation(v);
    }

    #[inline]
    pub fn matrix(&self) -> Mat4 {
        self.combined
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3;

    #[test]
    fn translation_accumulates_in_place() {
        let cam = Camera::game_default(4.0 / 3.0);
        let mut twice = Transform::from_camera(&cam);
        twice.translate(vec3(0.0, -1.0, 0.0));
        twice.translate(vec3(0.0, -1.0, 0.0));

        let mut once = Transform::from_camera(&cam);
        once.translate(vec3(0.0, -2.0, 0.0));

        assert!(twice.matrix().abs_diff_eq(once.matrix(), 1e-5));
    }

    #[test]
    fn translation_on_identity_sets_last_column() {
        let mut t = Transform::identity();
        t.translate(vec3(1.0, 2.0, 3.0));
        let m = t.matrix().to_cols_array();
        assert!((m[12] - 1.0).abs() < 1e-6);
        assert!((m[13] - 2.0).abs() < 1e-6);
        assert!((m[14] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn translation_order_matters_with_model() {
        let cam = Camera::game_default(1.0);
        let model = Mat4::from_scale(vec3(2.0, 2.0, 2.0));
        let mut t = Transform::from_camera_and_model(&cam, model);
        t.translate(vec3(1.0, 0.0, 0.0));
        // Translation is applied in model space, after the scale.
        let expected = cam.proj_view() * model * Mat4::from_translation(vec3(1.0, 0.0, 0.0));
        assert!(t.matrix().abs_diff_eq(expected, 1e-5));
    }
}
