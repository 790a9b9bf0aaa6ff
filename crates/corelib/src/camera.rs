use crate::{Mat4, Vec3, vec3};

/// Simple perspective camera (right-handed).
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub aspect: f32,
}

impl Camera {
    #[allow(clippy::too_many_arguments)]
    pub fn new_perspective(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y_rad: f32,
        z_near: f32,
        z_far: f32,
        aspect: f32,
    ) -> Self {
        Self {
            eye,
            target,
            up,
            fov_y_rad,
            z_near,
            z_far,
            aspect,
        }
    }

    /// The fixed viewpoint every game variant renders from: 90° vertical FOV,
    /// eye at (4, 3, 3) looking at the origin, clip range 0.1..100.
    pub fn game_default(aspect: f32) -> Self {
        Self::new_perspective(
            vec3(4.0, 3.0, 3.0),
            Vec3::ZERO,
            Vec3::Y,
            90f32.to_radians(),
            0.1,
            100.0,
            aspect,
        )
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Depth range is [0, 1], which is what wgpu expects.
    #[inline]
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_rad,
            self.aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }

    #[inline]
    pub fn proj_view(&self) -> Mat4 {
        self.proj() * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_default_looks_at_origin() {
        let cam = Camera::game_default(1.0);
        // The target lands on the view axis (x = y = 0 in view space).
        let p = cam.view().transform_point3(Vec3::ZERO);
        assert!(p.x.abs() < 1e-5);
        assert!(p.y.abs() < 1e-5);
        assert!(p.z < 0.0);
    }
}
