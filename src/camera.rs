//! The viewer trails are billboarded toward.

use glam::Vec3;

/// Eye position and projection parameters used when building trail geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    /// Eye position in world space.
    pub eye: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Viewport height in pixels.
    pub viewport_height: f32,
}

impl RenderView {
    /// View from `eye` with a 60 degree field of view on a 1080-pixel viewport.
    pub fn new(eye: Vec3) -> Self {
        Self {
            eye,
            fov_y: std::f32::consts::FRAC_PI_3,
            viewport_height: 1080.0,
        }
    }

    /// View orbiting `target` at `distance`, `yaw`/`pitch` in radians.
    pub fn orbit(target: Vec3, yaw: f32, pitch: f32, distance: f32) -> Self {
        let x = distance * pitch.cos() * yaw.sin();
        let y = distance * pitch.sin();
        let z = distance * pitch.cos() * yaw.cos();
        Self::new(target + Vec3::new(x, y, z))
    }

    /// Set projection parameters.
    pub fn with_projection(mut self, fov_y: f32, viewport_height: f32) -> Self {
        self.fov_y = fov_y;
        self.viewport_height = viewport_height.max(1.0);
        self
    }

    /// World-space size of one pixel at `distance` from the eye.
    #[inline]
    pub fn world_units_per_pixel(&self, distance: f32) -> f32 {
        2.0 * distance * (self.fov_y * 0.5).tan() / self.viewport_height
    }
}

impl Default for RenderView {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orbit_distance() {
        let view = RenderView::orbit(Vec3::new(1.0, 2.0, 3.0), 0.7, 0.3, 5.0);
        assert!(((view.eye - Vec3::new(1.0, 2.0, 3.0)).length() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_pixel_size_scales_with_distance() {
        let view = RenderView::new(Vec3::ZERO).with_projection(std::f32::consts::FRAC_PI_2, 100.0);
        // tan(45deg) = 1, so the viewport spans 2 * distance
        assert!((view.world_units_per_pixel(50.0) - 1.0).abs() < 1e-4);
        assert!((view.world_units_per_pixel(100.0) - 2.0).abs() < 1e-4);
    }
}
