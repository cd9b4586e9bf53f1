//! Direction along which a source builds its geometry.

use glam::{Mat3, Vec3};

use crate::origin::Origin;
use crate::world::World;

/// Orthonormal basis whose forward (z) axis points along `forward`.
///
/// A zero-length `forward` yields identity.
pub(crate) fn basis_from_forward(forward: Vec3) -> Mat3 {
    let Some(fvec) = forward.try_normalize() else {
        return Mat3::IDENTITY;
    };
    let up_hint = if fvec.y.abs() > 0.99 { Vec3::X } else { Vec3::Y };
    let rvec = up_hint.cross(fvec).normalize();
    let uvec = fvec.cross(rvec);
    Mat3::from_cols(rvec, uvec, fvec)
}

/// Emission direction, either relative to the origin's host or in world space.
///
/// A relative orientation is composed with the host's rotation when it is
/// resolved, so it follows a turning host. The optional normal is always
/// world-space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceOrientation {
    orientation: Mat3,
    relative: bool,
    normal: Option<Vec3>,
}

impl SourceOrientation {
    /// World-space forward orientation with no normal.
    pub fn new() -> Self {
        Self {
            orientation: Mat3::IDENTITY,
            relative: false,
            normal: None,
        }
    }

    /// Point along `direction`. Zero vectors leave the orientation untouched.
    pub fn set_from_vector(&mut self, direction: Vec3, relative: bool) {
        if direction.try_normalize().is_none() {
            return;
        }
        self.orientation = basis_from_forward(direction);
        self.relative = relative;
    }

    /// Use a full rotation matrix.
    pub fn set_from_matrix(&mut self, orientation: Mat3, relative: bool) {
        self.orientation = orientation;
        self.relative = relative;
    }

    /// Set the world-space surface normal.
    pub fn set_normal(&mut self, normal: Vec3) {
        self.normal = normal.try_normalize();
    }

    /// Stored rotation, before any host composition.
    #[inline]
    pub fn matrix(&self) -> Mat3 {
        self.orientation
    }

    /// Whether the direction follows the host's rotation.
    #[inline]
    pub fn is_relative(&self) -> bool {
        self.relative
    }

    /// Resolve the emission direction.
    ///
    /// Relative orientations are composed with the host's current rotation,
    /// unless the caller passes `allow_relative = false`.
    pub fn direction_vector(&self, origin: &Origin, world: &dyn World, allow_relative: bool) -> Vec3 {
        if !self.relative || !allow_relative {
            return self.orientation.z_axis;
        }
        (origin.host_orientation(world) * self.orientation).z_axis
    }

    /// World-space normal, if one was ever set.
    #[inline]
    pub fn normal(&self) -> Option<Vec3> {
        self.normal
    }
}

impl Default for SourceOrientation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{ObjectState, SimWorld};
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_basis_is_orthonormal() {
        for dir in [Vec3::X, Vec3::Y, -Vec3::Y, Vec3::new(1.0, 2.0, -3.0)] {
            let m = basis_from_forward(dir);
            assert!((m.z_axis - dir.normalize()).length() < 1e-5);
            assert!(m.x_axis.dot(m.y_axis).abs() < 1e-5);
            assert!((m.determinant() - 1.0).abs() < 1e-4);
        }
        assert_eq!(basis_from_forward(Vec3::ZERO), Mat3::IDENTITY);
    }

    #[test]
    fn test_global_direction_ignores_host() {
        let mut world = SimWorld::new();
        let ship = world.spawn_object(ObjectState::new(Vec3::ZERO, Mat3::from_rotation_y(FRAC_PI_2)));
        let mut origin = Origin::new();
        origin.move_to_object(ship, Vec3::ZERO);

        let mut orient = SourceOrientation::new();
        orient.set_from_vector(Vec3::Y, false);
        assert!((orient.direction_vector(&origin, &world, true) - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_relative_direction_tracks_host() {
        let mut world = SimWorld::new();
        let ship = world.spawn_object(ObjectState::new(Vec3::ZERO, Mat3::IDENTITY));
        let mut origin = Origin::new();
        origin.move_to_object(ship, Vec3::ZERO);

        let mut orient = SourceOrientation::new();
        orient.set_from_vector(Vec3::Z, true);
        assert!((orient.direction_vector(&origin, &world, true) - Vec3::Z).length() < 1e-5);

        // host turns after the orientation was set
        world
            .object_mut(ship)
            .unwrap()
            .step_to(Vec3::ZERO, Mat3::from_rotation_y(FRAC_PI_2));
        assert!((orient.direction_vector(&origin, &world, true) - Vec3::X).length() < 1e-5);
        assert!((orient.direction_vector(&origin, &world, false) - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_normal_absent_until_set() {
        let mut orient = SourceOrientation::new();
        assert!(orient.normal().is_none());

        orient.set_normal(Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(orient.normal(), Some(Vec3::Y));
    }

    #[test]
    fn test_zero_direction_is_ignored() {
        let mut orient = SourceOrientation::new();
        orient.set_from_vector(Vec3::ZERO, true);
        assert_eq!(orient.matrix(), Mat3::IDENTITY);
        assert!(!orient.is_relative());
    }
}
