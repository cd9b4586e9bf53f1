//! Where an emission point is anchored and how it resolves each frame.
//!
//! An [`Origin`] is one of seven anchor kinds (see [`OriginKind`]). Anything
//! that refers to a world entity holds only a weak handle, so every query
//! goes back through the [`World`] and fails soft when the host is gone.
//!
//! | Kind | Position | Orientation |
//! |------|----------|-------------|
//! | `Vector` | fixed point | cached matrix |
//! | `Beam` | random point along the beam, re-rolled per query | beam direction |
//! | `Object` | interpolated host transform | host, current frame |
//! | `Subobject` | host transform + submodel offset | host, current frame |
//! | `Turret` | host transform + fire point | host, current frame |
//! | `Particle` | particle position | identity |

use glam::{Mat3, Quat, Vec3};
use rand::Rng;

use crate::orientation::basis_from_forward;
use crate::world::{BeamHandle, ObjectHandle, ObjectState, ParticleHandle, WeaponState, World};

/// The anchor an [`Origin`] resolves through.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OriginKind {
    /// Not yet placed. Always invalid.
    #[default]
    None,
    /// A fixed world point with a cached orientation.
    Vector {
        /// World position.
        pos: Vec3,
        /// Orientation used to place offsets.
        orient: Mat3,
    },
    /// Anywhere along a beam.
    Beam(BeamHandle),
    /// An object's centre.
    Object(ObjectHandle),
    /// One of an object's submodels.
    Subobject {
        /// Host object.
        object: ObjectHandle,
        /// Submodel index on the host.
        submodel: usize,
    },
    /// A turret fire point on an object.
    Turret {
        /// Host object.
        object: ObjectHandle,
        /// Turret index on the host.
        turret: usize,
        /// Fire point index on the turret.
        fire_point: usize,
    },
    /// Another particle.
    Particle(ParticleHandle),
}

/// What the particle-effect framework receives for each spawned particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleInfo {
    /// World position, or object-local position when `attached_object` is set.
    pub pos: Vec3,
    /// Initial velocity.
    pub vel: Vec3,
    /// Lifetime override in seconds. `None` lets the effect pick.
    pub lifetime: Option<f32>,
    /// Size multiplier.
    pub scale: f32,
    /// Object the particle rides on, if any. Its generation is the signature.
    pub attached_object: Option<ObjectHandle>,
}

impl Default for ParticleInfo {
    fn default() -> Self {
        Self {
            pos: Vec3::ZERO,
            vel: Vec3::ZERO,
            lifetime: None,
            scale: 1.0,
            attached_object: None,
        }
    }
}

/// Anchor of an emission point, plus a host-relative offset and inherited velocity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Origin {
    kind: OriginKind,
    offset: Vec3,
    velocity: Vec3,
    weapon_state: Option<WeaponState>,
}

impl Origin {
    /// Create an unplaced origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current anchor kind.
    #[inline]
    pub fn kind(&self) -> &OriginKind {
        &self.kind
    }

    /// Host-relative offset applied on top of the anchor.
    #[inline]
    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    /// Anchor at a fixed world point.
    pub fn move_to_vector(&mut self, pos: Vec3, orient: Mat3) {
        self.kind = OriginKind::Vector { pos, orient };
    }

    /// Anchor to a beam. Positions are drawn along its current length.
    pub fn move_to_beam(&mut self, beam: BeamHandle) {
        self.kind = OriginKind::Beam(beam);
    }

    /// Anchor to an object with an offset in its local frame.
    pub fn move_to_object(&mut self, object: ObjectHandle, offset: Vec3) {
        self.kind = OriginKind::Object(object);
        self.offset = offset;
    }

    /// Anchor to a submodel with an offset in the host's local frame.
    pub fn move_to_subobject(&mut self, object: ObjectHandle, submodel: usize, offset: Vec3) {
        self.kind = OriginKind::Subobject { object, submodel };
        self.offset = offset;
    }

    /// Anchor to a turret fire point.
    pub fn move_to_turret(&mut self, object: ObjectHandle, turret: usize, fire_point: usize) {
        self.kind = OriginKind::Turret {
            object,
            turret,
            fire_point,
        };
        self.offset = Vec3::ZERO;
    }

    /// Anchor to another particle.
    pub fn move_to_particle(&mut self, particle: ParticleHandle) {
        self.kind = OriginKind::Particle(particle);
    }

    /// Velocity added to everything emitted from this origin.
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    /// Restrict validity to a host weapon phase. `None` lifts the restriction.
    pub fn set_weapon_state(&mut self, state: Option<WeaponState>) {
        self.weapon_state = state;
    }

    /// Object this origin is attached to, for the object-based kinds.
    pub fn host_object(&self) -> Option<ObjectHandle> {
        match self.kind {
            OriginKind::Object(object)
            | OriginKind::Subobject { object, .. }
            | OriginKind::Turret { object, .. } => Some(object),
            _ => None,
        }
    }

    /// Resolve to a world position.
    ///
    /// `interp` blends object hosts between this frame (0.0) and last frame
    /// (1.0). `manual_offset` replaces the stored offset for this query.
    /// Beam origins pick a new random point along the beam on every call.
    ///
    /// Returns `None` when the origin is unplaced or its host no longer resolves.
    pub fn global_position<R: Rng + ?Sized>(
        &self,
        world: &dyn World,
        rng: &mut R,
        interp: f32,
        manual_offset: Option<Vec3>,
    ) -> Option<Vec3> {
        let local = manual_offset.unwrap_or(self.offset);

        match self.kind {
            OriginKind::None => None,
            OriginKind::Vector { pos, orient } => Some(pos + orient * local),
            OriginKind::Beam(beam) => {
                let beam = world.beam(beam)?;
                let t: f32 = rng.gen();
                let orient = basis_from_forward(beam.end - beam.start);
                Some(beam.start.lerp(beam.end, t) + orient * local)
            }
            OriginKind::Object(object) => {
                let (pos, orient) = interpolated_transform(world.object(object)?, interp);
                Some(pos + orient * local)
            }
            OriginKind::Subobject { object, submodel } => {
                let (pos, orient) = interpolated_transform(world.object(object)?, interp);
                let sub = world.submodel_offset(object, submodel)?;
                Some(pos + orient * (sub + local))
            }
            OriginKind::Turret {
                object,
                turret,
                fire_point,
            } => {
                let (pos, orient) = interpolated_transform(world.object(object)?, interp);
                let muzzle = world.turret_fire_point(object, turret, fire_point)?;
                Some(pos + orient * (muzzle + local))
            }
            OriginKind::Particle(particle) => {
                let p = world.particle(particle)?;
                if p.is_expired() {
                    return None;
                }
                Some(p.pos + local)
            }
        }
    }

    /// Orientation of the host this frame.
    ///
    /// Always the current-frame rotation, even when positions are being
    /// interpolated. Falls back to identity for hosts without a rotation or
    /// hosts that no longer resolve.
    pub fn host_orientation(&self, world: &dyn World) -> Mat3 {
        match self.kind {
            OriginKind::Vector { orient, .. } => orient,
            OriginKind::Beam(beam) => world
                .beam(beam)
                .map(|b| basis_from_forward(b.end - b.start))
                .unwrap_or(Mat3::IDENTITY),
            OriginKind::Object(object)
            | OriginKind::Subobject { object, .. }
            | OriginKind::Turret { object, .. } => {
                world.object(object).map(|o| o.orient).unwrap_or(Mat3::IDENTITY)
            }
            OriginKind::Particle(_) | OriginKind::None => Mat3::IDENTITY,
        }
    }

    /// Velocity of the host plus this origin's own velocity.
    pub fn velocity(&self, world: &dyn World) -> Vec3 {
        let host = match self.kind {
            OriginKind::Object(object)
            | OriginKind::Subobject { object, .. }
            | OriginKind::Turret { object, .. } => world.object(object).map(|o| o.velocity),
            OriginKind::Particle(particle) => world.particle(particle).map(|p| p.velocity),
            _ => None,
        };
        host.unwrap_or(Vec3::ZERO) + self.velocity
    }

    /// Whether the origin is placed and its host still resolves.
    pub fn is_valid(&self, world: &dyn World) -> bool {
        match self.kind {
            OriginKind::None => false,
            OriginKind::Vector { .. } => true,
            OriginKind::Beam(beam) => world.beam(beam).is_some(),
            OriginKind::Object(object)
            | OriginKind::Subobject { object, .. }
            | OriginKind::Turret { object, .. } => match world.object(object) {
                None => false,
                Some(obj) => match self.weapon_state {
                    None => true,
                    Some(wanted) => obj.weapon_state == Some(wanted),
                },
            },
            OriginKind::Particle(particle) => world
                .particle(particle)
                .is_some_and(|p| !p.is_expired()),
        }
    }

    /// Fill the identifying part of a particle spawn record.
    ///
    /// Object-based origins with `allow_relative` attach the particle to the
    /// host and write a host-local position; everything else gets a world
    /// position. Particle origins pass on the remaining lifetime and radius.
    pub fn apply_to_particle_info<R: Rng + ?Sized>(
        &self,
        world: &dyn World,
        rng: &mut R,
        info: &mut ParticleInfo,
        allow_relative: bool,
        interp: f32,
    ) {
        info.vel = self.velocity;
        info.scale = 1.0;
        info.lifetime = None;
        info.attached_object = None;

        match self.kind {
            OriginKind::Object(object) if allow_relative => {
                info.attached_object = Some(object);
                info.pos = self.offset;
            }
            OriginKind::Subobject { object, submodel } if allow_relative => {
                info.attached_object = Some(object);
                info.pos = world.submodel_offset(object, submodel).unwrap_or(Vec3::ZERO) + self.offset;
            }
            OriginKind::Turret {
                object,
                turret,
                fire_point,
            } if allow_relative => {
                info.attached_object = Some(object);
                info.pos = world
                    .turret_fire_point(object, turret, fire_point)
                    .unwrap_or(Vec3::ZERO);
            }
            OriginKind::Particle(particle) => {
                if let Some(p) = world.particle(particle) {
                    info.lifetime = Some(p.remaining_life());
                    info.scale = p.radius;
                }
                info.pos = self.global_position(world, rng, interp, None).unwrap_or(Vec3::ZERO);
            }
            _ => {
                info.pos = self.global_position(world, rng, interp, None).unwrap_or(Vec3::ZERO);
            }
        }
    }
}

/// Host transform blended toward last frame by `interp`.
fn interpolated_transform(obj: &ObjectState, interp: f32) -> (Vec3, Mat3) {
    if interp <= 0.0 {
        return (obj.pos, obj.orient);
    }
    if interp >= 1.0 {
        return (obj.last_pos, obj.last_orient);
    }
    let pos = obj.pos.lerp(obj.last_pos, interp);
    let rot = Quat::from_mat3(&obj.orient).slerp(Quat::from_mat3(&obj.last_orient), interp);
    (pos, Mat3::from_quat(rot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{BeamState, ObjectState, ParticleState, SimWorld, TurretState};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(7)
    }

    fn moving_ship(world: &mut SimWorld) -> ObjectHandle {
        let mut ship = ObjectState::new(Vec3::new(0.0, 0.0, 10.0), Mat3::IDENTITY);
        ship.step_to(Vec3::new(0.0, 0.0, 20.0), Mat3::from_rotation_y(std::f32::consts::FRAC_PI_2));
        world.spawn_object(ship)
    }

    #[test]
    fn test_unplaced_origin_is_invalid() {
        let world = SimWorld::new();
        let origin = Origin::new();
        assert!(!origin.is_valid(&world));
        assert!(origin.global_position(&world, &mut rng(), 0.0, None).is_none());
    }

    #[test]
    fn test_object_round_trip_current_frame() {
        let mut world = SimWorld::new();
        let ship = moving_ship(&mut world);
        let mut origin = Origin::new();
        origin.move_to_object(ship, Vec3::new(0.0, 0.0, 1.0));

        // forward rotated a quarter turn about Y lands on +X
        let pos = origin.global_position(&world, &mut rng(), 0.0, None).unwrap();
        assert!((pos - Vec3::new(1.0, 0.0, 20.0)).length() < 1e-5);
    }

    #[test]
    fn test_object_round_trip_previous_frame() {
        let mut world = SimWorld::new();
        let ship = moving_ship(&mut world);
        let mut origin = Origin::new();
        origin.move_to_object(ship, Vec3::new(0.0, 0.0, 1.0));

        let pos = origin.global_position(&world, &mut rng(), 1.0, None).unwrap();
        assert!((pos - Vec3::new(0.0, 0.0, 11.0)).length() < 1e-5);
    }

    #[test]
    fn test_object_interpolates_position() {
        let mut world = SimWorld::new();
        let ship = moving_ship(&mut world);
        let mut origin = Origin::new();
        origin.move_to_object(ship, Vec3::ZERO);

        let pos = origin.global_position(&world, &mut rng(), 0.5, None).unwrap();
        assert!((pos.z - 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_host_orientation_is_current_frame() {
        let mut world = SimWorld::new();
        let ship = moving_ship(&mut world);
        let mut origin = Origin::new();
        origin.move_to_object(ship, Vec3::ZERO);

        let orient = origin.host_orientation(&world);
        assert!((orient.z_axis - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_destroyed_host_invalidates() {
        let mut world = SimWorld::new();
        let ship = moving_ship(&mut world);
        let mut origin = Origin::new();
        origin.move_to_object(ship, Vec3::ZERO);
        assert!(origin.is_valid(&world));

        world.destroy_object(ship);
        assert!(!origin.is_valid(&world));
        assert!(origin.global_position(&world, &mut rng(), 0.0, None).is_none());
        assert_eq!(origin.host_orientation(&world), Mat3::IDENTITY);
    }

    #[test]
    fn test_weapon_state_restriction() {
        let mut world = SimWorld::new();
        let mut missile = ObjectState::new(Vec3::ZERO, Mat3::IDENTITY);
        missile.weapon_state = Some(WeaponState::Ignition);
        let h = world.spawn_object(missile);

        let mut origin = Origin::new();
        origin.move_to_object(h, Vec3::ZERO);
        origin.set_weapon_state(Some(WeaponState::Ignition));
        assert!(origin.is_valid(&world));

        world.object_mut(h).unwrap().weapon_state = Some(WeaponState::HomedFlight);
        assert!(!origin.is_valid(&world));
    }

    #[test]
    fn test_vector_uses_manual_offset() {
        let world = SimWorld::new();
        let mut origin = Origin::new();
        origin.move_to_vector(Vec3::new(5.0, 0.0, 0.0), Mat3::from_rotation_z(std::f32::consts::FRAC_PI_2));

        let pos = origin
            .global_position(&world, &mut rng(), 0.0, Some(Vec3::X))
            .unwrap();
        assert!((pos - Vec3::new(5.0, 1.0, 0.0)).length() < 1e-5);
        assert!(origin.is_valid(&world));
    }

    #[test]
    fn test_beam_point_lies_on_beam() {
        let mut world = SimWorld::new();
        let beam = world.spawn_beam(BeamState {
            start: Vec3::ZERO,
            end: Vec3::new(0.0, 0.0, 100.0),
        });
        let mut origin = Origin::new();
        origin.move_to_beam(beam);

        let mut rng = rng();
        let a = origin.global_position(&world, &mut rng, 0.0, None).unwrap();
        let b = origin.global_position(&world, &mut rng, 0.0, None).unwrap();
        for p in [a, b] {
            assert!(p.x.abs() < 1e-4 && p.y.abs() < 1e-4);
            assert!((0.0..=100.0).contains(&p.z));
        }
        assert_ne!(a, b);
    }

    #[test]
    fn test_particle_origin_expires() {
        let mut world = SimWorld::new();
        let p = world.spawn_particle(ParticleState {
            pos: Vec3::ONE,
            velocity: Vec3::ZERO,
            age: 0.0,
            max_life: 1.0,
            radius: 2.0,
        });
        let mut origin = Origin::new();
        origin.move_to_particle(p);
        assert!(origin.is_valid(&world));

        world.particle_mut(p).unwrap().age = 1.5;
        assert!(!origin.is_valid(&world));
        assert!(origin.global_position(&world, &mut rng(), 0.0, None).is_none());
    }

    #[test]
    fn test_turret_and_subobject_positions() {
        let mut world = SimWorld::new();
        let mut ship = ObjectState::new(Vec3::new(100.0, 0.0, 0.0), Mat3::IDENTITY);
        ship.submodels = vec![Vec3::ZERO, Vec3::new(0.0, 5.0, 0.0)];
        ship.turrets.push(TurretState {
            submodel: 1,
            fire_points: vec![Vec3::new(0.0, 0.0, 2.0)],
        });
        let h = world.spawn_object(ship);

        let mut sub = Origin::new();
        sub.move_to_subobject(h, 1, Vec3::X);
        let pos = sub.global_position(&world, &mut rng(), 0.0, None).unwrap();
        assert!((pos - Vec3::new(101.0, 5.0, 0.0)).length() < 1e-5);

        let mut turret = Origin::new();
        turret.move_to_turret(h, 0, 0);
        let pos = turret.global_position(&world, &mut rng(), 0.0, None).unwrap();
        assert!((pos - Vec3::new(100.0, 5.0, 2.0)).length() < 1e-5);

        let mut missing = Origin::new();
        missing.move_to_subobject(h, 9, Vec3::ZERO);
        assert!(missing.global_position(&world, &mut rng(), 0.0, None).is_none());
    }

    #[test]
    fn test_particle_info_relative_object() {
        let mut world = SimWorld::new();
        let ship = moving_ship(&mut world);
        let mut origin = Origin::new();
        origin.move_to_object(ship, Vec3::new(0.0, 1.0, 0.0));
        origin.set_velocity(Vec3::Z);

        let mut info = ParticleInfo::default();
        origin.apply_to_particle_info(&world, &mut rng(), &mut info, true, 0.0);
        assert_eq!(info.attached_object, Some(ship));
        assert_eq!(info.pos, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(info.vel, Vec3::Z);
        assert_eq!(info.scale, 1.0);
        assert!(info.lifetime.is_none());

        origin.apply_to_particle_info(&world, &mut rng(), &mut info, false, 0.0);
        assert!(info.attached_object.is_none());
        assert!((info.pos - Vec3::new(0.0, 1.0, 20.0)).length() < 1e-5);
    }

    #[test]
    fn test_particle_info_from_particle_host() {
        let mut world = SimWorld::new();
        let p = world.spawn_particle(ParticleState {
            pos: Vec3::new(1.0, 2.0, 3.0),
            velocity: Vec3::ZERO,
            age: 0.25,
            max_life: 1.0,
            radius: 3.0,
        });
        let mut origin = Origin::new();
        origin.move_to_particle(p);

        let mut info = ParticleInfo::default();
        origin.apply_to_particle_info(&world, &mut rng(), &mut info, true, 0.0);
        assert_eq!(info.lifetime, Some(0.75));
        assert_eq!(info.scale, 3.0);
        assert_eq!(info.pos, Vec3::new(1.0, 2.0, 3.0));
    }
}
