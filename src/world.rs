//! The world-entity collaborator: what origins anchor to.
//!
//! Origins never own their hosts. They hold [`Handle`]s and resolve them
//! through a [`World`] every time they need a position, so a host that was
//! destroyed between frames simply stops resolving.
//!
//! [`SimWorld`] is a small arena-backed implementation used by tools and
//! tests; a game plugs its own object tables in by implementing [`World`].

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

use crate::handle::{Arena, Handle};

/// Weak handle to a world object (ship, weapon, debris...).
pub type ObjectHandle = Handle<ObjectState>;
/// Weak handle to a beam.
pub type BeamHandle = Handle<BeamState>;
/// Weak handle to a live particle.
pub type ParticleHandle = Handle<ParticleState>;

/// Flight phase of a weapon object.
///
/// An origin can be restricted to one phase; it reports invalid as soon as
/// its host weapon leaves that phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponState {
    /// Launched, not yet in any specialised phase.
    Normal,
    /// Unpowered glide after launch.
    FreeFlight,
    /// Engine ignition.
    Ignition,
    /// Guided flight with a lock.
    HomedFlight,
    /// Powered flight without a lock.
    UnhomedFlight,
}

/// Host-side view of a turret: the submodel it sits on and its muzzles.
#[derive(Debug, Clone, Default)]
pub struct TurretState {
    /// Submodel index of the turret base.
    pub submodel: usize,
    /// Fire points relative to the base submodel.
    pub fire_points: Vec<Vec3>,
}

/// Per-frame transform record of a world object.
#[derive(Debug, Clone)]
pub struct ObjectState {
    /// Current-frame world position.
    pub pos: Vec3,
    /// Previous-frame world position.
    pub last_pos: Vec3,
    /// Current-frame orientation (columns: right, up, forward).
    pub orient: Mat3,
    /// Previous-frame orientation.
    pub last_orient: Mat3,
    /// World-space velocity.
    pub velocity: Vec3,
    /// Submodel offsets in object-local space, by submodel index.
    pub submodels: Vec<Vec3>,
    /// Turrets, by turret index.
    pub turrets: Vec<TurretState>,
    /// Flight phase if this object is a weapon.
    pub weapon_state: Option<WeaponState>,
}

impl ObjectState {
    /// Stationary object at `pos` with orientation `orient`.
    pub fn new(pos: Vec3, orient: Mat3) -> Self {
        Self {
            pos,
            last_pos: pos,
            orient,
            last_orient: orient,
            velocity: Vec3::ZERO,
            submodels: Vec::new(),
            turrets: Vec::new(),
            weapon_state: None,
        }
    }

    /// Move to a new transform, keeping the old one as last frame's.
    pub fn step_to(&mut self, pos: Vec3, orient: Mat3) {
        self.last_pos = self.pos;
        self.last_orient = self.orient;
        self.pos = pos;
        self.orient = orient;
    }
}

/// Current extent of a beam.
#[derive(Debug, Clone, Copy)]
pub struct BeamState {
    /// Muzzle end.
    pub start: Vec3,
    /// Far end (impact point or max range).
    pub end: Vec3,
}

/// A live particle that other effects can anchor to.
#[derive(Debug, Clone, Copy)]
pub struct ParticleState {
    /// World position.
    pub pos: Vec3,
    /// World velocity.
    pub velocity: Vec3,
    /// Seconds since spawn.
    pub age: f32,
    /// Lifetime in seconds.
    pub max_life: f32,
    /// Visual radius.
    pub radius: f32,
}

impl ParticleState {
    /// Seconds left before the particle expires.
    #[inline]
    pub fn remaining_life(&self) -> f32 {
        (self.max_life - self.age).max(0.0)
    }

    /// Whether the particle has outlived its lifetime.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.age >= self.max_life
    }
}

/// Lookup surface the emission subsystem needs from the simulation.
///
/// Every method returns `None` once the referent is gone; callers treat that
/// as "host invalid", never as an error.
pub trait World {
    /// Resolve an object.
    fn object(&self, handle: ObjectHandle) -> Option<&ObjectState>;

    /// Resolve a beam.
    fn beam(&self, handle: BeamHandle) -> Option<&BeamState>;

    /// Resolve a particle.
    fn particle(&self, handle: ParticleHandle) -> Option<&ParticleState>;

    /// Object-local offset of a submodel.
    fn submodel_offset(&self, handle: ObjectHandle, submodel: usize) -> Option<Vec3> {
        self.object(handle)?.submodels.get(submodel).copied()
    }

    /// Object-local position of a turret fire point.
    ///
    /// Fire points are stored relative to the turret's base submodel.
    fn turret_fire_point(&self, handle: ObjectHandle, turret: usize, fire_point: usize) -> Option<Vec3> {
        let obj = self.object(handle)?;
        let turret = obj.turrets.get(turret)?;
        let base = obj.submodels.get(turret.submodel).copied().unwrap_or(Vec3::ZERO);
        Some(base + *turret.fire_points.get(fire_point)?)
    }
}

/// Arena-backed [`World`] for tools and tests.
#[derive(Default)]
pub struct SimWorld {
    objects: Arena<ObjectState>,
    beams: Arena<BeamState>,
    particles: Arena<ParticleState>,
}

impl SimWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object.
    pub fn spawn_object(&mut self, state: ObjectState) -> ObjectHandle {
        self.objects.insert(state)
    }

    /// Destroy an object. Handles to it stop resolving.
    pub fn destroy_object(&mut self, handle: ObjectHandle) -> Option<ObjectState> {
        self.objects.remove(handle)
    }

    /// Mutable access to an object, e.g. to step its transform.
    pub fn object_mut(&mut self, handle: ObjectHandle) -> Option<&mut ObjectState> {
        self.objects.get_mut(handle)
    }

    /// Add a beam.
    pub fn spawn_beam(&mut self, state: BeamState) -> BeamHandle {
        self.beams.insert(state)
    }

    /// Remove a beam.
    pub fn destroy_beam(&mut self, handle: BeamHandle) -> Option<BeamState> {
        self.beams.remove(handle)
    }

    /// Add a particle.
    pub fn spawn_particle(&mut self, state: ParticleState) -> ParticleHandle {
        self.particles.insert(state)
    }

    /// Mutable access to a particle.
    pub fn particle_mut(&mut self, handle: ParticleHandle) -> Option<&mut ParticleState> {
        self.particles.get_mut(handle)
    }

    /// Age all particles by `frametime` seconds and drop the expired ones.
    pub fn age_particles(&mut self, frametime: f32) -> usize {
        self.particles.retain(|_, p| {
            p.age += frametime;
            p.pos += p.velocity * frametime;
            !p.is_expired()
        })
    }
}

impl World for SimWorld {
    fn object(&self, handle: ObjectHandle) -> Option<&ObjectState> {
        self.objects.get(handle)
    }

    fn beam(&self, handle: BeamHandle) -> Option<&BeamState> {
        self.beams.get(handle)
    }

    fn particle(&self, handle: ParticleHandle) -> Option<&ParticleState> {
        self.particles.get(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destroyed_object_stops_resolving() {
        let mut world = SimWorld::new();
        let h = world.spawn_object(ObjectState::new(Vec3::X, Mat3::IDENTITY));
        assert!(world.object(h).is_some());

        world.destroy_object(h);
        assert!(world.object(h).is_none());
        assert!(world.submodel_offset(h, 0).is_none());
    }

    #[test]
    fn test_step_to_keeps_last_frame() {
        let mut state = ObjectState::new(Vec3::ZERO, Mat3::IDENTITY);
        state.step_to(Vec3::new(0.0, 0.0, 5.0), Mat3::from_rotation_y(1.0));

        assert_eq!(state.last_pos, Vec3::ZERO);
        assert_eq!(state.last_orient, Mat3::IDENTITY);
        assert_eq!(state.pos.z, 5.0);
    }

    #[test]
    fn test_turret_fire_point_lookup() {
        let mut world = SimWorld::new();
        let mut ship = ObjectState::new(Vec3::ZERO, Mat3::IDENTITY);
        ship.turrets.push(TurretState {
            submodel: 2,
            fire_points: vec![Vec3::new(1.0, 2.0, 3.0)],
        });
        let h = world.spawn_object(ship);

        assert_eq!(world.turret_fire_point(h, 0, 0), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert!(world.turret_fire_point(h, 0, 1).is_none());
        assert!(world.turret_fire_point(h, 1, 0).is_none());
    }

    #[test]
    fn test_particles_expire() {
        let mut world = SimWorld::new();
        let h = world.spawn_particle(ParticleState {
            pos: Vec3::ZERO,
            velocity: Vec3::X,
            age: 0.0,
            max_life: 1.0,
            radius: 0.5,
        });

        assert_eq!(world.age_particles(0.5), 0);
        assert!((world.particle(h).map(|p| p.pos.x).unwrap_or(0.0) - 0.5).abs() < 1e-6);
        assert_eq!(world.age_particles(0.6), 1);
        assert!(world.particle(h).is_none());
    }
}
