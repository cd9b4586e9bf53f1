//! Effect definitions: what a source emits once it is active.
//!
//! Effects are shared, immutable definitions. Many sources can point at the
//! same effect through an `Rc`; all per-source state lives on the
//! [`Source`] itself.
//!
//! Two effects ship with the crate:
//!
//! - [`PointEffect`] emits [`ParticleInfo`] records at a fixed interval,
//!   catching up when a frame spans several intervals.
//! - [`TrailEffect`] lays down a trail behind the source's origin.

use crate::origin::ParticleInfo;
use crate::source::{ProcessContext, Source};
use crate::trail::TrailInfo;

/// Drives an active [`Source`].
pub trait ParticleEffect {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Emit whatever is due this frame.
    ///
    /// Only called while the source's window is open and its origin
    /// resolves. Return `false` to retire the source early.
    fn process_source(&self, source: &mut Source, ctx: &mut ProcessContext<'_>) -> bool;
}

/// Fixed-rate particle emitter.
#[derive(Debug, Clone, PartialEq)]
pub struct PointEffect {
    name: String,
    interval_ms: i64,
    speed: f32,
    lifetime: Option<f32>,
    allow_relative: bool,
}

impl PointEffect {
    /// One particle every `interval_ms` milliseconds.
    pub fn new(name: impl Into<String>, interval_ms: i64) -> Self {
        Self {
            name: name.into(),
            interval_ms: interval_ms.max(1),
            speed: 0.0,
            lifetime: None,
            allow_relative: true,
        }
    }

    /// Launch speed along the source's direction.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Lifetime handed to particles whose origin does not supply one.
    pub fn with_lifetime(mut self, seconds: f32) -> Self {
        self.lifetime = Some(seconds.max(0.0));
        self
    }

    /// Whether particles may ride on their host object.
    pub fn with_relative(mut self, allow: bool) -> Self {
        self.allow_relative = allow;
        self
    }
}

impl ParticleEffect for PointEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_source(&self, source: &mut Source, ctx: &mut ProcessContext<'_>) -> bool {
        let due = source.timing_mut().consume_due_creations(ctx.now, self.interval_ms);
        if due == 0 {
            return true;
        }

        let direction = source
            .orientation()
            .direction_vector(source.origin(), ctx.world, self.allow_relative);

        for _ in 0..due {
            let mut info = ParticleInfo::default();
            source.origin().apply_to_particle_info(
                ctx.world,
                &mut *ctx.rng,
                &mut info,
                self.allow_relative,
                ctx.interp,
            );
            if info.attached_object.is_none() {
                info.vel = source.origin().velocity(ctx.world);
            }
            info.vel += direction * self.speed;
            info.lifetime = info.lifetime.or(self.lifetime);
            ctx.particles.push(info);
        }
        true
    }
}

/// Trail laid down behind a source.
///
/// The trail is created on the first active frame and owned by the trail
/// registry; the source only keeps its handle. New sections are appended
/// whenever the trail's emission throttle runs out, and in between the
/// newest section is pinned to the origin so the ribbon stays attached.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailEffect {
    name: String,
    info: TrailInfo,
    const_vel: bool,
}

impl TrailEffect {
    /// Trail effect using `info`.
    pub fn new(name: impl Into<String>, info: TrailInfo) -> Self {
        Self {
            name: name.into(),
            info,
            const_vel: false,
        }
    }

    /// Mark the host as moving at constant velocity.
    ///
    /// Combined with a plain [`TrailInfo`] this selects the two-section trail.
    pub fn with_const_vel(mut self, const_vel: bool) -> Self {
        self.const_vel = const_vel;
        self
    }

    /// Trail appearance.
    pub fn info(&self) -> &TrailInfo {
        &self.info
    }
}

impl ParticleEffect for TrailEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_source(&self, source: &mut Source, ctx: &mut ProcessContext<'_>) -> bool {
        let Some(pos) = source.origin().global_position(ctx.world, &mut *ctx.rng, ctx.interp, None) else {
            return false;
        };
        let orient = source.origin().host_orientation(ctx.world);
        let vel = source.origin().velocity(ctx.world);

        let trail = match source.trail().filter(|t| ctx.trails.contains(*t)) {
            Some(trail) => trail,
            None => {
                let Some(trail) = ctx.trails.create(&self.info, self.const_vel, ctx.now) else {
                    // Suppressed by settings; keep the source alive for anything else it drives.
                    return true;
                };
                if let Some(owner) = source.origin().host_object() {
                    ctx.trails.set_owner(trail, owner);
                }
                source.set_trail(Some(trail));
                trail
            }
        };

        let (stored, single_segment) = match ctx.trails.get(trail) {
            Some(t) => (t.len(), t.is_single_segment()),
            None => return true,
        };

        if single_segment {
            // Both ends start at the launch point; the front then flies with the host.
            for _ in stored..2 {
                ctx.trails.add_segment(trail, pos, Some(&orient), vel);
            }
            return true;
        }

        if stored == 0 || ctx.trails.stamp_elapsed(trail, ctx.now) {
            ctx.trails.add_segment(trail, pos, Some(&orient), vel);
            ctx.trails.set_stamp(trail, ctx.now);
        } else {
            ctx.trails.set_segment(trail, pos);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FxSettings;
    use crate::time::Timestamp;
    use crate::trail::TrailRegistry;
    use crate::world::{ObjectState, SimWorld};
    use glam::{Mat3, Vec3};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::rc::Rc;

    fn ts(ms: i64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn test_point_effect_catches_up() {
        let world = SimWorld::new();
        let mut trails = TrailRegistry::with_seed(FxSettings::new(), 1);
        let mut spawned = Vec::new();
        let mut rng = SmallRng::seed_from_u64(1);

        let effect = Rc::new(PointEffect::new("sparks", 100).with_speed(5.0).with_lifetime(0.5));
        let mut source = Source::new(effect, ts(0));
        source.origin_mut().move_to_vector(Vec3::new(1.0, 2.0, 3.0), Mat3::IDENTITY);
        source.orientation_mut().set_from_vector(Vec3::X, false);
        source.timing_mut().set_lifetime(ts(0), ts(10_000));

        let mut ctx = ProcessContext::new(&world, &mut trails, &mut spawned, &mut rng).at(ts(450), 0.45);
        assert!(source.process(&mut ctx));

        // Due at 0, 100, 200, 300, 400
        assert_eq!(spawned.len(), 5);
        for p in &spawned {
            assert_eq!(p.pos, Vec3::new(1.0, 2.0, 3.0));
            assert!((p.vel - Vec3::X * 5.0).length() < 1e-5);
            assert_eq!(p.lifetime, Some(0.5));
            assert_eq!(p.scale, 1.0);
        }
    }

    #[test]
    fn test_point_effect_inherits_host_velocity() {
        let mut world = SimWorld::new();
        let mut ship = ObjectState::new(Vec3::ZERO, Mat3::IDENTITY);
        ship.velocity = Vec3::new(0.0, 0.0, 20.0);
        let ship = world.spawn_object(ship);

        let mut trails = TrailRegistry::with_seed(FxSettings::new(), 1);
        let mut spawned = Vec::new();
        let mut rng = SmallRng::seed_from_u64(1);

        let effect = Rc::new(PointEffect::new("wake", 50).with_relative(false));
        let mut source = Source::new(effect, ts(0));
        source.origin_mut().move_to_object(ship, Vec3::ZERO);
        source.timing_mut().set_lifetime(ts(0), ts(1000));

        let mut ctx = ProcessContext::new(&world, &mut trails, &mut spawned, &mut rng).at(ts(0), 0.0);
        assert!(source.process(&mut ctx));
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].vel, Vec3::new(0.0, 0.0, 20.0));
        assert!(spawned[0].attached_object.is_none());
    }

    #[test]
    fn test_trail_effect_creates_and_extends() {
        let mut world = SimWorld::new();
        let ship = world.spawn_object(ObjectState::new(Vec3::ZERO, Mat3::IDENTITY));
        let mut trails = TrailRegistry::with_seed(FxSettings::new(), 1);
        let mut spawned = Vec::new();
        let mut rng = SmallRng::seed_from_u64(1);

        let effect = Rc::new(TrailEffect::new("exhaust", TrailInfo::new(1).with_stamp(100)));
        let mut source = Source::new(effect, ts(0));
        source.origin_mut().move_to_object(ship, Vec3::ZERO);
        source.timing_mut().set_lifetime(ts(0), ts(10_000));

        for frame in 0..5 {
            let now = ts(frame * 50);
            if let Some(obj) = world.object_mut(ship) {
                obj.step_to(Vec3::new(0.0, 0.0, frame as f32), Mat3::IDENTITY);
            }
            let mut ctx = ProcessContext::new(&world, &mut trails, &mut spawned, &mut rng).at(now, 0.05);
            assert!(source.process(&mut ctx));
        }

        let trail = source.trail().unwrap();
        assert!(trails.is_on_ship(trail, ship));
        let t = trails.get(trail).unwrap();
        // Appended at 0, 100, 200; pinned to the host in between
        assert_eq!(t.len(), 3);
        let newest = t.sections().last().unwrap().0;
        assert_eq!(newest, Vec3::new(0.0, 0.0, 4.0));
    }

    #[test]
    fn test_trail_effect_fast_path_stores_two() {
        let mut world = SimWorld::new();
        let ship = world.spawn_object(ObjectState::new(Vec3::ZERO, Mat3::IDENTITY));
        let mut trails = TrailRegistry::with_seed(FxSettings::new(), 1);
        let mut spawned = Vec::new();
        let mut rng = SmallRng::seed_from_u64(1);

        let effect = Rc::new(TrailEffect::new("missile", TrailInfo::new(1)).with_const_vel(true));
        let mut source = Source::new(effect, ts(0));
        source.origin_mut().move_to_object(ship, Vec3::ZERO);
        source.timing_mut().set_lifetime(ts(0), ts(10_000));

        for frame in 0..10 {
            let mut ctx = ProcessContext::new(&world, &mut trails, &mut spawned, &mut rng).at(ts(frame * 16), 0.016);
            assert!(source.process(&mut ctx));
        }
        let t = trails.get(source.trail().unwrap()).unwrap();
        assert!(t.is_single_segment());
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_trail_effect_suppressed_on_server() {
        let world = SimWorld::new();
        let mut trails = TrailRegistry::with_seed(FxSettings::standalone_server(), 1);
        let mut spawned = Vec::new();
        let mut rng = SmallRng::seed_from_u64(1);

        let effect = Rc::new(TrailEffect::new("exhaust", TrailInfo::new(1)));
        let mut source = Source::new(effect, ts(0));
        source.origin_mut().move_to_vector(Vec3::ZERO, Mat3::IDENTITY);
        source.timing_mut().set_lifetime(ts(0), ts(1000));

        let mut ctx = ProcessContext::new(&world, &mut trails, &mut spawned, &mut rng).at(ts(10), 0.01);
        assert!(source.process(&mut ctx));
        assert!(source.trail().is_none());
        assert!(trails.is_empty());
    }
}
