//! Emission points and the registry that steps them.
//!
//! A [`Source`] bundles where it emits from ([`Origin`]), which way
//! ([`SourceOrientation`]) and when ([`SourceTiming`]), plus the effect that
//! decides what to emit. Each frame the [`SourceRegistry`] calls
//! [`Source::process`] on every source; a `false` return retires the source
//! and tells any trail it was feeding that its host is gone.
//!
//! ```ignore
//! let mut source = Source::new(exhaust_effect.clone(), clock.now());
//! source.origin_mut().move_to_object(ship, Vec3::new(0.0, 0.0, -4.0));
//! source.timing_mut().set_lifetime(clock.now(), clock.stamp(5000));
//! sources.add(source);
//!
//! // Frame loop
//! let mut ctx = ProcessContext::new(&world, &mut trails, &mut spawned, &mut rng)
//!     .at(clock.now(), clock.frametime());
//! sources.process_all(&mut ctx);
//! ```

use std::fmt;
use std::rc::Rc;

use rand::rngs::SmallRng;

use crate::effect::ParticleEffect;
use crate::handle::{Arena, Handle};
use crate::orientation::SourceOrientation;
use crate::origin::{Origin, ParticleInfo};
use crate::time::Timestamp;
use crate::timing::{SourceTiming, TimingState};
use crate::trail::{TrailHandle, TrailRegistry};
use crate::world::World;

/// Handle to a source owned by a [`SourceRegistry`].
pub type SourceHandle = Handle<Source>;

/// Everything a source may touch while it is processed.
pub struct ProcessContext<'a> {
    /// Entity lookups for origin resolution.
    pub world: &'a dyn World,
    /// Trails the effect may create or extend.
    pub trails: &'a mut TrailRegistry,
    /// Spawn records produced this frame.
    pub particles: &'a mut Vec<ParticleInfo>,
    /// Randomness for beam points and effect jitter.
    pub rng: &'a mut SmallRng,
    /// Current mission time.
    pub now: Timestamp,
    /// Seconds since last frame.
    pub frametime: f32,
    /// Blend toward last frame's host transforms, 0.0 = this frame.
    pub interp: f32,
}

impl<'a> ProcessContext<'a> {
    /// Context at mission start with zero frame time.
    pub fn new(
        world: &'a dyn World,
        trails: &'a mut TrailRegistry,
        particles: &'a mut Vec<ParticleInfo>,
        rng: &'a mut SmallRng,
    ) -> Self {
        Self {
            world,
            trails,
            particles,
            rng,
            now: Timestamp::ZERO,
            frametime: 0.0,
            interp: 0.0,
        }
    }

    /// Set the frame time.
    pub fn at(mut self, now: Timestamp, frametime: f32) -> Self {
        self.now = now;
        self.frametime = frametime;
        self
    }

    /// Set the interpolation factor, clamped to `[0, 1]`.
    pub fn with_interp(mut self, interp: f32) -> Self {
        self.interp = interp.clamp(0.0, 1.0);
        self
    }
}

/// One emission point.
pub struct Source {
    origin: Origin,
    orientation: SourceOrientation,
    timing: SourceTiming,
    effect: Rc<dyn ParticleEffect>,
    processing_count: u32,
    trail: Option<TrailHandle>,
}

impl Source {
    /// A source driven by `effect`, created at `now`.
    ///
    /// The origin starts unplaced and the timing window unset; both must be
    /// filled in before the source does anything.
    pub fn new(effect: Rc<dyn ParticleEffect>, now: Timestamp) -> Self {
        Self {
            origin: Origin::new(),
            orientation: SourceOrientation::new(),
            timing: SourceTiming::new(now),
            effect,
            processing_count: 0,
            trail: None,
        }
    }

    /// Where the source is anchored.
    #[inline]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Mutable anchor, for the `move_to_*` setters.
    #[inline]
    pub fn origin_mut(&mut self) -> &mut Origin {
        &mut self.origin
    }

    /// Emission direction.
    #[inline]
    pub fn orientation(&self) -> &SourceOrientation {
        &self.orientation
    }

    /// Mutable emission direction.
    #[inline]
    pub fn orientation_mut(&mut self) -> &mut SourceOrientation {
        &mut self.orientation
    }

    /// Active window and emission schedule.
    #[inline]
    pub fn timing(&self) -> &SourceTiming {
        &self.timing
    }

    /// Mutable timing, for `set_lifetime` and the creation accumulator.
    #[inline]
    pub fn timing_mut(&mut self) -> &mut SourceTiming {
        &mut self.timing
    }

    /// The effect driving this source.
    #[inline]
    pub fn effect(&self) -> &Rc<dyn ParticleEffect> {
        &self.effect
    }

    /// How many times [`process`](Self::process) has run.
    #[inline]
    pub fn processing_count(&self) -> u32 {
        self.processing_count
    }

    /// Trail this source is feeding, if any.
    #[inline]
    pub fn trail(&self) -> Option<TrailHandle> {
        self.trail
    }

    /// Attach a trail.
    #[inline]
    pub fn set_trail(&mut self, trail: Option<TrailHandle>) {
        self.trail = trail;
    }

    /// Whether the origin still resolves and the window has not closed.
    pub fn is_valid(&self, world: &dyn World, now: Timestamp) -> bool {
        self.origin.is_valid(world) && !self.timing.is_finished(now)
    }

    /// Run one step. Returns `false` when the source should be discarded.
    ///
    /// Pending sources just wait. Active sources hand off to their effect,
    /// which may also ask for the source to be retired.
    pub fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        self.processing_count += 1;

        if !self.origin.is_valid(ctx.world) {
            return false;
        }
        match self.timing.state(ctx.now) {
            TimingState::Pending => true,
            TimingState::Finished => false,
            TimingState::Active => {
                let effect = Rc::clone(&self.effect);
                effect.process_source(self, ctx)
            }
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("effect", &self.effect.name())
            .field("origin", &self.origin)
            .field("timing", &self.timing)
            .field("processing_count", &self.processing_count)
            .field("trail", &self.trail)
            .finish()
    }
}

/// Owner of every live source.
#[derive(Default)]
pub struct SourceRegistry {
    sources: Arena<Source>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a source.
    pub fn add(&mut self, source: Source) -> SourceHandle {
        self.sources.insert(source)
    }

    /// Resolve a handle.
    pub fn get(&self, handle: SourceHandle) -> Option<&Source> {
        self.sources.get(handle)
    }

    /// Resolve a handle mutably.
    pub fn get_mut(&mut self, handle: SourceHandle) -> Option<&mut Source> {
        self.sources.get_mut(handle)
    }

    /// Process every source once and retire those that are done.
    ///
    /// A retired source's trail is marked host-dead so it fades out on its
    /// own. Returns how many sources were retired.
    pub fn process_all(&mut self, ctx: &mut ProcessContext<'_>) -> usize {
        self.sources.retain(|handle, source| {
            if source.process(ctx) {
                return true;
            }
            if let Some(trail) = source.trail {
                ctx.trails.object_died(trail);
            }
            log::trace!(
                "retiring {} source {:?} after {} steps",
                source.effect.name(),
                handle,
                source.processing_count
            );
            false
        })
    }

    /// Drop every source without notifying trails. Returns how many.
    pub fn clear(&mut self) -> usize {
        self.sources.clear()
    }

    /// Live source count.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no sources are live.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterate live sources.
    pub fn iter(&self) -> impl Iterator<Item = (SourceHandle, &Source)> {
        self.sources.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FxSettings;
    use crate::world::{ObjectState, SimWorld};
    use glam::{Mat3, Vec3};
    use rand::SeedableRng;
    use std::cell::Cell;

    /// Counts calls and keeps going until told otherwise.
    struct CountingEffect {
        calls: Cell<u32>,
        keep_going: bool,
    }

    impl ParticleEffect for CountingEffect {
        fn name(&self) -> &str {
            "counting"
        }

        fn process_source(&self, _source: &mut Source, _ctx: &mut ProcessContext<'_>) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.keep_going
        }
    }

    fn counting(keep_going: bool) -> Rc<CountingEffect> {
        Rc::new(CountingEffect {
            calls: Cell::new(0),
            keep_going,
        })
    }

    fn ts(ms: i64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn placed(effect: Rc<dyn ParticleEffect>, begin: i64, end: i64) -> Source {
        let mut source = Source::new(effect, ts(0));
        source.origin_mut().move_to_vector(Vec3::ZERO, Mat3::IDENTITY);
        source.timing_mut().set_lifetime(ts(begin), ts(end));
        source
    }

    #[test]
    fn test_process_follows_timing() {
        let world = SimWorld::new();
        let mut trails = TrailRegistry::with_seed(FxSettings::new(), 1);
        let mut spawned = Vec::new();
        let mut rng = SmallRng::seed_from_u64(1);
        let effect = counting(true);
        let mut source = placed(effect.clone(), 100, 200);

        let mut ctx = ProcessContext::new(&world, &mut trails, &mut spawned, &mut rng).at(ts(50), 0.05);
        assert!(source.process(&mut ctx));
        assert_eq!(effect.calls.get(), 0);

        ctx.now = ts(150);
        assert!(source.process(&mut ctx));
        assert_eq!(effect.calls.get(), 1);

        ctx.now = ts(200);
        assert!(!source.process(&mut ctx));
        assert_eq!(effect.calls.get(), 1);
        assert_eq!(source.processing_count(), 3);
    }

    #[test]
    fn test_unplaced_source_is_invalid() {
        let world = SimWorld::new();
        let mut source = Source::new(counting(true), ts(0));
        source.timing_mut().set_lifetime(ts(0), ts(1000));
        assert!(!source.is_valid(&world, ts(10)));
    }

    #[test]
    fn test_destroyed_host_retires_source_and_trail() {
        let mut world = SimWorld::new();
        let ship = world.spawn_object(ObjectState::new(Vec3::ZERO, Mat3::IDENTITY));
        let mut trails = TrailRegistry::with_seed(FxSettings::new(), 1);
        let trail = trails
            .create(&crate::trail::TrailInfo::new(1), false, ts(0))
            .unwrap();

        let mut sources = SourceRegistry::new();
        let mut source = Source::new(counting(true), ts(0));
        source.origin_mut().move_to_object(ship, Vec3::ZERO);
        source.timing_mut().set_lifetime(ts(0), ts(10_000));
        source.set_trail(Some(trail));
        let handle = sources.add(source);

        let mut spawned = Vec::new();
        let mut rng = SmallRng::seed_from_u64(1);
        {
            let mut ctx = ProcessContext::new(&world, &mut trails, &mut spawned, &mut rng).at(ts(10), 0.01);
            assert_eq!(sources.process_all(&mut ctx), 0);
        }
        assert!(sources.get(handle).is_some());

        world.destroy_object(ship);
        {
            let mut ctx = ProcessContext::new(&world, &mut trails, &mut spawned, &mut rng).at(ts(20), 0.01);
            assert_eq!(sources.process_all(&mut ctx), 1);
        }
        assert!(sources.is_empty());
        assert!(trails.get(trail).unwrap().is_object_died());
    }

    #[test]
    fn test_effect_can_retire_source() {
        let world = SimWorld::new();
        let mut trails = TrailRegistry::with_seed(FxSettings::new(), 1);
        let mut spawned = Vec::new();
        let mut rng = SmallRng::seed_from_u64(1);

        let mut sources = SourceRegistry::new();
        sources.add(placed(counting(false), 0, 1000));
        sources.add(placed(counting(true), 0, 1000));

        let mut ctx = ProcessContext::new(&world, &mut trails, &mut spawned, &mut rng).at(ts(10), 0.01);
        assert_eq!(sources.process_all(&mut ctx), 1);
        assert_eq!(sources.len(), 1);
    }
}
