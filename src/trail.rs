//! Motion trails: fixed-capacity ribbons recording a moving point's path.
//!
//! A [`Trail`] is a ring buffer of [`TRAIL_SECTIONS`] sections. Each section
//! stores a position, a velocity and a normalized age (0.0 when recorded,
//! 1.0 when it has lived `max_life` seconds). Appending to a full trail
//! silently overwrites the oldest section.
//!
//! All trails live in a [`TrailRegistry`]. Callers hold [`TrailHandle`]s,
//! which go stale once the registry reclaims the trail.
//!
//! # Lifecycle
//!
//! ```ignore
//! let info = TrailInfo::new(texture_id)
//!     .with_width(0.5, 0.1)
//!     .with_alpha(1.0, 0.0)
//!     .with_max_life(2.0);
//!
//! let trail = trails.create(&info, false, clock.now()).unwrap();
//!
//! // Each frame while the host lives:
//! trails.add_segment(trail, ship_pos, Some(&ship_orient), ship_vel);
//! trails.move_all(frametime);
//! trails.render_all(&view, &textures, None, &mut batch);
//!
//! // When the host dies, the trail fades out and is reclaimed.
//! trails.object_died(trail);
//! ```
//!
//! # Single-segment trails
//!
//! A constant-velocity trail with no spread, no decay curve and no fade-out
//! only ever needs its two endpoints. Such trails store exactly two
//! sections: the back (launch) end and the front (host) end. The back is
//! born with a negative age worth `spew_duration` and holds the launch
//! point until its age passes zero, then trails the front at the same
//! velocity. Once the host dies the front starts aging, and the trail is
//! gone when the front has caught up with the back.

use glam::{Mat3, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::camera::RenderView;
use crate::config::FxSettings;
use crate::handle::{Arena, Handle};
use crate::render::{build_trail_geometry, FogModel, TextureId, TextureLookup, TrailBatcher, TrailVertex};
use crate::time::Timestamp;
use crate::world::ObjectHandle;

/// Sections per trail.
pub const TRAIL_SECTIONS: usize = 128;

/// Handle to a trail owned by a [`TrailRegistry`].
pub type TrailHandle = Handle<Trail>;

/// Appearance and timing of a trail.
///
/// Widths are world units, alphas are `[0, 1]`, `max_life` is seconds,
/// `stamp` and `spew_duration` are milliseconds. Values read from settings
/// files are clamped the same way as the builder when a trail is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailInfo {
    /// Width at the newest section.
    pub w_start: f32,
    /// Width at full age.
    pub w_end: f32,
    /// Alpha at the newest section.
    pub a_start: f32,
    /// Alpha at full age.
    pub a_end: f32,
    /// Exponent applied to age before blending alpha.
    pub a_decay_exponent: f32,
    /// Seconds a section takes to reach full age.
    pub max_life: f32,
    /// Random lateral velocity added to each new section.
    pub spread: f32,
    /// Minimum milliseconds between segment emissions.
    pub stamp: i64,
    /// Milliseconds a single-segment trail holds its launch point.
    pub spew_duration: i64,
    /// Bitmap id.
    pub texture: TextureId,
    /// Sections at the newest end that fade in quadratically.
    pub fade_out_sections: u32,
    /// World length covered by one texture repeat.
    pub texture_stretch: f32,
}

impl TrailInfo {
    /// A one-unit wide trail fading from opaque to clear over one second.
    pub fn new(texture: TextureId) -> Self {
        Self {
            w_start: 1.0,
            w_end: 1.0,
            a_start: 1.0,
            a_end: 0.0,
            a_decay_exponent: 1.0,
            max_life: 1.0,
            spread: 0.0,
            stamp: 0,
            spew_duration: 0,
            texture,
            fade_out_sections: 0,
            texture_stretch: 1.0,
        }
    }

    /// Set start and end widths. Negative widths clamp to 0.
    pub fn with_width(mut self, start: f32, end: f32) -> Self {
        self.w_start = start.max(0.0);
        self.w_end = end.max(0.0);
        self
    }

    /// Set start and end alpha, clamped to `[0, 1]`.
    pub fn with_alpha(mut self, start: f32, end: f32) -> Self {
        self.a_start = start.max(0.0).min(1.0);
        self.a_end = end.max(0.0).min(1.0);
        self
    }

    /// Set the alpha decay exponent. Clamped to be positive.
    pub fn with_decay_exponent(mut self, exponent: f32) -> Self {
        self.a_decay_exponent = exponent.max(0.01);
        self
    }

    /// Set section lifetime in seconds.
    pub fn with_max_life(mut self, seconds: f32) -> Self {
        self.max_life = seconds.max(0.001);
        self
    }

    /// Set lateral spread.
    pub fn with_spread(mut self, spread: f32) -> Self {
        self.spread = spread.max(0.0);
        self
    }

    /// Set the emission throttle in milliseconds.
    pub fn with_stamp(mut self, ms: i64) -> Self {
        self.stamp = ms.max(0);
        self
    }

    /// Set how long a single-segment trail holds its launch point.
    pub fn with_spew_duration(mut self, ms: i64) -> Self {
        self.spew_duration = ms.max(0);
        self
    }

    /// Set how many newest sections fade in.
    pub fn with_fade_out_sections(mut self, sections: u32) -> Self {
        self.fade_out_sections = sections.min(TRAIL_SECTIONS as u32);
        self
    }

    /// Set the world length of one texture repeat.
    pub fn with_texture_stretch(mut self, stretch: f32) -> Self {
        self.texture_stretch = stretch.max(0.001);
        self
    }

    /// Run every builder clamp over the current values.
    ///
    /// NaN inputs land on the lower bound.
    pub fn sanitized(self) -> Self {
        let (w_start, w_end, a_start, a_end) = (self.w_start, self.w_end, self.a_start, self.a_end);
        let (exponent, life, spread, stamp) = (self.a_decay_exponent, self.max_life, self.spread, self.stamp);
        let (spew, fade, stretch) = (self.spew_duration, self.fade_out_sections, self.texture_stretch);
        self.with_width(w_start, w_end)
            .with_alpha(a_start, a_end)
            .with_decay_exponent(exponent)
            .with_max_life(life)
            .with_spread(spread)
            .with_stamp(stamp)
            .with_spew_duration(spew)
            .with_fade_out_sections(fade)
            .with_texture_stretch(stretch)
    }

    /// Whether a trail with this info and `const_vel` takes the two-section path.
    pub fn is_single_segment(&self, const_vel: bool) -> bool {
        const_vel && self.a_decay_exponent == 1.0 && self.spread == 0.0 && self.fade_out_sections == 0
    }
}

impl Default for TrailInfo {
    fn default() -> Self {
        Self::new(0)
    }
}

/// One ribbon's ring buffer.
#[derive(Debug, Clone)]
pub struct Trail {
    pos: [Vec3; TRAIL_SECTIONS],
    val: [f32; TRAIL_SECTIONS],
    vel: [Vec3; TRAIL_SECTIONS],
    head: usize,
    tail: usize,
    len: usize,
    object_died: bool,
    single_segment: bool,
    stamp: Timestamp,
    owner: Option<ObjectHandle>,
    info: TrailInfo,
}

impl Trail {
    fn new(info: TrailInfo, const_vel: bool, now: Timestamp) -> Self {
        let info = info.sanitized();
        let single_segment = info.is_single_segment(const_vel);
        let stamp = now + info.stamp;
        Self {
            pos: [Vec3::ZERO; TRAIL_SECTIONS],
            val: [0.0; TRAIL_SECTIONS],
            vel: [Vec3::ZERO; TRAIL_SECTIONS],
            head: 0,
            tail: 0,
            len: 0,
            object_died: false,
            single_segment,
            stamp,
            owner: None,
            info,
        }
    }

    /// Appearance parameters.
    #[inline]
    pub fn info(&self) -> &TrailInfo {
        &self.info
    }

    /// Stored sections, including expired ones not yet overwritten.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot of the oldest section.
    #[inline]
    pub fn head(&self) -> usize {
        self.head
    }

    /// Slot the next section will be written to.
    #[inline]
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Whether this trail uses the two-section path.
    #[inline]
    pub fn is_single_segment(&self) -> bool {
        self.single_segment
    }

    /// Whether the host has been reported dead.
    #[inline]
    pub fn is_object_died(&self) -> bool {
        self.object_died
    }

    /// Object this trail was attached to.
    #[inline]
    pub fn owner(&self) -> Option<ObjectHandle> {
        self.owner
    }

    /// `(position, age)` of each section, oldest first.
    pub fn sections(&self) -> impl Iterator<Item = (Vec3, f32)> + '_ {
        (0..self.len).map(move |i| {
            let idx = (self.head + i) % TRAIL_SECTIONS;
            (self.pos[idx], self.val[idx])
        })
    }

    /// Sections whose age has not passed 1.0.
    pub fn alive_sections(&self) -> usize {
        if self.single_segment && self.len == 2 {
            return if self.val[self.front()] < self.val[self.head] { 2 } else { 0 };
        }
        self.sections().filter(|(_, age)| *age <= 1.0).count()
    }

    pub(crate) fn indices_newest_first(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).map(move |i| (self.tail + TRAIL_SECTIONS - 1 - i) % TRAIL_SECTIONS)
    }

    #[inline]
    pub(crate) fn position_at(&self, idx: usize) -> Vec3 {
        self.pos[idx]
    }

    #[inline]
    pub(crate) fn age_at(&self, idx: usize) -> f32 {
        self.val[idx]
    }

    #[inline]
    fn front(&self) -> usize {
        (self.tail + TRAIL_SECTIONS - 1) % TRAIL_SECTIONS
    }

    fn push(&mut self, pos: Vec3, orient: Option<&Mat3>, velocity: Vec3, rng: &mut SmallRng) {
        if self.single_segment && self.len >= 2 {
            log::warn!("ignoring append to a single-segment trail that already has both ends");
            return;
        }

        let mut vel = velocity;
        if let Some(orient) = orient {
            if self.info.spread > 0.0 {
                let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                let r = self.info.spread * rng.gen::<f32>().sqrt();
                vel += (orient.x_axis * angle.cos() + orient.y_axis * angle.sin()) * r;
            }
        }

        let age = if self.single_segment && self.len == 0 {
            -(self.info.spew_duration as f32 / 1000.0) / self.info.max_life
        } else {
            0.0
        };
        self.pos[self.tail] = pos;
        self.val[self.tail] = age;
        self.vel[self.tail] = vel;
        self.tail = (self.tail + 1) % TRAIL_SECTIONS;
        if self.len == TRAIL_SECTIONS {
            self.head = (self.head + 1) % TRAIL_SECTIONS;
        } else {
            self.len += 1;
        }
    }

    fn overwrite_newest(&mut self, pos: Vec3) {
        if self.len > 0 {
            let front = self.front();
            self.pos[front] = pos;
        }
    }

    /// Age and move every section by `frametime` seconds.
    fn advance(&mut self, frametime: f32) {
        let step = frametime / self.info.max_life;

        if self.single_segment && self.len == 2 {
            let (back, front) = (self.head, self.front());
            if self.object_died {
                self.val[front] = (self.val[front] + step).min(1.0);
            } else {
                self.pos[front] += self.vel[front] * frametime;
            }
            self.val[back] = (self.val[back] + step).min(1.0);
            if self.val[back] > 0.0 {
                self.pos[back] += self.vel[back] * frametime;
            }
            return;
        }

        for i in 0..self.len {
            let idx = (self.head + i) % TRAIL_SECTIONS;
            self.val[idx] += step;
            self.pos[idx] += self.vel[idx] * frametime;
        }
    }
}

/// Owner of every live trail.
///
/// Created once and reset at each mission boundary with
/// [`level_init`](Self::level_init) and [`level_close`](Self::level_close).
pub struct TrailRegistry {
    trails: Arena<Trail>,
    settings: FxSettings,
    rng: SmallRng,
    scratch: Vec<TrailVertex>,
}

impl TrailRegistry {
    /// Create an empty registry with a time-seeded RNG.
    pub fn new(settings: FxSettings) -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42);
        Self::with_seed(settings, seed)
    }

    /// Create an empty registry with a fixed RNG seed.
    pub fn with_seed(settings: FxSettings, seed: u64) -> Self {
        Self {
            trails: Arena::new(),
            settings,
            rng: SmallRng::seed_from_u64(seed),
            scratch: Vec::with_capacity(TRAIL_SECTIONS * 6),
        }
    }

    /// Current settings.
    #[inline]
    pub fn settings(&self) -> &FxSettings {
        &self.settings
    }

    /// Replace the settings. Existing trails are kept.
    pub fn set_settings(&mut self, settings: FxSettings) {
        self.settings = settings;
    }

    /// Reset for a new mission.
    pub fn level_init(&mut self) {
        let freed = self.trails.clear();
        log::debug!("trail registry initialised ({} stale trails dropped)", freed);
    }

    /// Free every trail regardless of host state. Returns how many were freed.
    pub fn level_close(&mut self) -> usize {
        let freed = self.trails.clear();
        log::debug!("trail registry closed, freed {} trails", freed);
        freed
    }

    /// Start a new trail.
    ///
    /// Returns `None` when trails are suppressed by the server role or the
    /// detail level.
    pub fn create(&mut self, info: &TrailInfo, const_vel: bool, now: Timestamp) -> Option<TrailHandle> {
        if !self.settings.creates_trails() {
            log::trace!(
                "trail creation suppressed (mode {:?}, weapon extras {})",
                self.settings.game_mode,
                self.settings.weapon_extras
            );
            return None;
        }
        Some(self.trails.insert(Trail::new(info.clone(), const_vel, now)))
    }

    /// Record the object a trail belongs to.
    pub fn set_owner(&mut self, trail: TrailHandle, owner: ObjectHandle) -> bool {
        match self.trails.get_mut(trail) {
            Some(t) => {
                t.owner = Some(owner);
                true
            }
            None => false,
        }
    }

    /// Append a section.
    ///
    /// Spread jitter is only applied when `orient` is given. Returns `false`
    /// for a stale handle.
    pub fn add_segment(&mut self, trail: TrailHandle, pos: Vec3, orient: Option<&Mat3>, velocity: Vec3) -> bool {
        match self.trails.get_mut(trail) {
            Some(t) => {
                t.push(pos, orient, velocity, &mut self.rng);
                true
            }
            None => false,
        }
    }

    /// Move the newest section to `pos` without advancing the ring.
    pub fn set_segment(&mut self, trail: TrailHandle, pos: Vec3) -> bool {
        match self.trails.get_mut(trail) {
            Some(t) => {
                t.overwrite_newest(pos);
                true
            }
            None => false,
        }
    }

    /// Mark a trail's host as dead. The trail is reclaimed once fully faded.
    pub fn object_died(&mut self, trail: TrailHandle) -> bool {
        match self.trails.get_mut(trail) {
            Some(t) => {
                t.object_died = true;
                true
            }
            None => false,
        }
    }

    /// Mark every trail owned by `owner` as host-dead. Returns how many.
    pub fn owner_died(&mut self, owner: ObjectHandle) -> usize {
        let mut count = 0;
        for (_, t) in self.trails.iter_mut() {
            if t.owner == Some(owner) {
                t.object_died = true;
                count += 1;
            }
        }
        count
    }

    /// Advance every trail by `frametime` seconds and reclaim finished ones.
    ///
    /// A trail whose host is dead and which had no alive sections left
    /// after the previous call is reclaimed; everything else is advanced.
    /// Returns how many were reclaimed.
    pub fn move_all(&mut self, frametime: f32) -> usize {
        self.trails.retain(|handle, trail| {
            if trail.object_died && trail.alive_sections() == 0 {
                log::trace!("reclaiming trail {:?}", handle);
                return false;
            }
            trail.advance(frametime);
            true
        })
    }

    /// Build geometry for every trail and hand it to `batcher`.
    ///
    /// Does nothing in the server role. Trails whose texture is not loaded
    /// are skipped for this frame. Returns how many trails produced geometry.
    pub fn render_all(
        &mut self,
        view: &RenderView,
        textures: &dyn TextureLookup,
        fog: Option<&dyn FogModel>,
        batcher: &mut dyn TrailBatcher,
    ) -> usize {
        if !self.settings.renders_effects() {
            return 0;
        }

        let mut drawn = 0;
        for (handle, trail) in self.trails.iter() {
            let bitmap = textures.bitmap_handle(trail.info.texture);
            if bitmap <= 0 {
                log::trace!("skipping trail {:?}: texture {} not loaded", handle, trail.info.texture);
                continue;
            }
            self.scratch.clear();
            let counts = build_trail_geometry(trail, view, self.settings.min_trail_pixels, fog, &mut self.scratch);
            if counts.pieces() > 0 {
                batcher.submit(bitmap, &self.scratch);
                drawn += 1;
            }
        }
        drawn
    }

    /// Whether `trail` is live and belongs to `owner`.
    pub fn is_on_ship(&self, trail: TrailHandle, owner: ObjectHandle) -> bool {
        self.trails
            .get(trail)
            .is_some_and(|t| t.owner == Some(owner))
    }

    /// Live trails attached to `owner`.
    pub fn trails_on(&self, owner: ObjectHandle) -> impl Iterator<Item = TrailHandle> + '_ {
        self.trails
            .iter()
            .filter(move |(_, t)| t.owner == Some(owner))
            .map(|(h, _)| h)
    }

    /// Whether the trail's emission throttle has run out. Stale handles report `false`.
    pub fn stamp_elapsed(&self, trail: TrailHandle, now: Timestamp) -> bool {
        self.trails
            .get(trail)
            .is_some_and(|t| t.stamp.elapsed_at(now))
    }

    /// Restart the emission throttle from `now`.
    pub fn set_stamp(&mut self, trail: TrailHandle, now: Timestamp) -> bool {
        match self.trails.get_mut(trail) {
            Some(t) => {
                t.stamp = now + t.info.stamp;
                true
            }
            None => false,
        }
    }

    /// Resolve a handle.
    #[inline]
    pub fn get(&self, trail: TrailHandle) -> Option<&Trail> {
        self.trails.get(trail)
    }

    /// Whether the handle still resolves.
    #[inline]
    pub fn contains(&self, trail: TrailHandle) -> bool {
        self.trails.contains(trail)
    }

    /// Live trail count.
    #[inline]
    pub fn len(&self) -> usize {
        self.trails.len()
    }

    /// Whether no trails are live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }

    /// Iterate live trails.
    pub fn iter(&self) -> impl Iterator<Item = (TrailHandle, &Trail)> {
        self.trails.iter()
    }
}
