//! # trailfx - effect sources and motion trails
//!
//! Frame-stepped emission points and camera-facing ribbon trails for
//! moving, possibly short-lived world entities.
//!
//! trailfx tracks *where* an effect is anchored (an object, a submodel, a
//! turret, a beam, another particle or a fixed point), *when* it is active,
//! and records the path of anything that leaves a trail. It builds the trail
//! geometry; drawing it is left to your batch renderer.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::rc::Rc;
//! use trailfx::prelude::*;
//!
//! let settings = FxSettings::new();
//! let mut world = SimWorld::new();
//! let mut trails = TrailRegistry::new(settings.clone());
//! let mut sources = SourceRegistry::new();
//! let mut clock = MissionClock::new();
//!
//! let ship = world.spawn_object(ObjectState::new(Vec3::ZERO, Mat3::IDENTITY));
//! let exhaust = Rc::new(TrailEffect::new("exhaust", TrailInfo::new(1).with_max_life(1.5)));
//!
//! let mut source = Source::new(exhaust, clock.now());
//! source.origin_mut().move_to_object(ship, Vec3::new(0.0, 0.0, -3.0));
//! source.timing_mut().set_lifetime(clock.now(), clock.stamp(10_000));
//! sources.add(source);
//!
//! // Frame loop
//! let dt = clock.advance(1.0 / 60.0);
//! let mut ctx = ProcessContext::new(&world, &mut trails, &mut spawned, &mut rng).at(clock.now(), dt);
//! sources.process_all(&mut ctx);
//! trails.move_all(dt);
//! trails.render_all(&view, &textures, None, &mut batch);
//! ```
//!
//! ## Core Concepts
//!
//! ### Weak hosts
//!
//! Origins refer to world entities through generation-checked handles. A
//! destroyed host is never an error: the origin simply stops resolving and
//! its source retires on the next step.
//!
//! ### Per-frame order
//!
//! 1. [`SourceRegistry::process_all`] steps every source. Effects may emit
//!    particle records or extend trails.
//! 2. [`TrailRegistry::move_all`] ages and moves trail sections and
//!    reclaims trails whose host is dead and whose sections have all faded.
//! 3. [`TrailRegistry::render_all`] builds ribbons and submits them to a
//!    [`TrailBatcher`].
//!
//! ### Server role
//!
//! With [`GameMode::StandaloneServer`] no trail is ever created or drawn.

pub mod camera;
pub mod config;
pub mod effect;
pub mod error;
pub mod handle;
pub mod orientation;
pub mod origin;
pub mod render;
pub mod source;
pub mod textures;
pub mod time;
pub mod timing;
pub mod trail;
pub mod world;

pub use bytemuck;
pub use glam::{Mat3, Quat, Vec3};

pub use camera::RenderView;
pub use config::{FxSettings, GameMode};
pub use effect::{ParticleEffect, PointEffect, TrailEffect};
pub use error::{ConfigError, TextureError};
pub use handle::{Arena, Handle};
pub use orientation::SourceOrientation;
pub use origin::{Origin, OriginKind, ParticleInfo};
pub use render::{
    build_trail_geometry, ExpFog, FogModel, GeometryCounts, TextureId, TextureLookup, TrailBatcher, TrailVertex,
    VertexBatch,
};
pub use source::{ProcessContext, Source, SourceHandle, SourceRegistry};
pub use textures::{AddressMode, FilterMode, TextureConfig, TextureRegistry};
pub use time::{MissionClock, Timestamp};
pub use timing::{SourceTiming, TimingState};
pub use trail::{Trail, TrailHandle, TrailInfo, TrailRegistry, TRAIL_SECTIONS};
pub use world::{
    BeamHandle, BeamState, ObjectHandle, ObjectState, ParticleHandle, ParticleState, SimWorld, TurretState,
    WeaponState, World,
};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use trailfx::prelude::*;
/// ```
pub mod prelude {
    pub use crate::camera::RenderView;
    pub use crate::config::{FxSettings, GameMode};
    pub use crate::effect::{ParticleEffect, PointEffect, TrailEffect};
    pub use crate::orientation::SourceOrientation;
    pub use crate::origin::{Origin, ParticleInfo};
    pub use crate::render::{FogModel, TextureLookup, TrailBatcher, TrailVertex, VertexBatch};
    pub use crate::source::{ProcessContext, Source, SourceRegistry};
    pub use crate::textures::{TextureConfig, TextureRegistry};
    pub use crate::time::{MissionClock, Timestamp};
    pub use crate::timing::{SourceTiming, TimingState};
    pub use crate::trail::{TrailHandle, TrailInfo, TrailRegistry};
    pub use crate::world::{ObjectState, SimWorld, World};
    pub use crate::{Mat3, Vec3};
}
