//! # polyspray
//!
//! A GPU-compute driven 2D particle demo: point and bar emitters feed a
//! fixed-capacity particle pool that drifts inside (and dies outside) a
//! convex polygon region. All particle state lives in GPU storage buffers;
//! the CPU only orchestrates dispatches and uploads per-dispatch
//! parameters.
//!
//! ## Quick Start
//!
//! ```ignore
//! use polyspray::prelude::*;
//!
//! let mut updater = ComputeUpdater::new(15_000);
//! updater.add_emitter(Emitter::point(Vec2::ZERO, 0.3, 0.5))?;
//! updater.add_emitter(Emitter::bar(
//!     Vec2::new(-0.5, -0.75),
//!     Vec2::new(0.5, -0.75),
//!     Vec2::Y,
//!     0.1,
//!     0.3,
//! ))?;
//!
//! let mut pool = ParticlePool::new(15_000);
//! updater.init_particles(&mut pool);
//!
//! // Every frame, against any ComputeBackend:
//! updater.update(delta_time, Mat4::IDENTITY, &mut backend);
//! ```
//!
//! ## Core Concepts
//!
//! ### Particles
//!
//! A [`Particle`] is 48 bytes of GPU-visible state: position, velocity and
//! an active flag. Inactive particles are invisible and are the only ones
//! an emitter may reactivate.
//!
//! ### Emitters
//!
//! An [`Emitter`] is either a point (radial burst from a location) or a bar
//! (launch from a random spot on a segment, along a fixed direction). Each
//! carries a [`VelocityBand`] for random launch speeds and an optional
//! transform.
//!
//! ### The dispatch protocol
//!
//! [`ComputeUpdater::update`] runs one budgeted reset dispatch per emitter,
//! each fenced by a [`SyncIntent::StorageWriteVisible`] barrier so emitters
//! never race each other for inactive particles, then a single advection
//! dispatch. [`ParticleReset`] is the advection-free variant for scenes
//! that move particles elsewhere.
//!
//! ### Backends
//!
//! Orchestration is written against the [`ComputeBackend`] trait. The crate
//! ships a wgpu implementation ([`gpu::GpuState`]); tests drive the same
//! protocol against CPU models.

pub mod app;
pub mod backend;
pub mod emitter;
pub mod error;
pub mod gpu;
pub mod particle;
pub mod region;
pub mod reset;
pub mod shader;
pub mod time;
pub mod updater;

pub use backend::{ComputeBackend, DispatchParams, SyncIntent};
pub use bytemuck;
pub use emitter::{Emitter, EmitterKind, VelocityBand};
pub use error::{EmitterError, GpuError};
pub use glam::{Mat4, Vec2, Vec4};
pub use particle::{Particle, ParticlePool};
pub use region::{demo_region, PolygonFace, SurfaceVertex};
pub use reset::ParticleReset;
pub use time::Time;
pub use updater::{ComputeUpdater, EMIT_BUDGET_PER_FRAME, MAX_EMITTERS_PER_KIND};

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use crate::backend::{ComputeBackend, DispatchParams, SyncIntent};
    pub use crate::emitter::{Emitter, EmitterKind, VelocityBand};
    pub use crate::error::{EmitterError, GpuError};
    pub use crate::particle::{Particle, ParticlePool};
    pub use crate::region::{demo_region, PolygonFace};
    pub use crate::reset::ParticleReset;
    pub use crate::updater::ComputeUpdater;
    pub use glam::{Mat4, Vec2, Vec4};
}
