//! Reset-only orchestration, without advection.
//!
//! [`ParticleReset`] runs the same per-emitter reset phase as
//! [`ComputeUpdater`](crate::updater::ComputeUpdater) but never moves
//! particles. It exists for scenes where advection lives elsewhere (for
//! example a separate collision-aware updater) and only reactivation is
//! wanted from this crate.
//!
//! Unlike the frame updater it also re-seeds the shader's random counter
//! from host entropy on every invocation, so repeated resets of an
//! identical pool do not replay the same placements.

use glam::Mat4;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::backend::{ComputeBackend, DispatchParams, SyncIntent};
use crate::emitter::{Emitter, EmitterKind};
use crate::error::EmitterError;
use crate::shader::work_group_count;
use crate::updater::{run_reset_phase, EMIT_BUDGET_PER_FRAME, MAX_EMITTERS_PER_KIND};

/// Reactivates pool particles without advecting them.
pub struct ParticleReset {
    capacity: u32,
    point_emitters: Vec<Emitter>,
    bar_emitters: Vec<Emitter>,
    rng: SmallRng,
}

impl ParticleReset {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            point_emitters: Vec::new(),
            bar_emitters: Vec::new(),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Register an emitter, routed by kind. Same per-kind cap as the frame
    /// updater.
    pub fn add_emitter(&mut self, emitter: Emitter) -> Result<(), EmitterError> {
        let kind = emitter.kind();
        let collection = match kind {
            EmitterKind::Point => &mut self.point_emitters,
            EmitterKind::Bar => &mut self.bar_emitters,
        };

        if collection.len() >= MAX_EMITTERS_PER_KIND {
            return Err(EmitterError::LimitReached {
                kind,
                max: MAX_EMITTERS_PER_KIND,
            });
        }

        collection.push(emitter);
        Ok(())
    }

    pub fn emitter_count(&self) -> usize {
        self.point_emitters.len() + self.bar_emitters.len()
    }

    /// Run the reset phase once: seed the random counter from the host,
    /// then one budgeted reset dispatch per emitter, points before bars.
    ///
    /// No-op when no emitters are registered. The closing barrier makes the
    /// reactivated particles visible to vertex fetch.
    pub fn reset_particles<B: ComputeBackend>(
        &mut self,
        window_transform: Mat4,
        backend: &mut B,
    ) {
        if self.emitter_count() == 0 {
            return;
        }

        backend.seed_rand_counter(self.rng.gen());

        let budget = EMIT_BUDGET_PER_FRAME / self.emitter_count() as u32;
        let mut params = DispatchParams {
            region_transform: window_transform,
            emitter_transform: window_transform,
            max_particle_count: self.capacity,
            max_emit_count: budget,
            ..DispatchParams::default()
        };

        run_reset_phase(
            &self.point_emitters,
            &self.bar_emitters,
            &mut params,
            work_group_count(self.capacity),
            backend,
        );

        backend.barrier(SyncIntent::VertexAttribReadVisible);
    }
}
