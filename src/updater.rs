//! The per-frame update orchestrator.
//!
//! Owns the registered emitters and drives the compute dispatch protocol:
//! one reset dispatch per emitter (point emitters first, then bars), each
//! fenced by a barrier, followed by a single advection dispatch.
//!
//! The split exists because every reset dispatch scans the whole pool. A
//! combined "reset and advect for all emitters" dispatch let several
//! emitters claim the same inactive particle within one frame; giving each
//! emitter its own barrier-separated dispatch makes earlier claims visible
//! before the next emitter scans, at the cost of N+1 dispatches per frame.

use glam::Mat4;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::backend::{ComputeBackend, DispatchParams, SyncIntent};
use crate::emitter::{Emitter, EmitterKind};
use crate::error::EmitterError;
use crate::particle::ParticlePool;
use crate::shader::work_group_count;

/// Total reactivations per frame, split across all emitters.
///
/// Tuned so a 15k pool cycles through reactivation over several seconds
/// instead of popping in all at once.
pub const EMIT_BUDGET_PER_FRAME: u32 = 50;

/// Registration cap per emitter kind.
pub const MAX_EMITTERS_PER_KIND: usize = 5;

/// Orchestrates particle reset and advection over a [`ComputeBackend`].
pub struct ComputeUpdater {
    capacity: u32,
    point_emitters: Vec<Emitter>,
    bar_emitters: Vec<Emitter>,
}

impl ComputeUpdater {
    /// New orchestrator for a pool of `capacity` particles.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            point_emitters: Vec::new(),
            bar_emitters: Vec::new(),
        }
    }

    /// Register an emitter, routed by kind.
    ///
    /// Fails once the kind's collection is full; the caller can keep using
    /// the emitters that did register.
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

    /// Reactivations each emitter may perform this frame.
    ///
    /// Integer division of the fixed frame budget; more emitters means fewer
    /// reactivations each.
    pub fn per_emitter_budget(&self) -> u32 {
        EMIT_BUDGET_PER_FRAME / self.emitter_count().max(1) as u32
    }

    /// One-time CPU population of the pool.
    ///
    /// Round-robins slots across all emitters (points first, then bars,
    /// repeating) until the pool is exhausted, so every emitter seeds
    /// `floor(P/E)` or `ceil(P/E)` particles with the remainder going to the
    /// earliest-registered emitters.
    pub fn init_particles(&self, pool: &mut ParticlePool) {
        let emitters: Vec<&Emitter> = self
            .point_emitters
            .iter()
            .chain(self.bar_emitters.iter())
            .collect();
        if emitters.is_empty() {
            return;
        }

        let mut rng = SmallRng::from_entropy();
        for (slot, particle) in pool.particles_mut().iter_mut().enumerate() {
            emitters[slot % emitters.len()].reset_particle(particle, &mut rng);
        }
    }

    /// Run one frame of the dispatch protocol.
    ///
    /// `window_transform` maps region-local coordinates to window space and
    /// is uploaded as both the region and emitter transform. No-op when no
    /// emitters are registered.
    pub fn update<B: ComputeBackend>(
        &self,
        delta_time: f32,
        window_transform: Mat4,
        backend: &mut B,
    ) {
        if self.emitter_count() == 0 {
            return;
        }

        let work_groups = work_group_count(self.capacity);

        let mut params = DispatchParams {
            region_transform: window_transform,
            emitter_transform: window_transform,
            max_particle_count: self.capacity,
            max_emit_count: self.per_emitter_budget(),
            ..DispatchParams::default()
        };

        run_reset_phase(
            &self.point_emitters,
            &self.bar_emitters,
            &mut params,
            work_groups,
            backend,
        );

        // The advection pass is the only one allowed to move active
        // particles, and it runs exactly once regardless of emitter count.
        params.only_reset = false;
        params.delta_time = delta_time;
        backend.upload_params(&params);
        backend.dispatch(work_groups);
        backend.barrier(SyncIntent::VertexAttribReadVisible);
    }
}

/// The shared reset phase: one dispatch per emitter, points before bars,
/// each preceded by a counter zero and followed by a barrier.
///
/// Used by both [`ComputeUpdater`] and
/// [`ParticleReset`](crate::reset::ParticleReset); the two historical
/// variants of this routine disagreed on details, so there is exactly one
/// now.
pub(crate) fn run_reset_phase<B: ComputeBackend>(
    point_emitters: &[Emitter],
    bar_emitters: &[Emitter],
    params: &mut DispatchParams,
    work_groups: u32,
    backend: &mut B,
) {
    params.only_reset = true;

    for emitter in point_emitters.iter().chain(bar_emitters.iter()) {
        // Zeroing between dispatches is what caps each emitter at
        // max_emit_count; the counter is shared sequentially, never
        // concurrently.
        backend.zero_reset_counter();
        emitter.write_params(params);
        backend.upload_params(params);
        backend.dispatch(work_groups);
        backend.barrier(SyncIntent::StorageWriteVisible);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    /// Counts protocol calls without modeling the shader.
    #[derive(Default)]
    struct CountingBackend {
        zeroes: u32,
        uploads: u32,
        dispatches: u32,
        barriers: u32,
        last_params: Option<DispatchParams>,
    }

    impl ComputeBackend for CountingBackend {
        fn zero_reset_counter(&mut self) {
            self.zeroes += 1;
        }
        fn seed_rand_counter(&mut self, _seed: u32) {}
        fn upload_params(&mut self, params: &DispatchParams) {
            self.uploads += 1;
            self.last_params = Some(*params);
        }
        fn dispatch(&mut self, _work_groups: u32) {
            self.dispatches += 1;
        }
        fn barrier(&mut self, _intent: SyncIntent) {
            self.barriers += 1;
        }
    }

    fn point() -> Emitter {
        Emitter::point(Vec2::ZERO, 0.3, 0.5)
    }

    fn bar() -> Emitter {
        Emitter::bar(Vec2::new(-0.5, 0.0), Vec2::new(0.5, 0.0), Vec2::Y, 0.2, 0.4)
    }

    #[test]
    fn test_add_emitter_limit_per_kind() {
        let mut updater = ComputeUpdater::new(1000);
        for _ in 0..MAX_EMITTERS_PER_KIND {
            updater.add_emitter(point()).unwrap();
        }
        let err = updater.add_emitter(point()).unwrap_err();
        assert_eq!(
            err,
            EmitterError::LimitReached {
                kind: EmitterKind::Point,
                max: MAX_EMITTERS_PER_KIND,
            }
        );

        // The bar collection has its own cap.
        updater.add_emitter(bar()).unwrap();
    }

    #[test]
    fn test_budget_divides_across_emitters() {
        let mut updater = ComputeUpdater::new(1000);
        updater.add_emitter(point()).unwrap();
        updater.add_emitter(bar()).unwrap();
        assert_eq!(updater.per_emitter_budget(), 25);

        updater.add_emitter(point()).unwrap();
        updater.add_emitter(point()).unwrap();
        updater.add_emitter(bar()).unwrap();
        assert_eq!(updater.per_emitter_budget(), 10);
    }

    #[test]
    fn test_budget_monotonically_non_increasing() {
        let mut updater = ComputeUpdater::new(1000);
        let mut last = u32::MAX;
        for i in 0..MAX_EMITTERS_PER_KIND {
            updater.add_emitter(point()).unwrap();
            updater.add_emitter(bar()).unwrap();
            let budget = updater.per_emitter_budget();
            assert!(budget <= last, "budget grew at {} emitters", (i + 1) * 2);
            last = budget;
        }
    }

    #[test]
    fn test_update_without_emitters_is_noop() {
        let updater = ComputeUpdater::new(1000);
        let mut backend = CountingBackend::default();
        updater.update(0.016, Mat4::IDENTITY, &mut backend);
        assert_eq!(backend.uploads, 0);
        assert_eq!(backend.dispatches, 0);
        assert_eq!(backend.barriers, 0);
    }

    #[test]
    fn test_update_issues_one_dispatch_per_emitter_plus_advection() {
        let mut updater = ComputeUpdater::new(1000);
        updater.add_emitter(point()).unwrap();
        updater.add_emitter(point()).unwrap();
        updater.add_emitter(bar()).unwrap();

        let mut backend = CountingBackend::default();
        updater.update(0.016, Mat4::IDENTITY, &mut backend);

        assert_eq!(backend.dispatches, 4);
        assert_eq!(backend.barriers, 4);
        // Counter zeroing happens for reset dispatches only.
        assert_eq!(backend.zeroes, 3);

        // The final upload is the advection pass.
        let last = backend.last_params.unwrap();
        assert!(!last.only_reset);
        assert!((last.delta_time - 0.016).abs() < 1e-6);
    }

    #[test]
    fn test_init_particles_round_robin_split() {
        let mut updater = ComputeUpdater::new(10);
        updater.add_emitter(point()).unwrap();
        updater.add_emitter(bar()).unwrap();
        updater.add_emitter(bar()).unwrap();

        let mut pool = ParticlePool::new(10);
        updater.init_particles(&mut pool);

        // Every slot initialized with a nonzero velocity, none left zeroed.
        for p in pool.particles() {
            assert!(p.velocity.length() > 0.0);
            assert_eq!(p.is_active, 0);
            assert_eq!(p.position.w, 1.0);
        }

        // 10 slots over 3 emitters, points first: the point emitter takes
        // slots 0, 3, 6 and 9; the bars get three apiece. Bar particles
        // launch straight along +Y, so their velocity has an exactly zero x
        // component, which a random planar direction never produces.
        let bar_seeded = pool
            .particles()
            .iter()
            .filter(|p| p.velocity.x == 0.0 && p.velocity.y > 0.0)
            .count();
        assert_eq!(bar_seeded, 6);
        assert!(pool.particles()[0].position.abs_diff_eq(glam::Vec4::W, 1e-6));
    }
}
