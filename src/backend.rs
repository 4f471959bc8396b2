//! The dispatch protocol between the update orchestrators and the GPU.
//!
//! The orchestrators never touch wgpu directly. They speak this narrow
//! protocol: stage uniform parameters, zero or seed a counter, dispatch,
//! barrier. [`crate::gpu::GpuState`] implements it for real frames; the
//! integration tests implement it with a CPU model of the compute shader.

use glam::{Mat4, Vec4};

/// What a barrier must make visible before the next consumer runs.
///
/// Replaces the raw barrier bitflag soup of older graphics APIs with the two
/// intents this demo actually has.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncIntent {
    /// Storage-buffer writes from prior dispatches must be visible to the
    /// next dispatch. Used between every pair of reset dispatches so one
    /// emitter's claims are seen by the next.
    StorageWriteVisible,
    /// Storage-buffer writes must be visible to vertex fetch. Used once per
    /// frame before handing the particle buffer to the render stage.
    VertexAttribReadVisible,
}

/// The full uniform contract with the compute shader, one value per uniform.
///
/// Uploaded in its entirety before every dispatch. Shape fields that the
/// selected emitter kind does not use are simply left at their previous or
/// default values; the shader never reads them.
#[derive(Clone, Copy, Debug)]
pub struct DispatchParams {
    /// Window-space transform for the polygon region.
    pub region_transform: Mat4,
    /// Window-space transform for emitter geometry.
    pub emitter_transform: Mat4,
    /// Point emitter center (`use_point_emitter == true`).
    pub point_center: Vec4,
    /// Bar start point (`use_point_emitter == false`).
    pub bar_start: Vec4,
    /// Bar end point.
    pub bar_end: Vec4,
    /// Bar launch direction, `w == 0`.
    pub bar_emit_dir: Vec4,
    /// Total particle pool capacity; also the shader's index bound.
    pub max_particle_count: u32,
    /// Per-emitter reactivation cap for this dispatch.
    pub max_emit_count: u32,
    /// Emitter-kind selector for the reset phase.
    pub use_point_emitter: bool,
    /// True for reset dispatches, false for the advection dispatch.
    pub only_reset: bool,
    /// Lower bound of the emitter's speed band.
    pub min_velocity: f32,
    /// Width of the emitter's speed band.
    pub delta_velocity: f32,
    /// Frame delta time in seconds; only the advection dispatch reads it.
    pub delta_time: f32,
}

impl Default for DispatchParams {
    fn default() -> Self {
        Self {
            region_transform: Mat4::IDENTITY,
            emitter_transform: Mat4::IDENTITY,
            point_center: Vec4::W,
            bar_start: Vec4::W,
            bar_end: Vec4::W,
            bar_emit_dir: Vec4::ZERO,
            max_particle_count: 0,
            max_emit_count: 0,
            use_point_emitter: false,
            only_reset: true,
            min_velocity: 0.0,
            delta_velocity: 0.0,
            delta_time: 0.0,
        }
    }
}

/// The compute-dispatch surface the orchestrators drive.
///
/// Protocol invariants the callers uphold and implementations may rely on:
///
/// - `zero_reset_counter`, `seed_rand_counter`, and `upload_params` are only
///   called while no un-barriered dispatch is pending;
/// - every `dispatch` is followed by a `barrier` before the next call that
///   stages data;
/// - counter binding points are fixed for the backend's lifetime. Unlike the
///   particle and face storage buffers, the counters cannot be rebound.
pub trait ComputeBackend {
    /// Zero the atomic reactivation counter, bounding the next dispatch's
    /// claims at `max_emit_count`.
    fn zero_reset_counter(&mut self);

    /// Overwrite the GPU random-seed counter with a host random value.
    fn seed_rand_counter(&mut self, seed: u32);

    /// Stage the uniform values for the next dispatch.
    fn upload_params(&mut self, params: &DispatchParams);

    /// Launch `work_groups` work groups of the compute shader.
    fn dispatch(&mut self, work_groups: u32);

    /// Make prior dispatch writes visible to the named consumer.
    fn barrier(&mut self, intent: SyncIntent);
}
