//! Particle storage shared between the CPU and the GPU.
//!
//! The pool is allocated once at a fixed capacity and uploaded to the GPU a
//! single time. After that upload the compute shaders are the only writers;
//! the CPU never reads the pool back during steady state.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

/// A single particle record, laid out exactly as the WGSL `Particle` struct.
///
/// `is_active` doubles as the lifecycle flag: the reset compute pass flips it
/// to 1 when an emitter reclaims the slot, and the advection pass clears it
/// when the particle leaves the polygon region.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// Position in window space. `w` is 1.0 for an initialized particle.
    pub position: Vec4,
    /// Velocity in window-space units per second.
    ///
    /// Must be nonzero after CPU population; the compute shader's hash draws
    /// its entropy from these bits.
    pub velocity: Vec4,
    /// 1 while the particle is live, 0 while it waits for reactivation.
    pub is_active: u32,
    pub _pad0: u32,
    pub _pad1: u32,
    pub _pad2: u32,
}

impl Particle {
    pub const SIZE: usize = std::mem::size_of::<Particle>();
}

/// Fixed-capacity particle pool.
///
/// Zero-initialized on creation. Zeroed particles are useless to the GPU hash
/// (velocity bits of zero hash to zero), which is why
/// [`ComputeUpdater::init_particles`](crate::ComputeUpdater::init_particles)
/// must run over the pool before the first upload.
pub struct ParticlePool {
    particles: Vec<Particle>,
}

impl ParticlePool {
    /// Allocate a zeroed pool of `capacity` particles.
    pub fn new(capacity: u32) -> Self {
        Self {
            particles: vec![Particle::zeroed(); capacity as usize],
        }
    }

    /// Number of particle slots. Fixed for the lifetime of the pool.
    pub fn capacity(&self) -> u32 {
        self.particles.len() as u32
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Raw bytes for the one-time GPU buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.particles)
    }
}
