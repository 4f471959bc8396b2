//! Particle emitters.
//!
//! Emitters are the sources of particle reactivation parameters: a shape
//! (point or bar), a velocity band, and an optional spatial transform. The
//! update orchestrator uploads these parameters per dispatch; the compute
//! shader does the actual reactivation.
//!
//! The CPU-side [`Emitter::reset_particle`] exists only for the one-time
//! initial population of the pool. Zero-initialized particles can never be
//! randomized by the shader (its hash feeds on velocity bits), so every slot
//! gets a nonzero velocity here before the first upload.
//!
//! # Example
//!
//! ```ignore
//! // Fountain point at the origin, bar launching rightward from the left edge
//! updater.add_emitter(Emitter::point(Vec2::ZERO, 0.3, 0.5))?;
//! updater.add_emitter(Emitter::bar(
//!     Vec2::new(-0.6, -0.4),
//!     Vec2::new(-0.6, 0.4),
//!     Vec2::X,
//!     0.2,
//!     0.4,
//! ))?;
//! ```

use glam::{Mat4, Vec2, Vec4};
use rand::rngs::SmallRng;
use rand::Rng;
use std::f32::consts::TAU;

use crate::backend::DispatchParams;
use crate::particle::Particle;

/// Emitter shape tag, used for registration routing and error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitterKind {
    Point,
    Bar,
}

/// A velocity range `[min, min + delta)`.
///
/// The compute shader derives a random speed from this band via its hash;
/// the CPU population path does the same with a host RNG.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocityBand {
    min: f32,
    delta: f32,
}

impl VelocityBand {
    /// Band from `min` to `max` speed.
    pub fn new(min: f32, max: f32) -> Self {
        Self {
            min,
            delta: (max - min).max(0.0),
        }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Random speed in `[min, min + delta)`.
    pub fn random_speed(&self, rng: &mut SmallRng) -> f32 {
        self.min + rng.gen::<f32>() * self.delta
    }
}

/// Particle emitter configuration.
///
/// A closed set of variants: the orchestrator classifies an emitter exactly
/// once at registration by matching [`Emitter::kind`], so there is no
/// "unrecognized emitter" failure mode.
#[derive(Clone, Debug)]
pub enum Emitter {
    /// Reactivate particles at a single point with random planar directions.
    Point {
        /// Emission center, `w == 1`.
        center: Vec4,
        /// Speed band for reactivated particles.
        velocity: VelocityBand,
        /// Spatial transform applied to the center before upload.
        transform: Mat4,
    },

    /// Reactivate particles along a line segment, all launched in `emit_dir`.
    ///
    /// Particles are distributed evenly along the bar by the shader's hash.
    Bar {
        /// Bar start point, `w == 1`.
        start: Vec4,
        /// Bar end point, `w == 1`.
        end: Vec4,
        /// Launch direction, `w == 0`, normalized at construction.
        emit_dir: Vec4,
        /// Speed band for reactivated particles.
        velocity: VelocityBand,
        /// Spatial transform applied to the geometry before upload.
        transform: Mat4,
    },
}

impl Emitter {
    /// Point emitter at `center` with speeds in `[min_vel, max_vel)`.
    pub fn point(center: Vec2, min_vel: f32, max_vel: f32) -> Self {
        Emitter::Point {
            center: Vec4::new(center.x, center.y, 0.0, 1.0),
            velocity: VelocityBand::new(min_vel, max_vel),
            transform: Mat4::IDENTITY,
        }
    }

    /// Bar emitter from `p1` to `p2`, launching along `emit_dir`.
    pub fn bar(p1: Vec2, p2: Vec2, emit_dir: Vec2, min_vel: f32, max_vel: f32) -> Self {
        let dir = emit_dir.normalize_or_zero();
        Emitter::Bar {
            start: Vec4::new(p1.x, p1.y, 0.0, 1.0),
            end: Vec4::new(p2.x, p2.y, 0.0, 1.0),
            emit_dir: Vec4::new(dir.x, dir.y, 0.0, 0.0),
            velocity: VelocityBand::new(min_vel, max_vel),
            transform: Mat4::IDENTITY,
        }
    }

    pub fn kind(&self) -> EmitterKind {
        match self {
            Emitter::Point { .. } => EmitterKind::Point,
            Emitter::Bar { .. } => EmitterKind::Bar,
        }
    }

    pub fn velocity(&self) -> VelocityBand {
        match self {
            Emitter::Point { velocity, .. } => *velocity,
            Emitter::Bar { velocity, .. } => *velocity,
        }
    }

    /// Replace the spatial transform. The only mutation an emitter allows
    /// after construction.
    pub fn set_transform(&mut self, new_transform: Mat4) {
        match self {
            Emitter::Point { transform, .. } => *transform = new_transform,
            Emitter::Bar { transform, .. } => *transform = new_transform,
        }
    }

    /// Transformed emission center. `None` for bar emitters.
    pub fn center(&self) -> Option<Vec4> {
        match self {
            Emitter::Point {
                center, transform, ..
            } => Some(*transform * *center),
            Emitter::Bar { .. } => None,
        }
    }

    /// Transformed bar start point. `None` for point emitters.
    pub fn bar_start(&self) -> Option<Vec4> {
        match self {
            Emitter::Bar {
                start, transform, ..
            } => Some(*transform * *start),
            Emitter::Point { .. } => None,
        }
    }

    /// Transformed bar end point. `None` for point emitters.
    pub fn bar_end(&self) -> Option<Vec4> {
        match self {
            Emitter::Bar { end, transform, .. } => Some(*transform * *end),
            Emitter::Point { .. } => None,
        }
    }

    /// Transformed launch direction. `None` for point emitters.
    pub fn emit_dir(&self) -> Option<Vec4> {
        match self {
            Emitter::Bar {
                emit_dir,
                transform,
                ..
            } => Some(*transform * *emit_dir),
            Emitter::Point { .. } => None,
        }
    }

    /// Write this emitter's shape and velocity band into the dispatch
    /// parameters, leaving the frame-wide fields untouched.
    pub(crate) fn write_params(&self, params: &mut DispatchParams) {
        let band = self.velocity();
        params.min_velocity = band.min();
        params.delta_velocity = band.delta();

        match self {
            Emitter::Point { .. } => {
                params.use_point_emitter = true;
                params.point_center = self.center().unwrap_or(Vec4::W);
            }
            Emitter::Bar { .. } => {
                params.use_point_emitter = false;
                params.bar_start = self.bar_start().unwrap_or(Vec4::W);
                params.bar_end = self.bar_end().unwrap_or(Vec4::W);
                params.bar_emit_dir = self.emit_dir().unwrap_or(Vec4::ZERO);
            }
        }
    }

    /// CPU-side particle reset, used only for the initial population pass.
    ///
    /// Mirrors what the compute shader's reset phase does, with one
    /// deliberate difference: the particle is left inactive. Activation is
    /// the GPU's job; this pass exists to seed every slot with a nonzero
    /// velocity so the shader hash has something to chew on.
    pub fn reset_particle(&self, particle: &mut Particle, rng: &mut SmallRng) {
        let speed = self.velocity().random_speed(rng);

        match self {
            Emitter::Point { .. } => {
                let theta = rng.gen::<f32>() * TAU;
                particle.position = self.center().unwrap_or(Vec4::W);
                particle.velocity = Vec4::new(theta.cos() * speed, theta.sin() * speed, 0.0, 0.0);
            }
            Emitter::Bar { .. } => {
                let t = rng.gen::<f32>();
                let start = self.bar_start().unwrap_or(Vec4::W);
                let end = self.bar_end().unwrap_or(Vec4::W);
                particle.position = start.lerp(end, t);
                particle.velocity = self.emit_dir().unwrap_or(Vec4::X) * speed;
            }
        }

        particle.position.w = 1.0;
        particle.velocity.w = 0.0;
        particle.is_active = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_velocity_band_range() {
        let band = VelocityBand::new(0.3, 0.5);
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..100 {
            let speed = band.random_speed(&mut rng);
            assert!((0.3..0.5).contains(&speed));
        }
    }

    #[test]
    fn test_velocity_band_inverted_clamps() {
        let band = VelocityBand::new(0.5, 0.3);
        assert_eq!(band.delta(), 0.0);
    }

    #[test]
    fn test_kind_classification() {
        let point = Emitter::point(Vec2::ZERO, 0.1, 0.2);
        let bar = Emitter::bar(Vec2::ZERO, Vec2::X, Vec2::Y, 0.1, 0.2);
        assert_eq!(point.kind(), EmitterKind::Point);
        assert_eq!(bar.kind(), EmitterKind::Bar);
    }

    #[test]
    fn test_transform_applies_to_geometry() {
        let mut bar = Emitter::bar(Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::Y, 0.1, 0.2);
        bar.set_transform(Mat4::from_translation(glam::Vec3::new(0.5, 0.25, 0.0)));

        let start = bar.bar_start().unwrap();
        let end = bar.bar_end().unwrap();
        assert!((start.x - 0.5).abs() < 1e-6);
        assert!((start.y - 0.25).abs() < 1e-6);
        assert!((end.x - 1.5).abs() < 1e-6);

        // Direction vectors (w == 0) must not pick up the translation.
        let dir = bar.emit_dir().unwrap();
        assert!(dir.x.abs() < 1e-6);
        assert!((dir.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_point_reset_places_particle_at_center() {
        let emitter = Emitter::point(Vec2::new(0.1, -0.2), 0.3, 0.5);
        let mut rng = SmallRng::seed_from_u64(42);
        let mut p = bytemuck::Zeroable::zeroed();

        emitter.reset_particle(&mut p, &mut rng);

        assert!((p.position.x - 0.1).abs() < 1e-6);
        assert!((p.position.y + 0.2).abs() < 1e-6);
        assert_eq!(p.position.w, 1.0);
        assert_eq!(p.is_active, 0);

        let speed = (p.velocity.x * p.velocity.x + p.velocity.y * p.velocity.y).sqrt();
        assert!((0.3..0.5).contains(&speed));
    }

    #[test]
    fn test_bar_reset_places_particle_on_segment() {
        let emitter = Emitter::bar(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0), Vec2::Y, 0.2, 0.4);
        let mut rng = SmallRng::seed_from_u64(3);
        let mut p: Particle = bytemuck::Zeroable::zeroed();

        emitter.reset_particle(&mut p, &mut rng);

        assert!((-1.0..=1.0).contains(&p.position.x));
        assert!(p.position.y.abs() < 1e-6);
        // Launched along the bar's emit direction.
        assert!(p.velocity.y > 0.0);
        assert!(p.velocity.x.abs() < 1e-6);
    }
}
