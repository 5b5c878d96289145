//! Per-frame and user-adjustable simulation parameters.

use glam::Vec2;
use glam::Vec4;

/// Invocations per compute workgroup. Active particle counts are always a multiple of it.
pub const WORKGROUP_SIZE: u32 = 1024;

/// Particles per tier step ("one million").
pub const PARTICLES_PER_TIER: u32 = 1024 * 1024;

/// Number of active particles, in millions, as chosen in the overlay.
///
/// Always within `[ParticleTier::MIN, ParticleTier::MAX]`, so the particle count
/// it stands for is a whole number of workgroups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticleTier(u32);

impl ParticleTier {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 10;

    /// The largest tier; the particle buffer is sized for it.
    pub const HIGHEST: ParticleTier = ParticleTier(Self::MAX);

    /// Creates a tier, clamping out-of-range values.
    pub fn new(millions: u32) -> Self {
        Self(millions.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Number of particles simulated and drawn at this tier.
    pub fn count(self) -> u32 {
        self.0 * PARTICLES_PER_TIER
    }

    /// Number of workgroups dispatched at this tier.
    pub fn workgroups(self) -> u32 {
        self.count() / WORKGROUP_SIZE
    }
}

impl Default for ParticleTier {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

/// Inputs to one simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    /// Seconds since the previous step.
    pub dt: f32,
    /// Screen width and height in pixels; the simulation rectangle is `[0, w] x [0, h]`.
    pub screen_size: Vec2,
    /// Point particles are pulled toward, in bottom-left-origin pixels.
    pub attractor: Option<Vec2>,
    /// Point particles are pushed away from, in bottom-left-origin pixels.
    pub repulsor: Option<Vec2>,
}

impl SimulationParams {
    pub fn new(dt: f32, screen_size: Vec2) -> Self {
        Self {
            dt,
            screen_size,
            attractor: None,
            repulsor: None,
        }
    }
}

/// Values the overlay edits between frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Controls {
    pub tier: ParticleTier,
    /// Flat RGBA draw color applied to every particle.
    pub color: Vec4,
}

/// Everything one frame needs, gathered by the frame driver before any GPU work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub simulation: SimulationParams,
    pub color: Vec4,
    pub tier: ParticleTier,
}
