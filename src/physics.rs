//! Reference integrator for the particle step.
//!
//! The compute shader generated in [`crate::gpu::simulation`] embeds the
//! constants below and performs the same operations in the same order, so this
//! module doubles as the executable description of what the GPU does.

use glam::Vec2;

use crate::gpu::Particle;
use crate::params::SimulationParams;

/// Constant downward acceleration, pixels per second squared.
pub const GRAVITY: Vec2 = Vec2::new(0.0, -10.0);
/// Acceleration toward the attractor.
pub const ATTRACTION_MAGNITUDE: f32 = 200.0;
/// Acceleration away from the repulsor.
pub const REPULSION_MAGNITUDE: f32 = 800.0;
/// Velocity factor applied on a wall hit: reverse and halve.
pub const BOUNCE_FACTOR: f32 = -0.5;
/// Initial velocities are drawn from `[-INITIAL_SPEED, INITIAL_SPEED]` per axis.
pub const INITIAL_SPEED: f32 = 10.0;

/// Velocity along one axis after the wall check.
///
/// Only the velocity is corrected; a particle past the wall keeps its position
/// and comes back over the following steps.
pub fn bounce(position: f32, velocity: f32, extent: f32) -> f32 {
    if (position <= 0.0 && velocity < 0.0) || (position >= extent && velocity > 0.0) {
        velocity * BOUNCE_FACTOR
    } else {
        velocity
    }
}

/// One semi-implicit Euler step with the standard gravity.
pub fn integrate(particle: Particle, params: &SimulationParams) -> Particle {
    integrate_with_gravity(particle, params, GRAVITY)
}

/// One step with a caller-chosen gravity vector.
pub fn integrate_with_gravity(
    particle: Particle,
    params: &SimulationParams,
    gravity: Vec2,
) -> Particle {
    let dt = params.dt;
    let mut position = particle.position;
    let mut velocity = particle.velocity;

    velocity += gravity * dt;

    if let Some(target) = params.attractor {
        velocity += (target - position).normalize_or_zero() * ATTRACTION_MAGNITUDE * dt;
    }
    if let Some(source) = params.repulsor {
        velocity += (position - source).normalize_or_zero() * REPULSION_MAGNITUDE * dt;
    }

    velocity.x = bounce(position.x, velocity.x, params.screen_size.x);
    velocity.y = bounce(position.y, velocity.y, params.screen_size.y);

    position += velocity * dt;

    Particle { position, velocity }
}

/// Steps every particle in place.
pub fn step_all(particles: &mut [Particle], params: &SimulationParams) {
    for particle in particles.iter_mut() {
        *particle = integrate(*particle, params);
    }
}
