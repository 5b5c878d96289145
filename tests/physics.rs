//! Integration tests for the particle step, run on the CPU reference integrator.

use compute_particles::gpu::particle_buffer::generate;
use compute_particles::physics::{integrate, integrate_with_gravity, step_all, INITIAL_SPEED};
use compute_particles::{
    Particle, ParticleTier, SimulationParams, Vec2, PARTICLES_PER_TIER, WORKGROUP_SIZE,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

const WIDTH: f32 = 1280.0;
const HEIGHT: f32 = 768.0;

fn params(dt: f32) -> SimulationParams {
    SimulationParams::new(dt, Vec2::new(WIDTH, HEIGHT))
}

#[test]
fn test_gravity_only_step_for_all_particles() {
    let mut rng = StdRng::seed_from_u64(7);
    let before = generate(10_000, WIDTH, HEIGHT, &mut rng);
    let params = params(1.0 / 60.0);

    for p in &before {
        let after = integrate(*p, &params);
        // Particles on an edge moving outward bounce; everything else only falls.
        let on_edge = p.position.x <= 0.0
            || p.position.x >= WIDTH
            || p.position.y <= 0.0
            || p.position.y >= HEIGHT;
        if on_edge {
            continue;
        }
        assert_eq!(after.velocity.x, p.velocity.x);
        assert!((after.velocity.y - (p.velocity.y - 10.0 * params.dt)).abs() < 1e-5);
    }
}

#[test]
fn test_bounce_at_left_edge() {
    let p = Particle {
        position: Vec2::new(0.0, 300.0),
        velocity: Vec2::new(-5.0, 0.0),
    };
    let params = params(0.01);
    let after = integrate(p, &params);
    assert!((after.velocity.x - 2.5).abs() < 1e-6);
    assert!(after.position.x > 0.0);
}

#[test]
fn test_without_forces_particles_stay_near_screen() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut particles = generate(4096, WIDTH, HEIGHT, &mut rng);
    let dt = 1.0 / 30.0;
    let params = params(dt);
    // Bounces only ever shrink the speed, so one step's travel bounds the overshoot.
    let overshoot = INITIAL_SPEED * dt + 1e-3;

    for _ in 0..2000 {
        for p in particles.iter_mut() {
            let before = *p;
            *p = integrate_with_gravity(*p, &params, Vec2::ZERO);
            assert!(p.velocity.abs().cmple(before.velocity.abs()).all());
        }
    }

    for p in &particles {
        assert!(p.position.x >= -overshoot && p.position.x <= WIDTH + overshoot, "{:?}", p);
        assert!(p.position.y >= -overshoot && p.position.y <= HEIGHT + overshoot, "{:?}", p);
    }
}

#[test]
fn test_attraction_gathers_particles() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut particles = generate(1024, WIDTH, HEIGHT, &mut rng);
    let target = Vec2::new(WIDTH / 2.0, HEIGHT / 2.0);
    let mut params = params(1.0 / 60.0);
    params.attractor = Some(target);

    let mean_distance = |ps: &[Particle]| {
        ps.iter().map(|p| p.position.distance(target)).sum::<f32>() / ps.len() as f32
    };
    let start = mean_distance(&particles);
    for _ in 0..60 {
        step_all(&mut particles, &params);
    }
    assert!(mean_distance(&particles) < start);
}

#[test]
fn test_tier_sizes() {
    assert_eq!(ParticleTier::HIGHEST.count(), 10 * 1024 * 1024);
    assert_eq!(ParticleTier::new(3).count(), 3 * 1024 * 1024);
    assert_eq!(ParticleTier::new(3).workgroups(), 3 * 1024 * 1024 / WORKGROUP_SIZE);
    assert_eq!(PARTICLES_PER_TIER % WORKGROUP_SIZE, 0);
}
