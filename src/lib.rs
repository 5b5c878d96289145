//! # compute-particles
//!
//! Millions of 2D particles integrated by a compute shader and drawn as
//! additively blended points, with a small overlay to change the particle count
//! and color at runtime. Hold the left mouse button to attract particles and the
//! right one to push them away.
//!
//! ## Quick Start
//!
//! ```no_run
//! use compute_particles::AppConfig;
//!
//! fn main() -> Result<(), compute_particles::AppError> {
//!     compute_particles::run(AppConfig::default().with_tier(2))
//! }
//! ```
//!
//! ## Frame structure
//!
//! One particle buffer is shared by two programs. Every frame the simulation
//! program reads and writes it as a storage array, then the draw program reads
//! the same bytes as a point list:
//!
//! ```text
//! simulation pass (compute, 1024 per workgroup)
//!         |  VertexBarrier
//!         v
//! draw pass (vertex + fragment, additive)
//!         v
//! overlay pass -> present
//! ```
//!
//! The buffer is allocated once for [`ParticleTier::HIGHEST`]; lower tiers
//! simulate and draw a prefix of it.
//!
//! ## Shader programs
//!
//! [`gpu::compile_stage`] validates WGSL for a single stage and
//! [`gpu::link_program`] combines stages into a pipeline. Failures come back as
//! [`ShaderError`] values carrying the compiler or linker diagnostic; a failed
//! program never exists as a value, so it cannot be bound.
//!
//! [`physics`] holds a CPU reference of the compute step that shares its
//! constants with the generated shader.

#[macro_use]
pub mod gpu;

pub mod app;
pub mod config;
pub mod error;
pub mod input;
pub mod params;
pub mod physics;
pub mod time;
pub mod ui;

pub use app::run;
pub use config::AppConfig;
pub use error::{AppError, GpuError, ShaderError};
pub use glam::{Vec2, Vec4};
pub use gpu::Particle;
pub use params::{
    Controls, FrameParams, ParticleTier, SimulationParams, PARTICLES_PER_TIER, WORKGROUP_SIZE,
};
