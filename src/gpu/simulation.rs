//! Compute pass integrating every active particle once per frame.

use crate::error::ShaderError;
use crate::params::{SimulationParams, WORKGROUP_SIZE};
use crate::physics::{ATTRACTION_MAGNITUDE, BOUNCE_FACTOR, GRAVITY, REPULSION_MAGNITUDE};

use super::particle_buffer::ParticleBuffer;
use super::program::{compile_stage, link_program, Pipeline, Program, ProgramRole, StageKind};
use super::uniforms::UniformBlock;

/// Binding of the particle storage array in the simulation shader.
pub const PARTICLES_BINDING: u32 = 0;

/// Generate the simulation compute shader.
///
/// Constants are taken from [`crate::physics`] so the GPU step and the CPU
/// reference integrator cannot drift apart.
pub fn simulation_shader() -> String {
    format!(
        r#"struct Particle {{
    position: vec2<f32>,
    velocity: vec2<f32>,
}};

struct SimParams {{
    screen_size: vec2<f32>,
    attract_to: vec2<f32>,
    repulse_from: vec2<f32>,
    dt: f32,
    attract: u32,
    repulse: u32,
}};

@group(0) @binding({particles_binding})
var<storage, read_write> particles: array<Particle>;

@group(0) @binding(1)
var<uniform> params: SimParams;

const GRAVITY: vec2<f32> = vec2<f32>({gravity_x:?}, {gravity_y:?});
const ATTRACTION_MAG: f32 = {attraction:?};
const REPULSION_MAG: f32 = {repulsion:?};
const BOUNCE: f32 = {bounce:?};

fn safe_normalize(v: vec2<f32>) -> vec2<f32> {{
    let len = length(v);
    if len > 0.0 {{
        return v / len;
    }}
    return vec2<f32>(0.0, 0.0);
}}

fn bounce(pos: f32, vel: f32, extent: f32) -> f32 {{
    if (pos <= 0.0 && vel < 0.0) || (pos >= extent && vel > 0.0) {{
        return vel * BOUNCE;
    }}
    return vel;
}}

@compute @workgroup_size({workgroup_size})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    let index = global_id.x;
    var p = particles[index];
    let dt = params.dt;

    p.velocity += GRAVITY * dt;

    if params.attract != 0u {{
        p.velocity += safe_normalize(params.attract_to - p.position) * ATTRACTION_MAG * dt;
    }}

    if params.repulse != 0u {{
        p.velocity += safe_normalize(p.position - params.repulse_from) * REPULSION_MAG * dt;
    }}

    p.velocity.x = bounce(p.position.x, p.velocity.x, params.screen_size.x);
    p.velocity.y = bounce(p.position.y, p.velocity.y, params.screen_size.y);

    p.position += p.velocity * dt;

    particles[index] = p;
}}
"#,
        particles_binding = PARTICLES_BINDING,
        gravity_x = GRAVITY.x,
        gravity_y = GRAVITY.y,
        attraction = ATTRACTION_MAGNITUDE,
        repulsion = REPULSION_MAGNITUDE,
        bounce = BOUNCE_FACTOR,
        workgroup_size = WORKGROUP_SIZE,
    )
}

/// Compile and link the simulation program.
pub fn build_simulation_program(device: &wgpu::Device) -> Result<Program, ShaderError> {
    let compute = compile_stage(StageKind::Compute, &simulation_shader())?;
    link_program(device, ProgramRole::Simulation, vec![compute], None)
}

/// Proof that the compute pass writing the particle buffer has been recorded
/// and closed.
///
/// wgpu orders a storage write in one pass before vertex reads in a later
/// pass of the same encoder, so the end of the compute pass is the barrier.
/// The draw pass takes this token by value and draws exactly the particles
/// that were simulated.
#[must_use = "the draw pass needs the barrier to read the particle buffer"]
#[derive(Debug)]
pub struct VertexBarrier {
    count: u32,
}

impl VertexBarrier {
    /// Number of particles written by the compute pass.
    pub fn count(&self) -> u32 {
        self.count
    }
}

pub struct SimulationStage {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    uniforms: UniformBlock,
    workgroup_size: u32,
    capacity: u32,
}

impl SimulationStage {
    /// Wire a linked simulation program to the particle buffer.
    pub fn new(
        device: &wgpu::Device,
        program: Program,
        particles: &ParticleBuffer,
    ) -> Result<Self, ShaderError> {
        let role = program.role();
        let wrong_program = |log: &str| ShaderError::Link {
            program: role.to_string(),
            log: log.to_string(),
        };
        if role != ProgramRole::Simulation {
            return Err(wrong_program("expected the simulation program"));
        }
        let layout = program
            .uniforms()
            .cloned()
            .ok_or_else(|| wrong_program("simulation program declares no uniform block"))?;
        let workgroup_size = program.workgroup_size().map(|[x, _, _]| x).unwrap_or(WORKGROUP_SIZE);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Simulation Uniform Buffer"),
            size: layout.buffer_size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = gpu_call!(
            device,
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Simulation Bind Group"),
                layout: &program.bind_group_layout(layout.group()),
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: PARTICLES_BINDING,
                        resource: particles.storage_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: layout.binding(),
                        resource: uniform_buffer.as_entire_binding(),
                    },
                ],
            })
        );

        let pipeline = match program.pipeline {
            Pipeline::Compute(pipeline) => pipeline,
            Pipeline::Render(_) => {
                return Err(wrong_program("simulation program has no compute pipeline"))
            }
        };

        Ok(Self {
            pipeline,
            bind_group,
            uniform_buffer,
            uniforms: UniformBlock::new(layout),
            workgroup_size,
            capacity: particles.capacity(),
        })
    }

    /// Record one simulation step over the first `active_count` particles.
    ///
    /// `active_count` must be a multiple of the workgroup size; tiers always are.
    pub fn step(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        params: &SimulationParams,
        active_count: u32,
    ) -> VertexBarrier {
        debug_assert_eq!(active_count % self.workgroup_size, 0);
        let count = active_count.min(self.capacity);

        self.uniforms.set_or_log("dt", params.dt);
        self.uniforms.set_or_log("screen_size", params.screen_size);
        self.uniforms.set_or_log("attract", params.attractor.is_some());
        self.uniforms.set_or_log("attract_to", params.attractor.unwrap_or_default());
        self.uniforms.set_or_log("repulse", params.repulsor.is_some());
        self.uniforms.set_or_log("repulse_from", params.repulsor.unwrap_or_default());
        gpu_call!(device, queue.write_buffer(&self.uniform_buffer, 0, self.uniforms.bytes()));

        // Pass commands are validated when the encoder is finished.
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Simulation Pass"),
                timestamp_writes: None,
            });

            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &self.bind_group, &[]);
            compute_pass.dispatch_workgroups(count / self.workgroup_size, 1, 1);
        }

        VertexBarrier { count }
    }
}
