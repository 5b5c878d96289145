//! Draw pass: every active particle as one additively blended point.

use glam::{Mat4, Vec4};

use crate::error::ShaderError;

use super::particle_buffer::{Particle, ParticleBuffer};
use super::program::{
    compile_stage, link_program, Pipeline, Program, ProgramRole, RenderTarget, StageKind,
};
use super::simulation::VertexBarrier;
use super::uniforms::UniformBlock;

pub const VERTEX_SHADER: &str = r#"struct DrawParams {
    projection: mat4x4<f32>,
    color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> draw_params: DrawParams;

@vertex
fn vs_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
    return draw_params.projection * vec4<f32>(position, 0.0, 1.0);
}
"#;

pub const FRAGMENT_SHADER: &str = r#"struct DrawParams {
    projection: mat4x4<f32>,
    color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> draw_params: DrawParams;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return draw_params.color;
}
"#;

/// `src * src_alpha + dst`: overlapping particles accumulate brightness.
pub const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

pub fn color_target(format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
    wgpu::ColorTargetState {
        format,
        blend: Some(ADDITIVE),
        write_mask: wgpu::ColorWrites::ALL,
    }
}

/// Maps pixel coordinates with a bottom-left origin to clip space.
pub fn projection(width: f32, height: f32) -> Mat4 {
    Mat4::orthographic_rh(0.0, width, 0.0, height, -1.0, 1.0)
}

/// Compile both stages and link the draw program for a surface of `format`.
pub fn build_draw_program(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
) -> Result<Program, ShaderError> {
    let vertex = compile_stage(StageKind::Vertex, VERTEX_SHADER)?;
    let fragment = compile_stage(StageKind::Fragment, FRAGMENT_SHADER)?;
    let buffers = [Particle::vertex_layout()];
    link_program(
        device,
        ProgramRole::Draw,
        vec![vertex, fragment],
        Some(RenderTarget {
            vertex_buffers: &buffers,
            color_target: color_target(format),
            topology: wgpu::PrimitiveTopology::PointList,
        }),
    )
}

pub struct RenderStage {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    uniforms: UniformBlock,
}

impl RenderStage {
    pub fn new(device: &wgpu::Device, program: Program) -> Result<Self, ShaderError> {
        let role = program.role();
        let wrong_program = |log: &str| ShaderError::Link {
            program: role.to_string(),
            log: log.to_string(),
        };
        if role != ProgramRole::Draw {
            return Err(wrong_program("expected the draw program"));
        }
        let layout = program
            .uniforms()
            .cloned()
            .ok_or_else(|| wrong_program("draw program declares no uniform block"))?;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw Uniform Buffer"),
            size: layout.buffer_size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = gpu_call!(
            device,
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Draw Bind Group"),
                layout: &program.bind_group_layout(layout.group()),
                entries: &[wgpu::BindGroupEntry {
                    binding: layout.binding(),
                    resource: uniform_buffer.as_entire_binding(),
                }],
            })
        );

        let pipeline = match program.pipeline {
            Pipeline::Render(pipeline) => pipeline,
            Pipeline::Compute(_) => {
                return Err(wrong_program("draw program has no render pipeline"))
            }
        };

        Ok(Self {
            pipeline,
            bind_group,
            uniform_buffer,
            uniforms: UniformBlock::new(layout),
        })
    }

    /// Upload this frame's projection and draw color.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        projection: Mat4,
        color: Vec4,
    ) {
        self.uniforms.set_or_log("projection", projection);
        self.uniforms.set_or_log("color", color);
        gpu_call!(device, queue.write_buffer(&self.uniform_buffer, 0, self.uniforms.bytes()));
    }

    /// Draw the particles the compute pass just wrote.
    pub fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        particles: &ParticleBuffer,
        barrier: VertexBarrier,
    ) {
        let count = barrier.count();
        // Recorded into the caller's pass; validated when its encoder is finished.
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, particles.vertex_slice(count));
        pass.draw(0..count, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::program::resolve_interface;
    use crate::gpu::uniforms::UniformKind;
    use glam::{Vec2, Vec3};

    fn clip(m: Mat4, x: f32, y: f32) -> Vec2 {
        let p = m.project_point3(Vec3::new(x, y, 0.0));
        Vec2::new(p.x, p.y)
    }

    #[test]
    fn test_projection_maps_corners() {
        let m = projection(1280.0, 768.0);
        assert!((clip(m, 0.0, 0.0) - Vec2::new(-1.0, -1.0)).length() < 1e-6);
        assert!((clip(m, 1280.0, 768.0) - Vec2::new(1.0, 1.0)).length() < 1e-6);
        assert!((clip(m, 640.0, 384.0)).length() < 1e-6);
        // Bottom-left origin: larger y is higher on screen.
        assert!(clip(m, 0.0, 700.0).y > clip(m, 0.0, 10.0).y);
    }

    #[test]
    fn test_draw_stages_link_interface() {
        let vertex = compile_stage(StageKind::Vertex, VERTEX_SHADER).unwrap();
        let fragment = compile_stage(StageKind::Fragment, FRAGMENT_SHADER).unwrap();
        assert_eq!(vertex.entry_point(), "vs_main");
        assert_eq!(fragment.entry_point(), "fs_main");

        let interface = resolve_interface(ProgramRole::Draw, &[vertex, fragment]).unwrap();
        let layout = interface.uniforms.unwrap();
        assert_eq!(layout.location("projection").map(|l| l.kind), Some(UniformKind::Mat4));
        assert_eq!(layout.location("color").map(|l| l.offset), Some(64));
        assert_eq!(layout.buffer_size(), 80);
    }

    #[test]
    fn test_blend_is_additive() {
        let target = color_target(wgpu::TextureFormat::Bgra8Unorm);
        let blend = target.blend.unwrap();
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(blend.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(blend.color.operation, wgpu::BlendOperation::Add);
    }
}
