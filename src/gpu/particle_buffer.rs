//! The particle buffer shared by the compute and draw passes.
//!
//! One `wgpu::Buffer` holds every particle slot for the highest tier. The
//! simulation binds it whole as a read-write storage buffer; the draw pass reads
//! a prefix of it as vertex data through [`Particle::vertex_layout`], which
//! fetches `position` and steps over `velocity`.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::Rng;
use wgpu::util::DeviceExt;

use crate::error::GpuError;
use crate::physics::INITIAL_SPEED;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Particle {
    /// Stride between records in the buffer.
    pub const SIZE: wgpu::BufferAddress = std::mem::size_of::<Particle>() as wgpu::BufferAddress;

    const ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    /// Vertex layout reading `position` at location 0 with the full record as stride.
    pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Random particles spread uniformly over `[0, width] x [0, height]`.
pub fn generate<R: Rng + ?Sized>(
    count: usize,
    width: f32,
    height: f32,
    rng: &mut R,
) -> Vec<Particle> {
    let width = width.max(0.0);
    let height = height.max(0.0);
    (0..count)
        .map(|_| Particle {
            position: Vec2::new(rng.gen_range(0.0..=width), rng.gen_range(0.0..=height)),
            velocity: Vec2::new(
                rng.gen_range(-INITIAL_SPEED..=INITIAL_SPEED),
                rng.gen_range(-INITIAL_SPEED..=INITIAL_SPEED),
            ),
        })
        .collect()
}

pub struct ParticleBuffer {
    buffer: wgpu::Buffer,
    capacity: u32,
}

impl ParticleBuffer {
    /// Fill `max_count` slots with random particles and upload them once.
    ///
    /// The host-side scratch copy is released before returning.
    pub fn populate(device: &wgpu::Device, max_count: u32, width: f32, height: f32) -> Self {
        let scratch = generate(max_count as usize, width, height, &mut rand::thread_rng());
        let buffer = Self::from_particles(device, &scratch);
        drop(scratch);

        log::info!(
            "Uploaded {} particles ({:.1} MiB)",
            buffer.capacity,
            buffer.byte_size() as f64 / (1024.0 * 1024.0)
        );
        buffer
    }

    /// Upload the given particles as the whole buffer.
    pub fn from_particles(device: &wgpu::Device, particles: &[Particle]) -> Self {
        let buffer = gpu_call!(
            device,
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Particle Buffer"),
                contents: bytemuck::cast_slice(particles),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::VERTEX
                    | wgpu::BufferUsages::COPY_SRC,
            })
        );

        Self {
            buffer,
            capacity: particles.len() as u32,
        }
    }

    /// Number of particle slots; never changes after creation.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn byte_size(&self) -> wgpu::BufferAddress {
        self.capacity as wgpu::BufferAddress * Particle::SIZE
    }

    /// Storage view for the simulation pass.
    pub fn storage_binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }

    /// Byte range of the first `count` particles, clamped to the capacity.
    pub fn vertex_range(&self, count: u32) -> std::ops::Range<wgpu::BufferAddress> {
        0..count.min(self.capacity) as wgpu::BufferAddress * Particle::SIZE
    }

    /// Vertex view of the first `count` particles for the draw pass.
    pub fn vertex_slice(&self, count: u32) -> wgpu::BufferSlice<'_> {
        self.buffer.slice(self.vertex_range(count))
    }

    /// Copy the first `count` particles back to the host. Blocks until the GPU is done.
    pub fn read_back(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        count: u32,
    ) -> Result<Vec<Particle>, GpuError> {
        let size = self.vertex_range(count).end;
        if size == 0 {
            return Ok(Vec::new());
        }

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Readback Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, size);
        let commands = gpu_call!(device, encoder.finish());
        gpu_call!(device, queue.submit(std::iter::once(commands)));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let particles = {
            let data = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, Particle>(&data).to_vec()
        };
        staging.unmap();
        Ok(particles)
    }
}
