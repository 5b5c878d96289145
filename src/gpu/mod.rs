/// Runs a single GPU call inside a validation error scope and logs any error
/// it raised together with the call site. Execution always continues.
macro_rules! gpu_call {
    ($device:expr, $call:expr) => {{
        $device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = $call;
        if let Some(err) = pollster::block_on($device.pop_error_scope()) {
            log::error!("GPU error at {}:{} with: {}", file!(), line!(), err);
        }
        result
    }};
}

pub mod overlay;
pub mod particle_buffer;
pub mod program;
pub mod render;
pub mod simulation;
pub mod uniforms;

use std::sync::Arc;

use glam::Vec2;
use winit::window::Window;

use crate::error::GpuError;
use crate::params::WORKGROUP_SIZE;

pub use particle_buffer::{Particle, ParticleBuffer};
pub use program::{
    compile_stage, link_program, CompiledStage, Program, ProgramRole, RenderTarget, StageKind,
};
pub use render::{build_draw_program, RenderStage};
pub use simulation::{build_simulation_program, simulation_shader, SimulationStage, VertexBarrier};

/// Limits the simulation cannot run without, checked against what the adapter offers.
///
/// `buffer_bytes` is the size of the particle buffer, which is bound whole as a
/// storage buffer.
pub fn required_limits(
    adapter: &wgpu::Limits,
    buffer_bytes: u64,
) -> Result<wgpu::Limits, GpuError> {
    if adapter.max_compute_invocations_per_workgroup < WORKGROUP_SIZE
        || adapter.max_compute_workgroup_size_x < WORKGROUP_SIZE
    {
        return Err(GpuError::Limits(format!(
            "workgroups of {} invocations are not supported (max {})",
            WORKGROUP_SIZE, adapter.max_compute_invocations_per_workgroup
        )));
    }
    if (adapter.max_storage_buffer_binding_size as u64) < buffer_bytes
        || adapter.max_buffer_size < buffer_bytes
    {
        return Err(GpuError::Limits(format!(
            "particle buffer needs {} bytes, storage bindings are limited to {}",
            buffer_bytes, adapter.max_storage_buffer_binding_size
        )));
    }

    let defaults = wgpu::Limits::default();
    Ok(wgpu::Limits {
        max_compute_invocations_per_workgroup: WORKGROUP_SIZE
            .max(defaults.max_compute_invocations_per_workgroup),
        max_compute_workgroup_size_x: WORKGROUP_SIZE.max(defaults.max_compute_workgroup_size_x),
        max_storage_buffer_binding_size: (buffer_bytes as u32)
            .max(defaults.max_storage_buffer_binding_size),
        max_buffer_size: buffer_bytes.max(defaults.max_buffer_size),
        ..defaults
    })
}

/// Picks an adapter and opens a device able to hold `buffer_bytes` of particles.
pub async fn request_device(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
    buffer_bytes: u64,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), GpuError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(GpuError::NoAdapter)?;

    let info = adapter.get_info();
    log::info!("Using adapter {} ({:?})", info.name, info.backend);

    let required_limits = required_limits(&adapter.limits(), buffer_bytes)?;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                memory_hints: Default::default(),
            },
            None,
        )
        .await?;

    // Anything raised outside an error scope is logged rather than aborting the loop.
    device.on_uncaptured_error(Box::new(|err| {
        log::error!("Uncaptured GPU error: {}", err);
    }));

    Ok((adapter, device, queue))
}

/// A device without a window, for offscreen simulation and tests.
pub async fn request_headless(buffer_bytes: u64) -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });
    let (_, device, queue) = request_device(&instance, None, buffer_bytes).await?;
    Ok((device, queue))
}

/// Prefers a linear format: the overlay renderer expects one, and the draw color
/// is written as given.
fn pick_surface_format(
    formats: &[wgpu::TextureFormat],
) -> Result<wgpu::TextureFormat, GpuError> {
    formats
        .iter()
        .find(|f| !f.is_srgb())
        .or_else(|| formats.first())
        .copied()
        .ok_or(GpuError::NoSurfaceFormat)
}

/// Surface, device and queue for the application window.
pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    pub async fn new(
        window: Arc<Window>,
        vsync: bool,
        buffer_bytes: u64,
    ) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;
        let (adapter, device, queue) =
            request_device(&instance, Some(&surface), buffer_bytes).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = pick_surface_format(&surface_caps.formats)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
        })
    }

    /// Applies a new window size. Zero-sized (minimized) windows keep the old configuration.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.reconfigure();
        }
    }

    pub fn reconfigure(&mut self) {
        gpu_call!(self.device, self.surface.configure(&self.device, &self.config));
    }

    pub fn screen_size(&self) -> Vec2 {
        Vec2::new(self.config.width as f32, self.config.height as f32)
    }
}
