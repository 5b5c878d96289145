//! Window lifecycle and the per-frame driver.
//!
//! Each redraw runs, in this order: delta time, input gathering, the
//! simulation pass, the draw pass, the overlay, submit and present. The
//! simulation and draw passes are recorded into one encoder, so the particle
//! buffer is written and then read within a single submission.

use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::gpu::overlay::Overlay;
use crate::gpu::render::projection;
use crate::gpu::{
    build_draw_program, build_simulation_program, GpuContext, Particle, ParticleBuffer, RenderStage,
    SimulationStage,
};
use crate::input::MouseState;
use crate::params::{Controls, FrameParams, ParticleTier, SimulationParams};
use crate::time::FrameClock;
use crate::ui;

/// Open the window and run until it is closed.
///
/// Returns an error if anything fails during startup; the loop itself only
/// ends through a close request or an out-of-memory surface.
pub fn run(config: AppConfig) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

enum Phase {
    Initializing,
    Running(Box<Running>),
    ShuttingDown,
}

struct App {
    config: AppConfig,
    phase: Phase,
    failure: Option<AppError>,
}

impl App {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            phase: Phase::Initializing,
            failure: None,
        }
    }

    fn shut_down(&mut self, event_loop: &ActiveEventLoop) {
        // Dropping the running state releases the programs, the particle buffer,
        // the surface and the window.
        self.phase = Phase::ShuttingDown;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !matches!(self.phase, Phase::Initializing) {
            return;
        }

        match Running::new(event_loop, &self.config) {
            Ok(running) => {
                running.window.request_redraw();
                self.phase = Phase::Running(Box::new(running));
            }
            Err(err) => {
                log::error!("Failed to start: {}", err);
                self.failure = Some(err);
                self.shut_down(event_loop);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Phase::Running(running) = &mut self.phase else {
            return;
        };
        if running.window.id() != id {
            return;
        }

        match running.window_event(&event) {
            Flow::Continue => {}
            Flow::Exit => {
                log::info!("Shutting down");
                self.shut_down(event_loop);
            }
        }
    }
}

enum Flow {
    Continue,
    Exit,
}

/// Everything alive between startup and shutdown.
struct Running {
    window: Arc<Window>,
    gpu: GpuContext,
    particles: ParticleBuffer,
    simulation: SimulationStage,
    render: RenderStage,
    overlay: Overlay,
    clock: FrameClock,
    mouse: MouseState,
    controls: Controls,
    clear_color: wgpu::Color,
    title: String,
}

impl Running {
    fn new(event_loop: &ActiveEventLoop, config: &AppConfig) -> Result<Self, AppError> {
        let attributes = Window::default_attributes()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let capacity = ParticleTier::HIGHEST.count();
        let buffer_bytes = capacity as u64 * Particle::SIZE;
        let gpu = pollster::block_on(GpuContext::new(window.clone(), config.vsync, buffer_bytes))?;

        let simulation_program = build_simulation_program(&gpu.device)?;
        let draw_program = build_draw_program(&gpu.device, gpu.config.format)?;

        let screen = gpu.screen_size();
        let particles = ParticleBuffer::populate(&gpu.device, capacity, screen.x, screen.y);
        let simulation = SimulationStage::new(&gpu.device, simulation_program, &particles)?;
        let render = RenderStage::new(&gpu.device, draw_program)?;
        let overlay = Overlay::new(&gpu.device, gpu.config.format, &window);

        log::info!(
            "Running {}x{} with {} million particles",
            gpu.config.width,
            gpu.config.height,
            config.tier.get()
        );

        Ok(Self {
            window,
            gpu,
            particles,
            simulation,
            render,
            overlay,
            clock: FrameClock::new(),
            mouse: MouseState::new(),
            controls: Controls {
                tier: config.tier,
                color: config.color,
            },
            clear_color: config.clear_color,
            title: config.title.clone(),
        })
    }

    fn window_event(&mut self, event: &WindowEvent) -> Flow {
        let consumed = self.overlay.on_window_event(&self.window, event);

        match event {
            WindowEvent::CloseRequested => return Flow::Exit,
            WindowEvent::Resized(size) => self.gpu.resize(size.width, size.height),
            WindowEvent::RedrawRequested => return self.redraw(),
            // Clicks on the overlay do not reach the particles. Releases always
            // do, so a button never stays stuck.
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                ..
            } if consumed || self.overlay.wants_pointer() => {}
            _ => self.mouse.handle_event(event),
        }
        Flow::Continue
    }

    fn frame_params(&self, dt: f32) -> FrameParams {
        let mut simulation = SimulationParams::new(dt, self.gpu.screen_size());
        self.mouse.apply(&mut simulation);
        FrameParams {
            simulation,
            color: self.controls.color,
            tier: self.controls.tier,
        }
    }

    fn redraw(&mut self) -> Flow {
        let dt = self.clock.tick();
        let frame = self.frame_params(dt);

        let output = match self.gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring");
                self.gpu.reconfigure();
                self.window.request_redraw();
                return Flow::Continue;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory");
                return Flow::Exit;
            }
            Err(err) => {
                log::warn!("Skipping frame: {}", err);
                self.window.request_redraw();
                return Flow::Continue;
            }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let device = &self.gpu.device;
        let queue = &self.gpu.queue;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

        let barrier = self
            .simulation
            .step(device, queue, &mut encoder, &frame.simulation, frame.tier.count());

        let screen = frame.simulation.screen_size;
        self.render
            .prepare(device, queue, projection(screen.x, screen.y), frame.color);
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Particle Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.render.draw(&mut pass, &self.particles, barrier);
        }

        let controls = &mut self.controls;
        let mut changed = false;
        let overlay_frame = self.overlay.run(&self.window, |ctx| {
            changed |= ui::controls_window(ctx, controls);
        });
        if changed {
            log::info!(
                "Controls: {} million particles, color {:?}",
                controls.tier.get(),
                controls.color
            );
        }
        self.overlay.paint(
            device,
            queue,
            &mut encoder,
            &view,
            overlay_frame,
            [self.gpu.config.width, self.gpu.config.height],
        );

        let commands = gpu_call!(device, encoder.finish());
        gpu_call!(device, queue.submit(std::iter::once(commands)));
        self.window.pre_present_notify();
        output.present();

        if self.clock.fps_updated() {
            self.window
                .set_title(&frame_title(&self.title, self.clock.fps(), frame.tier));
        }
        self.window.request_redraw();
        Flow::Continue
    }
}

fn frame_title(title: &str, fps: f32, tier: ParticleTier) -> String {
    format!("{} | {:.0} FPS | {}M particles", title, fps, tier.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_title() {
        assert_eq!(
            frame_title("Compute Shader - Particles", 59.7, ParticleTier::new(3)),
            "Compute Shader - Particles | 60 FPS | 3M particles"
        );
    }
}
