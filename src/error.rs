//! Error types for the particle simulation.
//!
//! Setup failures (window, adapter, device, shader programs) are typed here.
//! Per-frame GPU errors never surface as values; they are logged where they
//! happen and the frame carries on.

use std::fmt;

use crate::gpu::program::StageKind;

/// Errors that can occur while acquiring or using the GPU.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// The adapter cannot satisfy a limit the simulation depends on.
    Limits(String),
    /// The surface offers no texture format to render into.
    NoSurfaceFormat,
    /// Failed to map buffer for reading.
    BufferMapping(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => {
                write!(f, "No compatible GPU adapter found (Vulkan, Metal or DX12 required)")
            }
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::Limits(msg) => write!(f, "GPU adapter limits too low: {}", msg),
            GpuError::NoSurfaceFormat => {
                write!(f, "The window surface reports no supported texture format")
            }
            GpuError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// A shader stage failed to compile or a program failed to link.
///
/// The `log` field always holds the diagnostic text, never an empty string.
#[derive(Debug, Clone)]
pub enum ShaderError {
    /// A single stage was rejected by the WGSL front end or validator.
    Compile { stage: StageKind, log: String },
    /// Stages compiled on their own but could not be combined into a program.
    Link { program: String, log: String },
}

impl ShaderError {
    /// The diagnostic text reported by the compiler or linker.
    pub fn log(&self) -> &str {
        match self {
            ShaderError::Compile { log, .. } | ShaderError::Link { log, .. } => log,
        }
    }
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::Compile { stage, log } => {
                write!(f, "Shader compilation failed ({} stage): {}", stage, log)
            }
            ShaderError::Link { program, log } => {
                write!(f, "Program linking failed ({}): {}", program, log)
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// Errors that end the application before or during startup.
#[derive(Debug)]
pub enum AppError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
    /// One of the two shader programs could not be built.
    Shader(ShaderError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            AppError::Window(e) => write!(f, "Failed to create window: {}", e),
            AppError::Gpu(e) => write!(f, "GPU error: {}", e),
            AppError::Shader(e) => write!(f, "Shader error: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::EventLoop(e) => Some(e),
            AppError::Window(e) => Some(e),
            AppError::Gpu(e) => Some(e),
            AppError::Shader(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for AppError {
    fn from(e: winit::error::EventLoopError) -> Self {
        AppError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for AppError {
    fn from(e: winit::error::OsError) -> Self {
        AppError::Window(e)
    }
}

impl From<GpuError> for AppError {
    fn from(e: GpuError) -> Self {
        AppError::Gpu(e)
    }
}

impl From<ShaderError> for AppError {
    fn from(e: ShaderError) -> Self {
        AppError::Shader(e)
    }
}
