//! Startup configuration for the application.

use glam::Vec4;

use crate::params::ParticleTier;

/// Window and initial control values.
///
/// ```
/// use compute_particles::AppConfig;
///
/// let config = AppConfig::default()
///     .with_size(1920, 1080)
///     .with_tier(4)
///     .with_vsync(false);
/// assert_eq!(config.tier.get(), 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Tier active on the first frame. The buffer is always sized for the highest one.
    pub tier: ParticleTier,
    pub color: Vec4,
    pub clear_color: wgpu::Color,
    pub vsync: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: crate::ui::WINDOW_TITLE.to_string(),
            width: 1280,
            height: 768,
            tier: ParticleTier::default(),
            color: Vec4::new(0.7, 0.2, 0.3, 0.1),
            clear_color: wgpu::Color::BLACK,
            vsync: true,
        }
    }
}

impl AppConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Initial window size in physical pixels. Zero is raised to one.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    /// Initial number of particles in millions, clamped to the supported range.
    pub fn with_tier(mut self, millions: u32) -> Self {
        self.tier = ParticleTier::new(millions);
        self
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    pub fn with_clear_color(mut self, clear_color: wgpu::Color) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }
}
