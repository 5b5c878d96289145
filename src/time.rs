//! Frame timing: delta time, frame count and a periodically refreshed FPS.

use std::time::{Duration, Instant};

/// How often the FPS value is recomputed.
pub const FPS_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct FrameClock {
    /// When the last frame occurred.
    last_frame: Instant,
    /// Time since last frame in seconds.
    delta_secs: f32,
    frame_count: u64,
    fps: f32,
    /// Frame count at last FPS update.
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_updated: bool,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            last_frame: now,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_updated: false,
        }
    }

    /// Advance to a new frame now. Returns the delta time in seconds.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// Advance to a new frame at `now`.
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        self.delta_secs = now.saturating_duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frame_count += 1;

        let fps_elapsed = now.saturating_duration_since(self.fps_update_time);
        self.fps_updated = fps_elapsed >= FPS_UPDATE_INTERVAL;
        if self.fps_updated {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        self.delta_secs
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// True if the last tick recomputed the FPS.
    #[inline]
    pub fn fps_updated(&self) -> bool {
        self.fps_updated
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
