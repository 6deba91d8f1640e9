use std::path::PathBuf;

use crate::shared::constants::DEFAULT_FPS;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Frame rate to encode with. Sources that report no rate fall back to
    /// [`DEFAULT_FPS`].
    pub fn effective_fps(&self) -> f64 {
        if self.fps.is_finite() && self.fps > 0.0 {
            self.fps
        } else {
            DEFAULT_FPS
        }
    }
}
