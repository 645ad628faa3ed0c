use serde::{Deserialize, Serialize};

/// Grid parameters derived from the configuration, used by the sampler.
/// Validation lives with the sampler so callers get a typed error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub x_min: f64,
    pub x_max: f64,
    pub x_res: u16, // Number of steps along x (res + 1 samples)
    pub y_min: f64,
    pub y_max: f64,
    pub y_res: u16,
    pub z: f64, // Evaluation height
}

impl GridSpec {
    /// Distance along x between adjacent points.
    pub fn x_step(&self) -> f64 {
        (self.x_max - self.x_min) / self.x_res as f64
    }

    /// Distance along y between adjacent points.
    pub fn y_step(&self) -> f64 {
        (self.y_max - self.y_min) / self.y_res as f64
    }

    /// Total number of points the grid yields.
    pub fn num_points(&self) -> usize {
        (self.x_res as usize + 1) * (self.y_res as usize + 1)
    }
}
