use serde::{Serialize, Deserialize};
use crate::vecmath::Vec3;

/// One sample of the radio environment map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemPoint {
    /// Position of the sample (meters).
    pub pos: Vec3,
    /// SNR averaged over iterations in the linear domain, reported in dB.
    pub avg_snr_db: f64,
    /// SINR averaged over iterations in the linear domain, reported in dB.
    pub avg_sinr_db: f64,
}

impl RemPoint {
    /// A point that has not been evaluated yet.
    pub fn at(pos: Vec3) -> Self {
        RemPoint { pos, avg_snr_db: 0.0, avg_sinr_db: 0.0 }
    }
}
