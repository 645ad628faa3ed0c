//! Frequency grid and power spectral densities.
//!
//! A `SpectrumModel` is the ordered list of resource blocks of one bandwidth
//! part; a `SpectrumValue` holds one PSD value (W/Hz) per block of a model.

use crate::error::{RemError, RemResult};

/// Boltzmann constant (J/K).
pub const BOLTZMANN: f64 = 1.380649e-23;
/// Reference noise temperature (K).
pub const REFERENCE_TEMPERATURE_K: f64 = 290.0;
pub const SUBCARRIERS_PER_RB: usize = 12;
/// Largest numerology with a defined sub-carrier spacing (15 kHz * 2^6).
pub const MAX_NUMEROLOGY: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub center_hz: f64,
    pub width_hz: f64,
}

impl Band {
    pub fn low_hz(&self) -> f64 {
        self.center_hz - self.width_hz / 2.0
    }

    pub fn high_hz(&self) -> f64 {
        self.center_hz + self.width_hz / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumModel {
    bands: Vec<Band>,
}

impl SpectrumModel {
    pub fn new(bands: Vec<Band>) -> Self {
        SpectrumModel { bands }
    }

    /// Sub-carrier spacing for a numerology: 15 kHz * 2^numerology.
    pub fn subcarrier_spacing_hz(numerology: u8) -> f64 {
        15_000.0 * f64::from(1u32 << numerology)
    }

    /// Resource-block grid of a bandwidth part, centred on the carrier.
    pub fn nr(central_frequency_hz: f64, bandwidth_hz: f64, numerology: u8) -> RemResult<Self> {
        if numerology > MAX_NUMEROLOGY {
            return Err(RemError::config(format!(
                "numerology {} exceeds the maximum of {}",
                numerology, MAX_NUMEROLOGY
            )));
        }
        if !(central_frequency_hz > 0.0) || !(bandwidth_hz > 0.0) {
            return Err(RemError::config("carrier frequency and bandwidth must be positive"));
        }
        let rb_width = Self::subcarrier_spacing_hz(numerology) * SUBCARRIERS_PER_RB as f64;
        let num_rbs = (bandwidth_hz / rb_width).floor() as usize;
        if num_rbs == 0 {
            return Err(RemError::config(format!(
                "bandwidth {:.0} Hz is narrower than one resource block ({:.0} Hz)",
                bandwidth_hz, rb_width
            )));
        }
        let start = central_frequency_hz - num_rbs as f64 * rb_width / 2.0;
        let bands = (0..num_rbs)
            .map(|i| Band {
                center_hz: start + (i as f64 + 0.5) * rb_width,
                width_hz: rb_width,
            })
            .collect();
        Ok(SpectrumModel { bands })
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn total_width_hz(&self) -> f64 {
        self.bands.iter().map(|b| b.width_hz).sum()
    }

    pub fn low_hz(&self) -> f64 {
        self.bands.first().map(|b| b.low_hz()).unwrap_or(0.0)
    }

    pub fn high_hz(&self) -> f64 {
        self.bands.last().map(|b| b.high_hz()).unwrap_or(0.0)
    }
}

/// PSD values (W/Hz), one per band of the model they were built on.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumValue {
    values: Vec<f64>,
}

impl SpectrumValue {
    pub fn zeros(num_bands: usize) -> Self {
        SpectrumValue { values: vec![0.0; num_bands] }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        SpectrumValue { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True if no band carries power.
    pub fn is_silent(&self) -> bool {
        self.values.iter().all(|v| *v <= 0.0)
    }

    pub fn scale(&mut self, factor: f64) {
        self.values.iter_mut().for_each(|v| *v *= factor);
    }

    /// Multiplies band by band with per-band gains.
    pub fn scale_each(&mut self, factors: &[f64]) -> RemResult<()> {
        if factors.len() != self.values.len() {
            return Err(RemError::evaluation(format!(
                "gain vector has {} bands, PSD has {}",
                factors.len(),
                self.values.len()
            )));
        }
        self.values.iter_mut().zip(factors).for_each(|(v, g)| *v *= g);
        Ok(())
    }

    /// Transmit PSD of a device, projected on the receiver's bands.
    /// Power is spread uniformly over the transmitter's blocks; receiver bands
    /// whose centre lies outside the transmitter allocation get zero.
    pub fn transmit_psd(tx_power_dbm: f64, tx_model: &SpectrumModel, rx_model: &SpectrumModel) -> Self {
        let width = tx_model.total_width_hz();
        if width <= 0.0 {
            return SpectrumValue::zeros(rx_model.num_bands());
        }
        let psd = dbm_to_watts(tx_power_dbm) / width;
        let (low, high) = (tx_model.low_hz(), tx_model.high_hz());
        let values = rx_model
            .bands()
            .iter()
            .map(|b| if b.center_hz >= low && b.center_hz <= high { psd } else { 0.0 })
            .collect();
        SpectrumValue { values }
    }

    /// Thermal noise PSD kT scaled by the receiver noise figure.
    pub fn noise(model: &SpectrumModel, noise_figure_db: f64) -> Self {
        let psd = BOLTZMANN * REFERENCE_TEMPERATURE_K * db_to_linear(noise_figure_db);
        SpectrumValue { values: vec![psd; model.num_bands()] }
    }

    /// Integrated power (W) over the model's bands.
    pub fn total_power_w(&self, model: &SpectrumModel) -> f64 {
        self.values.iter().zip(model.bands()).map(|(v, b)| v * b.width_hz).sum()
    }
}

pub fn dbm_to_watts(dbm: f64) -> f64 {
    10f64.powf((dbm - 30.0) / 10.0)
}

pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}
