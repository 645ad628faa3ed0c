//! Antenna arrays and beam steering.
//!
//! Elements sit on the local y-z plane with boresight along local +x.
//! Orientation (bearing, downtilt) maps global angles to the local frame; the
//! beam is kept in global angles so a policy can steer it from positions alone.

use rem_common::{clamp, wrap_angle, Angles, AntennaConfig, BeamConfig, ElementKind, Vec3};
use std::f64::consts::PI;

/// Peak gain of the directional element (dBi).
const THREE_GPP_ELEMENT_GAIN_DB: f64 = 8.0;
const THREE_GPP_BEAMWIDTH_DEG: f64 = 65.0;
const THREE_GPP_MAX_ATTENUATION_DB: f64 = 30.0;
/// Floor applied to array gain before converting to dB (array nulls).
const MIN_ARRAY_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementPattern {
    Isotropic,
    ThreeGpp,
}

impl ElementPattern {
    /// Element gain (dBi) toward a direction given in the local frame.
    pub fn gain_db(&self, local: Angles) -> f64 {
        match self {
            ElementPattern::Isotropic => 0.0,
            ElementPattern::ThreeGpp => {
                let theta = local.inclination.to_degrees();
                let phi = local.azimuth.to_degrees();
                let vertical = -(12.0 * ((theta - 90.0) / THREE_GPP_BEAMWIDTH_DEG).powi(2))
                    .min(THREE_GPP_MAX_ATTENUATION_DB);
                let horizontal = -(12.0 * (phi / THREE_GPP_BEAMWIDTH_DEG).powi(2))
                    .min(THREE_GPP_MAX_ATTENUATION_DB);
                let attenuation = (-(vertical + horizontal)).min(THREE_GPP_MAX_ATTENUATION_DB);
                THREE_GPP_ELEMENT_GAIN_DB - attenuation
            }
        }
    }
}

impl From<ElementKind> for ElementPattern {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Isotropic => ElementPattern::Isotropic,
            ElementKind::ThreeGpp => ElementPattern::ThreeGpp,
        }
    }
}

/// Current beamforming configuration of an array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Beam {
    /// Wide pattern with unit array gain in every direction.
    QuasiOmni,
    /// Direct-path beam toward a global direction.
    Steered(Angles),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AntennaArray {
    rows: u32,
    columns: u32,
    spacing_wavelengths: f64,
    element: ElementPattern,
    bearing_rad: f64,
    downtilt_rad: f64,
    beam: Beam,
}

impl AntennaArray {
    pub fn new(rows: u32, columns: u32, element: ElementPattern) -> Self {
        AntennaArray {
            rows: rows.max(1),
            columns: columns.max(1),
            spacing_wavelengths: 0.5,
            element,
            bearing_rad: 0.0,
            downtilt_rad: 0.0,
            beam: Beam::QuasiOmni,
        }
    }

    /// Single isotropic element.
    pub fn isotropic() -> Self {
        AntennaArray::new(1, 1, ElementPattern::Isotropic)
    }

    /// Builds the array described by the scene. `position` resolves beams
    /// configured toward a target point.
    pub fn from_config(config: &AntennaConfig, position: Vec3) -> Self {
        let mut array = AntennaArray::new(config.rows, config.columns, config.element.into())
            .with_orientation(config.bearing_deg.to_radians(), config.downtilt_deg.to_radians())
            .with_spacing(config.spacing_wavelengths);
        array.beam = match &config.beam {
            BeamConfig::QuasiOmni => Beam::QuasiOmni,
            BeamConfig::Direction { azimuth_deg, inclination_deg } => {
                Beam::Steered(Angles::from_degrees(*azimuth_deg, *inclination_deg))
            }
            BeamConfig::Toward { target } => Beam::Steered(Angles::between(position, Vec3::from(*target))),
        };
        array
    }

    pub fn with_orientation(mut self, bearing_rad: f64, downtilt_rad: f64) -> Self {
        self.bearing_rad = bearing_rad;
        self.downtilt_rad = downtilt_rad;
        self
    }

    pub fn with_spacing(mut self, spacing_wavelengths: f64) -> Self {
        self.spacing_wavelengths = spacing_wavelengths;
        self
    }

    pub fn num_elements(&self) -> u32 {
        self.rows * self.columns
    }

    pub fn beam(&self) -> Beam {
        self.beam
    }

    /// Beam-steering entry point: direct-path beam toward a global direction.
    pub fn steer_towards(&mut self, direction: Angles) {
        self.beam = Beam::Steered(direction);
    }

    /// Steers the beam from `own_position` toward `target`.
    pub fn point_at(&mut self, own_position: Vec3, target: Vec3) {
        self.steer_towards(Angles::between(own_position, target));
    }

    pub fn set_quasi_omni(&mut self) {
        self.beam = Beam::QuasiOmni;
    }

    pub fn set_beam(&mut self, beam: Beam) {
        self.beam = beam;
    }

    /// Total gain (dBi) toward a global direction: element pattern plus
    /// array factor for the current beam.
    pub fn gain_db(&self, direction: Angles) -> f64 {
        let local = self.to_local(direction);
        let array_gain = self.array_gain(local).max(MIN_ARRAY_GAIN);
        self.element.gain_db(local) + 10.0 * array_gain.log10()
    }

    fn to_local(&self, global: Angles) -> Angles {
        Angles::new(
            wrap_angle(global.azimuth - self.bearing_rad),
            clamp(global.inclination - self.downtilt_rad, 0.0, PI),
        )
    }

    /// Linear array gain |w^H a(dir)|^2 with unit-norm weights; N at the
    /// steered direction, 1 for quasi-omni.
    fn array_gain(&self, local: Angles) -> f64 {
        let steer = match self.beam {
            Beam::QuasiOmni => return 1.0,
            Beam::Steered(direction) => self.to_local(direction),
        };
        let (mut re, mut im) = (0.0, 0.0);
        for row in 0..self.rows {
            for col in 0..self.columns {
                let phase = self.element_phase(row, col, local) - self.element_phase(row, col, steer);
                re += phase.cos();
                im += phase.sin();
            }
        }
        (re * re + im * im) / self.num_elements() as f64
    }

    fn element_phase(&self, row: u32, col: u32, dir: Angles) -> f64 {
        let y = col as f64 * self.spacing_wavelengths;
        let z = row as f64 * self.spacing_wavelengths;
        2.0 * PI * (y * dir.inclination.sin() * dir.azimuth.sin() + z * dir.inclination.cos())
    }
}

impl Default for AntennaArray {
    fn default() -> Self {
        AntennaArray::isotropic()
    }
}
