//! Pluggable propagation models and the factory that builds fresh instances.
//!
//! Every model keeps per-link random state (shadowing, LOS/NLOS state, fading
//! draws) keyed by the (tx, rx) pair. Instances are never shared between
//! samples: the engine asks a [`ModelFactory`] for new ones per sample.

use crate::device::{DeviceId, RadioDevice};
use crate::error::{RemError, RemResult};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Exp1, Normal, StandardNormal};
use rem_common::{ChannelConditionKind, FastFadingKind, PathlossKind, PropagationConfig};
use std::collections::HashMap;

pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

pub type LinkKey = (DeviceId, DeviceId);

/// A directed transmitter → receiver pair.
#[derive(Debug, Clone, Copy)]
pub struct Link<'a> {
    pub tx: &'a RadioDevice,
    pub rx: &'a RadioDevice,
}

impl<'a> Link<'a> {
    pub fn new(tx: &'a RadioDevice, rx: &'a RadioDevice) -> Self {
        Link { tx, rx }
    }

    pub fn key(&self) -> LinkKey {
        (self.tx.id, self.rx.id)
    }

    pub fn distance_3d(&self) -> f64 {
        self.tx.position.distance(self.rx.position)
    }

    pub fn distance_2d(&self) -> f64 {
        self.tx.position.distance_2d(self.rx.position)
    }

    pub fn frequency_hz(&self) -> f64 {
        self.tx.central_frequency_hz
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCondition {
    Los,
    Nlos,
}

pub trait PathlossModel: Send {
    /// Attenuation in dB (positive values attenuate), shadowing included.
    fn loss_db(&mut self, link: &Link<'_>, condition: ChannelCondition) -> RemResult<f64>;
}

pub trait ChannelConditionModel: Send {
    fn condition(&mut self, link: &Link<'_>) -> ChannelCondition;
}

pub trait FastFadingModel: Send {
    /// Linear power gain per band for the link.
    fn band_gains(&mut self, link: &Link<'_>, condition: ChannelCondition, num_bands: usize) -> RemResult<Vec<f64>>;
}

/// Builds brand-new model instances. Each call receives its own RNG.
pub trait ModelFactory: Send + Sync {
    fn create_pathloss(&self, rng: StdRng) -> RemResult<Box<dyn PathlossModel>>;
    fn create_channel_condition(&self, rng: StdRng) -> RemResult<Box<dyn ChannelConditionModel>>;
    fn create_fast_fading(&self, rng: StdRng) -> RemResult<Box<dyn FastFadingModel>>;
}

/// Free-space loss (dB) at a distance and frequency.
pub fn free_space_loss_db(distance_m: f64, frequency_hz: f64) -> f64 {
    20.0 * (4.0 * std::f64::consts::PI * distance_m * frequency_hz / SPEED_OF_LIGHT).log10()
}

// ============================================================================
// Configured models
// ============================================================================

/// Log-distance pathloss anchored on free space at the reference distance,
/// with a LOS/NLOS dependent shadowing draw cached per link.
pub struct DistancePathloss {
    exponent: f64,
    reference_distance_m: f64,
    min_distance_m: f64,
    nlos_excess_loss_db: f64,
    shadowing_los: Normal<f64>,
    shadowing_nlos: Normal<f64>,
    rng: StdRng,
    shadowing: HashMap<LinkKey, f64>,
}

impl DistancePathloss {
    pub fn new(config: &PropagationConfig, rng: StdRng) -> RemResult<Self> {
        let (exponent, reference_distance_m) = match config.pathloss {
            PathlossKind::FreeSpace => (2.0, 1.0),
            PathlossKind::LogDistance { exponent, reference_distance_m } => (exponent, reference_distance_m),
        };
        if !(exponent > 0.0 && exponent.is_finite()) {
            return Err(RemError::model("pathloss", format!("exponent must be positive, got {}", exponent)));
        }
        if !(reference_distance_m > 0.0) || !(config.min_distance_m > 0.0) {
            return Err(RemError::model("pathloss", "reference and minimum distances must be positive"));
        }
        if !(config.nlos_excess_loss_db >= 0.0) {
            return Err(RemError::model("pathloss", "NLOS excess loss must be non-negative"));
        }
        for (label, std) in [("LOS", config.shadowing_std_los_db), ("NLOS", config.shadowing_std_nlos_db)] {
            if !(std >= 0.0 && std.is_finite()) {
                return Err(RemError::model(
                    "pathloss",
                    format!("{} shadowing std must be finite and non-negative, got {}", label, std),
                ));
            }
        }
        let shadowing_los = Normal::new(0.0, config.shadowing_std_los_db)
            .map_err(|e| RemError::model("pathloss", format!("LOS shadowing: {}", e)))?;
        let shadowing_nlos = Normal::new(0.0, config.shadowing_std_nlos_db)
            .map_err(|e| RemError::model("pathloss", format!("NLOS shadowing: {}", e)))?;
        Ok(DistancePathloss {
            exponent,
            reference_distance_m,
            min_distance_m: config.min_distance_m,
            nlos_excess_loss_db: config.nlos_excess_loss_db,
            shadowing_los,
            shadowing_nlos,
            rng,
            shadowing: HashMap::new(),
        })
    }

    fn mean_loss_db(&self, link: &Link<'_>, condition: ChannelCondition) -> f64 {
        let d = link.distance_3d().max(self.min_distance_m);
        let reference = free_space_loss_db(self.reference_distance_m, link.frequency_hz());
        let excess = match condition {
            ChannelCondition::Los => 0.0,
            ChannelCondition::Nlos => self.nlos_excess_loss_db,
        };
        reference + 10.0 * self.exponent * (d / self.reference_distance_m).log10() + excess
    }
}

impl PathlossModel for DistancePathloss {
    fn loss_db(&mut self, link: &Link<'_>, condition: ChannelCondition) -> RemResult<f64> {
        let mean = self.mean_loss_db(link, condition);
        let dist = match condition {
            ChannelCondition::Los => self.shadowing_los,
            ChannelCondition::Nlos => self.shadowing_nlos,
        };
        let rng = &mut self.rng;
        let shadow = *self.shadowing.entry(link.key()).or_insert_with(|| rng.sample(dist));
        let loss = mean + shadow;
        if !loss.is_finite() {
            return Err(RemError::evaluation(format!("pathloss for link {:?} is not finite", link.key())));
        }
        Ok(loss)
    }
}

/// LOS/NLOS state drawn once per link.
pub struct ConfiguredChannelCondition {
    kind: ChannelConditionKind,
    rng: StdRng,
    states: HashMap<LinkKey, ChannelCondition>,
}

impl ConfiguredChannelCondition {
    pub fn new(kind: &ChannelConditionKind, rng: StdRng) -> RemResult<Self> {
        if let ChannelConditionKind::DistanceBased { los_distance_m, decay_distance_m } = kind {
            if !(*los_distance_m > 0.0) || !(*decay_distance_m > 0.0) {
                return Err(RemError::model("channel condition", "LOS and decay distances must be positive"));
            }
        }
        Ok(ConfiguredChannelCondition { kind: kind.clone(), rng, states: HashMap::new() })
    }

    /// LOS probability for a 2D distance.
    pub fn los_probability(&self, distance_2d: f64) -> f64 {
        match self.kind {
            ChannelConditionKind::AlwaysLos => 1.0,
            ChannelConditionKind::AlwaysNlos => 0.0,
            ChannelConditionKind::DistanceBased { los_distance_m, decay_distance_m } => {
                if distance_2d <= los_distance_m {
                    return 1.0;
                }
                let decay = (-distance_2d / decay_distance_m).exp();
                (los_distance_m / distance_2d) * (1.0 - decay) + decay
            }
        }
    }
}

impl ChannelConditionModel for ConfiguredChannelCondition {
    fn condition(&mut self, link: &Link<'_>) -> ChannelCondition {
        if let Some(state) = self.states.get(&link.key()) {
            return *state;
        }
        let p = self.los_probability(link.distance_2d());
        let state = if self.rng.random::<f64>() < p { ChannelCondition::Los } else { ChannelCondition::Nlos };
        self.states.insert(link.key(), state);
        state
    }
}

/// Block fading per band, drawn once per link.
pub struct ConfiguredFastFading {
    kind: FastFadingKind,
    rng: StdRng,
    draws: HashMap<LinkKey, Vec<f64>>,
}

impl ConfiguredFastFading {
    pub fn new(kind: &FastFadingKind, rng: StdRng) -> RemResult<Self> {
        if let FastFadingKind::Rician { k_factor_db } = kind {
            if !k_factor_db.is_finite() {
                return Err(RemError::model("fast fading", "Rician K factor must be finite"));
            }
        }
        Ok(ConfiguredFastFading { kind: kind.clone(), rng, draws: HashMap::new() })
    }

    fn draw(&mut self, condition: ChannelCondition, num_bands: usize) -> Vec<f64> {
        let rng = &mut self.rng;
        match (&self.kind, condition) {
            (FastFadingKind::None, _) => vec![1.0; num_bands],
            (FastFadingKind::Rician { k_factor_db }, ChannelCondition::Los) => {
                let k = 10f64.powf(k_factor_db / 10.0);
                let los = (k / (k + 1.0)).sqrt();
                let scatter = (1.0 / (2.0 * (k + 1.0))).sqrt();
                (0..num_bands)
                    .map(|_| {
                        let re: f64 = los + scatter * rng.sample::<f64, _>(StandardNormal);
                        let im: f64 = scatter * rng.sample::<f64, _>(StandardNormal);
                        re * re + im * im
                    })
                    .collect()
            }
            // Rayleigh, and Rician links without a direct path
            _ => (0..num_bands).map(|_| rng.sample::<f64, _>(Exp1)).collect(),
        }
    }
}

impl FastFadingModel for ConfiguredFastFading {
    fn band_gains(&mut self, link: &Link<'_>, condition: ChannelCondition, num_bands: usize) -> RemResult<Vec<f64>> {
        if let Some(gains) = self.draws.get(&link.key()) {
            if gains.len() == num_bands {
                return Ok(gains.clone());
            }
        }
        let gains = self.draw(condition, num_bands);
        self.draws.insert(link.key(), gains.clone());
        Ok(gains)
    }
}

/// Factory over a private copy of the scenario's propagation attributes.
#[derive(Debug, Clone)]
pub struct ConfiguredModelFactory {
    config: PropagationConfig,
}

impl ConfiguredModelFactory {
    /// Deep-copies the reference configuration; later changes to the
    /// caller's config do not reach models built by this factory.
    pub fn from_config(reference: &PropagationConfig) -> Self {
        ConfiguredModelFactory { config: reference.clone() }
    }

    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }
}

impl ModelFactory for ConfiguredModelFactory {
    fn create_pathloss(&self, rng: StdRng) -> RemResult<Box<dyn PathlossModel>> {
        Ok(Box::new(DistancePathloss::new(&self.config, rng)?))
    }

    fn create_channel_condition(&self, rng: StdRng) -> RemResult<Box<dyn ChannelConditionModel>> {
        Ok(Box::new(ConfiguredChannelCondition::new(&self.config.channel_condition, rng)?))
    }

    fn create_fast_fading(&self, rng: StdRng) -> RemResult<Box<dyn FastFadingModel>> {
        Ok(Box::new(ConfiguredFastFading::new(&self.config.fast_fading, rng)?))
    }
}
