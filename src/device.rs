use crate::antenna::AntennaArray;
use crate::error::{RemError, RemResult};
use crate::spectrum::{SpectrumModel, SpectrumValue};
use log::debug;
use rem_common::{BandwidthPartConfig, RemConfig, Vec3};
use std::collections::HashSet;
use std::sync::Arc;

pub type DeviceId = u32;

/// One radio endpoint of the map: a transmitter (RTD) or the receiver (RRD).
#[derive(Debug, Clone)]
pub struct RadioDevice {
    pub id: DeviceId,
    pub name: String,
    pub position: Vec3,
    pub antenna: AntennaArray,
    pub tx_power_dbm: f64,
    pub bandwidth_hz: f64,
    pub central_frequency_hz: f64,
    pub numerology: u8,
    /// Resource-block grid of the evaluated bandwidth part.
    pub spectrum: Arc<SpectrumModel>,
}

impl RadioDevice {
    /// Creates a device on a bandwidth part with a single isotropic element.
    pub fn new(
        id: DeviceId,
        name: impl Into<String>,
        position: Vec3,
        bwp: &BandwidthPartConfig,
        tx_power_dbm: f64,
    ) -> RemResult<Self> {
        let spectrum = SpectrumModel::nr(bwp.central_frequency_hz, bwp.bandwidth_hz, bwp.numerology)?;
        Ok(RadioDevice {
            id,
            name: name.into(),
            position,
            antenna: AntennaArray::isotropic(),
            tx_power_dbm,
            bandwidth_hz: bwp.bandwidth_hz,
            central_frequency_hz: bwp.central_frequency_hz,
            numerology: bwp.numerology,
            spectrum: Arc::new(spectrum),
        })
    }

    pub fn with_antenna(mut self, antenna: AntennaArray) -> Self {
        self.antenna = antenna;
        self
    }

    /// This device's transmit PSD as seen on another spectrum grid.
    pub fn transmit_psd_on(&self, rx_model: &SpectrumModel) -> SpectrumValue {
        SpectrumValue::transmit_psd(self.tx_power_dbm, &self.spectrum, rx_model)
    }
}

/// Everything the engine samples: transmitters, the evaluation receiver and
/// the receiver's noise PSD.
#[derive(Debug, Clone)]
pub struct Scene {
    pub transmitters: Vec<RadioDevice>,
    pub receiver: RadioDevice,
    pub noise_psd: SpectrumValue,
}

impl Scene {
    pub fn new(transmitters: Vec<RadioDevice>, receiver: RadioDevice, noise_figure_db: f64) -> RemResult<Self> {
        if transmitters.is_empty() {
            return Err(RemError::config("scene has no transmitters"));
        }
        if !noise_figure_db.is_finite() {
            return Err(RemError::config("receiver noise figure must be finite"));
        }
        // Per-link draws are keyed by device id
        let mut ids = HashSet::with_capacity(transmitters.len() + 1);
        for device in transmitters.iter().chain(std::iter::once(&receiver)) {
            if !ids.insert(device.id) {
                return Err(RemError::config(format!("device id {} ('{}') is not unique", device.id, device.name)));
            }
        }
        let noise_psd = SpectrumValue::noise(&receiver.spectrum, noise_figure_db);
        Ok(Scene { transmitters, receiver, noise_psd })
    }

    /// Builds the scene for the configured bandwidth part.
    pub fn from_config(config: &RemConfig) -> RemResult<Self> {
        let bwp = config
            .bandwidth_parts
            .get(config.rem.bwp_id)
            .ok_or_else(|| RemError::config(format!("bandwidth part {} does not exist", config.rem.bwp_id)))?;

        let mut transmitters = Vec::with_capacity(config.transmitters.len());
        for (idx, tx) in config.transmitters.iter().enumerate() {
            let position = Vec3::from(tx.position);
            let device = RadioDevice::new(idx as DeviceId, tx.name.clone(), position, bwp, tx.tx_power_dbm)?
                .with_antenna(AntennaArray::from_config(&tx.antenna, position));
            debug!(
                "Transmitter '{}' at ({:.1}, {:.1}, {:.1}), {:.1} dBm, {} elements, beam {:?}",
                device.name,
                position.x,
                position.y,
                position.z,
                device.tx_power_dbm,
                device.antenna.num_elements(),
                device.antenna.beam()
            );
            transmitters.push(device);
        }

        // The receiver is moved to every sample; its initial position is irrelevant.
        let receiver_id = transmitters.len() as DeviceId;
        let receiver = RadioDevice::new(receiver_id, "rrd", Vec3::zero(), bwp, 0.0)?
            .with_antenna(AntennaArray::from_config(&config.receiver.antenna, Vec3::zero()));

        Scene::new(transmitters, receiver, config.receiver.noise_figure_db)
    }
}
