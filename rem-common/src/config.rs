use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::grid_spec::GridSpec;
use std::path::Path;

// Map bounds and resolution
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GridConfig {
    pub x_min: f64,
    pub x_max: f64,
    pub x_res: u16,
    pub y_min: f64,
    pub y_max: f64,
    pub y_res: u16,
    #[serde(default = "default_z")]
    pub z: f64,
}

/// Which beamforming policy drives the map.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemMode {
    /// Beams stay as configured by the scene.
    BeamShape,
    /// Beams are re-pointed toward every sample.
    CoverageArea,
}

// Engine run settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RemSettingsConfig {
    #[serde(default = "default_mode")]
    pub mode: RemMode,
    /// Independent channel realizations averaged per point.
    #[serde(default = "default_iterations")]
    pub iterations: u16,
    /// Index into `bandwidth_parts`.
    #[serde(default)]
    pub bwp_id: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Fixed useful transmitter. None selects the best server per sample.
    #[serde(default)]
    pub serving_transmitter: Option<usize>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PathlossKind {
    FreeSpace,
    LogDistance {
        exponent: f64,
        #[serde(default = "default_reference_distance")]
        reference_distance_m: f64,
    },
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConditionKind {
    AlwaysLos,
    AlwaysNlos,
    /// LOS probability min(d1/d, 1) * (1 - exp(-d/d2)) + exp(-d/d2) on the 2D distance.
    DistanceBased {
        los_distance_m: f64,
        decay_distance_m: f64,
    },
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FastFadingKind {
    None,
    Rayleigh,
    /// Rician on LOS links, Rayleigh on NLOS links.
    Rician { k_factor_db: f64 },
}

// Propagation model attributes, copied into every sample's fresh models
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PropagationConfig {
    #[serde(default = "default_pathloss")]
    pub pathloss: PathlossKind,
    #[serde(default = "default_min_distance")]
    pub min_distance_m: f64,
    #[serde(default)]
    pub shadowing_std_los_db: f64,
    #[serde(default)]
    pub shadowing_std_nlos_db: f64,
    #[serde(default)]
    pub nlos_excess_loss_db: f64,
    #[serde(default = "default_channel_condition")]
    pub channel_condition: ChannelConditionKind,
    #[serde(default = "default_fast_fading")]
    pub fast_fading: FastFadingKind,
}

// One slice of spectrum a link may be evaluated on
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BandwidthPartConfig {
    pub central_frequency_hz: f64,
    pub bandwidth_hz: f64,
    #[serde(default)]
    pub numerology: u8,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Isotropic,
    /// Directional element with 65 degree beamwidth and 8 dBi peak gain.
    ThreeGpp,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BeamConfig {
    QuasiOmni,
    Direction { azimuth_deg: f64, inclination_deg: f64 },
    /// Direct path toward a fixed position (e.g. an attached UE).
    Toward { target: [f64; 3] },
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AntennaConfig {
    #[serde(default = "default_one")]
    pub rows: u32,
    #[serde(default = "default_one")]
    pub columns: u32,
    #[serde(default = "default_element")]
    pub element: ElementKind,
    #[serde(default)]
    pub bearing_deg: f64,
    #[serde(default)]
    pub downtilt_deg: f64,
    #[serde(default = "default_spacing")]
    pub spacing_wavelengths: f64,
    #[serde(default = "default_beam")]
    pub beam: BeamConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TransmitterConfig {
    pub name: String,
    pub position: [f64; 3],
    pub tx_power_dbm: f64,
    #[serde(default)]
    pub antenna: AntennaConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ReceiverConfig {
    #[serde(default)]
    pub antenna: AntennaConfig,
    #[serde(default = "default_noise_figure")]
    pub noise_figure_db: f64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Json,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    #[serde(default = "default_format")]
    pub format: OutputFormat,
    #[serde(default = "default_true")]
    pub save_transmitters: bool,
}

// Main configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RemConfig {
    pub grid: GridConfig,
    #[serde(default)]
    pub rem: RemSettingsConfig,
    #[serde(default)]
    pub propagation: PropagationConfig,
    pub bandwidth_parts: Vec<BandwidthPartConfig>,
    pub transmitters: Vec<TransmitterConfig>,
    #[serde(default)]
    pub receiver: ReceiverConfig,
    pub output: OutputConfig,
}

impl Default for RemSettingsConfig {
    fn default() -> Self {
        RemSettingsConfig {
            mode: default_mode(),
            iterations: default_iterations(),
            bwp_id: 0,
            seed: default_seed(),
            serving_transmitter: None,
            parallel: false,
            show_progress: true,
        }
    }
}

impl Default for PropagationConfig {
    fn default() -> Self {
        PropagationConfig {
            pathloss: default_pathloss(),
            min_distance_m: default_min_distance(),
            shadowing_std_los_db: 0.0,
            shadowing_std_nlos_db: 0.0,
            nlos_excess_loss_db: 0.0,
            channel_condition: default_channel_condition(),
            fast_fading: default_fast_fading(),
        }
    }
}

impl Default for AntennaConfig {
    fn default() -> Self {
        AntennaConfig {
            rows: 1,
            columns: 1,
            element: default_element(),
            bearing_deg: 0.0,
            downtilt_deg: 0.0,
            spacing_wavelengths: default_spacing(),
            beam: default_beam(),
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            antenna: AntennaConfig::default(),
            noise_figure_db: default_noise_figure(),
        }
    }
}

impl RemConfig {
    /// Loads the REM configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: RemConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.rem.iterations == 0 {
            anyhow::bail!("rem.iterations must be greater than 0.");
        }
        if self.transmitters.is_empty() {
            anyhow::bail!("At least one transmitter is required.");
        }
        if self.rem.bwp_id >= self.bandwidth_parts.len() {
            anyhow::bail!(
                "rem.bwp_id {} is out of range ({} bandwidth parts configured).",
                self.rem.bwp_id,
                self.bandwidth_parts.len()
            );
        }
        if let Some(idx) = self.rem.serving_transmitter {
            if idx >= self.transmitters.len() {
                anyhow::bail!("rem.serving_transmitter {} is out of range.", idx);
            }
        }
        for bwp in &self.bandwidth_parts {
            if bwp.central_frequency_hz <= 0.0 || bwp.bandwidth_hz <= 0.0 {
                anyhow::bail!("Bandwidth part frequency and bandwidth must be positive.");
            }
        }
        let propagation = &self.propagation;
        for std in [propagation.shadowing_std_los_db, propagation.shadowing_std_nlos_db] {
            if !(std >= 0.0 && std.is_finite()) {
                anyhow::bail!("Shadowing standard deviations must be finite and non-negative, got {}.", std);
            }
        }
        for tx in &self.transmitters {
            if tx.position.iter().any(|c| !c.is_finite()) {
                anyhow::bail!("Transmitter '{}' has a non-finite position.", tx.name);
            }
            if tx.antenna.rows == 0 || tx.antenna.columns == 0 {
                anyhow::bail!("Transmitter '{}' antenna needs at least one row and column.", tx.name);
            }
        }
        if self.receiver.antenna.rows == 0 || self.receiver.antenna.columns == 0 {
            anyhow::bail!("Receiver antenna needs at least one row and column.");
        }
        Ok(())
    }

    /// Converts the grid section into the spec the sampler consumes.
    pub fn get_grid_spec(&self) -> GridSpec {
        GridSpec {
            x_min: self.grid.x_min,
            x_max: self.grid.x_max,
            x_res: self.grid.x_res,
            y_min: self.grid.y_min,
            y_max: self.grid.y_max,
            y_res: self.grid.y_res,
            z: self.grid.z,
        }
    }

    /// The bandwidth part selected by `rem.bwp_id`.
    pub fn bandwidth_part(&self) -> &BandwidthPartConfig {
        &self.bandwidth_parts[self.rem.bwp_id]
    }
}

fn default_z() -> f64 {
    1.5 // Typical UE height
}

fn default_mode() -> RemMode {
    RemMode::BeamShape
}

fn default_iterations() -> u16 {
    1
}

fn default_seed() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

fn default_one() -> u32 {
    1
}

fn default_pathloss() -> PathlossKind {
    PathlossKind::FreeSpace
}

fn default_reference_distance() -> f64 {
    1.0
}

fn default_min_distance() -> f64 {
    1.0
}

fn default_channel_condition() -> ChannelConditionKind {
    ChannelConditionKind::AlwaysLos
}

fn default_fast_fading() -> FastFadingKind {
    FastFadingKind::None
}

fn default_element() -> ElementKind {
    ElementKind::Isotropic
}

fn default_spacing() -> f64 {
    0.5
}

fn default_beam() -> BeamConfig {
    BeamConfig::QuasiOmni
}

fn default_noise_figure() -> f64 {
    5.0 // dB, UE default
}

fn default_format() -> OutputFormat {
    OutputFormat::Csv
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [grid]
        x_min = -100.0
        x_max = 100.0
        x_res = 2
        y_min = -100.0
        y_max = 100.0
        y_res = 2

        [[bandwidth_parts]]
        central_frequency_hz = 3.5e9
        bandwidth_hz = 20e6

        [[transmitters]]
        name = "gnb-0"
        position = [0.0, 0.0, 25.0]
        tx_power_dbm = 43.0

        [output]
        base_filename = "rem"
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = RemConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.rem.mode, RemMode::BeamShape);
        assert_eq!(config.rem.iterations, 1);
        assert_eq!(config.grid.z, 1.5);
        assert_eq!(config.propagation.pathloss, PathlossKind::FreeSpace);
        assert_eq!(config.receiver.noise_figure_db, 5.0);
        assert_eq!(config.transmitters[0].antenna.beam, BeamConfig::QuasiOmni);
        assert_eq!(config.output.format, OutputFormat::Csv);

        let spec = config.get_grid_spec();
        assert_eq!(spec.num_points(), 9);
        assert_eq!(spec.x_step(), 100.0);
    }

    #[test]
    fn test_tagged_model_sections() {
        let text = format!(
            "{}\n{}",
            MINIMAL,
            r#"
            [rem]
            mode = "coverage_area"
            iterations = 8

            [propagation]
            pathloss = { type = "log_distance", exponent = 3.5 }
            channel_condition = { type = "distance_based", los_distance_m = 18.0, decay_distance_m = 63.0 }
            fast_fading = { type = "rician", k_factor_db = 9.0 }
            "#
        );
        let config = RemConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.rem.mode, RemMode::CoverageArea);
        assert_eq!(config.rem.iterations, 8);
        assert_eq!(
            config.propagation.pathloss,
            PathlossKind::LogDistance { exponent: 3.5, reference_distance_m: 1.0 }
        );
        assert_eq!(config.propagation.fast_fading, FastFadingKind::Rician { k_factor_db: 9.0 });
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let text = format!("{}\n[rem]\niterations = 0\n", MINIMAL);
        assert!(RemConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn test_rejects_bad_bwp_index() {
        let text = format!("{}\n[rem]\nbwp_id = 3\n", MINIMAL);
        let err = RemConfig::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("bwp_id"));
    }

    #[test]
    fn test_rejects_negative_shadowing_std() {
        let text = format!("{}\n[propagation]\nshadowing_std_nlos_db = -2.0\n", MINIMAL);
        let err = RemConfig::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("Shadowing"));

        let text = format!("{}\n[propagation]\nshadowing_std_los_db = nan\n", MINIMAL);
        assert!(RemConfig::from_toml_str(&text).is_err());

        let text = format!("{}\n[propagation]\nshadowing_std_los_db = 0.0\n", MINIMAL);
        assert!(RemConfig::from_toml_str(&text).is_ok());
    }
}
