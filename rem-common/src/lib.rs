pub mod config;
pub mod grid_spec;
pub mod rem_point;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{
    AntennaConfig, BandwidthPartConfig, BeamConfig, ChannelConditionKind, ElementKind, FastFadingKind,
    GridConfig, OutputConfig, OutputFormat, PathlossKind, PropagationConfig, ReceiverConfig, RemConfig,
    RemMode, RemSettingsConfig, TransmitterConfig,
};
pub use grid_spec::GridSpec;
pub use rem_point::RemPoint;
pub use vecmath::{Angles, Vec3, clamp, wrap_angle};
