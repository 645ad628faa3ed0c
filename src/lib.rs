//! Radio environment map (REM) generation.
//!
//! A [`RemEngine`] samples SNR and SINR over a horizontal grid for a scene of
//! transmitters and one evaluation receiver. Every (point, iteration) sample
//! gets fresh propagation models from a [`ModelFactory`], so samples never
//! share random state.

pub mod antenna;
pub mod beamforming;
pub mod device;
pub mod engine;
pub mod error;
pub mod grid;
pub mod propagation;
pub mod session;
pub mod sinr;
pub mod spectrum;

pub use antenna::{AntennaArray, Beam, ElementPattern};
pub use beamforming::BeamformingPolicy;
pub use device::{DeviceId, RadioDevice, Scene};
pub use engine::{sample_seed, EngineSettings, EngineState, RemEngine};
pub use error::{RemError, RemResult};
pub use grid::{generate_points, GridSampler};
pub use propagation::{
    ChannelCondition, ChannelConditionModel, ConfiguredModelFactory, FastFadingModel, Link, ModelFactory,
    PathlossModel,
};
pub use session::{with_session, PropagationSession};
pub use sinr::{reduce, ServingSelection, SinrEvaluator, SinrSample};
pub use spectrum::{SpectrumModel, SpectrumValue};
