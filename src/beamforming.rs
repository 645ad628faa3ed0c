use crate::device::RadioDevice;
use rem_common::{RemMode, Vec3};

/// How antennas are steered for each sample of the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamformingPolicy {
    /// Transmitters keep their configured beams; the receiver listens
    /// quasi-omni. Shows the footprint of the configured beams.
    BeamShape,
    /// Every transmitter steers toward the sample and the receiver steers
    /// toward whichever transmitter is being evaluated. Shows the best
    /// achievable coverage.
    CoverageArea,
}

impl From<RemMode> for BeamformingPolicy {
    fn from(mode: RemMode) -> Self {
        match mode {
            RemMode::BeamShape => BeamformingPolicy::BeamShape,
            RemMode::CoverageArea => BeamformingPolicy::CoverageArea,
        }
    }
}

impl BeamformingPolicy {
    /// Places the receiver at `point` and sets the beams for this sample.
    /// Only beams and the receiver position change; applying twice is the
    /// same as applying once.
    pub fn apply(&self, point: Vec3, transmitters: &mut [RadioDevice], receiver: &mut RadioDevice) {
        receiver.position = point;
        match self {
            BeamformingPolicy::BeamShape => receiver.antenna.set_quasi_omni(),
            BeamformingPolicy::CoverageArea => {
                for tx in transmitters.iter_mut() {
                    let position = tx.position;
                    tx.antenna.point_at(position, point);
                }
            }
        }
    }

    /// Orients the receiver before `transmitter`'s contribution is evaluated.
    pub fn orient_receiver(&self, receiver: &mut RadioDevice, transmitter: &RadioDevice) {
        if let BeamformingPolicy::CoverageArea = self {
            let position = receiver.position;
            receiver.antenna.point_at(position, transmitter.position);
        }
    }
}
