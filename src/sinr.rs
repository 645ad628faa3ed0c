//! Per-sample SNR/SINR from received PSDs.
//!
//! Values are computed per resource block on the receiver grid and the point
//! value is the best block. Blocks where the useful transmitter puts no power
//! are not part of the reduction.

use crate::beamforming::BeamformingPolicy;
use crate::device::RadioDevice;
use crate::error::{RemError, RemResult};
use crate::session::PropagationSession;
use crate::spectrum::SpectrumValue;
use log::trace;

/// Which transmitter is the useful one at a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingSelection {
    /// Every transmitter is tried as the useful one; the best value wins.
    BestServer,
    /// Always the transmitter at this index; all others interfere.
    Fixed(usize),
}

impl From<Option<usize>> for ServingSelection {
    fn from(index: Option<usize>) -> Self {
        index.map_or(ServingSelection::BestServer, ServingSelection::Fixed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinrSample {
    pub snr_db: f64,
    pub sinr_db: f64,
}

impl SinrSample {
    pub fn snr_linear(&self) -> f64 {
        10f64.powf(self.snr_db / 10.0)
    }

    pub fn sinr_linear(&self) -> f64 {
        10f64.powf(self.sinr_db / 10.0)
    }
}

/// Linear power ratio to dB. Zero, negative and non-finite ratios have no
/// dB value and are reported as evaluation errors.
pub fn to_db(linear: f64) -> RemResult<f64> {
    if !linear.is_finite() || linear <= 0.0 {
        return Err(RemError::evaluation(format!("cannot convert {} to dB", linear)));
    }
    Ok(10.0 * linear.log10())
}

/// Best-block SNR and SINR of `useful` against `noise` plus the summed
/// `interferers`. Blocks with exactly zero useful power are skipped; negative
/// or non-finite PSD values and non-positive noise are errors.
pub fn reduce<'a, I>(useful: &SpectrumValue, interferers: I, noise: &SpectrumValue) -> RemResult<SinrSample>
where
    I: IntoIterator<Item = &'a SpectrumValue>,
{
    let num_bands = useful.len();
    if noise.len() != num_bands {
        return Err(RemError::evaluation(format!(
            "noise PSD has {} bands, useful PSD has {}",
            noise.len(),
            num_bands
        )));
    }
    check_psd("useful", useful)?;
    if let Some(n) = noise.values().iter().find(|n| !n.is_finite() || **n <= 0.0) {
        return Err(RemError::evaluation(format!("noise PSD must be positive and finite, got {}", n)));
    }
    let mut interference = vec![0.0; num_bands];
    for psd in interferers {
        if psd.len() != num_bands {
            return Err(RemError::evaluation(format!(
                "interferer PSD has {} bands, useful PSD has {}",
                psd.len(),
                num_bands
            )));
        }
        check_psd("interferer", psd)?;
        interference.iter_mut().zip(psd.values()).for_each(|(acc, v)| *acc += v);
    }

    let mut best: Option<(f64, f64)> = None;
    for ((u, n), i) in useful.values().iter().zip(noise.values()).zip(&interference) {
        if *u == 0.0 {
            continue; // Outside the useful allocation
        }
        let snr = u / n;
        let sinr = u / (n + i);
        best = Some(match best {
            Some((s, si)) => (s.max(snr), si.max(sinr)),
            None => (snr, sinr),
        });
    }
    let (snr, sinr) = best.ok_or_else(|| RemError::evaluation("useful signal carries no power on the receiver band"))?;
    Ok(SinrSample { snr_db: to_db(snr)?, sinr_db: to_db(sinr)? })
}

fn check_psd(role: &str, psd: &SpectrumValue) -> RemResult<()> {
    match psd.values().iter().position(|v| !v.is_finite() || *v < 0.0) {
        Some(band) => Err(RemError::evaluation(format!(
            "{} PSD has invalid value {} in band {}",
            role,
            psd.values()[band],
            band
        ))),
        None => Ok(()),
    }
}

/// Turns one session's channel realization into the sample value.
#[derive(Debug, Clone, Copy)]
pub struct SinrEvaluator {
    policy: BeamformingPolicy,
    serving: ServingSelection,
}

impl SinrEvaluator {
    pub fn new(policy: BeamformingPolicy, serving: ServingSelection) -> Self {
        SinrEvaluator { policy, serving }
    }

    /// PSD of every transmitter at the receiver. The receiver is oriented
    /// toward each transmitter before its contribution is evaluated.
    pub fn received_psds(
        &self,
        session: &mut PropagationSession,
        transmitters: &[RadioDevice],
        receiver: &mut RadioDevice,
    ) -> RemResult<Vec<SpectrumValue>> {
        transmitters.iter().map(|tx| self.received_psd(session, tx, receiver)).collect()
    }

    fn received_psd(
        &self,
        session: &mut PropagationSession,
        tx: &RadioDevice,
        receiver: &mut RadioDevice,
    ) -> RemResult<SpectrumValue> {
        self.policy.orient_receiver(receiver, tx);
        session.received_psd(tx, receiver)
    }

    /// SNR/SINR of one useful transmitter against the given interferers.
    pub fn evaluate(
        &self,
        session: &mut PropagationSession,
        useful: &RadioDevice,
        interferers: &[&RadioDevice],
        receiver: &mut RadioDevice,
        noise_psd: &SpectrumValue,
    ) -> RemResult<SinrSample> {
        let useful_psd = self.received_psd(session, useful, receiver)?;
        let interference = interferers
            .iter()
            .map(|tx| self.received_psd(session, tx, receiver))
            .collect::<RemResult<Vec<_>>>()?;
        reduce(&useful_psd, &interference, noise_psd)
    }

    /// Sample value at the receiver's current position, following the
    /// serving selection.
    pub fn evaluate_sample(
        &self,
        session: &mut PropagationSession,
        transmitters: &[RadioDevice],
        receiver: &mut RadioDevice,
        noise_psd: &SpectrumValue,
    ) -> RemResult<SinrSample> {
        match self.serving {
            ServingSelection::Fixed(idx) => {
                let useful = transmitters.get(idx).ok_or_else(|| {
                    RemError::config(format!("serving transmitter {} out of {}", idx, transmitters.len()))
                })?;
                let interferers: Vec<&RadioDevice> =
                    transmitters.iter().enumerate().filter(|(i, _)| *i != idx).map(|(_, tx)| tx).collect();
                self.evaluate(session, useful, &interferers, receiver, noise_psd)
            }
            ServingSelection::BestServer => self.best_server(session, transmitters, receiver, noise_psd),
        }
    }

    fn best_server(
        &self,
        session: &mut PropagationSession,
        transmitters: &[RadioDevice],
        receiver: &mut RadioDevice,
        noise_psd: &SpectrumValue,
    ) -> RemResult<SinrSample> {
        // Each contribution is independent of which transmitter is useful.
        let psds = self.received_psds(session, transmitters, receiver)?;

        let mut best: Option<SinrSample> = None;
        for (idx, tx) in transmitters.iter().enumerate() {
            if psds[idx].is_silent() {
                trace!("Transmitter '{}' has no power on the receiver band", tx.name);
                continue;
            }
            let interferers = psds.iter().enumerate().filter(|(i, _)| *i != idx).map(|(_, p)| p);
            let sample = reduce(&psds[idx], interferers, noise_psd)?;
            best = Some(match best {
                Some(b) => SinrSample { snr_db: b.snr_db.max(sample.snr_db), sinr_db: b.sinr_db.max(sample.sinr_db) },
                None => sample,
            });
        }
        best.ok_or_else(|| RemError::evaluation("no transmitter overlaps the receiver band"))
    }
}
