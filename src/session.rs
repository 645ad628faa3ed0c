use crate::device::RadioDevice;
use crate::error::RemResult;
use crate::propagation::{ChannelConditionModel, FastFadingModel, Link, ModelFactory, PathlossModel};
use crate::spectrum::{db_to_linear, SpectrumValue};
use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rem_common::Angles;

/// Private propagation models for exactly one sample (one point, one
/// iteration). Dropping the session releases the models.
pub struct PropagationSession {
    seed: u64,
    pathloss: Box<dyn PathlossModel>,
    channel_condition: Box<dyn ChannelConditionModel>,
    fast_fading: Box<dyn FastFadingModel>,
}

impl PropagationSession {
    /// Builds fresh model instances. Each model draws from its own stream
    /// split from `seed`.
    pub fn open(factory: &dyn ModelFactory, seed: u64) -> RemResult<Self> {
        let mut root = StdRng::seed_from_u64(seed);
        let channel_condition = factory.create_channel_condition(StdRng::seed_from_u64(root.random()))?;
        let pathloss = factory.create_pathloss(StdRng::seed_from_u64(root.random()))?;
        let fast_fading = factory.create_fast_fading(StdRng::seed_from_u64(root.random()))?;
        trace!("Opened propagation session (seed {})", seed);
        Ok(PropagationSession { seed, pathloss, channel_condition, fast_fading })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// PSD received by `rx` from `tx` on the receiver's bands: transmit PSD,
    /// pathloss with shadowing, both antenna gains for the current beams and
    /// per-band fast fading.
    pub fn received_psd(&mut self, tx: &RadioDevice, rx: &RadioDevice) -> RemResult<SpectrumValue> {
        let mut psd = tx.transmit_psd_on(&rx.spectrum);
        if psd.is_silent() {
            return Ok(psd); // No spectral overlap
        }
        let link = Link::new(tx, rx);
        let condition = self.channel_condition.condition(&link);
        let loss_db = self.pathloss.loss_db(&link, condition)?;
        let tx_gain_db = tx.antenna.gain_db(Angles::between(tx.position, rx.position));
        let rx_gain_db = rx.antenna.gain_db(Angles::between(rx.position, tx.position));
        psd.scale(db_to_linear(tx_gain_db + rx_gain_db - loss_db));

        let gains = self.fast_fading.band_gains(&link, condition, psd.len())?;
        psd.scale_each(&gains)?;
        trace!(
            "Link {:?}: {:?}, loss {:.2} dB, gains tx {:.2} dB rx {:.2} dB",
            link.key(),
            condition,
            loss_db,
            tx_gain_db,
            rx_gain_db
        );
        Ok(psd)
    }

    /// Ends the session and releases its models.
    pub fn close(self) {}
}

impl Drop for PropagationSession {
    fn drop(&mut self) {
        trace!("Released propagation session (seed {})", self.seed);
    }
}

/// Runs `f` with a session that is released on every exit path.
pub fn with_session<T, F>(factory: &dyn ModelFactory, seed: u64, f: F) -> RemResult<T>
where
    F: FnOnce(&mut PropagationSession) -> RemResult<T>,
{
    let mut session = PropagationSession::open(factory, seed)?;
    let result = f(&mut session);
    session.close();
    result
}
