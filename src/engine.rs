use crate::beamforming::BeamformingPolicy;
use crate::device::Scene;
use crate::error::{RemError, RemResult};
use crate::grid::GridSampler;
use crate::propagation::{ConfiguredModelFactory, ModelFactory};
use crate::session::with_session;
use crate::sinr::{to_db, ServingSelection, SinrEvaluator, SinrSample};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressIterator, ProgressStyle};
use log::{debug, error, info, trace};
use rayon::prelude::*;
use rem_common::{GridSpec, RemConfig, RemPoint};
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle of one map computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Configuring,
    Sampling,
    Averaging,
    Done,
}

/// Everything a run is bound to.
#[derive(Clone)]
pub struct EngineSettings {
    pub scene: Scene,
    pub grid: GridSpec,
    pub policy: BeamformingPolicy,
    pub serving: ServingSelection,
    /// Independent channel realizations per point.
    pub iterations: u16,
    pub factory: Arc<dyn ModelFactory>,
    pub seed: u64,
    pub parallel: bool,
    pub show_progress: bool,
}

impl EngineSettings {
    /// Single-iteration BeamShape run with best-server selection.
    pub fn new(scene: Scene, grid: GridSpec, factory: Arc<dyn ModelFactory>) -> Self {
        EngineSettings {
            scene,
            grid,
            policy: BeamformingPolicy::BeamShape,
            serving: ServingSelection::BestServer,
            iterations: 1,
            factory,
            seed: 1,
            parallel: false,
            show_progress: false,
        }
    }

    /// Scene, grid and models described by a loaded configuration.
    pub fn from_config(config: &RemConfig) -> RemResult<Self> {
        let scene = Scene::from_config(config)?;
        let factory: Arc<dyn ModelFactory> = Arc::new(ConfiguredModelFactory::from_config(&config.propagation));
        Ok(EngineSettings {
            scene,
            grid: config.get_grid_spec(),
            policy: config.rem.mode.into(),
            serving: config.rem.serving_transmitter.into(),
            iterations: config.rem.iterations,
            factory,
            seed: config.rem.seed,
            parallel: config.rem.parallel,
            show_progress: config.rem.show_progress,
        })
    }

    fn validate(&self) -> RemResult<GridSampler> {
        if self.iterations == 0 {
            return Err(RemError::config("number of iterations must be at least 1"));
        }
        if self.scene.transmitters.is_empty() {
            return Err(RemError::config("no transmitters to evaluate"));
        }
        if let ServingSelection::Fixed(idx) = self.serving {
            if idx >= self.scene.transmitters.len() {
                return Err(RemError::config(format!(
                    "serving transmitter {} out of range ({} transmitters)",
                    idx,
                    self.scene.transmitters.len()
                )));
            }
        }
        if self.scene.noise_psd.len() != self.scene.receiver.spectrum.num_bands() {
            return Err(RemError::config("noise PSD does not match the receiver spectrum"));
        }
        GridSampler::new(self.grid)
    }
}

/// Seed of the session for one (point, iteration) sample. Unique per sample
/// and independent of how points are scheduled.
pub fn sample_seed(run_seed: u64, point_idx: usize, iteration: u16, iterations: u16) -> u64 {
    let offset = (point_idx as u64)
        .wrapping_mul(iterations as u64)
        .wrapping_add(iteration as u64);
    run_seed.wrapping_add(offset)
}

/// Linear SNR/SINR sums of one point.
#[derive(Debug, Clone, Copy, Default)]
struct LinearAccumulator {
    snr: f64,
    sinr: f64,
    count: u32,
}

impl LinearAccumulator {
    fn add(&mut self, sample: SinrSample) {
        self.snr += sample.snr_linear();
        self.sinr += sample.sinr_linear();
        self.count += 1;
    }

    fn write_into(&self, point: &mut RemPoint) -> RemResult<()> {
        if self.count == 0 {
            return Err(RemError::evaluation("point has no samples to average"));
        }
        let n = self.count as f64;
        point.avg_snr_db = to_db(self.snr / n)?;
        point.avg_sinr_db = to_db(self.sinr / n)?;
        Ok(())
    }
}

/// Computes the radio environment map over a grid.
pub struct RemEngine {
    state: EngineState,
    settings: Option<EngineSettings>,
    sampler: Option<GridSampler>,
    points: Vec<RemPoint>,
}

impl RemEngine {
    pub fn new() -> Self {
        RemEngine { state: EngineState::Idle, settings: None, sampler: None, points: Vec::new() }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    fn expect_state(&self, expected: EngineState) -> RemResult<()> {
        if self.state != expected {
            return Err(RemError::InvalidState { expected, actual: self.state });
        }
        Ok(())
    }

    /// Binds the run settings. Every configuration error is reported here,
    /// before any point is sampled; on error the engine stays idle.
    pub fn configure(&mut self, settings: EngineSettings) -> RemResult<()> {
        self.expect_state(EngineState::Idle)?;
        let sampler = settings.validate()?;
        info!(
            "REM configured: {} points ({}x{}), {} transmitters, mode {:?}, serving {:?}, {} iterations",
            sampler.len(),
            sampler.spec().x_res as usize + 1,
            sampler.spec().y_res as usize + 1,
            settings.scene.transmitters.len(),
            settings.policy,
            settings.serving,
            settings.iterations
        );
        debug!("Grid: {:?}", sampler.spec());
        self.sampler = Some(sampler);
        self.settings = Some(settings);
        self.state = EngineState::Configuring;
        Ok(())
    }

    /// Samples every point and averages its iterations. Any error drops the
    /// partial map and returns the engine to idle.
    pub fn run(&mut self) -> RemResult<&[RemPoint]> {
        self.expect_state(EngineState::Configuring)?;
        match self.compute() {
            Ok(points) => {
                self.points = points;
                self.state = EngineState::Done;
                Ok(&self.points)
            }
            Err(e) => {
                error!("REM generation aborted: {}", e);
                self.reset();
                Err(e)
            }
        }
    }

    fn compute(&mut self) -> RemResult<Vec<RemPoint>> {
        let (settings, sampler) = match (&self.settings, &self.sampler) {
            (Some(settings), Some(sampler)) => (settings, sampler),
            _ => return Err(RemError::InvalidState { expected: EngineState::Configuring, actual: self.state }),
        };
        let start_time = Instant::now();
        let mut points: Vec<RemPoint> = sampler.points().collect();

        self.state = EngineState::Sampling;
        let progress = progress_bar(points.len(), settings.show_progress);
        let accumulators = if settings.parallel {
            info!("Sampling {} points on {} Rayon threads", points.len(), rayon::current_num_threads());
            points
                .par_iter()
                .enumerate()
                .progress_with(progress.clone())
                .map(|(idx, point)| sample_point(settings, idx, point))
                .collect::<RemResult<Vec<_>>>()?
        } else {
            info!("Sampling {} points", points.len());
            points
                .iter()
                .enumerate()
                .progress_with(progress.clone())
                .map(|(idx, point)| sample_point(settings, idx, point))
                .collect::<RemResult<Vec<_>>>()?
        };
        progress.finish_and_clear();

        self.state = EngineState::Averaging;
        for (point, acc) in points.iter_mut().zip(&accumulators) {
            acc.write_into(point)?;
        }

        info!(
            "REM finished: {} points x {} iterations in {:.3} s",
            points.len(),
            settings.iterations,
            start_time.elapsed().as_secs_f64()
        );
        Ok(points)
    }

    /// Ordered map of the last successful run.
    pub fn points(&self) -> RemResult<&[RemPoint]> {
        self.expect_state(EngineState::Done)?;
        Ok(&self.points)
    }

    pub fn into_points(self) -> RemResult<Vec<RemPoint>> {
        self.expect_state(EngineState::Done)?;
        Ok(self.points)
    }

    /// Drops settings and results; the engine can be configured again.
    pub fn reset(&mut self) {
        self.state = EngineState::Idle;
        self.settings = None;
        self.sampler = None;
        self.points.clear();
    }
}

impl Default for RemEngine {
    fn default() -> Self {
        RemEngine::new()
    }
}

/// All iterations of one point on private copies of the devices.
fn sample_point(settings: &EngineSettings, idx: usize, point: &RemPoint) -> RemResult<LinearAccumulator> {
    let mut transmitters = settings.scene.transmitters.clone();
    let mut receiver = settings.scene.receiver.clone();
    let evaluator = SinrEvaluator::new(settings.policy, settings.serving);
    let mut acc = LinearAccumulator::default();

    for iteration in 0..settings.iterations {
        settings.policy.apply(point.pos, &mut transmitters, &mut receiver);
        let seed = sample_seed(settings.seed, idx, iteration, settings.iterations);
        let sample = with_session(settings.factory.as_ref(), seed, |session| {
            evaluator.evaluate_sample(session, &transmitters, &mut receiver, &settings.scene.noise_psd)
        })?;
        trace!(
            "Point {} ({:.1}, {:.1}) iteration {}: SNR {:.2} dB, SINR {:.2} dB",
            idx,
            point.pos.x,
            point.pos.y,
            iteration,
            sample.snr_db,
            sample.sinr_db
        );
        acc.add(sample);
    }
    Ok(acc)
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} points ({percent}%) [{eta}]")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}
