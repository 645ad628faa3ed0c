use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Exp1;
use rem_common::{Angles, BandwidthPartConfig, GridSpec, RemConfig, RemPoint, Vec3};
use rem_engine::antenna::{AntennaArray, Beam, ElementPattern};
use rem_engine::propagation::free_space_loss_db;
use rem_engine::{
    BeamformingPolicy, ChannelCondition, ChannelConditionModel, ConfiguredModelFactory, EngineSettings,
    EngineState, FastFadingModel, Link, ModelFactory, PathlossModel, RadioDevice, RemEngine, RemError, RemResult,
    Scene, ServingSelection,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Stub models
// ============================================================================

/// Free-space loss, always LOS, optional random block gain with mean `mean_gain`.
struct StubFactory {
    mean_gain: Option<f64>,
    opened: AtomicUsize,
    fail: bool,
}

impl StubFactory {
    fn free_space() -> Self {
        StubFactory { mean_gain: None, opened: AtomicUsize::new(0), fail: false }
    }

    fn with_random_gain(mean_gain: f64) -> Self {
        StubFactory { mean_gain: Some(mean_gain), ..StubFactory::free_space() }
    }

    fn failing() -> Self {
        StubFactory { fail: true, ..StubFactory::free_space() }
    }
}

struct FreeSpace;

impl PathlossModel for FreeSpace {
    fn loss_db(&mut self, link: &Link<'_>, _condition: ChannelCondition) -> RemResult<f64> {
        Ok(free_space_loss_db(link.distance_3d().max(1.0), link.frequency_hz()))
    }
}

struct AlwaysLos;

impl ChannelConditionModel for AlwaysLos {
    fn condition(&mut self, _link: &Link<'_>) -> ChannelCondition {
        ChannelCondition::Los
    }
}

/// One exponential draw per link, scaled to `mean`, applied to every band.
struct BlockGain {
    mean: Option<f64>,
    rng: StdRng,
}

impl FastFadingModel for BlockGain {
    fn band_gains(&mut self, _link: &Link<'_>, _condition: ChannelCondition, num_bands: usize) -> RemResult<Vec<f64>> {
        let gain = match self.mean {
            Some(mean) => mean * self.rng.sample::<f64, _>(Exp1),
            None => 1.0,
        };
        Ok(vec![gain; num_bands])
    }
}

impl ModelFactory for StubFactory {
    fn create_pathloss(&self, _rng: StdRng) -> RemResult<Box<dyn PathlossModel>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RemError::model("pathloss", "stub refuses to build"));
        }
        Ok(Box::new(FreeSpace))
    }

    fn create_channel_condition(&self, _rng: StdRng) -> RemResult<Box<dyn ChannelConditionModel>> {
        Ok(Box::new(AlwaysLos))
    }

    fn create_fast_fading(&self, rng: StdRng) -> RemResult<Box<dyn FastFadingModel>> {
        Ok(Box::new(BlockGain { mean: self.mean_gain, rng }))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn bwp() -> BandwidthPartConfig {
    BandwidthPartConfig { central_frequency_hz: 2.0e9, bandwidth_hz: 10e6, numerology: 0 }
}

fn nine_point_grid() -> GridSpec {
    GridSpec { x_min: -100.0, x_max: 100.0, x_res: 2, y_min: -100.0, y_max: 100.0, y_res: 2, z: 1.5 }
}

fn single_tx_scene(antenna: AntennaArray) -> Scene {
    let tx = RadioDevice::new(0, "gnb", Vec3::new(0.0, 0.0, 10.0), &bwp(), 43.0).unwrap().with_antenna(antenna);
    let rx = RadioDevice::new(1, "rrd", Vec3::zero(), &bwp(), 0.0).unwrap();
    Scene::new(vec![tx], rx, 5.0).unwrap()
}

fn run(settings: EngineSettings) -> Vec<RemPoint> {
    let mut engine = RemEngine::new();
    engine.configure(settings).unwrap();
    engine.run().unwrap();
    engine.into_points().unwrap()
}

fn shadowed_factory() -> Arc<ConfiguredModelFactory> {
    let config = RemConfig::from_toml_str(
        r#"
        [grid]
        x_min = 0.0
        x_max = 1.0
        x_res = 1
        y_min = 0.0
        y_max = 1.0
        y_res = 1

        [propagation]
        shadowing_std_los_db = 4.0
        shadowing_std_nlos_db = 8.0
        nlos_excess_loss_db = 15.0
        pathloss = { type = "log_distance", exponent = 3.0 }
        channel_condition = { type = "distance_based", los_distance_m = 18.0, decay_distance_m = 63.0 }
        fast_fading = { type = "rayleigh" }

        [[bandwidth_parts]]
        central_frequency_hz = 2.0e9
        bandwidth_hz = 10e6

        [[transmitters]]
        name = "unused"
        position = [0.0, 0.0, 0.0]
        tx_power_dbm = 0.0

        [output]
        base_filename = "unused"
        "#,
    )
    .unwrap();
    Arc::new(ConfiguredModelFactory::from_config(&config.propagation))
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn nine_points_nearest_has_highest_snr() {
    let settings = EngineSettings::new(
        single_tx_scene(AntennaArray::isotropic()),
        nine_point_grid(),
        Arc::new(StubFactory::free_space()),
    );
    let points = run(settings);
    assert_eq!(points.len(), 9);

    let (best_idx, _) = points
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.avg_snr_db.total_cmp(&b.1.avg_snr_db))
        .unwrap();
    assert_eq!(points[best_idx].pos, Vec3::new(0.0, 0.0, 1.5));
    // Single transmitter: nothing interferes
    for p in &points {
        assert!((p.avg_snr_db - p.avg_sinr_db).abs() < 1e-9);
    }
    // Symmetric corners see the same value
    assert!((points[0].avg_snr_db - points[8].avg_snr_db).abs() < 1e-9);
}

#[test]
fn unit_resolution_samples_the_corners() {
    let mut grid = nine_point_grid();
    grid.x_res = 1;
    grid.y_res = 1;
    let settings = EngineSettings::new(
        single_tx_scene(AntennaArray::isotropic()),
        grid,
        Arc::new(StubFactory::free_space()),
    );
    let points = run(settings);
    assert_eq!(points.len(), 4);
    assert_eq!(points[0].pos, Vec3::new(-100.0, -100.0, 1.5));
    assert_eq!(points[3].pos, Vec3::new(100.0, 100.0, 1.5));
}

#[test]
fn coverage_area_dominates_fixed_beam_shape() {
    // Beam fixed toward +y; sample points at -y are far off the main lobe.
    let mut antenna =
        AntennaArray::new(8, 8, ElementPattern::ThreeGpp).with_orientation(std::f64::consts::FRAC_PI_2, 0.0);
    antenna.set_beam(Beam::Steered(Angles::from_degrees(90.0, 95.0)));

    let factory: Arc<dyn ModelFactory> = Arc::new(StubFactory::free_space());
    let shape = EngineSettings::new(single_tx_scene(antenna.clone()), nine_point_grid(), factory.clone());
    let mut coverage = EngineSettings::new(single_tx_scene(antenna), nine_point_grid(), factory);
    coverage.policy = BeamformingPolicy::CoverageArea;

    let shape = run(shape);
    let coverage = run(coverage);
    for (s, c) in shape.iter().zip(&coverage) {
        assert_eq!(s.pos, c.pos);
        assert!(c.avg_snr_db >= s.avg_snr_db - 1e-9, "{:?} vs {:?}", c, s);
    }
    // (100, -100): behind the fixed beam
    let off_lobe = 2 * 3;
    assert_eq!(shape[off_lobe].pos, Vec3::new(100.0, -100.0, 1.5));
    assert!(coverage[off_lobe].avg_snr_db > shape[off_lobe].avg_snr_db + 3.0);
}

#[test]
fn interference_lowers_sinr() {
    let tx0 = RadioDevice::new(0, "serving", Vec3::new(-50.0, 0.0, 10.0), &bwp(), 43.0).unwrap();
    let tx1 = RadioDevice::new(1, "interferer", Vec3::new(50.0, 0.0, 10.0), &bwp(), 43.0).unwrap();
    let rx = RadioDevice::new(2, "rrd", Vec3::zero(), &bwp(), 0.0).unwrap();
    let factory: Arc<dyn ModelFactory> = Arc::new(StubFactory::free_space());

    let mut alone = EngineSettings::new(
        Scene::new(vec![tx0.clone()], rx.clone(), 5.0).unwrap(),
        nine_point_grid(),
        factory.clone(),
    );
    alone.serving = ServingSelection::Fixed(0);
    let mut shared = EngineSettings::new(Scene::new(vec![tx0, tx1], rx, 5.0).unwrap(), nine_point_grid(), factory);
    shared.serving = ServingSelection::Fixed(0);

    let alone = run(alone);
    let shared = run(shared);
    for (a, s) in alone.iter().zip(&shared) {
        assert!((a.avg_snr_db - s.avg_snr_db).abs() < 1e-9);
        assert!(s.avg_sinr_db < a.avg_sinr_db);
        assert!(s.avg_sinr_db <= s.avg_snr_db);
    }
}

#[test]
fn identical_inputs_give_identical_maps() {
    let factory = shadowed_factory();
    let make = |parallel: bool| {
        let mut settings = EngineSettings::new(
            single_tx_scene(AntennaArray::new(2, 2, ElementPattern::ThreeGpp)),
            nine_point_grid(),
            factory.clone(),
        );
        settings.iterations = 5;
        settings.seed = 1234;
        settings.parallel = parallel;
        settings.policy = BeamformingPolicy::CoverageArea;
        settings
    };
    let first = run(make(false));
    let second = run(make(false));
    let parallel = run(make(true));
    assert_eq!(first, second);
    assert_eq!(first, parallel);

    let mut other_seed = make(false);
    other_seed.seed = 99;
    assert_ne!(run(other_seed), first);
}

#[test]
fn averaging_converges_to_mean_gain() {
    let reference = run(EngineSettings::new(
        single_tx_scene(AntennaArray::isotropic()),
        nine_point_grid(),
        Arc::new(StubFactory::free_space()),
    ));

    let mean_gain = 2.5;
    let mut settings = EngineSettings::new(
        single_tx_scene(AntennaArray::isotropic()),
        nine_point_grid(),
        Arc::new(StubFactory::with_random_gain(mean_gain)),
    );
    settings.iterations = 20_000;
    settings.parallel = true;
    let averaged = run(settings);

    for (r, a) in reference.iter().zip(&averaged) {
        let ratio = 10f64.powf((a.avg_snr_db - r.avg_snr_db) / 10.0);
        assert!((ratio / mean_gain - 1.0).abs() < 0.05, "ratio {} at {:?}", ratio, a.pos);
    }
}

#[test]
fn configuration_errors_surface_before_sampling() {
    let factory = Arc::new(StubFactory::free_space());
    let mut engine = RemEngine::new();

    let mut settings = EngineSettings::new(single_tx_scene(AntennaArray::isotropic()), nine_point_grid(), factory.clone());
    settings.iterations = 0;
    let err = engine.configure(settings).unwrap_err();
    assert!(err.is_configuration_error());

    let mut grid = nine_point_grid();
    grid.y_max = grid.y_min;
    let settings = EngineSettings::new(single_tx_scene(AntennaArray::isotropic()), grid, factory.clone());
    assert!(matches!(engine.configure(settings), Err(RemError::InvalidGridSpec { .. })));

    assert_eq!(factory.opened.load(Ordering::SeqCst), 0);
    assert_eq!(engine.state(), EngineState::Idle);
}

#[test]
fn model_failure_aborts_without_partial_map() {
    let factory = Arc::new(StubFactory::failing());
    let mut engine = RemEngine::new();
    engine
        .configure(EngineSettings::new(single_tx_scene(AntennaArray::isotropic()), nine_point_grid(), factory))
        .unwrap();
    let err = engine.run().unwrap_err();
    assert!(matches!(err, RemError::ModelInstantiation { model: "pathloss", .. }));
    assert_eq!(engine.state(), EngineState::Idle);
    assert!(matches!(engine.points(), Err(RemError::InvalidState { .. })));
}

#[test]
fn map_from_configuration_text() {
    let config = RemConfig::from_toml_str(
        r#"
        [grid]
        x_min = -100.0
        x_max = 100.0
        x_res = 2
        y_min = -100.0
        y_max = 100.0
        y_res = 2

        [rem]
        mode = "coverage_area"
        iterations = 3
        seed = 7

        [propagation]
        shadowing_std_los_db = 3.0
        fast_fading = { type = "rician", k_factor_db = 6.0 }

        [[bandwidth_parts]]
        central_frequency_hz = 3.5e9
        bandwidth_hz = 20e6
        numerology = 1

        [[transmitters]]
        name = "a"
        position = [0.0, 0.0, 25.0]
        tx_power_dbm = 43.0
        antenna = { rows = 4, columns = 4, element = "three_gpp", beam = { type = "toward", target = [0.0, 50.0, 1.5] } }

        [[transmitters]]
        name = "b"
        position = [300.0, 0.0, 25.0]
        tx_power_dbm = 43.0

        [output]
        base_filename = "rem"
        "#,
    )
    .unwrap();
    let settings = EngineSettings::from_config(&config).unwrap();
    assert_eq!(settings.policy, BeamformingPolicy::CoverageArea);
    assert_eq!(settings.serving, ServingSelection::BestServer);
    assert_eq!(settings.scene.transmitters.len(), 2);

    let points = run(settings);
    assert_eq!(points.len(), 9);
    for p in &points {
        assert!(p.avg_snr_db.is_finite() && p.avg_sinr_db.is_finite());
        assert!(p.avg_sinr_db <= p.avg_snr_db + 1e-9);
    }
}
