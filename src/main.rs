use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::Builder;
use log::{debug, info, LevelFilter};
use rem_common::{OutputFormat, RemConfig, RemMode, RemPoint};
use rem_engine::{EngineSettings, RadioDevice, RemEngine};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

/// Command-line arguments for the REM generator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the scenario configuration
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override `output.format`
    #[arg(long, value_enum)]
    output_format: Option<FormatArg>,

    /// Override `rem.iterations`
    #[arg(long)]
    iterations: Option<u16>,

    /// Override `rem.mode`
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Override `rem.seed`
    #[arg(long)]
    seed: Option<u64>,

    /// Sample grid points on all Rayon threads
    #[arg(long)]
    parallel: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Csv,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    BeamShape,
    CoverageArea,
}

/// One output row.
#[derive(Serialize)]
struct RemRow {
    x: f64,
    y: f64,
    z: f64,
    snr_db: f64,
    sinr_db: f64,
}

impl From<&RemPoint> for RemRow {
    fn from(p: &RemPoint) -> Self {
        RemRow { x: p.pos.x, y: p.pos.y, z: p.pos.z, snr_db: p.avg_snr_db, sinr_db: p.avg_sinr_db }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Info by default, RUST_LOG takes precedence
    Builder::new()
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("Starting REM generator...");

    // --- Load Configuration ---
    let mut config = RemConfig::load(&args.config)?;
    apply_overrides(&mut config, &args);
    info!("Loaded scenario from {}", args.config.display());
    let bwp = config.bandwidth_part();
    info!(
        "Bandwidth part {}: {:.3} GHz, {:.1} MHz, numerology {}",
        config.rem.bwp_id,
        bwp.central_frequency_hz / 1e9,
        bwp.bandwidth_hz / 1e6,
        bwp.numerology
    );
    debug!("Configuration: {:#?}", config);

    // --- Build and run the engine ---
    let settings = EngineSettings::from_config(&config).context("Failed to build the REM scene")?;
    let transmitters = settings.scene.transmitters.clone();
    let mut engine = RemEngine::new();
    engine.configure(settings)?;

    let start_time = Instant::now();
    engine.run()?;
    info!("Map generated in {:.3} seconds.", start_time.elapsed().as_secs_f64());

    // --- Save Results ---
    let points = engine.into_points()?;
    let base = &config.output.base_filename;
    match config.output.format {
        OutputFormat::Csv => write_csv(&format!("{}_rem.csv", base), &points)?,
        OutputFormat::Json => write_json(&format!("{}_rem.json", base), &points)?,
    }
    if config.output.save_transmitters {
        write_transmitters(&format!("{}_transmitters.csv", base), &transmitters)?;
    } else {
        info!("Skipping transmitter list as per config.");
    }

    info!("REM Complete.");
    Ok(())
}

fn apply_overrides(config: &mut RemConfig, args: &Args) {
    if let Some(format) = args.output_format {
        config.output.format = match format {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
        };
    }
    if let Some(iterations) = args.iterations {
        config.rem.iterations = iterations;
    }
    if let Some(mode) = args.mode {
        config.rem.mode = match mode {
            ModeArg::BeamShape => RemMode::BeamShape,
            ModeArg::CoverageArea => RemMode::CoverageArea,
        };
    }
    if let Some(seed) = args.seed {
        config.rem.seed = seed;
    }
    if args.parallel {
        config.rem.parallel = true;
    }
}

fn write_csv(filename: &str, points: &[RemPoint]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(filename).with_context(|| format!("Failed to create '{}'", filename))?;
    for point in points {
        writer.serialize(RemRow::from(point))?;
    }
    writer.flush()?;
    info!("{} REM points saved to {}", points.len(), filename);
    Ok(())
}

fn write_json(filename: &str, points: &[RemPoint]) -> Result<()> {
    let file = File::create(filename).with_context(|| format!("Failed to create '{}'", filename))?;
    let rows: Vec<RemRow> = points.iter().map(RemRow::from).collect();
    serde_json::to_writer(BufWriter::new(file), &rows)
        .with_context(|| format!("Failed to serialize REM points to '{}'", filename))?;
    info!("{} REM points saved to {}", points.len(), filename);
    Ok(())
}

fn write_transmitters(filename: &str, transmitters: &[RadioDevice]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(filename).with_context(|| format!("Failed to create '{}'", filename))?;
    writer.write_record(["name", "x", "y", "z", "tx_power_dbm"])?;
    for tx in transmitters {
        writer.write_record(&[
            tx.name.clone(),
            format!("{:.2}", tx.position.x),
            format!("{:.2}", tx.position.y),
            format!("{:.2}", tx.position.z),
            format!("{:.1}", tx.tx_power_dbm),
        ])?;
    }
    writer.flush()?;
    info!("Transmitter positions saved to {}", filename);
    Ok(())
}
