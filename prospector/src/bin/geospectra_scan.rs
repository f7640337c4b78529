//! Scan a locality for candidate mineral targets
//!
//! Resolves the locality, picks the most recent clear scene from an imagery
//! archive directory, applies the mineral's band ratio with vegetation
//! excluded, and writes the ranked targets plus map layers to an output
//! directory.
//!
//! Usage:
//!   geospectra_scan --archive ./archive --locality "Canaã dos Carajás, PA" \
//!       --mineral "Ouro (Nativo/Sufetos)" --sensitivity 1.21
//!   geospectra_scan --list-minerals

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use prospector::shared_args::{parse_sensitivity, ConfigArgs};
use prospector::{DirectoryArchive, NominatimGeocoder};
use spectra::{ConfigStorage, MineralRegistry, ScanConfig, ScanReport, ScanRequest, Scanner};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "geospectra_scan",
    about = "Band-ratio mineral target detection on Sentinel-2 imagery",
    long_about = None
)]
struct Args {
    /// Locality to scan (city, region, address)
    #[arg(long)]
    locality: Option<String>,

    /// Mineral name; defaults to the first registry entry
    #[arg(long)]
    mineral: Option<String>,

    /// Ratio threshold in [0.01, 4.0].
    ///
    /// When omitted, the mineral's own default threshold from the registry is
    /// used rather than one shared value for every mineral.
    #[arg(long, value_parser = parse_sensitivity)]
    sensitivity: Option<f64>,

    /// Imagery archive directory containing catalog.json
    #[arg(long, default_value = "archive")]
    archive: PathBuf,

    /// Directory for the CSV report and map layers
    #[arg(long, default_value = "geospectra_output")]
    output_dir: PathBuf,

    #[command(flatten)]
    settings: ConfigArgs,

    /// Print the mineral table and exit
    #[arg(long)]
    list_minerals: bool,
}

fn load_config(args: &ConfigArgs, storage: &ConfigStorage) -> Result<ScanConfig> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::load_from_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => match storage.get_scan_config() {
            Some(Ok(config)) => {
                info!("Using stored config in {}", storage.root_path().display());
                config
            }
            Some(Err(e)) => {
                warn!("Ignoring unreadable stored config: {e}");
                ScanConfig::default()
            }
            None => ScanConfig::default(),
        },
    };

    if let Some(seed) = args.seed {
        config.sampling_seed = seed;
    }
    if let Some(timeout) = args.timeout {
        config.geocoder.timeout_ms = timeout.0.as_millis() as u64;
    }
    config.validate()?;
    Ok(config)
}

fn load_registry(storage: &ConfigStorage) -> MineralRegistry {
    match storage.get_minerals() {
        Some(Ok(registry)) => {
            info!("Using stored mineral table ({} entries)", registry.len());
            registry
        }
        Some(Err(e)) => {
            warn!("Ignoring invalid stored mineral table: {e}");
            MineralRegistry::builtin()
        }
        None => MineralRegistry::builtin(),
    }
}

fn print_minerals(registry: &MineralRegistry) {
    println!("{:<28} {:>5} {:>5} {:>9}", "Mineral", "Num", "Den", "Threshold");
    for signature in registry.iter() {
        println!(
            "{:<28} {:>5} {:>5} {:>9.2}",
            signature.name, signature.numerator, signature.denominator, signature.default_threshold
        );
    }
}

fn print_summary(report: &ScanReport) {
    let presentation = &report.presentation;
    println!("Mineral:      {}", presentation.mineral);
    println!("Center:       {}", report.region.center);
    println!(
        "Scene:        {} ({}, {:.1}% cloud)",
        presentation.scene_id, presentation.capture_date, presentation.cloud_cover_percent
    );
    println!("Sensitivity:  {:.2}", report.evaluation.sensitivity);
    println!("Detected px:  {}", report.evaluation.detected_pixels());
    println!("Targets:      {}", presentation.target_count);

    if report.evaluation.has_targets() {
        println!();
        println!("{:>5} {:>8} {:>11} {:>11}", "RK", "INT", "LAT", "LON");
        for target in report.evaluation.targets.iter().take(10) {
            println!(
                "{:>5} {:>8.3} {:>11.5} {:>11.5}",
                target.rank, target.intensity, target.latitude, target.longitude
            );
        }
        if report.evaluation.target_count() > 10 {
            println!("  ... {} more", report.evaluation.target_count() - 10);
        }
    }
}

fn write_outputs(
    scanner: &Scanner<'_, NominatimGeocoder, DirectoryArchive>,
    report: &ScanReport,
    output_dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    if let Some(export) = &report.presentation.export {
        let path = output_dir.join(&export.filename);
        std::fs::write(&path, &export.bytes)?;
        println!("Report:       {}", path.display());
    }

    let layers_path = output_dir.join("layers.json");
    std::fs::write(&layers_path, report.presentation.layers_json()?)?;

    match scanner.render_composite(report) {
        Ok(img) => img.save(output_dir.join("satellite.png"))?,
        Err(e) => warn!("Satellite composite skipped: {}", e.user_message()),
    }
    scanner
        .render_overlay(report)
        .save(output_dir.join("detection.png"))?;

    info!("Layers written to {}", output_dir.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let storage = ConfigStorage::default();
    let config = load_config(&args.settings, &storage)?;
    let registry = load_registry(&storage);

    if args.list_minerals {
        print_minerals(&registry);
        return Ok(());
    }

    let Some(locality) = args.locality.clone() else {
        bail!("--locality is required unless --list-minerals is given");
    };
    let mineral = match &args.mineral {
        Some(name) => name.clone(),
        None => registry
            .list_all()
            .first()
            .map(|name| name.to_string())
            .context("Mineral table is empty")?,
    };
    let sensitivity = match args.sensitivity {
        Some(value) => value,
        None => match registry.lookup(&mineral) {
            Ok(signature) => signature.default_threshold,
            Err(e) => {
                eprintln!("{}", e.user_message());
                std::process::exit(1);
            }
        },
    };

    let archive = DirectoryArchive::open(&args.archive)
        .with_context(|| format!("Failed to open archive {}", args.archive.display()))?;
    let geocoder = NominatimGeocoder::from_config(&config.geocoder);
    let scanner = Scanner::new(&registry, geocoder, archive, &config)?;

    let request = ScanRequest::new(locality, mineral, sensitivity);
    let report = match scanner.run(&request) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    };

    print_summary(&report);
    write_outputs(&scanner, &report, &args.output_dir)?;
    Ok(())
}
