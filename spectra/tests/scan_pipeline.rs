//! End-to-end scans against synthetic Carajás imagery

use spectra::test_util::{
    carajas_scene, FailingGeocoder, StaticGeocoder, CARAJAS, OUTCROP, OUTCROP_RATIO,
};
use spectra::{
    GeoPoint, InMemoryArchive, MineralRegistry, ScanConfig, ScanError, ScanRequest, Scanner,
    SpectralBand,
};

const GOLD: &str = "Ouro (Nativo/Sufetos)";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn carajas_archive() -> InMemoryArchive {
    let (older, older_bands) = carajas_scene("S2B_MSIL2A_20240803", 3).cloud_cover(2.0).build();
    let (newer, newer_bands) = carajas_scene("S2A_MSIL2A_20240812", 12).cloud_cover(8.5).build();
    let (cloudy, cloudy_bands) = carajas_scene("S2A_MSIL2A_20240822", 22)
        .cloud_cover(64.0)
        .build();
    InMemoryArchive::new()
        .with_scene(older, older_bands)
        .with_scene(newer, newer_bands)
        .with_scene(cloudy, cloudy_bands)
}

#[test]
fn test_carajas_gold_scan() {
    init_logging();
    let registry = MineralRegistry::builtin();
    let geocoder = StaticGeocoder::carajas();
    let archive = carajas_archive();
    let scanner = Scanner::new(&registry, &geocoder, &archive, &ScanConfig::default()).unwrap();

    let report = scanner.run(&ScanRequest::new(CARAJAS, GOLD, 1.21)).unwrap();

    // Most recent scene under 20% cloud
    assert_eq!(report.scene.id, "S2A_MSIL2A_20240812");
    assert_eq!(report.presentation.capture_date, "12/08/2024");

    let (rows, cols) = OUTCROP;
    let outcrop_pixels = rows.len() * cols.len();
    assert_eq!(report.evaluation.detected_pixels(), outcrop_pixels);
    assert_eq!(report.presentation.target_count, outcrop_pixels);
    assert!(report.presentation.target_count <= 1500);

    let bounds = report.region.bounding_box();
    for (i, target) in report.evaluation.targets.iter().enumerate() {
        assert_eq!(target.rank, i + 1);
        assert!(target.intensity > 1.21);
        assert!((target.intensity - OUTCROP_RATIO).abs() < 1e-9);
        assert!(target.latitude >= bounds.south && target.latitude <= bounds.north);
        assert!(target.longitude >= bounds.west && target.longitude <= bounds.east);
    }

    let export = report.presentation.export.as_ref().expect("targets were found");
    assert_eq!(export.filename, "Relatorio_Geospectra.csv");
    let csv = export.as_str().unwrap();
    assert!(csv.starts_with("RK,INT,LAT,LON"));
    assert_eq!(csv.lines().count(), outcrop_pixels + 1);
}

#[test]
fn test_scan_is_idempotent() {
    let registry = MineralRegistry::builtin();
    let geocoder = StaticGeocoder::carajas();
    let archive = carajas_archive();
    let scanner = Scanner::new(&registry, &geocoder, &archive, &ScanConfig::default()).unwrap();
    let request = ScanRequest::new(CARAJAS, GOLD, 1.21);

    let first = scanner.run(&request).unwrap();
    let second = scanner.run(&request).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_empty_locality_contacts_nothing() {
    let registry = MineralRegistry::builtin();
    let geocoder = StaticGeocoder::carajas();
    let archive = carajas_archive();
    let scanner = Scanner::new(&registry, &geocoder, &archive, &ScanConfig::default()).unwrap();

    let err = scanner.run(&ScanRequest::new("", GOLD, 1.21)).unwrap_err();
    assert!(matches!(err, ScanError::LocationNotFound { .. }));
    assert_eq!(geocoder.calls(), 0);
    assert_eq!(archive.query_count(), 0);
}

#[test]
fn test_unknown_locality_never_queries_archive() {
    let registry = MineralRegistry::builtin();
    let geocoder = StaticGeocoder::carajas();
    let archive = carajas_archive();
    let scanner = Scanner::new(&registry, &geocoder, &archive, &ScanConfig::default()).unwrap();

    let err = scanner.run(&ScanRequest::new("Atlantis", GOLD, 1.21)).unwrap_err();
    assert!(matches!(err, ScanError::LocationNotFound { .. }));
    assert_eq!(archive.query_count(), 0);
}

#[test]
fn test_geocoder_outage() {
    let registry = MineralRegistry::builtin();
    let archive = carajas_archive();
    let scanner = Scanner::new(
        &registry,
        FailingGeocoder::server_error(503),
        &archive,
        &ScanConfig::default(),
    )
    .unwrap();

    let err = scanner.run(&ScanRequest::new(CARAJAS, GOLD, 1.21)).unwrap_err();
    assert!(matches!(err, ScanError::GeocodingUnavailable(_)));
    assert_eq!(archive.query_count(), 0);
}

#[test]
fn test_persistent_cloud_cover() {
    let (scene, bands) = carajas_scene("S2A_MSIL2A_20240105", 5).cloud_cover(100.0).build();
    let archive = InMemoryArchive::new().with_scene(scene, bands);
    let registry = MineralRegistry::builtin();
    let geocoder = StaticGeocoder::carajas();
    let scanner = Scanner::new(&registry, &geocoder, &archive, &ScanConfig::default()).unwrap();

    let err = scanner.run(&ScanRequest::new(CARAJAS, GOLD, 1.21)).unwrap_err();
    assert!(matches!(err, ScanError::NoSceneAvailable { .. }));
}

#[test]
fn test_max_sensitivity_finds_nothing() {
    let registry = MineralRegistry::builtin();
    let geocoder = StaticGeocoder::carajas();
    let archive = carajas_archive();
    let scanner = Scanner::new(&registry, &geocoder, &archive, &ScanConfig::default()).unwrap();

    let report = scanner.run(&ScanRequest::new(CARAJAS, GOLD, 4.0)).unwrap();
    assert_eq!(report.presentation.target_count, 0);
    assert!(report.evaluation.targets.is_empty());
    assert!(report.presentation.export.is_none());
}

#[test]
fn test_invalid_requests_fail_before_geocoding() {
    let registry = MineralRegistry::builtin();
    let geocoder = StaticGeocoder::carajas();
    let archive = carajas_archive();
    let scanner = Scanner::new(&registry, &geocoder, &archive, &ScanConfig::default()).unwrap();

    let err = scanner
        .run(&ScanRequest::new(CARAJAS, "Unobtainium", 1.21))
        .unwrap_err();
    assert!(matches!(err, ScanError::UnknownMineral { .. }));

    let err = scanner.run(&ScanRequest::new(CARAJAS, GOLD, 0.0)).unwrap_err();
    assert!(matches!(err, ScanError::InvalidSensitivity { .. }));

    assert_eq!(geocoder.calls(), 0);
}

#[test]
fn test_missing_band_is_reported() {
    let (scene, bands) = carajas_scene("S2A_MSIL2A_20240812", 12)
        .without_band(SpectralBand::B11)
        .build();
    let archive = InMemoryArchive::new().with_scene(scene, bands);
    let registry = MineralRegistry::builtin();
    let geocoder = StaticGeocoder::carajas();
    let scanner = Scanner::new(&registry, &geocoder, &archive, &ScanConfig::default()).unwrap();

    let err = scanner.run(&ScanRequest::new(CARAJAS, GOLD, 1.21)).unwrap_err();
    assert!(matches!(
        err,
        ScanError::BandUnavailable {
            band: SpectralBand::B11,
            ..
        }
    ));
}

#[test]
fn test_rendered_layers_match_region() {
    let registry = MineralRegistry::builtin();
    let geocoder = StaticGeocoder::carajas();
    let archive = carajas_archive();
    let scanner = Scanner::new(&registry, &geocoder, &archive, &ScanConfig::default()).unwrap();
    let report = scanner.run(&ScanRequest::new(CARAJAS, GOLD, 1.21)).unwrap();

    let composite = scanner.render_composite(&report).unwrap();
    let overlay = scanner.render_overlay(&report);
    let (rows, cols) = report.evaluation.intensity.dim();
    assert_eq!(composite.dimensions(), (cols as u32, rows as u32));
    assert_eq!(overlay.dimensions(), composite.dimensions());

    let opaque = overlay.pixels().filter(|p| p[3] == 255).count();
    assert_eq!(opaque, report.evaluation.detected_pixels());
}

#[test]
fn test_invalid_config_is_rejected() {
    let registry = MineralRegistry::builtin();
    let config = ScanConfig {
        max_samples: 0,
        ..Default::default()
    };
    let result = Scanner::new(
        &registry,
        StaticGeocoder::carajas(),
        InMemoryArchive::new(),
        &config,
    );
    assert!(matches!(result, Err(ScanError::Config(_))));
}

#[test]
fn test_bare_scene_targets_stay_inside_region() {
    let (scene, bands) = carajas_scene("S2A_MSIL2A_20240812", 12)
        .fill(SpectralBand::B11, 3000.0)
        .fill(SpectralBand::B8, 1200.0)
        .build();
    let archive = InMemoryArchive::new().with_scene(scene, bands);
    let registry = MineralRegistry::builtin();
    let geocoder = StaticGeocoder::carajas();
    let config = ScanConfig {
        max_samples: 100_000,
        ..Default::default()
    };
    let scanner = Scanner::new(&registry, &geocoder, &archive, &config).unwrap();

    let report = scanner.run(&ScanRequest::new(CARAJAS, GOLD, 1.21)).unwrap();
    assert!(report.evaluation.has_targets());
    assert_eq!(
        report.evaluation.target_count(),
        report.evaluation.detected_pixels()
    );

    let bounds = report.region.bounding_box();
    let outside = report
        .evaluation
        .targets
        .iter()
        .filter(|t| !bounds.contains(&GeoPoint::new(t.latitude, t.longitude).unwrap()))
        .count();
    assert_eq!(outside, 0);
}

#[test]
fn test_mixed_resolution_scene_scans_like_native() {
    let registry = MineralRegistry::builtin();
    let geocoder = StaticGeocoder::carajas();

    let (scene, bands) = carajas_scene("S2A_MSIL2A_20240812", 12)
        .coarsen(SpectralBand::B11, (200, 200))
        .coarsen(SpectralBand::B12, (200, 200))
        .build();
    let mixed = InMemoryArchive::new().with_scene(scene, bands);
    let scanner = Scanner::new(&registry, &geocoder, &mixed, &ScanConfig::default()).unwrap();
    let report = scanner.run(&ScanRequest::new(CARAJAS, GOLD, 1.21)).unwrap();

    let (rows, cols) = OUTCROP;
    assert_eq!(report.presentation.target_count, rows.len() * cols.len());

    let composite = scanner.render_composite(&report).unwrap();
    let (rows, cols) = report.evaluation.intensity.dim();
    assert_eq!(composite.dimensions(), (cols as u32, rows as u32));
}

#[test]
fn test_composite_band_on_odd_grid_is_rejected() {
    let (scene, bands) = carajas_scene("S2A_MSIL2A_20240812", 12)
        .coarsen(SpectralBand::B12, (150, 150))
        .build();
    let archive = InMemoryArchive::new().with_scene(scene, bands);
    let registry = MineralRegistry::builtin();
    let geocoder = StaticGeocoder::carajas();
    let scanner = Scanner::new(&registry, &geocoder, &archive, &ScanConfig::default()).unwrap();

    // Gold reads B11 and B2 only, so the scan itself succeeds
    let report = scanner.run(&ScanRequest::new(CARAJAS, GOLD, 1.21)).unwrap();
    let err = scanner.render_composite(&report).unwrap_err();
    assert!(matches!(
        err,
        ScanError::BandShapeMismatch {
            band: SpectralBand::B12,
            ..
        }
    ));
}
