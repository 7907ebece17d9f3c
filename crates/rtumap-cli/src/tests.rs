use super::*;

#[test]
fn parses_history_command() {
    let cli = Cli::try_parse_from(["rtumap", "history"]).expect("expected valid cli args");

    assert!(matches!(cli.command, Commands::History { locate: false }));
}

#[test]
fn parses_history_with_locate() {
    let cli =
        Cli::try_parse_from(["rtumap", "history", "--locate"]).expect("expected valid cli args");

    assert!(matches!(cli.command, Commands::History { locate: true }));
}

#[test]
fn help_is_reported_by_the_parser() {
    let err = Cli::try_parse_from(["rtumap", "--help"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
}

#[test]
fn parses_geocode_address() {
    let cli = Cli::try_parse_from(["rtumap", "geocode", "123 Main St, Pittsburgh"])
        .expect("expected valid cli args");

    match cli.command {
        Commands::Geocode { address } => assert_eq!(address, "123 Main St, Pittsburgh"),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parses_reverse_with_negative_longitude() {
    let cli = Cli::try_parse_from(["rtumap", "reverse", "--lat", "40.44", "--lng", "-79.99"])
        .expect("expected valid cli args");

    match cli.command {
        Commands::Reverse { lat, lng } => {
            assert!((lat - 40.44).abs() < f64::EPSILON);
            assert!((lng + 79.99).abs() < f64::EPSILON);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parses_detect_with_save() {
    let cli = Cli::try_parse_from([
        "rtumap",
        "detect",
        "--image",
        "map.png",
        "--lat",
        "40.44",
        "--lng",
        "-79.99",
        "--building-name",
        "Plaza",
        "--save",
    ])
    .expect("expected valid cli args");

    match cli.command {
        Commands::Detect {
            image,
            building_name,
            save,
            ..
        } => {
            assert_eq!(image, PathBuf::from("map.png"));
            assert_eq!(building_name.as_deref(), Some("Plaza"));
            assert!(save);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn detect_requires_image() {
    let result = Cli::try_parse_from(["rtumap", "detect", "--lat", "40.44", "--lng", "-79.99"]);
    assert!(result.is_err());
}

#[test]
fn parses_delete_id() {
    let cli = Cli::try_parse_from(["rtumap", "delete", "12"]).expect("expected valid cli args");

    assert!(matches!(cli.command, Commands::Delete { id: 12 }));
}

#[test]
fn missing_command_is_an_error() {
    assert!(Cli::try_parse_from(["rtumap"]).is_err());
}

#[test]
fn history_row_marks_unlocated_records() {
    let mut record = rtumap_core::LocationRecord {
        id: Some(RecordId(3)),
        building_name: "Warehouse".to_string(),
        address: "1 Industrial Way".to_string(),
        ..rtumap_core::LocationRecord::default()
    };
    record.set_rtu_count(12);

    let row = records::history_row(&record);
    assert!(row.starts_with("3     Warehouse"));
    assert!(row.contains("Good"));
    assert!(row.ends_with("unlocated"));
}

fn config_without_maps_key() -> AppConfig {
    AppConfig {
        env: rtumap_core::Environment::Test,
        log_level: "info".to_string(),
        api_base_url: "http://localhost:8000".to_string(),
        geocode_api_key: None,
        geocode_base_url: rtumap_core::config::DEFAULT_GEOCODE_BASE_URL.to_string(),
        geocode_max_concurrent: 4,
        request_timeout_secs: 5,
        user_agent: "rtumap-test/0.1".to_string(),
        capture_scale: 2.0,
        default_center: rtumap_core::Coordinates::new(40.4406, -79.9959).unwrap(),
        default_zoom: 16,
    }
}

#[test]
fn backend_commands_do_not_need_maps_key() {
    assert!(backend(&config_without_maps_key()).is_ok());
}

#[test]
fn geocoding_commands_report_missing_maps_key() {
    let err = geocode::client(&config_without_maps_key())
        .err()
        .expect("client should require a key");
    assert!(err.to_string().contains("GOOGLE_MAPS_API_KEY"), "got: {err}");
}

#[test]
fn model_score_defaults_to_neutral_projection() {
    let result = rtumap_core::DetectionResult::new(4, Vec::new(), None, None);
    assert_eq!(detect::model_score(&result), "0.50 (8 (Fair))");
}

#[test]
fn model_score_projects_provider_value() {
    let result = rtumap_core::DetectionResult::new(4, Vec::new(), None, Some(1.0));
    assert_eq!(detect::model_score(&result), "1.00 (15 (Good))");
}
