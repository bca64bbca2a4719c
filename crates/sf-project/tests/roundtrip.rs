use sf_core::OilType;
use sf_project::schema::*;
use sf_project::{ProjectError, ValidationError, from_yaml_str, load_config, load_yaml, save_yaml};
use std::path::PathBuf;

const MINIMAL: &str = r#"
simulation:
  name: paria
  start_datetime: "2021-08-21 03:43"
  spill_lat: [35.25, 35.30]
  spill_lon: [35.90, 35.95]
  spill_duration: [0, 6]
  spill_rate: [27.78, 10]
  slick_age: [0, 0]
  oil: [28, "Arabian Light"]
input_files:
  dtm:
    bathymetry_path: bathy.nc
    coastline_path: coast.shp
solver:
  install_dir: solver
"#;

#[test]
fn minimal_config_gets_defaults() {
    let config = from_yaml_str(MINIMAL).unwrap();

    assert_eq!(config.n_spill_points(), 2);
    assert_eq!(config.simulation.sim_length, 24.0);
    assert_eq!(
        config.simulation.oil,
        vec![OilType::Api(28.0), OilType::Name("Arabian Light".into())]
    );
    assert!(config.run_options.run_model);
    assert_eq!(config.run_options.workspace, WorkspaceMode::Isolated);
    assert_eq!(config.input_files.delta, vec![0.75]);
    assert_eq!(config.input_files.shapefile.thickness_m, 1.0e-4);
    assert_eq!(config.postprocessing.grid_resolution_deg, 0.005);
    assert_eq!(config.solver.run.program, "sh");
    assert_eq!(config.solver.source_file, PathBuf::from("RUN/MODEL_SRC/medslik_II.for"));
    assert_eq!(config.experiment_root(), PathBuf::from("cases/paria"));
    assert!(config.input_files.metoce.oce_path().is_none());
}

#[test]
fn roundtrip_yaml() {
    let mut config = from_yaml_str(MINIMAL).unwrap();
    config.run_options.workspace = WorkspaceMode::Shared;
    config.plot_options.mass_balance_command = Some(ToolDef::new("python", &["mb.py"]));

    let path = std::env::temp_dir().join("sf_project_roundtrip.yaml");
    save_yaml(&path, &config).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(config, loaded);
}

#[test]
fn json_config_loads_by_extension() {
    let config = from_yaml_str(MINIMAL).unwrap();
    let dir = std::env::temp_dir().join("sf_project_json");
    std::fs::create_dir_all(&dir).unwrap();

    let json_path = dir.join("paria.json");
    std::fs::write(&json_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    assert_eq!(load_config(&json_path).unwrap(), config);

    let yaml_path = dir.join("paria.yaml");
    save_yaml(&yaml_path, &config).unwrap();
    assert_eq!(load_config(&yaml_path).unwrap(), config);

    let broken = dir.join("broken.json");
    std::fs::write(&broken, "{ \"simulation\": ").unwrap();
    assert!(matches!(load_config(&broken), Err(ProjectError::Json(_))));
}

#[test]
fn mismatched_lists_are_rejected() {
    let broken = MINIMAL.replace("spill_rate: [27.78, 10]", "spill_rate: [27.78]");
    let err = from_yaml_str(&broken).unwrap_err();

    match err {
        ProjectError::Validation(ValidationError::LengthMismatch {
            field,
            expected,
            found,
        }) => {
            assert_eq!(field, "simulation.spill_rate");
            assert_eq!(expected, 2);
            assert_eq!(found, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn redaction_masks_credentials_only() {
    let mut config = from_yaml_str(MINIMAL).unwrap();
    config.download.copernicus_user = "someone".into();
    config.download.copernicus_password = "hunter2".into();
    config.download.cds_token = "abc:123".into();

    let redacted = config.redacted();
    assert_eq!(redacted.download.copernicus_user, "someone");
    assert_eq!(redacted.download.copernicus_password, "***");
    assert_eq!(redacted.download.cds_token, "***");
    assert_eq!(config.download.copernicus_password, "hunter2");
}

#[test]
fn demo_configs_load() {
    let crate_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let root = crate_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root");

    for rel in ["demos/configs/lebanon_2021.yaml"] {
        let path = root.join(rel);
        let result = load_yaml(&path);
        assert!(
            result.is_ok(),
            "demo config failed validation: {} => {:?}",
            path.display(),
            result.err()
        );
    }
}
