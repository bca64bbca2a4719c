use chrono::NaiveDate;
use sf_core::{Domain, EventMode, OilType, Region, SpillEvent};
use sf_results::*;

fn fresh_store(tag: &str) -> ExperimentStore {
    let root = std::env::temp_dir().join("sf_results_test").join(tag);
    let _ = std::fs::remove_dir_all(&root);
    ExperimentStore::new(root)
}

fn manifest(status: RunStatus) -> RunManifest {
    RunManifest {
        run_id: "run-1".to_string(),
        experiment: "smoke".to_string(),
        timestamp: "2026-02-25T12:00:00Z".to_string(),
        config_hash: "abc".to_string(),
        start_time: "2021-08-21T03:43:00".to_string(),
        sim_length_h: 24.0,
        domain: Domain::new(34.5, 36.0, 35.15, 36.65),
        region: Region::Local,
        mode: EventMode::Combined,
        n_events: 1,
        status,
    }
}

#[test]
fn create_is_idempotent() {
    let store = fresh_store("idempotent");
    store.create().unwrap();
    store.create_forcing_dirs().unwrap();
    std::fs::write(store.oce_dir().join("keep.mrc"), "x").unwrap();

    store.create().unwrap();
    store.create_forcing_dirs().unwrap();

    assert!(store.figures_dir().is_dir());
    assert!(store.xp_dir().is_dir());
    assert!(store.bnc_dir().is_dir());
    assert!(store.oce_dir().join("keep.mrc").exists());
    assert_eq!(store.name(), "idempotent");
}

#[test]
fn manifest_roundtrip_and_status_update() {
    let store = fresh_store("manifest");
    store.create().unwrap();

    store.save_manifest(&manifest(RunStatus::Initialized)).unwrap();
    let mut loaded = store.load_manifest().unwrap();
    assert_eq!(loaded, manifest(RunStatus::Initialized));
    assert!(!loaded.status.is_terminal());

    loaded.status = RunStatus::Failed {
        category: "solver_execution".to_string(),
        message: "exit 1".to_string(),
    };
    store.save_manifest(&loaded).unwrap();
    assert!(store.load_manifest().unwrap().status.is_terminal());
}

#[test]
fn events_load_in_index_order() {
    let store = fresh_store("events");
    store.create().unwrap();

    let start = NaiveDate::from_ymd_opt(2021, 8, 21)
        .unwrap()
        .and_hms_opt(3, 43, 0)
        .unwrap();
    let event = |index: usize| SpillEvent {
        index,
        simname: "smoke".to_string(),
        start_time: start,
        sim_length: 24,
        longitude: 35.9 + index as f64,
        latitude: 35.25,
        duration: 0,
        rate: 1.0,
        oil: OilType::Name("Arabian Light".to_string()),
        mode: EventMode::Separate,
    };

    store.save_events(&[event(1), event(0)]).unwrap();
    let loaded = store.load_events().unwrap();
    assert_eq!(loaded, vec![event(0), event(1)]);
}

#[test]
fn missing_records_are_not_found() {
    let store = fresh_store("missing");
    assert!(matches!(
        store.load_manifest(),
        Err(ResultsError::NotFound { .. })
    ));
    assert!(matches!(
        store.load_dataset(),
        Err(ResultsError::NotFound { .. })
    ));
}

#[test]
fn dataset_roundtrip_reads_absent_cells_as_zero() {
    let store = fresh_store("dataset");
    store.create().unwrap();

    let dataset = ConcentrationDataset {
        lon: vec![35.0, 35.5, 36.0],
        lat: vec![34.0, 34.5],
        time_h: vec![1.0, 2.0],
        concentration: vec![
            vec![
                GridCell { j: 0, i: 2, value: 1.5 },
                GridCell { j: 1, i: 0, value: 2.0 },
            ],
            vec![],
        ],
        events: vec!["combined".to_string()],
        units: "tons/km2".to_string(),
    };
    store.save_dataset(&dataset).unwrap();
    let loaded = store.load_dataset().unwrap();

    assert_eq!(loaded, dataset);
    assert_eq!(loaded.value_at(0, 1, 0), 2.0);
    assert_eq!(loaded.value_at(0, 1, 2), 0.0);
    assert_eq!(loaded.value_at(5, 0, 0), 0.0);
    assert_eq!(loaded.total_at(0), 3.5);
    assert_eq!(loaded.total_at(1), 0.0);
    assert_eq!(loaded.stored_cells(), 2);
}
