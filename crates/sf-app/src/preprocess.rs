//! Preprocessing pipeline: acquisition, conversion, event fan-out and solver
//! input files.

use crate::acquisition::{AcquisitionSummary, ForcingProvider, acquire};
use crate::convert::{
    BATHYMETRY_FILE, COASTLINE_FILE, CURRENTS_EXT, ForcingConverter, WINDS_EXT, require_file,
    require_input_dir, require_outputs,
};
use crate::error::{AppError, AppResult};
use crate::setup::RunSetup;
use crate::solver_files::{
    CONFIG1_FILE, CONFIG2_FILE, INITIAL_SLICK_FILE, SOURCE_FILE, patch_memory_source,
    read_bathymetry_grid, render_config1, render_config2,
};
use sf_core::SpillEvent;
use sf_project::{AdvancedParamsDef, SimulationConfig};
use sf_results::ExperimentStore;
use std::fs;
use std::path::PathBuf;

/// External collaborators used by preprocessing.
pub struct PreprocessServices<'a> {
    pub provider: &'a dyn ForcingProvider,
    pub converter: &'a dyn ForcingConverter,
}

#[derive(Debug, Clone, Default)]
pub struct PreprocessOutcome {
    pub acquisition: Option<AcquisitionSummary>,
    /// Events written this run; empty when preprocessing was disabled.
    pub events: Vec<SpillEvent>,
}

/// One event per point in separate mode, else a single event from point 0.
pub fn build_events(config: &SimulationConfig, setup: &RunSetup) -> Vec<SpillEvent> {
    let sim = &config.simulation;
    let indices: Vec<usize> = if setup.mode.is_separate() {
        (0..config.n_spill_points()).collect()
    } else {
        vec![0]
    };

    indices
        .into_iter()
        .map(|i| SpillEvent {
            index: i,
            simname: sim.name.clone(),
            start_time: setup.timing.start,
            sim_length: setup.timing.sim_length_h.trunc() as u32,
            longitude: sim.spill_lon[i],
            latitude: sim.spill_lat[i],
            duration: setup.timing.spill_duration_h[i].trunc() as u32,
            rate: setup.rates[i],
            oil: sim.oil[i].clone(),
            mode: setup.mode,
        })
        .collect()
}

/// Where an event's primary configuration lives under `xp_files`.
pub fn event_config_path(store: &ExperimentStore, event: &SpillEvent) -> PathBuf {
    if event.mode.is_separate() {
        store.xp_dir().join(event.slick_dir_name()).join(CONFIG1_FILE)
    } else {
        store.xp_dir().join(CONFIG1_FILE)
    }
}

pub fn run(
    config: &SimulationConfig,
    store: &ExperimentStore,
    setup: &RunSetup,
    services: &PreprocessServices<'_>,
) -> AppResult<PreprocessOutcome> {
    store.create()?;
    store.create_forcing_dirs()?;

    let mut outcome = PreprocessOutcome::default();

    if config.download.download_data {
        outcome.acquisition = Some(acquire(
            config,
            &setup.domain,
            &setup.timing,
            store,
            services.provider,
        )?);
    }

    if !config.run_options.preprocessing {
        tracing::info!("preprocessing disabled; reusing existing solver inputs");
        return Ok(outcome);
    }

    if config.run_options.preprocessing_metoce {
        convert_metoce(config, store, setup, services.converter)?;
    }
    if config.run_options.preprocessing_dtm {
        convert_terrain(config, store, setup, services.converter)?;
    }

    if let Some(spill) = &setup.area_spill {
        let path = store.xp_dir().join(INITIAL_SLICK_FILE);
        spill.write_initial_slick(&path)?;
        tracing::info!(path = %path.display(), "area spill initial condition written");
    }

    let events = build_events(config, setup);
    write_event_files(store, setup, &events)?;

    patch_solver_source(config, store)?;

    let params = if config.simulation.advanced_parameters {
        tracing::info!("using custom solver parameters");
        config.simulation.advanced.clone()
    } else {
        tracing::info!("using default solver parameters");
        AdvancedParamsDef::default()
    };
    fs::write(store.xp_dir().join(CONFIG2_FILE), render_config2(&params))?;

    outcome.events = events;
    Ok(outcome)
}

fn convert_metoce(
    config: &SimulationConfig,
    store: &ExperimentStore,
    setup: &RunSetup,
    converter: &dyn ForcingConverter,
) -> AppResult<()> {
    let metoce = &config.input_files.metoce;

    let oce_src = metoce.oce_path().unwrap_or_else(|| store.oce_dir());
    require_input_dir(&oce_src, "currents")?;
    tracing::info!(source = %oce_src.display(), "converting currents");
    converter.currents(&oce_src, &store.oce_dir(), &setup.domain)?;
    require_outputs(&store.oce_dir(), CURRENTS_EXT, "currents")?;

    let met_src = metoce.met_path().unwrap_or_else(|| store.met_dir());
    require_input_dir(&met_src, "winds")?;
    tracing::info!(source = %met_src.display(), "converting winds");
    converter.winds(&met_src, &store.met_dir(), &setup.domain)?;
    require_outputs(&store.met_dir(), WINDS_EXT, "winds")?;

    Ok(())
}

fn convert_terrain(
    config: &SimulationConfig,
    store: &ExperimentStore,
    setup: &RunSetup,
    converter: &dyn ForcingConverter,
) -> AppResult<()> {
    let dtm = &config.input_files.dtm;
    require_file(&dtm.bathymetry_path, "bathymetry")?;
    require_file(&dtm.coastline_path, "coastline")?;

    tracing::info!("converting bathymetry and coastline");
    converter.terrain(
        &dtm.bathymetry_path,
        &dtm.coastline_path,
        &store.oce_dir(),
        &store.bnc_dir(),
        &setup.domain,
    )?;
    require_file(&store.bnc_dir().join(BATHYMETRY_FILE), "converted bathymetry")?;
    require_file(&store.bnc_dir().join(COASTLINE_FILE), "converted coastline")?;
    Ok(())
}

fn write_event_files(
    store: &ExperimentStore,
    setup: &RunSetup,
    events: &[SpillEvent],
) -> AppResult<()> {
    let area = setup.area_spill.is_some();
    let n_slick = setup
        .area_spill
        .as_ref()
        .map(|s| s.polygons.len())
        .unwrap_or(1);

    tracing::info!(events = events.len(), mode = ?setup.mode, "writing spill events");
    for event in events {
        let path = event_config_path(store, event);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, render_config1(event, n_slick, area))?;
    }
    store.save_events(events)?;
    Ok(())
}

fn patch_solver_source(config: &SimulationConfig, store: &ExperimentStore) -> AppResult<()> {
    let source_path = config.solver.install_dir.join(&config.solver.source_file);
    let source = fs::read_to_string(&source_path).map_err(|e| {
        AppError::Preprocessing(format!(
            "cannot read solver source {}: {}",
            source_path.display(),
            e
        ))
    })?;
    let (imx, jmx) = read_bathymetry_grid(&store.bnc_dir().join(BATHYMETRY_FILE))?;
    let nsl = config.n_spill_points();

    tracing::info!(imx, jmx, nsl, "sizing solver memory");
    fs::write(
        store.xp_dir().join(SOURCE_FILE),
        patch_memory_source(&source, imx, jmx, nsl),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coastline::tests::island;
    use crate::setup::initialize_setup;
    use crate::setup::tests::{ONE_POINT, two_points};
    use sf_core::EventMode;

    #[test]
    fn separate_mode_fans_out_every_point() {
        let config = two_points();
        let setup = initialize_setup(&config, &island()).unwrap();
        let events = build_events(&config, &setup);

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].index, 1);
        assert_eq!(events[1].latitude, 35.30);
        assert_eq!(events[1].longitude, 35.95);
        assert_eq!(events[1].rate, 10.0);
        assert_eq!(events[1].sim_length, 34);
        assert!(events.iter().all(|e| e.duration == 0));
        assert!(events.iter().all(|e| e.mode == EventMode::Separate));
    }

    #[test]
    fn combined_mode_uses_point_zero() {
        let config = sf_project::from_yaml_str(ONE_POINT).unwrap();
        let setup = initialize_setup(&config, &island()).unwrap();
        let events = build_events(&config, &setup);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 0);
        assert_eq!(events[0].duration, 6);
        assert_eq!(events[0].sim_length, 24);
        assert_eq!(events[0].mode, EventMode::Combined);
    }

    #[test]
    fn fractional_hours_truncate() {
        let mut config = sf_project::from_yaml_str(ONE_POINT).unwrap();
        config.simulation.spill_duration = vec![6.7];
        config.simulation.sim_length = 24.6;
        let setup = initialize_setup(&config, &island()).unwrap();
        let events = build_events(&config, &setup);

        assert_eq!(events[0].duration, 6);
        assert_eq!(events[0].sim_length, 24);
    }

    #[test]
    fn config_paths_follow_mode() {
        let config = two_points();
        let setup = initialize_setup(&config, &island()).unwrap();
        let store = ExperimentStore::new(PathBuf::from("cases/x"));
        let events = build_events(&config, &setup);
        assert_eq!(
            event_config_path(&store, &events[1]),
            PathBuf::from("cases/x/xp_files/slick2/config1.txt")
        );
    }
}
