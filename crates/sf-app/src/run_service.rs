//! Run execution service.
//!
//! Sequences initialization, preprocessing, the solver stage,
//! postprocessing and presentation for one configuration, with a per-run log
//! and a manifest that tracks the run's status on disk.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use sf_core::{Domain, SpillEvent};
use sf_project::SimulationConfig;
use sf_results::{ExperimentStore, RunManifest, RunStatus, compute_config_hash};
use tracing_subscriber::filter::LevelFilter;
use uuid::Uuid;

use crate::acquisition::{ForcingProvider, ToolProvider};
use crate::coastline::{CoastlineShapes, LandClassifier};
use crate::convert::{ForcingConverter, ToolConverter};
use crate::error::{AppError, AppResult};
use crate::postprocess;
use crate::preprocess::{self, PreprocessServices};
use crate::presentation::{self, PresentationOutcome};
use crate::progress::{RunProgressEvent, RunStage, SolverProgress};
use crate::run_log::RunLog;
use crate::setup::{RunSetup, initialize_setup};
use crate::solver_stage::{SolverPhase, SolverStage};

/// Options for running simulations.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Mirror the run log to stderr at this level.
    pub console_log: Option<LevelFilter>,
}

/// Request to execute a run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub config: SimulationConfig,
    pub options: RunOptions,
}

impl RunRequest {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            options: RunOptions::default(),
        }
    }

    /// Load and validate a YAML or JSON configuration.
    pub fn from_path(path: &Path) -> AppResult<Self> {
        Ok(Self::new(sf_project::load_config(path)?))
    }
}

/// External collaborators of a run.
pub struct RunServices {
    pub land: Box<dyn LandClassifier>,
    pub provider: Box<dyn ForcingProvider>,
    pub converter: Box<dyn ForcingConverter>,
}

impl RunServices {
    /// Coastline from `input_files.dtm.coastline_path`, downloads and
    /// converters from the configured tools.
    pub fn from_config(config: &SimulationConfig) -> AppResult<Self> {
        let sim = &config.simulation;
        let land = CoastlineShapes::load_around(
            &config.input_files.dtm.coastline_path,
            &sim.spill_lat,
            &sim.spill_lon,
        )?;
        if land.polygon_count() == 0 {
            tracing::warn!(
                path = %config.input_files.dtm.coastline_path.display(),
                "no coastline polygons near the spill points; every point classifies as sea"
            );
        }
        Ok(Self {
            land: Box::new(land),
            provider: Box::new(ToolProvider::from_config(&config.download)),
            converter: Box::new(ToolConverter::new(config.solver.converters.clone())),
        })
    }
}

/// Wall time per stage.
#[derive(Debug, Clone, Default)]
pub struct RunTimingSummary {
    pub init_time_s: f64,
    pub preprocess_time_s: f64,
    pub solver_time_s: f64,
    pub postprocess_time_s: f64,
    pub presentation_time_s: f64,
    pub total_time_s: f64,
}

/// Response from a run execution.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub domain: Domain,
    pub n_events: usize,
    /// Combined dataset, when postprocessing ran.
    pub dataset_path: Option<PathBuf>,
    pub presentation: PresentationOutcome,
    pub timing: RunTimingSummary,
}

/// Result of [`initialize`]: the derived setup, the experiment directory and
/// the manifest already written to it.
#[derive(Debug, Clone)]
pub struct InitializedRun {
    pub setup: RunSetup,
    pub store: ExperimentStore,
    pub manifest: RunManifest,
}

/// Resolve domain and timing, validate inputs, create the experiment
/// directory, and write the configuration copy and the initial manifest.
pub fn initialize(config: &SimulationConfig, services: &RunServices) -> AppResult<InitializedRun> {
    let setup = initialize_setup(config, services.land.as_ref())?;

    let store = ExperimentStore::for_config(config);
    store.create()?;
    store.save_config_copy(config)?;

    let n_events = if setup.mode.is_separate() {
        setup.n_points()
    } else {
        1
    };
    let manifest = RunManifest {
        run_id: Uuid::new_v4().to_string(),
        experiment: store.name().to_string(),
        timestamp: Utc::now().to_rfc3339(),
        config_hash: compute_config_hash(config),
        start_time: setup.timing.start.format("%Y-%m-%d %H:%M").to_string(),
        sim_length_h: setup.timing.sim_length_h,
        domain: setup.domain,
        region: setup.domain.region(),
        mode: setup.mode,
        n_events,
        status: RunStatus::Initialized,
    };
    store.save_manifest(&manifest)?;

    tracing::info!(
        run_id = %manifest.run_id,
        domain = %setup.domain,
        region = %manifest.region,
        n_events,
        "run initialized"
    );

    Ok(InitializedRun {
        setup,
        store,
        manifest,
    })
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    stage: RunStage,
    started: Instant,
    message: Option<String>,
    solver: Option<SolverProgress>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent {
            stage,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
            message,
            solver,
        });
    }
}

/// Execute a run.
pub fn ensure_run(request: &RunRequest, services: &RunServices) -> AppResult<RunResponse> {
    ensure_run_with_progress(request, services, None)
}

/// Execute a run and stream progress events.
pub fn ensure_run_with_progress(
    request: &RunRequest,
    services: &RunServices,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<RunResponse> {
    let started = Instant::now();
    let config = &request.config;

    let store = ExperimentStore::for_config(config);
    store.create()?;
    let log = RunLog::open(&store.run_log_path(), request.options.console_log)?;
    let _log_guard = log.enter();
    let span = tracing::info_span!("run", experiment = %store.name());
    let _entered = span.enter();

    let interrupted = store
        .load_manifest()
        .ok()
        .filter(|previous| !previous.status.is_terminal());
    if let Some(previous) = interrupted {
        tracing::warn!(
            run_id = %previous.run_id,
            status = ?previous.status,
            "previous run of this experiment did not finish"
        );
    }

    let mut tracker = StageTracker {
        stage: RunStage::Initializing,
        manifest: None,
        store: &store,
    };

    match execute_run(config, services, &mut tracker, &mut progress_cb, started) {
        Ok(response) => Ok(response),
        Err(err) => {
            tracing::error!(
                stage = tracker.stage.label(),
                category = %err.category(),
                error = %err,
                "run failed"
            );
            tracker.set_status(RunStatus::Failed {
                category: err.category().as_str().to_string(),
                message: err.to_string(),
            });
            Err(err)
        }
    }
}

/// Current stage and manifest, so failures can be attributed and recorded.
struct StageTracker<'a> {
    stage: RunStage,
    manifest: Option<RunManifest>,
    store: &'a ExperimentStore,
}

impl StageTracker<'_> {
    fn enter(&mut self, stage: RunStage) {
        self.stage = stage;
        self.set_status(RunStatus::Running {
            stage: stage.label().to_string(),
        });
    }

    fn set_status(&mut self, status: RunStatus) {
        let Some(manifest) = self.manifest.as_mut() else {
            return;
        };
        manifest.status = status;
        if let Err(e) = self.store.save_manifest(manifest) {
            tracing::warn!(error = %e, "failed to update run manifest");
        }
    }
}

fn execute_run(
    config: &SimulationConfig,
    services: &RunServices,
    tracker: &mut StageTracker<'_>,
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    started: Instant,
) -> AppResult<RunResponse> {
    let mut timing = RunTimingSummary::default();
    let run_options = &config.run_options;

    emit_progress(
        progress_cb,
        RunStage::Initializing,
        started,
        Some("Initializing run".to_string()),
        None,
    );
    let stage_started = Instant::now();
    let init = initialize(config, services)?;
    timing.init_time_s = stage_started.elapsed().as_secs_f64();

    let InitializedRun {
        setup,
        store,
        manifest,
    } = init;
    let run_id = manifest.run_id.clone();
    let n_events = manifest.n_events;
    tracker.manifest = Some(manifest);

    tracker.enter(RunStage::Preprocessing);
    let message = if config.download.download_data {
        "Acquiring forcing and preparing solver inputs"
    } else {
        "Preparing solver inputs"
    };
    emit_progress(progress_cb, RunStage::Preprocessing, started, Some(message.to_string()), None);
    let stage_started = Instant::now();
    let services = PreprocessServices {
        provider: services.provider.as_ref(),
        converter: services.converter.as_ref(),
    };
    preprocess::run(config, &store, &setup, &services)?;
    timing.preprocess_time_s = stage_started.elapsed().as_secs_f64();

    if run_options.run_model {
        tracker.enter(RunStage::RunningSolver);
        let events = store.load_events()?;
        emit_progress(
            progress_cb,
            RunStage::RunningSolver,
            started,
            Some(format!("Running solver for {} event(s)", events.len())),
            None,
        );
        let stage_started = Instant::now();
        let n = events.len();
        let stage = SolverStage::new(config, &store);
        stage.run_all(&events, &mut |event: &SpillEvent, phase: SolverPhase| {
            emit_progress(
                progress_cb,
                RunStage::RunningSolver,
                started,
                Some(format!("Event {}/{}: {}", event.index + 1, n, phase)),
                Some(SolverProgress {
                    event: event.index,
                    n_events: n,
                    phase,
                }),
            );
        })?;
        timing.solver_time_s = stage_started.elapsed().as_secs_f64();
    } else {
        tracing::info!("solver disabled");
    }

    let mut dataset_path = None;
    if run_options.postprocessing {
        tracker.enter(RunStage::Postprocessing);
        emit_progress(
            progress_cb,
            RunStage::Postprocessing,
            started,
            Some("Combining surface concentration".to_string()),
            None,
        );
        let stage_started = Instant::now();
        let post = &config.postprocessing;
        let dataset = postprocess::aggregate(
            &setup.domain,
            &store.out_dir(),
            setup.mode.is_separate(),
            n_events,
            post.grid_resolution_deg,
            &post.surface_file,
        )?;
        let path = store.save_dataset(&dataset)?;
        tracing::info!(path = %path.display(), "combined dataset written");
        dataset_path = Some(path);
        timing.postprocess_time_s = stage_started.elapsed().as_secs_f64();
    }

    let mut presentation = PresentationOutcome::Skipped;
    if config.plot_options.plotting {
        tracker.enter(RunStage::Presenting);
        emit_progress(
            progress_cb,
            RunStage::Presenting,
            started,
            Some("Plotting".to_string()),
            None,
        );
        let stage_started = Instant::now();
        let dataset = dataset_path.clone().unwrap_or_else(|| store.dataset_path());
        if !dataset.is_file() {
            return Err(AppError::Presentation(format!(
                "no combined dataset at {}",
                dataset.display()
            )));
        }
        presentation = presentation::present(config, &store, &setup.domain, &dataset)?;
        timing.presentation_time_s = stage_started.elapsed().as_secs_f64();
    }

    tracker.stage = RunStage::Completed;
    tracker.set_status(RunStatus::Completed);
    timing.total_time_s = started.elapsed().as_secs_f64();
    tracing::info!(total_s = timing.total_time_s, "run completed");

    emit_progress(
        progress_cb,
        RunStage::Completed,
        started,
        Some("Run completed".to_string()),
        None,
    );

    Ok(RunResponse {
        run_id,
        domain: setup.domain,
        n_events,
        dataset_path,
        presentation,
        timing,
    })
}

/// Manifest of the last run of the experiment a configuration points at.
pub fn load_run(config: &SimulationConfig) -> AppResult<RunManifest> {
    Ok(ExperimentStore::for_config(config).load_manifest()?)
}
