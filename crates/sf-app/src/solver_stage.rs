//! Solver execution stage.
//!
//! Each spill event goes through the same six phases against a solver tree
//! laid out as the solver expects it:
//!
//! ```text
//! {root}/RUN/            build and run scripts, config1.txt, config2.txt
//! {root}/RUN/TEMP/OCE/   currents (*.mrc)
//! {root}/RUN/TEMP/MET/   winds (*.eri)
//! {root}/RUN/MODEL_SRC/  memory-sized solver source
//! {root}/DTM_INP/        bathymetry and coastline
//! {root}/OUT/MDK_SIM_*/  solver output
//! ```
//!
//! In `isolated` mode the tree is a per-event copy of the install under the
//! experiment, so events never share state and may run in parallel. In
//! `shared` mode the install tree itself is used and a process-wide lock is
//! held for the whole event.

use crate::convert::{CURRENTS_EXT, WINDS_EXT, files_with_ext, list_files};
use crate::error::{AppError, AppResult};
use crate::preprocess::event_config_path;
use crate::solver_files::{CONFIG1_FILE, CONFIG2_FILE, INITIAL_SLICK_FILE, SOURCE_FILE};
use crate::staging::{clear_dir, copy_dir_contents, copy_files_into, copy_tree, remove_path};
use crate::tools::{Placeholders, run_tool};
use rayon::prelude::*;
use sf_core::{SpillEvent, solver_output_name};
use sf_project::{SimulationConfig, WorkspaceMode};
use sf_results::ExperimentStore;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

static SOLVER_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverPhase {
    PurgeOldOutput,
    StageInputs,
    Build,
    Execute,
    CollectOutput,
    CleanTemp,
}

impl SolverPhase {
    pub const ALL: [SolverPhase; 6] = [
        SolverPhase::PurgeOldOutput,
        SolverPhase::StageInputs,
        SolverPhase::Build,
        SolverPhase::Execute,
        SolverPhase::CollectOutput,
        SolverPhase::CleanTemp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SolverPhase::PurgeOldOutput => "PURGE_OLD_OUTPUT",
            SolverPhase::StageInputs => "STAGE_INPUTS",
            SolverPhase::Build => "BUILD",
            SolverPhase::Execute => "EXECUTE",
            SolverPhase::CollectOutput => "COLLECT_OUTPUT",
            SolverPhase::CleanTemp => "CLEAN_TEMP",
        }
    }
}

impl fmt::Display for SolverPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paths inside one solver tree.
#[derive(Debug, Clone)]
pub struct SolverLayout {
    root: PathBuf,
}

impl SolverLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root.join("RUN")
    }

    pub fn oce_temp(&self) -> PathBuf {
        self.run_dir().join("TEMP").join("OCE")
    }

    pub fn met_temp(&self) -> PathBuf {
        self.run_dir().join("TEMP").join("MET")
    }

    pub fn model_src(&self) -> PathBuf {
        self.run_dir().join("MODEL_SRC")
    }

    pub fn dtm_dir(&self) -> PathBuf {
        self.root.join("DTM_INP")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root.join("OUT")
    }

    pub fn output_dir(&self, event: &SpillEvent) -> PathBuf {
        self.out_dir()
            .join(solver_output_name(&event.start_time, &event.simname))
    }
}

/// Solver tree for one event; keeps the shared lock alive while it exists.
struct Workspace {
    layout: SolverLayout,
    sandbox: bool,
    _guard: Option<MutexGuard<'static, ()>>,
}

/// Runs events through the six phases.
pub struct SolverStage<'a> {
    config: &'a SimulationConfig,
    store: &'a ExperimentStore,
}

impl<'a> SolverStage<'a> {
    pub fn new(config: &'a SimulationConfig, store: &'a ExperimentStore) -> Self {
        Self { config, store }
    }

    pub fn install_layout(&self) -> SolverLayout {
        SolverLayout::new(self.config.solver.install_dir.clone())
    }

    /// `out_files` in combined mode, `out_files/slick{i+1}` in separate mode.
    pub fn collection_dir(&self, event: &SpillEvent) -> PathBuf {
        if event.mode.is_separate() {
            self.store.out_dir().join(event.slick_dir_name())
        } else {
            self.store.out_dir()
        }
    }

    /// Run all events and return their collection directories in event order.
    ///
    /// `on_phase` is called before each phase when events run sequentially.
    pub fn run_all(
        &self,
        events: &[SpillEvent],
        on_phase: &mut dyn FnMut(&SpillEvent, SolverPhase),
    ) -> AppResult<Vec<PathBuf>> {
        let run_options = &self.config.run_options;
        let parallel = run_options.parallel_events
            && run_options.workspace == WorkspaceMode::Isolated
            && events.len() > 1;

        if parallel {
            tracing::info!(events = events.len(), "running solver events in parallel");
            let dispatch = tracing::dispatcher::get_default(|d| d.clone());
            events
                .par_iter()
                .map(|event| {
                    tracing::dispatcher::with_default(&dispatch, || {
                        self.run_event(event, &mut |_: &SpillEvent, _: SolverPhase| {})
                    })
                })
                .collect()
        } else {
            events
                .iter()
                .map(|event| self.run_event(event, on_phase))
                .collect()
        }
    }

    /// Run one event through all phases.
    pub fn run_event(
        &self,
        event: &SpillEvent,
        on_phase: &mut dyn FnMut(&SpillEvent, SolverPhase),
    ) -> AppResult<PathBuf> {
        let span = tracing::info_span!("solver_event", event = event.index);
        let _entered = span.enter();
        let destination = self.collection_dir(event);

        on_phase(event, SolverPhase::PurgeOldOutput);
        let workspace = self.phase(event, SolverPhase::PurgeOldOutput, || self.purge(event))?;
        let layout = &workspace.layout;

        on_phase(event, SolverPhase::StageInputs);
        self.phase(event, SolverPhase::StageInputs, || self.stage_inputs(event, layout))?;

        on_phase(event, SolverPhase::Build);
        self.phase(event, SolverPhase::Build, || {
            self.run_script(&self.config.solver.build, event, layout)
        })?;

        on_phase(event, SolverPhase::Execute);
        self.phase(event, SolverPhase::Execute, || {
            self.run_script(&self.config.solver.run, event, layout)
        })?;

        on_phase(event, SolverPhase::CollectOutput);
        self.phase(event, SolverPhase::CollectOutput, || {
            let output = layout.output_dir(event);
            if !output.is_dir() {
                return Err(format!("solver produced no output at {}", output.display()));
            }
            copy_dir_contents(&output, &destination).map_err(|e| e.to_string())
        })?;

        on_phase(event, SolverPhase::CleanTemp);
        self.phase(event, SolverPhase::CleanTemp, || {
            for dir in ["MET", "OCE"] {
                remove_path(&destination.join(dir)).map_err(|e| e.to_string())?;
            }
            if workspace.sandbox {
                remove_path(layout.root()).map_err(|e| e.to_string())?;
            }
            Ok(())
        })?;

        tracing::info!(destination = %destination.display(), "solver event completed");
        Ok(destination)
    }

    fn phase<T>(
        &self,
        event: &SpillEvent,
        phase: SolverPhase,
        f: impl FnOnce() -> Result<T, String>,
    ) -> AppResult<T> {
        tracing::debug!(%phase, "solver phase");
        f().map_err(|message| {
            tracing::error!(%phase, %message, "solver phase failed");
            AppError::SolverExecution {
                phase,
                event: event.index,
                message,
            }
        })
    }

    /// Acquire the workspace and remove anything a previous run of this
    /// event left behind.
    fn purge(&self, event: &SpillEvent) -> Result<Workspace, String> {
        let workspace = match self.config.run_options.workspace {
            WorkspaceMode::Shared => Workspace {
                layout: self.install_layout(),
                sandbox: false,
                _guard: Some(SOLVER_LOCK.lock().unwrap_or_else(|p| p.into_inner())),
            },
            WorkspaceMode::Isolated => {
                let root = self
                    .store
                    .solver_work_dir()
                    .join(format!("event_{}", event.index));
                remove_path(&root).map_err(|e| e.to_string())?;
                let install = self.config.solver.install_dir.as_path();
                if !install.is_dir() {
                    return Err(format!("solver install {} not found", install.display()));
                }
                copy_tree(install, &root, &[Path::new("OUT"), Path::new("RUN/TEMP")])
                    .map_err(|e| format!("copying solver tree: {e}"))?;
                Workspace {
                    layout: SolverLayout::new(root),
                    sandbox: true,
                    _guard: None,
                }
            }
        };

        remove_path(&workspace.layout.output_dir(event)).map_err(|e| e.to_string())?;
        let destination = self.collection_dir(event);
        if event.mode.is_separate() {
            remove_path(&destination)
        } else {
            clear_dir(&destination, &["figures"])
        }
        .map_err(|e| format!("purging {}: {}", destination.display(), e))?;

        Ok(workspace)
    }

    fn stage_inputs(&self, event: &SpillEvent, layout: &SolverLayout) -> Result<(), String> {
        let store = self.store;
        let xp = store.xp_dir();

        for dir in [layout.oce_temp(), layout.met_temp()] {
            clear_dir(&dir, &[]).map_err(|e| e.to_string())?;
        }

        let currents = non_empty(files_with_ext(&store.oce_dir(), CURRENTS_EXT), "*.mrc currents")?;
        let winds = non_empty(files_with_ext(&store.met_dir(), WINDS_EXT), "*.eri winds")?;
        let terrain = non_empty(list_files(&store.bnc_dir()), "terrain files")?;

        let io = |e: std::io::Error| e.to_string();
        copy_files_into(&currents, &layout.oce_temp()).map_err(io)?;
        copy_files_into(&winds, &layout.met_temp()).map_err(io)?;
        copy_files_into(&terrain, &layout.dtm_dir()).map_err(io)?;

        let config1 = event_config_path(store, event);
        let copies = [
            (xp.join(SOURCE_FILE), layout.model_src().join(SOURCE_FILE)),
            (xp.join(CONFIG2_FILE), layout.run_dir().join(CONFIG2_FILE)),
            (config1, layout.run_dir().join(CONFIG1_FILE)),
        ];
        for (src, dst) in copies {
            if !src.is_file() {
                return Err(format!("missing {}", src.display()));
            }
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent).map_err(io)?;
            }
            fs::copy(&src, &dst).map_err(io)?;
        }

        let slick = xp.join(INITIAL_SLICK_FILE);
        if slick.is_file() {
            fs::copy(&slick, layout.run_dir().join(INITIAL_SLICK_FILE)).map_err(io)?;
        }
        Ok(())
    }

    fn run_script(
        &self,
        tool: &sf_project::ToolDef,
        event: &SpillEvent,
        layout: &SolverLayout,
    ) -> Result<(), String> {
        let vars = Placeholders::new()
            .with("event", event.index)
            .with("slick", event.index + 1)
            .with("name", &event.simname)
            .with_path("solver_root", layout.root());
        run_tool(tool, &vars, Some(&layout.run_dir()), &[])
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

fn non_empty(files: AppResult<Vec<PathBuf>>, what: &str) -> Result<Vec<PathBuf>, String> {
    match files {
        Ok(files) if !files.is_empty() => Ok(files),
        Ok(_) => Err(format!("no {what} staged in the experiment")),
        Err(e) => Err(e.to_string()),
    }
}
