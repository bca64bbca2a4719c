//! Experiment directory API.

use crate::types::{ConcentrationDataset, RunManifest};
use crate::{ResultsError, ResultsResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sf_core::SpillEvent;
use sf_project::SimulationConfig;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const EVENTS_FILE: &str = "events.json";
pub const CONFIG_COPY_FILE: &str = "config.yaml";
pub const RUN_LOG_FILE: &str = "run.log";
pub const DATASET_FILE: &str = "combined_surface_concentration.json";

/// `{experiment_path}/{name}` and its fixed subtree.
#[derive(Clone, Debug)]
pub struct ExperimentStore {
    root_dir: PathBuf,
    name: String,
}

impl ExperimentStore {
    /// Handle only; nothing is created until [`ExperimentStore::create`].
    pub fn new(root_dir: PathBuf) -> Self {
        let name = root_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { root_dir, name }
    }

    pub fn for_config(config: &SimulationConfig) -> Self {
        Self::new(config.experiment_root())
    }

    /// Create `out_files/figures` and `xp_files`. Idempotent.
    pub fn create(&self) -> ResultsResult<()> {
        fs::create_dir_all(self.figures_dir())?;
        fs::create_dir_all(self.xp_dir())?;
        Ok(())
    }

    /// Create the forcing staging folders. Idempotent.
    pub fn create_forcing_dirs(&self) -> ResultsResult<()> {
        for dir in [self.oce_dir(), self.met_dir(), self.bnc_dir()] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.xp_dir().is_dir()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root_dir.join("out_files")
    }

    pub fn figures_dir(&self) -> PathBuf {
        self.out_dir().join("figures")
    }

    pub fn xp_dir(&self) -> PathBuf {
        self.root_dir.join("xp_files")
    }

    pub fn oce_dir(&self) -> PathBuf {
        self.root_dir.join("oce_files")
    }

    pub fn met_dir(&self) -> PathBuf {
        self.root_dir.join("met_files")
    }

    pub fn bnc_dir(&self) -> PathBuf {
        self.root_dir.join("bnc_files")
    }

    /// Isolated solver working copies live here.
    pub fn solver_work_dir(&self) -> PathBuf {
        self.root_dir.join("solver_work")
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.xp_dir().join(RUN_LOG_FILE)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.out_dir().join(DATASET_FILE)
    }

    pub fn save_manifest(&self, manifest: &RunManifest) -> ResultsResult<()> {
        self.write_json(MANIFEST_FILE, manifest)
    }

    pub fn load_manifest(&self) -> ResultsResult<RunManifest> {
        self.read_json(MANIFEST_FILE)
    }

    pub fn save_events(&self, events: &[SpillEvent]) -> ResultsResult<()> {
        self.write_json(EVENTS_FILE, &events)
    }

    /// Events in stored index order.
    pub fn load_events(&self) -> ResultsResult<Vec<SpillEvent>> {
        let mut events: Vec<SpillEvent> = self.read_json(EVENTS_FILE)?;
        events.sort_by_key(|e| e.index);
        Ok(events)
    }

    /// Writes the credential-redacted configuration to `xp_files/config.yaml`.
    pub fn save_config_copy(&self, config: &SimulationConfig) -> ResultsResult<()> {
        let content = serde_yaml::to_string(&config.redacted())?;
        fs::write(self.xp_dir().join(CONFIG_COPY_FILE), content)?;
        Ok(())
    }

    pub fn save_dataset(&self, dataset: &ConcentrationDataset) -> ResultsResult<PathBuf> {
        let path = self.dataset_path();
        fs::create_dir_all(self.out_dir())?;
        fs::write(&path, serde_json::to_string(dataset)?)?;
        Ok(path)
    }

    pub fn load_dataset(&self) -> ResultsResult<ConcentrationDataset> {
        let path = self.dataset_path();
        if !path.exists() {
            return Err(self.not_found(DATASET_FILE));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> ResultsResult<()> {
        fs::create_dir_all(self.xp_dir())?;
        let json = serde_json::to_string_pretty(value)?;
        fs::write(self.xp_dir().join(file), json)?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, file: &str) -> ResultsResult<T> {
        let path = self.xp_dir().join(file);
        if !path.exists() {
            return Err(self.not_found(file));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn not_found(&self, what: &str) -> ResultsError {
        ResultsError::NotFound {
            experiment: self.name.clone(),
            what: what.to_string(),
        }
    }
}
