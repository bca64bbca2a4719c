//! Run configuration schema.

use serde::{Deserialize, Serialize};
use sf_core::OilType;
use std::collections::BTreeMap;
use std::path::PathBuf;

const REDACTED: &str = "***";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    pub simulation: SimulationDef,
    #[serde(default)]
    pub download: DownloadDef,
    pub input_files: InputFilesDef,
    #[serde(default)]
    pub run_options: RunOptionsDef,
    #[serde(default)]
    pub plot_options: PlotOptionsDef,
    #[serde(default)]
    pub postprocessing: PostprocessingDef,
    pub solver: SolverDef,
}

impl SimulationConfig {
    /// Number of spill points, taken from the latitude list.
    pub fn n_spill_points(&self) -> usize {
        self.simulation.spill_lat.len()
    }

    /// `{experiment_path}/{name}`.
    pub fn experiment_root(&self) -> PathBuf {
        self.simulation.experiment_path.join(&self.simulation.name)
    }

    /// Copy with credentials masked, suitable for writing next to results.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for secret in [
            &mut copy.download.copernicus_password,
            &mut copy.download.cds_token,
        ] {
            if !secret.is_empty() {
                *secret = REDACTED.to_string();
            }
        }
        copy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationDef {
    pub name: String,
    /// Kept as text; parsed and checked by input validation.
    pub start_datetime: String,
    #[serde(default = "default_sim_length")]
    pub sim_length: f64,
    pub spill_lat: Vec<f64>,
    pub spill_lon: Vec<f64>,
    pub spill_duration: Vec<f64>,
    pub spill_rate: Vec<f64>,
    pub slick_age: Vec<f64>,
    pub oil: Vec<OilType>,
    #[serde(default)]
    pub multiple_slick: bool,
    #[serde(default)]
    pub area_spill: bool,
    #[serde(default)]
    pub advanced_parameters: bool,
    #[serde(default)]
    pub advanced: AdvancedParamsDef,
    #[serde(default = "default_experiment_path")]
    pub experiment_path: PathBuf,
}

fn default_sim_length() -> f64 {
    24.0
}

fn default_experiment_path() -> PathBuf {
    PathBuf::from("cases")
}

/// Solver physics parameters written to the secondary solver configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdvancedParamsDef {
    pub horizontal_diffusivity_m2_s: f64,
    pub vertical_diffusivity_surface_m2_s: f64,
    pub vertical_diffusivity_deep_m2_s: f64,
    pub wind_drift_factor: f64,
    pub wind_drift_angle_deg: f64,
    pub stokes_drift: bool,
    pub evaporation: bool,
    pub dispersion: bool,
    pub emulsification: bool,
    pub spreading: bool,
    pub n_parcels: u32,
    pub output_interval_h: u32,
}

impl Default for AdvancedParamsDef {
    fn default() -> Self {
        Self {
            horizontal_diffusivity_m2_s: 2.0,
            vertical_diffusivity_surface_m2_s: 0.01,
            vertical_diffusivity_deep_m2_s: 0.0001,
            wind_drift_factor: 0.031,
            wind_drift_angle_deg: 0.0,
            stokes_drift: true,
            evaporation: true,
            dispersion: true,
            emulsification: true,
            spreading: true,
            n_parcels: 90_000,
            output_interval_h: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DownloadDef {
    #[serde(default)]
    pub download_data: bool,
    #[serde(default)]
    pub download_curr: bool,
    #[serde(default)]
    pub download_wind: bool,
    #[serde(default)]
    pub copernicus_user: String,
    #[serde(default)]
    pub copernicus_password: String,
    #[serde(default)]
    pub cds_token: String,
    /// Overrides `$HOME/.cdsapirc`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cds_rc_path: Option<PathBuf>,
    #[serde(default)]
    pub providers: ProvidersDef,
}

/// How the two external download clients are invoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvidersDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currents: Option<ToolDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winds: Option<ToolDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_postprocess: Option<ToolDef>,
    #[serde(default = "default_currents_cache")]
    pub currents_cache: PathBuf,
    #[serde(default = "default_winds_cache")]
    pub winds_cache: PathBuf,
}

impl Default for ProvidersDef {
    fn default() -> Self {
        Self {
            currents: None,
            winds: None,
            wind_postprocess: None,
            currents_cache: default_currents_cache(),
            winds_cache: default_winds_cache(),
        }
    }
}

fn default_currents_cache() -> PathBuf {
    PathBuf::from("data/COPERNICUS")
}

fn default_winds_cache() -> PathBuf {
    PathBuf::from("data/ERA5")
}

/// External program invocation. Arguments may contain `{placeholder}`
/// tokens filled in by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDef {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ToolDef {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputFilesDef {
    #[serde(default)]
    pub set_domain: bool,
    #[serde(default = "default_lat")]
    pub lat: Vec<f64>,
    #[serde(default = "default_lon")]
    pub lon: Vec<f64>,
    #[serde(default = "default_delta")]
    pub delta: Vec<f64>,
    pub dtm: DtmDef,
    #[serde(default)]
    pub metoce: MetoceDef,
    #[serde(default)]
    pub shapefile: ShapefileDef,
}

fn default_lat() -> Vec<f64> {
    vec![31.0, 38.0]
}

fn default_lon() -> Vec<f64> {
    vec![32.0, 37.0]
}

fn default_delta() -> Vec<f64> {
    vec![0.75]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DtmDef {
    pub bathymetry_path: PathBuf,
    pub coastline_path: PathBuf,
}

/// Pre-supplied forcing. Empty strings mean "use the staged downloads".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MetoceDef {
    #[serde(default)]
    pub oce_data_path: String,
    #[serde(default)]
    pub met_data_path: String,
}

impl MetoceDef {
    pub fn oce_path(&self) -> Option<PathBuf> {
        non_empty_path(&self.oce_data_path)
    }

    pub fn met_path(&self) -> Option<PathBuf> {
        non_empty_path(&self.met_data_path)
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    if value.trim().is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShapefileDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_path: Option<PathBuf>,
    #[serde(default = "default_thickness")]
    pub thickness_m: f64,
}

impl Default for ShapefileDef {
    fn default() -> Self {
        Self {
            shape_path: None,
            thickness_m: default_thickness(),
        }
    }
}

impl ShapefileDef {
    /// Configured shapefile, only if it exists on disk.
    pub fn existing_path(&self) -> Option<&PathBuf> {
        self.shape_path.as_ref().filter(|p| p.exists())
    }
}

fn default_thickness() -> f64 {
    1.0e-4
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceMode {
    /// Each event runs in its own copy of the solver tree.
    #[default]
    Isolated,
    /// Events run in the solver install tree under a process-wide lock.
    Shared,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunOptionsDef {
    #[serde(default = "yes")]
    pub preprocessing: bool,
    #[serde(default = "yes")]
    pub preprocessing_metoce: bool,
    #[serde(default = "yes")]
    pub preprocessing_dtm: bool,
    #[serde(default = "yes")]
    pub run_model: bool,
    #[serde(default = "yes")]
    pub postprocessing: bool,
    #[serde(default)]
    pub workspace: WorkspaceMode,
    #[serde(default)]
    pub parallel_events: bool,
}

impl Default for RunOptionsDef {
    fn default() -> Self {
        Self {
            preprocessing: true,
            preprocessing_metoce: true,
            preprocessing_dtm: true,
            run_model: true,
            postprocessing: true,
            workspace: WorkspaceMode::Isolated,
            parallel_events: false,
        }
    }
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlotOptionsDef {
    #[serde(default)]
    pub plotting: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_lon: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_lat: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_command: Option<ToolDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass_balance_command: Option<ToolDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostprocessingDef {
    #[serde(default = "default_resolution")]
    pub grid_resolution_deg: f64,
    #[serde(default = "default_surface_file")]
    pub surface_file: String,
}

impl Default for PostprocessingDef {
    fn default() -> Self {
        Self {
            grid_resolution_deg: default_resolution(),
            surface_file: default_surface_file(),
        }
    }
}

fn default_resolution() -> f64 {
    0.005
}

fn default_surface_file() -> String {
    "surface_concentration.csv".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolverDef {
    pub install_dir: PathBuf,
    /// Memory-sizing source, relative to `install_dir`.
    #[serde(default = "default_source_file")]
    pub source_file: PathBuf,
    #[serde(default = "default_build")]
    pub build: ToolDef,
    #[serde(default = "default_run")]
    pub run: ToolDef,
    #[serde(default)]
    pub converters: ConvertersDef,
}

fn default_source_file() -> PathBuf {
    PathBuf::from("RUN/MODEL_SRC/medslik_II.for")
}

fn default_build() -> ToolDef {
    ToolDef::new("sh", &["MODEL_SRC/compile.sh"])
}

fn default_run() -> ToolDef {
    ToolDef::new("sh", &["RUN.sh"])
}

/// External converters producing solver-native forcing and terrain files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ConvertersDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currents: Option<ToolDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winds: Option<ToolDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terrain: Option<ToolDef>,
}
