//! Conversion of raw forcing and terrain into solver-native inputs.

use crate::error::{AppError, AppResult};
use crate::tools::{Placeholders, run_tool};
use sf_core::Domain;
use sf_project::{ConvertersDef, ToolDef};
use std::fs;
use std::path::{Path, PathBuf};

pub const CURRENTS_EXT: &str = "mrc";
pub const WINDS_EXT: &str = "eri";
pub const BATHYMETRY_FILE: &str = "dtm.bath";
pub const COASTLINE_FILE: &str = "dtm.map";

pub trait ForcingConverter {
    /// Raw currents in `input_dir` → `*.mrc` in `output_dir`.
    fn currents(&self, input_dir: &Path, output_dir: &Path, domain: &Domain) -> AppResult<()>;

    /// Raw winds in `input_dir` → `*.eri` in `output_dir`.
    fn winds(&self, input_dir: &Path, output_dir: &Path, domain: &Domain) -> AppResult<()>;

    /// Bathymetry and coastline cropped on the grid of the currents found in
    /// `grid_dir`, written as `dtm.bath` and `dtm.map` in `output_dir`.
    fn terrain(
        &self,
        bathymetry: &Path,
        coastline: &Path,
        grid_dir: &Path,
        output_dir: &Path,
        domain: &Domain,
    ) -> AppResult<()>;
}

/// Converter backed by the configured external tools.
pub struct ToolConverter {
    converters: ConvertersDef,
}

impl ToolConverter {
    pub fn new(converters: ConvertersDef) -> Self {
        Self { converters }
    }

    fn run(&self, what: &str, tool: Option<&ToolDef>, vars: Placeholders) -> AppResult<()> {
        let tool = tool.ok_or_else(|| {
            AppError::Preprocessing(format!("no {what} converter configured"))
        })?;
        run_tool(tool, &vars, None, &[])
            .map_err(|e| AppError::Preprocessing(format!("{what} conversion: {e}")))?;
        Ok(())
    }
}

impl ForcingConverter for ToolConverter {
    fn currents(&self, input_dir: &Path, output_dir: &Path, domain: &Domain) -> AppResult<()> {
        let vars = Placeholders::new()
            .with_domain(domain)
            .with_path("input_dir", input_dir)
            .with_path("output_dir", output_dir);
        self.run("currents", self.converters.currents.as_ref(), vars)
    }

    fn winds(&self, input_dir: &Path, output_dir: &Path, domain: &Domain) -> AppResult<()> {
        let vars = Placeholders::new()
            .with_domain(domain)
            .with_path("input_dir", input_dir)
            .with_path("output_dir", output_dir);
        self.run("winds", self.converters.winds.as_ref(), vars)
    }

    fn terrain(
        &self,
        bathymetry: &Path,
        coastline: &Path,
        grid_dir: &Path,
        output_dir: &Path,
        domain: &Domain,
    ) -> AppResult<()> {
        let vars = Placeholders::new()
            .with_domain(domain)
            .with_path("bathymetry", bathymetry)
            .with_path("coastline", coastline)
            .with_path("grid_dir", grid_dir)
            .with_path("output_dir", output_dir);
        self.run("terrain", self.converters.terrain.as_ref(), vars)
    }
}

/// Regular files directly inside `dir`, sorted by name.
pub fn list_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Files in `dir` with extension `ext`, sorted by name.
pub fn files_with_ext(dir: &Path, ext: &str) -> AppResult<Vec<PathBuf>> {
    Ok(list_files(dir)?
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)))
        .collect())
}

/// A forcing input directory that must hold at least one file.
pub fn require_input_dir(dir: &Path, what: &str) -> AppResult<()> {
    if list_files(dir)?.is_empty() {
        return Err(AppError::Preprocessing(format!(
            "{what} forcing directory {} has no files",
            dir.display()
        )));
    }
    Ok(())
}

/// Converter output that must exist afterwards.
pub fn require_outputs(dir: &Path, ext: &str, what: &str) -> AppResult<Vec<PathBuf>> {
    let files = files_with_ext(dir, ext)?;
    if files.is_empty() {
        return Err(AppError::Preprocessing(format!(
            "{what} conversion produced no *.{ext} files in {}",
            dir.display()
        )));
    }
    Ok(files)
}

pub fn require_file(path: &Path, what: &str) -> AppResult<()> {
    if !path.is_file() {
        return Err(AppError::Preprocessing(format!(
            "missing {what}: {}",
            path.display()
        )));
    }
    Ok(())
}
