//! Forcing data acquisition.
//!
//! The two download clients are external programs. This module decides what
//! to ask them for (region, domain, time window, output name), invokes them,
//! then moves their output from the provider cache into the experiment's
//! staging folders.

use crate::error::{AppError, AppResult};
use crate::tools::{Placeholders, run_tool};
use sf_core::{Domain, Region, RunTiming, TimeWindow, run_identifier};
use sf_project::{DownloadDef, ProvidersDef, SimulationConfig};
use sf_results::ExperimentStore;
use std::fs;
use std::path::{Path, PathBuf};

/// Depth range requested for currents, in metres.
pub const CURRENT_DEPTH_M: (f64, f64) = (0.0, 120.0);

const CDS_URL: &str = "https://cds.climate.copernicus.eu/api";
const DATETIME_ARG: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcingSource {
    Currents,
    Winds,
}

impl ForcingSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ForcingSource::Currents => "currents",
            ForcingSource::Winds => "winds",
        }
    }
}

/// One download, fully resolved.
#[derive(Debug, Clone)]
pub struct ForcingRequest {
    pub source: ForcingSource,
    pub region: Region,
    pub domain: Domain,
    pub window: TimeWindow,
    pub identifier: String,
    pub name: String,
    /// Provider cache directory the client writes into.
    pub cache_dir: PathBuf,
    /// Target file name inside `cache_dir`. For currents it still carries a
    /// `{var}` token the client fills per variable.
    pub output_name: String,
}

impl ForcingRequest {
    pub fn output_path(&self) -> PathBuf {
        self.cache_dir.join(&self.output_name)
    }
}

pub trait ForcingProvider {
    fn fetch(&self, request: &ForcingRequest) -> AppResult<()>;

    /// Optional post-processing of a downloaded wind file.
    fn postprocess_winds(&self, _request: &ForcingRequest) -> AppResult<()> {
        Ok(())
    }
}

/// Provider backed by the configured external download tools.
pub struct ToolProvider {
    providers: ProvidersDef,
    copernicus_user: String,
    copernicus_password: String,
}

impl ToolProvider {
    pub fn from_config(download: &DownloadDef) -> Self {
        Self {
            providers: download.providers.clone(),
            copernicus_user: download.copernicus_user.clone(),
            copernicus_password: download.copernicus_password.clone(),
        }
    }

    fn placeholders(request: &ForcingRequest) -> Placeholders {
        Placeholders::new()
            .with_domain(&request.domain)
            .with("region", request.region)
            .with("start", request.window.start.format(DATETIME_ARG))
            .with("end", request.window.end.format(DATETIME_ARG))
            .with("depth_min", CURRENT_DEPTH_M.0)
            .with("depth_max", CURRENT_DEPTH_M.1)
            .with("identifier", &request.identifier)
            .with("name", &request.name)
            .with_path("output_dir", &request.cache_dir)
            .with("output_name", &request.output_name)
            .with_path("output", &request.output_path())
    }
}

impl ForcingProvider for ToolProvider {
    fn fetch(&self, request: &ForcingRequest) -> AppResult<()> {
        let source_name = request.source.as_str();
        let tool = match request.source {
            ForcingSource::Currents => self.providers.currents.as_ref(),
            ForcingSource::Winds => self.providers.winds.as_ref(),
        }
        .ok_or_else(|| AppError::Acquisition {
            source_name,
            message: "no download tool configured".to_string(),
        })?;

        fs::create_dir_all(&request.cache_dir)?;
        let env: Vec<(&str, &str)> = match request.source {
            ForcingSource::Currents => vec![
                ("COPERNICUSMARINE_SERVICE_USERNAME", self.copernicus_user.as_str()),
                ("COPERNICUSMARINE_SERVICE_PASSWORD", self.copernicus_password.as_str()),
            ],
            ForcingSource::Winds => Vec::new(),
        };

        run_tool(tool, &Self::placeholders(request), None, &env).map_err(|e| {
            AppError::Acquisition {
                source_name,
                message: e.to_string(),
            }
        })?;
        Ok(())
    }

    fn postprocess_winds(&self, request: &ForcingRequest) -> AppResult<()> {
        let Some(tool) = &self.providers.wind_postprocess else {
            return Ok(());
        };
        run_tool(tool, &Self::placeholders(request), None, &[]).map_err(|e| {
            AppError::Acquisition {
                source_name: "winds",
                message: format!("post-processing: {e}"),
            }
        })?;
        Ok(())
    }
}

/// What was fetched and where it was staged.
#[derive(Debug, Clone)]
pub struct AcquisitionSummary {
    pub identifier: String,
    pub region: Region,
    pub window: TimeWindow,
    pub currents: Vec<PathBuf>,
    pub winds: Vec<PathBuf>,
}

/// Fetch the enabled forcing sources for `domain` and the (aged) run timing.
pub fn acquire(
    config: &SimulationConfig,
    domain: &Domain,
    timing: &RunTiming,
    store: &ExperimentStore,
    provider: &dyn ForcingProvider,
) -> AppResult<AcquisitionSummary> {
    let download = &config.download;
    let name = config.simulation.name.clone();
    let identifier = run_identifier(&timing.start);
    let window = TimeWindow::for_run(timing.start, timing.sim_length_h);
    let region = domain.region();

    tracing::info!(
        %identifier,
        %region,
        start = %window.start,
        end = %window.end,
        "forcing window resolved"
    );

    store.create_forcing_dirs()?;
    let request = |source: ForcingSource, cache_dir: &Path, output_name: String| ForcingRequest {
        source,
        region,
        domain: *domain,
        window,
        identifier: identifier.clone(),
        name: name.clone(),
        cache_dir: cache_dir.to_path_buf(),
        output_name,
    };

    let mut summary = AcquisitionSummary {
        identifier: identifier.clone(),
        region,
        window,
        currents: Vec::new(),
        winds: Vec::new(),
    };

    if download.download_curr {
        let req = request(
            ForcingSource::Currents,
            &download.providers.currents_cache,
            format!("Currents{{var}}_{identifier}_{name}.nc"),
        );
        tracing::info!("downloading currents");
        provider.fetch(&req)?;
        summary.currents = stage(&req, &store.oce_dir())?;
    }

    if download.download_wind {
        ensure_cds_token(download)?;
        let req = request(
            ForcingSource::Winds,
            &download.providers.winds_cache,
            format!("era5_winds10_{identifier}_{name}.nc"),
        );
        tracing::info!("downloading winds");
        provider.fetch(&req)?;
        provider.postprocess_winds(&req)?;
        summary.winds = stage(&req, &store.met_dir())?;
    }

    Ok(summary)
}

fn stage(request: &ForcingRequest, dest: &Path) -> AppResult<Vec<PathBuf>> {
    let staged = stage_from_cache(&request.cache_dir, &request.identifier, &request.name, dest)
        .map_err(|e| AppError::Acquisition {
            source_name: request.source.as_str(),
            message: format!("staging from {}: {}", request.cache_dir.display(), e),
        })?;
    if staged.is_empty() {
        return Err(AppError::Acquisition {
            source_name: request.source.as_str(),
            message: format!(
                "no files for {} / {} in {}",
                request.identifier,
                request.name,
                request.cache_dir.display()
            ),
        });
    }
    tracing::info!(
        source = request.source.as_str(),
        files = staged.len(),
        dest = %dest.display(),
        "forcing staged"
    );
    Ok(staged)
}

/// Copy every `.nc` file in `cache` named for this run's `identifier` and
/// experiment `name` into `dest`, then delete it from the cache. Returns the staged
/// paths in name order.
pub fn stage_from_cache(
    cache: &Path,
    identifier: &str,
    name: &str,
    dest: &Path,
) -> std::io::Result<Vec<PathBuf>> {
    if !cache.is_dir() {
        return Ok(Vec::new());
    }

    let mut matches: Vec<PathBuf> = fs::read_dir(cache)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .map(|n| n.to_string_lossy())
                    .is_some_and(|n| is_cached_forcing(&n, identifier, name))
        })
        .collect();
    matches.sort();

    fs::create_dir_all(dest)?;
    let mut staged = Vec::with_capacity(matches.len());
    for src in matches {
        if let Some(file_name) = src.file_name() {
            let target = dest.join(file_name);
            fs::copy(&src, &target)?;
            fs::remove_file(&src)?;
            staged.push(target);
        }
    }
    Ok(staged)
}

/// `*_{identifier}_{name}.nc` or `*_{identifier}_{name}_*.nc`.
fn is_cached_forcing(file_name: &str, identifier: &str, name: &str) -> bool {
    let Some(stem) = file_name.strip_suffix(".nc") else {
        return false;
    };
    let key = format!("_{identifier}_{name}");
    stem.match_indices(&key).any(|(at, _)| {
        let rest = &stem[at + key.len()..];
        rest.is_empty() || rest.starts_with('_')
    })
}

/// Path of the reanalysis API token file.
pub fn cds_rc_path(download: &DownloadDef) -> Option<PathBuf> {
    download
        .cds_rc_path
        .clone()
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cdsapirc")))
}

/// Make sure the token file exists and carries the configured key.
pub fn ensure_cds_token(download: &DownloadDef) -> AppResult<()> {
    let path = cds_rc_path(download).ok_or_else(|| AppError::Acquisition {
        source_name: "winds",
        message: "cannot locate home directory for the CDS token file".to_string(),
    })?;
    let token = download.cds_token.trim();
    let existing = fs::read_to_string(&path).ok();

    if token.is_empty() {
        return match existing {
            Some(_) => Ok(()),
            None => Err(AppError::Acquisition {
                source_name: "winds",
                message: format!("no CDS token configured and {} is missing", path.display()),
            }),
        };
    }

    let current_key = existing.as_deref().and_then(|content| {
        content
            .lines()
            .find_map(|line| line.strip_prefix("key:").map(str::trim))
    });
    if current_key == Some(token) {
        return Ok(());
    }

    let write_failed = |e: std::io::Error| AppError::Acquisition {
        source_name: "winds",
        message: format!("cannot write CDS token file {}: {}", path.display(), e),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_failed)?;
    }
    fs::write(&path, format!("url: {CDS_URL}\nkey: {token}\n")).map_err(write_failed)?;
    tracing::info!(path = %path.display(), "CDS token file written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn temp(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("sf_app_acquisition").join(tag);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn staging_moves_only_matching_files() {
        let root = temp("stage");
        let cache = root.join("cache");
        let dest = root.join("oce_files");
        fs::create_dir_all(&cache).unwrap();
        for name in [
            "CurrentsU_20210821_lebanon.nc",
            "CurrentsV_20210821_lebanon.nc",
            "CurrentsU_20210822_lebanon.nc",
            "CurrentsU_20210821_other.nc",
            "CurrentsU_20210821_lebanon.txt",
        ] {
            fs::write(cache.join(name), "x").unwrap();
        }

        let staged = stage_from_cache(&cache, "20210821", "lebanon", &dest).unwrap();
        let names: Vec<String> = staged
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["CurrentsU_20210821_lebanon.nc", "CurrentsV_20210821_lebanon.nc"]
        );
        assert!(!cache.join("CurrentsU_20210821_lebanon.nc").exists());
        assert!(cache.join("CurrentsU_20210822_lebanon.nc").exists());
        assert!(cache.join("CurrentsU_20210821_other.nc").exists());
    }

    #[test]
    fn cache_match_needs_name_right_after_identifier() {
        assert!(is_cached_forcing("CurrentsU_20210821_a.nc", "20210821", "a"));
        assert!(is_cached_forcing("era5_winds10_20210821_a_part1.nc", "20210821", "a"));
        assert!(!is_cached_forcing("CurrentsU_20210821_abc.nc", "20210821", "a"));
        assert!(!is_cached_forcing("CurrentsU_20210821_lebanon.nc", "20210821", "a"));
        assert!(!is_cached_forcing("a_CurrentsU_20210821_b.nc", "20210821", "a"));
        assert!(!is_cached_forcing("CurrentsU_20210821_a.nc.tmp", "20210821", "a"));
    }

    #[test]
    fn short_name_leaves_other_experiments_cached() {
        let root = temp("shortname");
        let cache = root.join("cache");
        fs::create_dir_all(&cache).unwrap();
        for name in ["CurrentsU_20210821_a.nc", "CurrentsU_20210821_lebanon.nc"] {
            fs::write(cache.join(name), "x").unwrap();
        }

        let staged = stage_from_cache(&cache, "20210821", "a", &root.join("d")).unwrap();
        assert_eq!(staged.len(), 1);
        assert!(cache.join("CurrentsU_20210821_lebanon.nc").exists());
    }

    #[test]
    fn missing_cache_stages_nothing() {
        let root = temp("nocache");
        let staged = stage_from_cache(&root.join("absent"), "x", "y", &root.join("d")).unwrap();
        assert!(staged.is_empty());
    }

    #[test]
    fn token_file_written_once_then_kept() {
        let root = temp("token");
        let rc = root.join(".cdsapirc");
        let mut download = DownloadDef {
            cds_token: "abc:123".into(),
            cds_rc_path: Some(rc.clone()),
            ..DownloadDef::default()
        };

        ensure_cds_token(&download).unwrap();
        let first = fs::read_to_string(&rc).unwrap();
        assert!(first.contains("key: abc:123"));

        ensure_cds_token(&download).unwrap();
        assert_eq!(fs::read_to_string(&rc).unwrap(), first);

        download.cds_token = "def:456".into();
        ensure_cds_token(&download).unwrap();
        assert!(fs::read_to_string(&rc).unwrap().contains("key: def:456"));
    }

    #[test]
    fn unwritable_token_file_is_an_acquisition_error() {
        let root = temp("badtoken");
        let blocker = root.join("not_a_dir");
        fs::write(&blocker, "x").unwrap();
        let download = DownloadDef {
            cds_token: "abc:123".into(),
            cds_rc_path: Some(blocker.join(".cdsapirc")),
            ..DownloadDef::default()
        };
        let err = ensure_cds_token(&download).unwrap_err();
        assert!(matches!(err, AppError::Acquisition { source_name: "winds", .. }));
        assert_eq!(err.category(), ErrorCategory::Acquisition);
    }

    #[test]
    fn empty_token_without_file_fails() {
        let root = temp("notoken");
        let download = DownloadDef {
            cds_rc_path: Some(root.join(".cdsapirc")),
            ..DownloadDef::default()
        };
        assert!(matches!(
            ensure_cds_token(&download),
            Err(AppError::Acquisition { source_name: "winds", .. })
        ));
    }
}
