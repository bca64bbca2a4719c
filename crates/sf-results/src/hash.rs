//! Content hash of a run configuration.

use sha2::{Digest, Sha256};
use sf_project::SimulationConfig;

/// SHA-256 over the JSON form of the redacted configuration, so the hash
/// does not change when only credentials do.
pub fn compute_config_hash(config: &SimulationConfig) -> String {
    let mut hasher = Sha256::new();
    let json = serde_json::to_string(&config.redacted()).unwrap_or_default();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
simulation:
  name: hash
  start_datetime: "2021-08-21T03:43"
  spill_lat: [35.25]
  spill_lon: [35.90]
  spill_duration: [0]
  spill_rate: [27.78]
  slick_age: [0]
  oil: [28]
input_files:
  dtm:
    bathymetry_path: b.nc
    coastline_path: c.shp
solver:
  install_dir: solver
"#;

    fn config() -> SimulationConfig {
        sf_project::from_yaml_str(CONFIG).unwrap()
    }

    #[test]
    fn hash_stability() {
        assert_eq!(compute_config_hash(&config()), compute_config_hash(&config()));
        assert_eq!(compute_config_hash(&config()).len(), 64);
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        let mut other = config();
        other.simulation.sim_length = 48.0;
        assert_ne!(compute_config_hash(&config()), compute_config_hash(&other));
    }

    #[test]
    fn hash_ignores_credentials() {
        let mut other = config();
        other.download.copernicus_password = "secret".into();
        let mut again = config();
        again.download.copernicus_password = "different".into();
        assert_eq!(compute_config_hash(&other), compute_config_hash(&again));
    }
}
