//! Solver input files: the per-event primary configuration, the physics
//! parameter file and the memory-sized solver source.

use crate::error::{AppError, AppResult};
use chrono::{Datelike, Timelike};
use sf_core::{SpillEvent, degrees_minutes};
use sf_project::AdvancedParamsDef;
use std::path::Path;

const CONFIG1_TEMPLATE: &str = include_str!("../templates/config1.txt");

pub const CONFIG1_FILE: &str = "config1.txt";
pub const CONFIG2_FILE: &str = "config2.txt";
pub const SOURCE_FILE: &str = "medslik_II.for";
pub const INITIAL_SLICK_FILE: &str = "initial_slick.txt";

/// Render the primary configuration of one event.
pub fn render_config1(event: &SpillEvent, n_slick: usize, area_spill: bool) -> String {
    let (lat_deg, lat_min) = degrees_minutes(event.latitude);
    let (lon_deg, lon_min) = degrees_minutes(event.longitude);
    let t = &event.start_time;

    let tokens: [(&str, String); 15] = [
        ("%SIMNAME%", event.simname.clone()),
        ("%DAY%", format!("{:02}", t.day())),
        ("%MONTH%", format!("{:02}", t.month())),
        ("%YEAR%", format!("{:04}", t.year())),
        ("%HOUR%", format!("{:02}", t.hour())),
        ("%MINUTE%", format!("{:02}", t.minute())),
        ("%SIMLENGTH%", format!("{:04}", event.sim_length)),
        ("%LAT_DEG%", format!("{:02}", lat_deg)),
        ("%LAT_MIN%", format!("{:.2}", lat_min)),
        ("%LON_DEG%", format!("{:02}", lon_deg)),
        ("%LON_MIN%", format!("{:.2}", lon_min)),
        ("%SPILL_DURATION%", format!("{:04}", event.duration)),
        ("%SPILL_RATE%", format!("{:.2}", event.rate)),
        ("%OIL%", event.oil.to_string()),
        ("%N_SLICK%", n_slick.to_string()),
    ];

    let mut out = CONFIG1_TEMPLATE.to_string();
    for (token, value) in &tokens {
        out = out.replace(token, value);
    }
    out.replace("%AREA_SPILL%", if area_spill { "1" } else { "0" })
}

/// Physics parameters, one `value  description` row each.
pub fn render_config2(params: &AdvancedParamsDef) -> String {
    let flag = |b: bool| (if b { "1" } else { "0" }).to_string();
    let rows: [(String, &str); 12] = [
        (
            params.horizontal_diffusivity_m2_s.to_string(),
            "horizontal diffusivity (m2/s)",
        ),
        (
            params.vertical_diffusivity_surface_m2_s.to_string(),
            "vertical diffusivity above the mixed layer (m2/s)",
        ),
        (
            params.vertical_diffusivity_deep_m2_s.to_string(),
            "vertical diffusivity below the mixed layer (m2/s)",
        ),
        (params.wind_drift_factor.to_string(), "wind drift factor"),
        (params.wind_drift_angle_deg.to_string(), "wind drift angle (deg)"),
        (flag(params.stokes_drift), "stokes drift"),
        (flag(params.evaporation), "evaporation"),
        (flag(params.dispersion), "dispersion"),
        (flag(params.emulsification), "emulsification"),
        (flag(params.spreading), "spreading"),
        (params.n_parcels.to_string(), "number of parcels"),
        (params.output_interval_h.to_string(), "output interval (hours)"),
    ];

    rows.iter()
        .map(|(value, description)| format!("{value:<12}{description}\n"))
        .collect()
}

/// Grid size `(imx, jmx)` from the third header line of `dtm.bath`.
pub fn read_bathymetry_grid(path: &Path) -> AppResult<(usize, usize)> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::Preprocessing(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_bathymetry_grid(&content).ok_or_else(|| {
        AppError::Preprocessing(format!(
            "{}: third line must hold the grid size 'imx jmx'",
            path.display()
        ))
    })
}

fn parse_bathymetry_grid(content: &str) -> Option<(usize, usize)> {
    let line = content.lines().nth(2)?;
    let mut fields = line.split_whitespace();
    let imx = fields.next()?.parse().ok()?;
    let jmx = fields.next()?.parse().ok()?;
    Some((imx, jmx))
}

/// Rewrite the `imx`, `jmx` and `nsl` bounds of the solver's `parameter`
/// statements. Other lines are returned unchanged.
pub fn patch_memory_source(source: &str, imx: usize, jmx: usize, nsl: usize) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        if line.to_ascii_lowercase().contains("parameter") {
            let mut patched = line.to_string();
            for (name, value) in [("imx", imx), ("jmx", jmx), ("nsl", nsl)] {
                patched = replace_int_param(&patched, name, value);
            }
            out.push_str(&patched);
        } else {
            out.push_str(line);
        }
    }
    out
}

/// Replace the integer after every `name =` in `line`, case-insensitively.
fn replace_int_param(line: &str, name: &str, value: usize) -> String {
    let lower = line.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut out = String::with_capacity(line.len());
    let mut copied = 0;
    let mut search = 0;

    while let Some(found) = lower[search..].find(name) {
        let start = search + found;
        let mut i = start + name.len();
        search = i;

        let boundary = start == 0 || {
            let prev = bytes[start - 1];
            !(prev.is_ascii_alphanumeric() || prev == b'_')
        };
        if !boundary {
            continue;
        }

        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits_start {
            continue;
        }

        out.push_str(&line[copied..digits_start]);
        out.push_str(&value.to_string());
        copied = i;
        search = i;
    }
    out.push_str(&line[copied..]);
    out
}
