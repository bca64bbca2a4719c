//! Time helpers shared by acquisition and the solver stage.

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};

use crate::error::{CoreError, CoreResult};

/// Hours of forcing fetched before the nominal start.
pub const WINDOW_LEAD_H: i64 = 1;
/// Hours of forcing fetched after the end of the simulation.
pub const WINDOW_TAIL_H: i64 = 24;

const START_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Closed forcing time window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// `[start - 1h, start + sim_length + 24h]`.
    pub fn for_run(start: NaiveDateTime, sim_length_h: f64) -> Self {
        let length = Duration::seconds((sim_length_h * 3600.0).round() as i64);
        Self {
            start: start - Duration::hours(WINDOW_LEAD_H),
            end: start + length + Duration::hours(WINDOW_TAIL_H),
        }
    }

    pub fn hours(&self) -> i64 {
        (self.end - self.start).num_hours()
    }
}

/// `YYYYMMDD` tag used in forcing file names.
pub fn run_identifier(start: &NaiveDateTime) -> String {
    format!("{:04}{:02}{:02}", start.year(), start.month(), start.day())
}

/// Solver output directory name for a run starting at `start`.
pub fn solver_output_name(start: &NaiveDateTime, simname: &str) -> String {
    format!(
        "MDK_SIM_{}_{:02}_{:02}_{:02}{:02}_{}",
        start.year(),
        start.month(),
        start.day(),
        start.hour(),
        start.minute(),
        simname
    )
}

/// Parse the configured start time. Accepts ISO-like `T` or space
/// separators, with or without seconds.
pub fn parse_start_datetime(value: &str) -> CoreResult<NaiveDateTime> {
    let trimmed = value.trim();
    START_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| CoreError::InvalidDate {
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    #[test]
    fn window_brackets_the_run() {
        let w = TimeWindow::for_run(at(2021, 8, 21, 3, 43), 24.0);
        assert_eq!(w.start, at(2021, 8, 21, 2, 43));
        assert_eq!(w.end, at(2021, 8, 23, 3, 43));
        assert_eq!(w.hours(), 49);
    }

    #[test]
    fn identifier_is_zero_padded() {
        assert_eq!(run_identifier(&at(2021, 8, 1, 0, 0)), "20210801");
    }

    #[test]
    fn output_name_pattern() {
        assert_eq!(
            solver_output_name(&at(2021, 8, 21, 3, 4), "lebanon"),
            "MDK_SIM_2021_08_21_0304_lebanon"
        );
    }

    #[test]
    fn parses_common_layouts() {
        let expected = at(2021, 8, 21, 3, 43);
        assert_eq!(parse_start_datetime("2021-08-21T03:43:00").unwrap(), expected);
        assert_eq!(parse_start_datetime("2021-08-21T03:43").unwrap(), expected);
        assert_eq!(parse_start_datetime("2021-08-21 03:43:00").unwrap(), expected);
        assert_eq!(parse_start_datetime(" 2021-08-21 03:43 ").unwrap(), expected);
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(matches!(
            parse_start_datetime("2021-13-40T00:00:00"),
            Err(CoreError::InvalidDate { .. })
        ));
        assert!(parse_start_datetime("yesterday").is_err());
        assert!(parse_start_datetime("").is_err());
    }
}
