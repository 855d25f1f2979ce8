use crate::utils::error::{PipelineError, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic center of the outermost domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainCenter {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
}

impl DomainCenter {
    pub fn new(id: impl Into<String>, lat: f64, lon: f64) -> Result<Self> {
        let center = Self {
            id: id.into(),
            lat,
            lon,
        };
        center.check()?;
        Ok(center)
    }

    pub fn check(&self) -> Result<()> {
        crate::utils::validation::validate_non_empty_string("center.id", &self.id)?;
        crate::utils::validation::validate_range("center.lat", self.lat, -90.0, 90.0)?;
        crate::utils::validation::validate_range("center.lon", self.lon, -180.0, 180.0)
    }
}

/// Simulation window, both ends truncated to whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPeriod {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl RunPeriod {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        let start = truncate_to_hour(start);
        let end = truncate_to_hour(end);
        if end < start {
            return Err(PipelineError::invalid_value(
                "run.end",
                end.to_string(),
                format!("End must not precede start ({})", start),
            ));
        }
        Ok(Self { start, end })
    }

    /// Parses the `YYYY-MM-DD HH` form used in run files.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_hour_stamp("run.start", start)?, parse_hour_stamp("run.end", end)?)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Days covered by the run, `YYYYMMDD`, start day through end day.
    pub fn run_dates(&self) -> Vec<String> {
        days_between(self.start.date(), self.end.date())
            .map(|d| d.format("%Y%m%d").to_string())
            .collect()
    }

    /// Days to request from the reanalysis service, `YYYY-MM-DD`. A run ending
    /// after midnight pulls one more day so the last boundary time is covered.
    pub fn retrieval_dates(&self) -> Vec<String> {
        let mut last = self.end;
        if self.end.hour() > 0 {
            last += Duration::days(1);
        }
        let span = (last - self.start).num_days();
        (0..=span)
            .map(|i| (self.start + Duration::days(i)).format("%Y-%m-%d").to_string())
            .collect()
    }
}

pub fn namelist_timestamp(t: &NaiveDateTime) -> String {
    t.format("%Y-%m-%d_%H:00:00").to_string()
}

fn truncate_to_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.date()
        .and_hms_opt(t.hour(), 0, 0)
        .unwrap_or(t)
}

fn parse_hour_stamp(field: &str, raw: &str) -> Result<NaiveDateTime> {
    let invalid = |reason: &str| PipelineError::invalid_value(field, raw, reason);
    let (date, hour) = raw
        .trim()
        .split_once(' ')
        .ok_or_else(|| invalid("Expected 'YYYY-MM-DD HH'"))?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| invalid(&e.to_string()))?;
    let hour: u32 = hour.trim().parse().map_err(|_| invalid("Hour is not a number"))?;
    date.and_hms_opt(hour, 0, 0)
        .ok_or_else(|| invalid("Hour must be between 0 and 23"))
}

fn days_between(first: NaiveDate, last: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    first.iter_days().take_while(move |d| *d <= last)
}

/// Outer domain grid spacing and desired cell counts per nesting level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OuterDomainSpec {
    /// West-east grid spacing in meters.
    pub dx: f64,
    /// South-north grid spacing in meters.
    pub dy: f64,
    pub e_we: Vec<u32>,
    pub e_sn: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestingSpec {
    pub max_dom: usize,
    /// Entry 0 is ignored.
    pub parent_grid_ratio: Vec<u32>,
}

impl NestingSpec {
    pub fn ratio(&self, level: usize) -> Result<u32> {
        if level == 0 {
            return Ok(1);
        }
        self.parent_grid_ratio.get(level).copied().ok_or_else(|| {
            PipelineError::invalid_value(
                format!("domain.parent_grid_ratio[{}]", level),
                "",
                format!("No refinement ratio for nesting level {}", level),
            )
        })
    }

    pub fn check(&self) -> Result<()> {
        crate::utils::validation::validate_positive_number("domain.max_dom", self.max_dom, 1)?;
        crate::utils::validation::validate_min_len(
            "domain.parent_grid_ratio",
            &self.parent_grid_ratio,
            self.max_dom,
        )?;
        for (level, ratio) in self.parent_grid_ratio.iter().enumerate().skip(1).take(self.max_dom - 1) {
            if *ratio == 0 {
                return Err(PipelineError::invalid_value(
                    format!("domain.parent_grid_ratio[{}]", level),
                    "0",
                    "Refinement ratio must be at least 1",
                ));
            }
        }
        Ok(())
    }
}

/// Resolved placement of one nesting level.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    pub e_we: u32,
    pub e_sn: u32,
    pub i_parent_start: u32,
    pub j_parent_start: u32,
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Area ordering expected by the retrieval service.
    pub fn as_area(&self) -> [f64; 4] {
        [self.north, self.west, self.south, self.east]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineStage {
    Setup,
    GridPreprocess,
    FieldExtractionPressure,
    FieldExtractionSurface,
    FieldInterpolation,
    PostInterpolationSync,
    ModelInit,
    Integration,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 8] = [
        PipelineStage::Setup,
        PipelineStage::GridPreprocess,
        PipelineStage::FieldExtractionPressure,
        PipelineStage::FieldExtractionSurface,
        PipelineStage::FieldInterpolation,
        PipelineStage::PostInterpolationSync,
        PipelineStage::ModelInit,
        PipelineStage::Integration,
    ];

    pub fn next(self) -> Option<PipelineStage> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Setup => "Setup",
            PipelineStage::GridPreprocess => "GridPreprocess",
            PipelineStage::FieldExtractionPressure => "FieldExtractionPressure",
            PipelineStage::FieldExtractionSurface => "FieldExtractionSurface",
            PipelineStage::FieldInterpolation => "FieldInterpolation",
            PipelineStage::PostInterpolationSync => "PostInterpolationSync",
            PipelineStage::ModelInit => "ModelInit",
            PipelineStage::Integration => "Integration",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the sequencer is. `Completed` and `Failed` are terminal.
#[derive(Debug)]
pub enum PipelineState {
    Pending(PipelineStage),
    Completed,
    Failed {
        stage: PipelineStage,
        error: String,
    },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineState::Pending(_))
    }
}

/// Dimension sizes scraped from the first interpolation output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetgridMetadata {
    pub num_metgrid_levels: u64,
    pub num_land_cat: u64,
    pub num_metgrid_soil_levels: u64,
}

/// One reanalysis product for one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalRequest {
    pub dataset: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub variables: Vec<String>,
    /// Pressure levels in hPa; empty for single-level products.
    pub levels: Vec<String>,
    pub times: Vec<String>,
    pub area: [f64; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_period_parse_and_order() {
        let period = RunPeriod::parse("2024-01-01 00", "2024-01-02 12").unwrap();
        assert_eq!(period.duration(), Duration::hours(36));
        assert_eq!(namelist_timestamp(&period.start), "2024-01-01_00:00:00");
        assert_eq!(namelist_timestamp(&period.end), "2024-01-02_12:00:00");

        assert!(RunPeriod::parse("2024-01-02 00", "2024-01-01 00").is_err());
        assert!(RunPeriod::parse("2024-01-01", "2024-01-02 00").is_err());
        assert!(RunPeriod::parse("2024-01-01 24", "2024-01-02 00").is_err());
    }

    #[test]
    fn test_run_period_truncates_to_hour() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(6, 45, 30)
            .unwrap();
        let period = RunPeriod::new(start, start).unwrap();
        assert_eq!(period.start.minute(), 0);
        assert_eq!(period.start.second(), 0);
        assert_eq!(period.start.hour(), 6);
    }

    #[test]
    fn test_date_ranges() {
        let period = RunPeriod::parse("2024-01-01 00", "2024-01-02 12").unwrap();
        assert_eq!(period.run_dates(), vec!["20240101", "20240102"]);
        assert_eq!(
            period.retrieval_dates(),
            vec!["2024-01-01", "2024-01-02", "2024-01-03"]
        );

        let midnight = RunPeriod::parse("2024-02-28 00", "2024-03-01 00").unwrap();
        assert_eq!(midnight.run_dates(), vec!["20240228", "20240229", "20240301"]);
        assert_eq!(
            midnight.retrieval_dates(),
            vec!["2024-02-28", "2024-02-29", "2024-03-01"]
        );
    }

    #[test]
    fn test_domain_center_bounds() {
        assert!(DomainCenter::new("Mogadishu", 2.05, 45.32).is_ok());
        assert!(DomainCenter::new("Nowhere", 91.0, 0.0).is_err());
        assert!(DomainCenter::new("Nowhere", 0.0, 181.0).is_err());
        assert!(DomainCenter::new("  ", 0.0, 0.0).is_err());
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(PipelineStage::Setup.next(), Some(PipelineStage::GridPreprocess));
        assert_eq!(
            PipelineStage::FieldInterpolation.next(),
            Some(PipelineStage::PostInterpolationSync)
        );
        assert_eq!(PipelineStage::Integration.next(), None);
    }

    #[test]
    fn test_nesting_spec_check() {
        let nesting = NestingSpec {
            max_dom: 3,
            parent_grid_ratio: vec![1, 3, 3],
        };
        assert!(nesting.check().is_ok());
        assert_eq!(nesting.ratio(0).unwrap(), 1);
        assert_eq!(nesting.ratio(2).unwrap(), 3);
        assert!(matches!(
            nesting.ratio(3),
            Err(PipelineError::InvalidConfigValue { .. })
        ));

        let short = NestingSpec {
            max_dom: 3,
            parent_grid_ratio: vec![1, 3],
        };
        assert!(short.check().is_err());

        let zero = NestingSpec {
            max_dom: 2,
            parent_grid_ratio: vec![1, 0],
        };
        assert!(zero.check().is_err());
    }
}
