use crate::core::geometry::compute_bounding_box;
use crate::domain::model::{DomainCenter, OuterDomainSpec, RetrievalRequest, RunPeriod};
use crate::domain::ports::ReanalysisClient;
use crate::utils::error::{PipelineError, Result};
use std::path::{Path, PathBuf};

pub const PRESSURE_LEVEL_DATASET: &str = "reanalysis-era5-pressure-levels";
pub const SINGLE_LEVEL_DATASET: &str = "reanalysis-era5-single-levels";

const SYNOPTIC_TIMES: [&str; 4] = ["00:00", "06:00", "12:00", "18:00"];

const PRESSURE_VARIABLES: [&str; 5] = [
    "geopotential",
    "relative_humidity",
    "temperature",
    "u_component_of_wind",
    "v_component_of_wind",
];

const PRESSURE_LEVELS_HPA: [&str; 37] = [
    "1", "2", "3", "5", "7", "10", "20", "30", "50", "70", "100", "125", "150", "175", "200",
    "225", "250", "300", "350", "400", "450", "500", "550", "600", "650", "700", "750", "775",
    "800", "825", "850", "875", "900", "925", "950", "975", "1000",
];

const NO_LEVELS: [&str; 0] = [];

const SURFACE_VARIABLES: [&str; 19] = [
    "10m_u_component_of_wind",
    "10m_v_component_of_wind",
    "2m_dewpoint_temperature",
    "2m_temperature",
    "land_sea_mask",
    "mean_sea_level_pressure",
    "sea_ice_cover",
    "sea_surface_temperature",
    "skin_temperature",
    "snow_depth",
    "soil_temperature_level_1",
    "soil_temperature_level_2",
    "soil_temperature_level_3",
    "soil_temperature_level_4",
    "surface_pressure",
    "volumetric_soil_water_layer_1",
    "volumetric_soil_water_layer_2",
    "volumetric_soil_water_layer_3",
    "volumetric_soil_water_layer_4",
];

/// Vertical kind of a reanalysis product; also names the local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKind {
    Pressure,
    Surface,
}

impl LevelKind {
    pub fn label(&self) -> &'static str {
        match self {
            LevelKind::Pressure => "pressure",
            LevelKind::Surface => "surface",
        }
    }
}

/// `era5_ungrib_{kind}_levels_YYYYMMDD.grib`; `compact_date` is `YYYYMMDD`.
pub fn reanalysis_file_name(kind: LevelKind, compact_date: &str) -> String {
    format!("era5_ungrib_{}_levels_{}.grib", kind.label(), compact_date)
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn build_request(kind: LevelKind, date: &str, area: [f64; 4]) -> RetrievalRequest {
    let (dataset, variables, levels) = match kind {
        LevelKind::Pressure => (
            PRESSURE_LEVEL_DATASET,
            &PRESSURE_VARIABLES[..],
            &PRESSURE_LEVELS_HPA[..],
        ),
        LevelKind::Surface => (SINGLE_LEVEL_DATASET, &SURFACE_VARIABLES[..], &NO_LEVELS[..]),
    };

    RetrievalRequest {
        dataset: dataset.to_string(),
        date: date.to_string(),
        variables: owned(variables),
        levels: owned(levels),
        times: owned(&SYNOPTIC_TIMES),
        area,
    }
}

/// Pulls every reanalysis file a run needs into one directory.
pub struct ReanalysisDownloader<'a, C: ReanalysisClient> {
    client: &'a C,
    download_dir: PathBuf,
}

impl<'a, C: ReanalysisClient> ReanalysisDownloader<'a, C> {
    pub fn new(client: &'a C, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub async fn download(
        &self,
        period: &RunPeriod,
        center: &DomainCenter,
        outer: &OuterDomainSpec,
    ) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.download_dir)?;
        let bbox = compute_bounding_box(center, outer)?;
        let area = bbox.as_area();
        tracing::info!(?area, domain = %center.id, "downloading reanalysis data");

        let mut files = Vec::new();
        for date in period.retrieval_dates() {
            tracing::info!("⬇️ Downloading data for {}", date);
            for kind in [LevelKind::Pressure, LevelKind::Surface] {
                let request = build_request(kind, &date, area);
                let target = self
                    .download_dir
                    .join(reanalysis_file_name(kind, &date.replace('-', "")));
                let path = self.client.fetch(&request, &target).await.map_err(|e| match e {
                    PipelineError::DataUnavailable { .. } => e,
                    other => PipelineError::DataUnavailable {
                        date: date.clone(),
                        reason: format!("{} levels: {}", kind.label(), other),
                    },
                })?;
                files.push(path);
            }
            tracing::info!("✅ Completed data download for {}", date);
        }

        Ok(files)
    }
}
