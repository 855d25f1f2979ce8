use crate::core::sequencer::{ExecutionSettings, RunPaths, RunPlan};
use crate::core::synthesizer::DEFAULT_GEOG_DATA_RES;
use crate::domain::model::{DomainCenter, NestingSpec, OuterDomainSpec, RunPeriod};
use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::{
    validate_min_len, validate_path, validate_positive_number, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A run file: one domain, one period, one installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub run: RunSection,
    pub center: DomainCenter,
    pub domain: DomainConfig,
    pub paths: PathsConfig,
    pub execution: Option<ExecutionConfig>,
    pub retrieval: Option<RetrievalConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    /// `YYYY-MM-DD HH`
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub max_dom: usize,
    pub parent_grid_ratio: Vec<u32>,
    pub dx: f64,
    pub dy: f64,
    pub e_we: Vec<u32>,
    pub e_sn: Vec<u32>,
    pub geog_data_res: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub wps_dir: String,
    pub wrf_dir: String,
    pub geog_dir: String,
    /// Defaults to `<base>/era5/<center id>`.
    pub reanalysis_dir: Option<String>,
    pub namelist_wps: String,
    pub namelist_input: String,
    /// Defaults to `<base>/Run_WRF/<center id>`.
    pub run_dir: Option<String>,
    pub base_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub mpi: Option<bool>,
    pub num_cores: Option<usize>,
    pub mpi_launcher: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub url: Option<String>,
    pub key: Option<String>,
    pub poll_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}]+)\}").expect("static pattern is valid");
        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn period(&self) -> Result<RunPeriod> {
        RunPeriod::parse(&self.run.start, &self.run.end)
    }

    pub fn outer_domain(&self) -> OuterDomainSpec {
        OuterDomainSpec {
            dx: self.domain.dx,
            dy: self.domain.dy,
            e_we: self.domain.e_we.clone(),
            e_sn: self.domain.e_sn.clone(),
        }
    }

    pub fn nesting(&self) -> NestingSpec {
        NestingSpec {
            max_dom: self.domain.max_dom,
            parent_grid_ratio: self.domain.parent_grid_ratio.clone(),
        }
    }

    fn base_dir(&self) -> PathBuf {
        PathBuf::from(self.paths.base_dir.as_deref().unwrap_or("."))
    }

    pub fn reanalysis_dir(&self) -> PathBuf {
        match &self.paths.reanalysis_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.base_dir().join("era5").join(&self.center.id),
        }
    }

    pub fn run_dir(&self) -> PathBuf {
        match &self.paths.run_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.base_dir().join("Run_WRF").join(&self.center.id),
        }
    }

    pub fn mpi_launcher(&self) -> &str {
        self.execution
            .as_ref()
            .and_then(|e| e.mpi_launcher.as_deref())
            .unwrap_or(crate::adapters::process::DEFAULT_MPI_LAUNCHER)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn execution_settings(&self) -> ExecutionSettings {
        let execution = self.execution.as_ref();
        ExecutionSettings {
            mpi: execution.and_then(|e| e.mpi).unwrap_or(true),
            num_cores: execution.and_then(|e| e.num_cores).unwrap_or(4),
        }
    }

    /// Validated plan for the sequencer.
    pub fn to_plan(&self) -> Result<RunPlan> {
        self.validate()?;
        Ok(RunPlan {
            period: self.period()?,
            center: self.center.clone(),
            outer: self.outer_domain(),
            nesting: self.nesting(),
            geog_data_res: self
                .domain
                .geog_data_res
                .clone()
                .unwrap_or_else(|| DEFAULT_GEOG_DATA_RES.to_string()),
            paths: RunPaths {
                wps_dir: PathBuf::from(&self.paths.wps_dir),
                wrf_dir: PathBuf::from(&self.paths.wrf_dir),
                geog_dir: PathBuf::from(&self.paths.geog_dir),
                reanalysis_dir: self.reanalysis_dir(),
                namelist_wps_template: PathBuf::from(&self.paths.namelist_wps),
                namelist_input_template: PathBuf::from(&self.paths.namelist_input),
                run_dir: self.run_dir(),
            },
            execution: self.execution_settings(),
        })
    }
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<()> {
        self.period()?;
        self.center.check()?;

        self.nesting().check()?;
        validate_min_len("domain.e_we", &self.domain.e_we, self.domain.max_dom)?;
        validate_min_len("domain.e_sn", &self.domain.e_sn, self.domain.max_dom)?;
        for (field, spacing) in [("domain.dx", self.domain.dx), ("domain.dy", self.domain.dy)] {
            if !(spacing > 0.0) {
                return Err(PipelineError::invalid_value(
                    field,
                    spacing.to_string(),
                    "Grid spacing must be positive",
                ));
            }
        }

        validate_path("paths.wps_dir", &self.paths.wps_dir)?;
        validate_path("paths.wrf_dir", &self.paths.wrf_dir)?;
        validate_path("paths.geog_dir", &self.paths.geog_dir)?;
        validate_path("paths.namelist_wps", &self.paths.namelist_wps)?;
        validate_path("paths.namelist_input", &self.paths.namelist_input)?;

        if let Some(execution) = &self.execution {
            if let Some(cores) = execution.num_cores {
                validate_positive_number("execution.num_cores", cores, 1)?;
            }
        }
        if let Some(url) = self.retrieval.as_ref().and_then(|r| r.url.as_deref()) {
            validate_url("retrieval.url", url)?;
        }
        Ok(())
    }
}
