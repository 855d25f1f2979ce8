#![allow(dead_code)]

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wrf_runner::core::namelist::NamelistDocument;
use wrf_runner::core::sequencer::{ExecutionSettings, RunPaths, RunPlan};
use wrf_runner::core::synthesizer::DEFAULT_GEOG_DATA_RES;
use wrf_runner::domain::model::{
    DomainCenter, MetgridMetadata, NestingSpec, OuterDomainSpec, RunPeriod,
};
use wrf_runner::domain::ports::{MetadataReader, ProcessRunner, StageCommand};
use wrf_runner::{PipelineError, Result};

pub fn template(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("templates").join(name)
}

fn touch(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A fake preprocessing/model installation plus reanalysis files in a temp dir.
pub struct Installation {
    pub root: TempDir,
    pub plan: RunPlan,
}

impl Installation {
    pub fn new(reanalysis_dates: &[&str]) -> Self {
        let root = TempDir::new().unwrap();
        let base = root.path();

        for program in ["geogrid", "ungrib", "metgrid"] {
            touch(&base.join(format!("WPS/{}.exe", program)), "#!/bin/sh\n");
        }
        touch(&base.join("WPS/geogrid/GEOGRID.TBL"), "table");
        touch(&base.join("WPS/ungrib/Variable_Tables/Vtable.ECMWF"), "vtable");
        touch(&base.join("WPS/metgrid/METGRID.TBL"), "table");

        touch(&base.join("WRF/run/namelist.input"), "stale");
        touch(&base.join("WRF/run/LANDUSE.TBL"), "landuse");
        touch(&base.join("WRF/run/real.exe"), "#!/bin/sh\n");
        touch(&base.join("WRF/run/wrf.exe"), "#!/bin/sh\n");

        for date in reanalysis_dates {
            for kind in ["pressure", "surface"] {
                touch(
                    &base.join(format!("era5/era5_ungrib_{}_levels_{}.grib", kind, date)),
                    "GRIB",
                );
            }
        }

        let plan = RunPlan {
            period: RunPeriod::parse("2024-01-01 00", "2024-01-02 12").unwrap(),
            center: DomainCenter::new("Mogadishu", 2.05, 45.32).unwrap(),
            outer: OuterDomainSpec {
                dx: 6000.0,
                dy: 6000.0,
                e_we: vec![50, 50, 50],
                e_sn: vec![50, 50, 50],
            },
            nesting: NestingSpec {
                max_dom: 2,
                parent_grid_ratio: vec![1, 3, 3],
            },
            geog_data_res: DEFAULT_GEOG_DATA_RES.to_string(),
            paths: RunPaths {
                wps_dir: base.join("WPS"),
                wrf_dir: base.join("WRF"),
                geog_dir: base.join("WPS_GEOG"),
                reanalysis_dir: base.join("era5"),
                namelist_wps_template: template("namelist.wps"),
                namelist_input_template: template("namelist.input"),
                run_dir: base.join("Run_WRF/Mogadishu"),
            },
            execution: ExecutionSettings {
                mpi: true,
                num_cores: 4,
            },
        };

        Self { root, plan }
    }

    pub fn run_dir(&self) -> &Path {
        &self.plan.paths.run_dir
    }

    pub fn read_run_file(&self, name: &str) -> String {
        fs::read_to_string(self.run_dir().join(name)).unwrap()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub program: String,
    pub parallelism: Option<usize>,
    /// `prefix` in the preprocessing namelist when the call was made.
    pub prefix: Option<String>,
    pub grib_links: usize,
}

/// Records every invocation; fails the configured program.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    pub calls: Arc<Mutex<Vec<Call>>>,
    pub fail_program: Option<String>,
}

impl ScriptedRunner {
    pub fn failing(program: &str) -> Self {
        Self {
            fail_program: Some(program.to_string()),
            ..Default::default()
        }
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.program.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &StageCommand) -> Result<()> {
        let wps = command.working_dir.join("namelist.wps");
        let prefix = NamelistDocument::load(&wps)
            .ok()
            .and_then(|doc| doc.store().first_item("prefix").ok());
        let grib_links = fs::read_dir(&command.working_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().starts_with("GRIBFILE."))
                    .count()
            })
            .unwrap_or(0);

        self.calls.lock().unwrap().push(Call {
            program: command.program.clone(),
            parallelism: command.parallelism,
            prefix,
            grib_links,
        });

        if self.fail_program.as_deref() == Some(command.program.as_str()) {
            return Err(PipelineError::ExternalProcess {
                program: command.program.clone(),
                exit_code: Some(1),
            });
        }
        Ok(())
    }
}

/// Metadata a typical reanalysis-driven interpolation run produces.
#[derive(Debug, Clone, Default)]
pub struct FixedMetadata;

impl MetadataReader for FixedMetadata {
    fn read(&self, _run_dir: &Path) -> Result<MetgridMetadata> {
        Ok(MetgridMetadata {
            num_metgrid_levels: 38,
            num_land_cat: 21,
            num_metgrid_soil_levels: 4,
        })
    }
}
