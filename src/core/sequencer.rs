//! Ordered execution of the run stages.
//!
//! Each stage finishes before the next begins. The two namelist files in the
//! run directory are the only state carried between stages and are rewritten
//! here, between stage invocations. The first failure is terminal.

use crate::adapters::staging;
use crate::core::download::{reanalysis_file_name, LevelKind};
use crate::core::geometry::compute_bounding_box;
use crate::core::namelist::{join_list, patch_file, quoted, NamelistDocument, NamelistStore};
use crate::core::nesting::align_domains;
use crate::core::propagator::propagate;
use crate::core::synthesizer::PreprocessParameters;
use crate::domain::model::{
    BoundingBox, DomainCenter, GridLayout, NestingSpec, OuterDomainSpec, PipelineStage,
    PipelineState, RunPeriod,
};
use crate::domain::ports::{MetadataReader, ProcessRunner, StageCommand};
use crate::utils::error::{PipelineError, Result};
use crate::utils::monitor::StageMonitor;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const WPS_NAMELIST: &str = "namelist.wps";
pub const INPUT_NAMELIST: &str = "namelist.input";
const WPS_PROGRAMS: [&str; 3] = ["geogrid", "ungrib", "metgrid"];
const VTABLE: &str = "ungrib/Variable_Tables/Vtable.ECMWF";

/// Installation and data locations for one run.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub wps_dir: PathBuf,
    pub wrf_dir: PathBuf,
    pub geog_dir: PathBuf,
    pub reanalysis_dir: PathBuf,
    pub namelist_wps_template: PathBuf,
    pub namelist_input_template: PathBuf,
    pub run_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    pub mpi: bool,
    pub num_cores: usize,
}

impl ExecutionSettings {
    fn integration_parallelism(&self) -> Option<usize> {
        self.mpi.then_some(self.num_cores)
    }
}

/// Everything the sequencer needs, already validated.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub period: RunPeriod,
    pub center: DomainCenter,
    pub outer: OuterDomainSpec,
    pub nesting: NestingSpec,
    pub geog_data_res: String,
    pub paths: RunPaths,
    pub execution: ExecutionSettings,
}

impl RunPlan {
    pub fn layouts(&self) -> Result<Vec<GridLayout>> {
        align_domains(&self.outer, &self.nesting)
    }

    pub fn bounding_box(&self) -> Result<BoundingBox> {
        compute_bounding_box(&self.center, &self.outer)
    }

    /// Values merged into the preprocessing namelist before grid preprocessing.
    pub fn preprocess_store(&self, layouts: &[GridLayout]) -> Result<NamelistStore> {
        let mut store = PreprocessParameters {
            period: &self.period,
            center: &self.center,
            nesting: &self.nesting,
            layouts,
            geog_data_res: &self.geog_data_res,
        }
        .synthesize()?;
        store.insert(
            "geog_data_path",
            quoted(&self.paths.geog_dir.display().to_string()),
        );
        Ok(store)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: PipelineStage,
    pub duration: Duration,
}

pub struct PipelineSequencer<R: ProcessRunner, M: MetadataReader> {
    plan: RunPlan,
    runner: R,
    metadata: M,
    state: PipelineState,
    reports: Vec<StageReport>,
    monitor: StageMonitor,
}

impl<R: ProcessRunner, M: MetadataReader> PipelineSequencer<R, M> {
    pub fn new(plan: RunPlan, runner: R, metadata: M) -> Self {
        Self {
            plan,
            runner,
            metadata,
            state: PipelineState::Pending(PipelineStage::Setup),
            reports: Vec::new(),
            monitor: StageMonitor::new(false),
        }
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = StageMonitor::new(enabled);
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn reports(&self) -> &[StageReport] {
        &self.reports
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn run_dir(&self) -> &Path {
        &self.plan.paths.run_dir
    }

    fn wps_path(&self) -> PathBuf {
        self.run_dir().join(WPS_NAMELIST)
    }

    fn input_path(&self) -> PathBuf {
        self.run_dir().join(INPUT_NAMELIST)
    }

    /// Runs every remaining stage. A finished sequencer cannot be rerun; a
    /// retry starts from a fresh sequencer and a regenerated run directory.
    pub async fn run(&mut self) -> Result<Vec<StageReport>> {
        let mut stage = match self.state {
            PipelineState::Pending(stage) => stage,
            _ => {
                return Err(PipelineError::config(
                    "pipeline already finished; start a new run to retry",
                ))
            }
        };

        loop {
            tracing::info!("▶️ Stage {} started", stage);
            let started = Instant::now();

            if let Err(e) = self.execute_stage(stage).await {
                tracing::error!("❌ Stage {} failed: {}", stage, e);
                self.state = PipelineState::Failed {
                    stage,
                    error: e.to_string(),
                };
                return Err(PipelineError::StageFailed {
                    stage,
                    source: Box::new(e),
                });
            }

            let report = StageReport {
                stage,
                duration: started.elapsed(),
            };
            tracing::info!("✅ Stage {} completed in {:?}", stage, report.duration);
            self.reports.push(report);
            self.monitor.log_stage(stage.name());

            match stage.next() {
                Some(next) => {
                    stage = next;
                    self.state = PipelineState::Pending(next);
                }
                None => {
                    self.state = PipelineState::Completed;
                    break;
                }
            }
        }

        Ok(self.reports.clone())
    }

    async fn execute_stage(&self, stage: PipelineStage) -> Result<()> {
        match stage {
            PipelineStage::Setup => self.setup(),
            PipelineStage::GridPreprocess => self.run_program("./geogrid.exe", None).await,
            PipelineStage::FieldExtractionPressure => {
                self.extract_fields(LevelKind::Pressure).await
            }
            PipelineStage::FieldExtractionSurface => self.extract_fields(LevelKind::Surface).await,
            PipelineStage::FieldInterpolation => self.run_program("./metgrid.exe", None).await,
            PipelineStage::PostInterpolationSync => self.sync_model_namelist(),
            PipelineStage::ModelInit => self.run_program("./real.exe", None).await,
            PipelineStage::Integration => {
                let parallelism = self.plan.execution.integration_parallelism();
                self.run_program("./wrf.exe", parallelism).await
            }
        }
    }

    async fn run_program(&self, program: &str, parallelism: Option<usize>) -> Result<()> {
        let command = StageCommand::new(program, self.run_dir()).with_parallelism(parallelism);
        self.runner.run(&command).await
    }

    fn setup(&self) -> Result<()> {
        // Derive first so configuration errors surface before any filesystem work.
        let layouts = self.plan.layouts()?;
        let store = self.plan.preprocess_store(&layouts)?;

        let paths = &self.plan.paths;
        std::fs::create_dir_all(&paths.run_dir)?;
        for program in WPS_PROGRAMS {
            staging::copy_dir_recursive(&paths.wps_dir.join(program), &paths.run_dir.join(program))?;
            let exe = format!("{}.exe", program);
            std::fs::copy(paths.wps_dir.join(&exe), paths.run_dir.join(&exe))?;
        }
        let copied = staging::copy_regular_files(
            &paths.wrf_dir.join("run"),
            &paths.run_dir,
            &[INPUT_NAMELIST],
        )?;
        tracing::debug!(copied, "model run files staged");

        std::fs::copy(&paths.namelist_wps_template, self.wps_path())?;
        std::fs::copy(&paths.namelist_input_template, self.input_path())?;

        let replaced = patch_file(&self.wps_path(), &self.wps_path(), &store)?;
        tracing::info!(
            domains = layouts.len(),
            replaced,
            run_dir = %paths.run_dir.display(),
            "preprocessing namelist written"
        );
        Ok(())
    }

    fn reanalysis_files(&self, kind: LevelKind) -> Result<Vec<PathBuf>> {
        self.plan
            .period
            .run_dates()
            .into_iter()
            .map(|date| {
                let file = self
                    .plan
                    .paths
                    .reanalysis_dir
                    .join(reanalysis_file_name(kind, &date));
                if file.is_file() {
                    Ok(file)
                } else {
                    Err(PipelineError::DataUnavailable {
                        date,
                        reason: format!("{} not found", file.display()),
                    })
                }
            })
            .collect()
    }

    async fn extract_fields(&self, kind: LevelKind) -> Result<()> {
        let run_dir = self.run_dir();
        let prefix = extraction_prefix(kind);

        staging::replace_symlink(&run_dir.join(VTABLE), &run_dir.join("Vtable"))?;
        staging::remove_matching(run_dir, staging::GRIB_LINK_PREFIX)?;
        let files = self.reanalysis_files(kind)?;
        staging::link_grib_files(run_dir, &files)?;
        staging::remove_matching(run_dir, prefix)?;

        let prefix_store: NamelistStore = [("prefix", quoted(prefix))].into_iter().collect();
        patch_file(&self.wps_path(), &self.wps_path(), &prefix_store)?;

        tracing::info!(level = kind.label(), files = files.len(), prefix, "extracting fields");
        self.run_program("./ungrib.exe", None).await?;
        staging::remove_matching(run_dir, staging::GRIB_LINK_PREFIX)?;

        if kind == LevelKind::Surface {
            let fg_name = join_list(
                [LevelKind::Pressure, LevelKind::Surface]
                    .iter()
                    .map(|k| quoted(extraction_prefix(*k))),
            );
            let store: NamelistStore = [("fg_name", fg_name)].into_iter().collect();
            patch_file(&self.wps_path(), &self.wps_path(), &store)?;
        }
        Ok(())
    }

    fn sync_model_namelist(&self) -> Result<()> {
        let wps = NamelistDocument::load(&self.wps_path())?.store();
        let mut input = NamelistDocument::load(&self.input_path())?;

        let template = input.store();
        let merged = propagate(&wps, &template)?;
        // Unchanged lines keep their original formatting.
        let replaced = input.apply(&merged.changed_since(&template))?;

        let meta = self.metadata.read(self.run_dir())?;
        tracing::info!(
            num_metgrid_levels = meta.num_metgrid_levels,
            num_land_cat = meta.num_land_cat,
            num_metgrid_soil_levels = meta.num_metgrid_soil_levels,
            "interpolation output metadata"
        );
        let meta_store: NamelistStore = [
            ("num_metgrid_levels", meta.num_metgrid_levels.to_string()),
            ("num_land_cat", meta.num_land_cat.to_string()),
            ("num_metgrid_soil_levels", meta.num_metgrid_soil_levels.to_string()),
        ]
        .into_iter()
        .collect();
        input.apply(&meta_store)?;
        input.save(&self.input_path())?;

        tracing::info!(replaced, "model namelist synchronized");
        Ok(())
    }
}

/// Intermediate-file prefix written by field extraction.
pub fn extraction_prefix(kind: LevelKind) -> &'static str {
    match kind {
        LevelKind::Pressure => "ERA5A",
        LevelKind::Surface => "ERA5S",
    }
}
