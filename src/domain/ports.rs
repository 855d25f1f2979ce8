use crate::domain::model::{MetgridMetadata, RetrievalRequest};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// An external executable invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Process count handed to the MPI launcher; `None` runs serially.
    pub parallelism: Option<usize>,
}

impl StageCommand {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            parallelism: None,
        }
    }

    pub fn with_parallelism(mut self, parallelism: Option<usize>) -> Self {
        self.parallelism = parallelism;
        self
    }
}

/// Runs one blocking unit of external work. Non-zero exit is an error.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &StageCommand) -> Result<()>;
}

/// Fetches one gridded reanalysis product into `target`.
#[async_trait]
pub trait ReanalysisClient: Send + Sync {
    async fn fetch(&self, request: &RetrievalRequest, target: &Path) -> Result<PathBuf>;
}

/// Reads the dimension sizes the model namelist needs from interpolation output.
pub trait MetadataReader: Send + Sync {
    fn read(&self, run_dir: &Path) -> Result<MetgridMetadata>;
}
