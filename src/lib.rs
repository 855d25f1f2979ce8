pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::Cli;
pub use config::RunConfig;

pub use adapters::{CdsClient, CdsCredentials, MetgridFileReader, TokioProcessRunner};
pub use core::{
    download::ReanalysisDownloader,
    sequencer::{PipelineSequencer, RunPlan, StageReport},
};
pub use utils::error::{PipelineError, Result};
