pub mod download;
pub mod geometry;
pub mod namelist;
pub mod nesting;
pub mod propagator;
pub mod sequencer;
pub mod synthesizer;

pub use crate::domain::model::{GridLayout, PipelineStage, PipelineState};
pub use crate::domain::ports::{MetadataReader, ProcessRunner, ReanalysisClient};
pub use crate::utils::error::Result;
