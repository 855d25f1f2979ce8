// Adapters layer: concrete implementations of the domain ports and the
// filesystem plumbing around the run directory.

pub mod cds;
pub mod metgrid;
pub mod process;
pub mod staging;

pub use cds::{CdsClient, CdsCredentials};
pub use metgrid::MetgridFileReader;
pub use process::TokioProcessRunner;
