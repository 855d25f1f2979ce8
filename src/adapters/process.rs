use crate::domain::ports::{ProcessRunner, StageCommand};
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

pub const DEFAULT_MPI_LAUNCHER: &str = "mpirun";

/// Spawns stage executables with tokio; parallel stages go through an MPI launcher.
#[derive(Debug, Clone)]
pub struct TokioProcessRunner {
    launcher: String,
}

impl TokioProcessRunner {
    pub fn new(launcher: impl Into<String>) -> Self {
        Self {
            launcher: launcher.into(),
        }
    }

    /// Program and arguments actually executed for `command`.
    pub fn argv(&self, command: &StageCommand) -> (String, Vec<String>) {
        match command.parallelism {
            Some(n) => {
                let mut args = vec!["-np".to_string(), n.to_string(), command.program.clone()];
                args.extend(command.args.iter().cloned());
                (self.launcher.clone(), args)
            }
            None => (command.program.clone(), command.args.clone()),
        }
    }
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_MPI_LAUNCHER)
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: &StageCommand) -> Result<()> {
        let (program, args) = self.argv(command);
        tracing::debug!(
            %program,
            ?args,
            cwd = %command.working_dir.display(),
            "spawning stage process"
        );

        let status = Command::new(&program)
            .args(&args)
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(PipelineError::ExternalProcess {
                program: command.program.clone(),
                exit_code: status.code(),
            })
        }
    }
}
