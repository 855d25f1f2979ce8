pub mod toml_config;

pub use toml_config::RunConfig;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "wrf-runner")]
#[command(about = "Configure and drive nested regional model runs")]
pub struct Cli {
    /// Path to the TOML run file
    #[arg(short, long, global = true, default_value = "run.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Log host resource usage after each stage
    #[arg(long, global = true)]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show derived domains and namelist values without touching the filesystem
    Plan,
    /// Download reanalysis data for the run period
    Download,
    /// Stage the run directory and execute every stage
    Run,
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["wrf-runner", "run", "--monitor", "--config", "oslo.toml"]).unwrap();
        assert!(matches!(cli.command, Command::Run));
        assert!(cli.monitor);
        assert_eq!(cli.config, "oslo.toml");

        let cli = Cli::try_parse_from(["wrf-runner", "--monitor", "plan"]).unwrap();
        assert!(matches!(cli.command, Command::Plan));
        assert!(cli.monitor);

        let cli = Cli::try_parse_from(["wrf-runner", "download"]).unwrap();
        assert!(!cli.monitor);
        assert!(!cli.verbose);
        assert_eq!(cli.config, "run.toml");
    }

    #[test]
    fn test_monitor_takes_no_value() {
        assert!(Cli::try_parse_from(["wrf-runner", "run", "--monitor", "true"]).is_err());
    }
}
