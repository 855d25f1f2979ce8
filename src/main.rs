use clap::Parser;
use std::time::Duration;
use wrf_runner::config::Command;
use wrf_runner::core::namelist::NamelistStore;
use wrf_runner::utils::error::ErrorSeverity;
use wrf_runner::utils::logger;
use wrf_runner::{
    CdsClient, CdsCredentials, Cli, MetgridFileReader, PipelineError, PipelineSequencer,
    ReanalysisDownloader, RunConfig, TokioProcessRunner,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting wrf-runner");
    tracing::info!("📁 Loading run configuration from: {}", cli.config);

    let config = match RunConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load run file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    let outcome = match &cli.command {
        Command::Plan => plan(&config),
        Command::Download => download(&config).await,
        Command::Run => run(&config, cli.monitor).await,
    };

    if let Err(e) = outcome {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn print_store(title: &str, store: &NamelistStore) {
    println!("{}", title);
    for (key, value) in store.iter() {
        println!("  {} = {}", key, value);
    }
}

fn plan(config: &RunConfig) -> Result<(), PipelineError> {
    let plan = config.to_plan()?;
    let bbox = plan.bounding_box()?;
    let layouts = plan.layouts()?;

    println!("📋 Run plan for {}", plan.center.id);
    println!("  Period: {} -> {}", plan.period.start, plan.period.end);
    println!(
        "  Retrieval area [N, W, S, E]: {:?}",
        bbox.as_area()
    );
    for (level, layout) in layouts.iter().enumerate() {
        println!(
            "  d{:02}: {} x {} cells, start ({}, {}), dx {} m",
            level + 1,
            layout.e_we,
            layout.e_sn,
            layout.i_parent_start,
            layout.j_parent_start,
            layout.dx
        );
    }
    print_store("  Preprocessing namelist values:", &plan.preprocess_store(&layouts)?);
    println!("  Run directory: {}", plan.paths.run_dir.display());
    Ok(())
}

async fn download(config: &RunConfig) -> Result<(), PipelineError> {
    let plan = config.to_plan()?;
    let retrieval = config.retrieval.as_ref();
    let credentials = CdsCredentials::resolve(
        retrieval.and_then(|r| r.url.as_deref()),
        retrieval.and_then(|r| r.key.as_deref()),
    )?;
    let poll = retrieval
        .and_then(|r| r.poll_interval_seconds)
        .unwrap_or(10);
    let client = CdsClient::new(credentials).with_polling(Duration::from_secs(poll), u32::MAX);

    let files = ReanalysisDownloader::new(&client, &plan.paths.reanalysis_dir)
        .download(&plan.period, &plan.center, &plan.outer)
        .await?;
    println!("✅ Downloaded {} files into {}", files.len(), plan.paths.reanalysis_dir.display());
    Ok(())
}

async fn run(config: &RunConfig, monitor: bool) -> Result<(), PipelineError> {
    let plan = config.to_plan()?;
    let monitor_enabled = monitor || config.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 Host monitoring enabled");
    }

    let runner = TokioProcessRunner::new(config.mpi_launcher());
    let mut sequencer =
        PipelineSequencer::new(plan, runner, MetgridFileReader).with_monitoring(monitor_enabled);

    // Dropping the run future kills the running stage process.
    tokio::select! {
        result = sequencer.run() => {
            let reports = result?;
            let total: Duration = reports.iter().map(|r| r.duration).sum();
            println!("✅ Run completed: {} stages in {:?}", reports.len(), total);
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("⚠️ Interrupted; run directory must be regenerated before retrying");
            Err(PipelineError::Interrupted)
        }
    }
}
