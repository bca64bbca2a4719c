use clap::{Parser, Subcommand};
use sf_app::{
    AppError, AppResult, PresentationOutcome, RunProgressEvent, RunRequest, RunServices, RunStage,
    apply_aging, resolve_domain, run_service, setup,
};
use sf_core::{EventMode, TimeWindow, run_identifier};
use sf_results::ExperimentStore;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(name = "slickflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SlickFlow CLI - Oil spill fate simulation runner", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a run configuration
    Validate {
        /// Path to the configuration file (YAML, or JSON by extension)
        config_path: PathBuf,
    },
    /// Show the resolved domain, forcing region and run timing
    Domain {
        /// Path to the configuration file (YAML, or JSON by extension)
        config_path: PathBuf,
    },
    /// Run a simulation end to end
    Run {
        /// Path to the configuration file (YAML, or JSON by extension)
        config_path: PathBuf,
    },
    /// Show the last run of an experiment
    Show {
        /// Path to the configuration file (YAML, or JSON by extension)
        config_path: PathBuf,
    },
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Configuration(e.to_string()))?;

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Domain { config_path } => cmd_domain(&config_path),
        Commands::Run { config_path } => cmd_run(&config_path, LevelFilter::from_level(level)),
        Commands::Show { config_path } => cmd_show(&config_path),
    }
}

fn cmd_validate(config_path: &Path) -> AppResult<()> {
    println!("Validating configuration: {}", config_path.display());
    let config = sf_project::load_config(config_path)?;
    let n = config.n_spill_points();
    println!("✓ Configuration is valid");
    println!("  Experiment: {}", config.experiment_root().display());
    println!(
        "  Spill points: {} ({} mode)",
        n,
        match EventMode::for_point_count(n) {
            EventMode::Combined => "combined",
            EventMode::Separate => "separate",
        }
    );
    Ok(())
}

fn cmd_domain(config_path: &Path) -> AppResult<()> {
    let config = sf_project::load_config(config_path)?;
    let domain = resolve_domain(&config);
    let timing = apply_aging(&config, &setup::configured_timing(&config)?);
    let window = TimeWindow::for_run(timing.start, timing.sim_length_h);

    println!("Domain:     {}", domain);
    println!("Region:     {}", domain.region());
    println!("Start:      {}", timing.start.format("%Y-%m-%d %H:%M"));
    println!("Length:     {} h", timing.sim_length_h);
    println!("Identifier: {}", run_identifier(&timing.start));
    println!(
        "Forcing:    {} .. {}",
        window.start.format("%Y-%m-%d %H:%M"),
        window.end.format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

fn cmd_run(config_path: &Path, console: LevelFilter) -> AppResult<()> {
    let mut request = RunRequest::from_path(config_path)?;
    request.options.console_log = Some(console.min(LevelFilter::WARN));
    println!(
        "Running simulation: {}",
        request.config.experiment_root().display()
    );

    let services = RunServices::from_config(&request.config)?;

    let mut last_emit = Instant::now();
    let mut last_stage = String::new();
    let response = run_service::ensure_run_with_progress(
        &request,
        &services,
        Some(&mut |event| {
            let stage_key = format!("{:?}{:?}", event.stage, event.solver);
            let emit_now = stage_key != last_stage || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = stage_key;
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();

    println!("✓ Simulation completed: {}", response.run_id);
    println!("  Domain: {}", response.domain);
    println!("  Events: {}", response.n_events);
    if let Some(path) = &response.dataset_path {
        println!("  Dataset: {}", path.display());
    }
    match &response.presentation {
        PresentationOutcome::Skipped => {}
        PresentationOutcome::Done => println!("  Figures written"),
        PresentationOutcome::Degraded(reason) => {
            println!("  Figures written; secondary plot failed: {}", reason)
        }
    }

    print_timing_summary(&response.timing);
    Ok(())
}

fn cmd_show(config_path: &Path) -> AppResult<()> {
    let config = sf_project::load_config(config_path)?;
    let manifest = run_service::load_run(&config)?;

    println!("Run: {}", manifest.run_id);
    println!("  Experiment: {}", manifest.experiment);
    println!("  Started:    {}", manifest.timestamp);
    println!("  Status:     {:?}", manifest.status);
    if !manifest.status.is_terminal() {
        println!("  (run did not finish; it was interrupted or is still in progress)");
    }
    println!("  Domain:     {} ({})", manifest.domain, manifest.region);
    println!("  Spill time: {}", manifest.start_time);
    println!("  Length:     {} h", manifest.sim_length_h);
    println!("  Events:     {} ({:?})", manifest.n_events, manifest.mode);

    let store = ExperimentStore::for_config(&config);
    if let Ok(dataset) = store.load_dataset() {
        println!("\nCombined dataset ({}):", dataset.units);
        println!(
            "  Grid: {} x {} ({} non-zero cells stored)",
            dataset.lat.len(),
            dataset.lon.len(),
            dataset.stored_cells()
        );
        println!("  Sources: {}", dataset.events.join(", "));
        for (t, time_h) in dataset.time_h.iter().enumerate() {
            println!("  t={:>7.2} h  total={:.4}", time_h, dataset.total_at(t));
        }
    }
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    let spinner = ['|', '/', '-', '\\'];
    let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
    let mut line = format!(
        "\r{} {}  elapsed={:.2}s",
        spinner[spin_idx],
        event.stage.label(),
        event.elapsed_wall_s
    );
    if let (RunStage::RunningSolver, Some(s)) = (event.stage, &event.solver) {
        line.push_str(&format!("  event={}/{}  phase={}", s.event + 1, s.n_events, s.phase));
    } else if let Some(msg) = &event.message {
        line.push_str(&format!("  {}", msg));
    }
    print!("{}", line);
    let _ = io::stdout().flush();
}

fn print_timing_summary(timing: &sf_app::RunTimingSummary) {
    let total = timing.total_time_s.max(1.0e-12);
    let pct = |t: f64| 100.0 * t / total;

    println!("\nTiming summary:");
    println!(
        "  Init:        {:.3}s ({:.1}%)",
        timing.init_time_s,
        pct(timing.init_time_s)
    );
    println!(
        "  Preprocess:  {:.3}s ({:.1}%)",
        timing.preprocess_time_s,
        pct(timing.preprocess_time_s)
    );
    println!(
        "  Solver:      {:.3}s ({:.1}%)",
        timing.solver_time_s,
        pct(timing.solver_time_s)
    );
    println!(
        "  Postprocess: {:.3}s ({:.1}%)",
        timing.postprocess_time_s,
        pct(timing.postprocess_time_s)
    );
    if timing.presentation_time_s > 0.0 {
        println!("  Plotting:    {:.3}s", timing.presentation_time_s);
    }
    println!("  Total:       {:.3}s", timing.total_time_s);
}
