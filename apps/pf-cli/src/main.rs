mod config;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use nalgebra::DVector;
use pf_melt::NewtonConfig;
use pf_results::{Checkpoint, ResultsError, RunManifest, RunSummary, SnapshotStore};
use pf_sim::{OutputSchedule, RunOutcome, SimError, SimRecord, TracingObserver, run_sim};

use crate::config::{ConfigError, RunConfig, StepBoundsDef};

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Results(#[from] ResultsError),

    #[error("No checkpoint found in {dir}")]
    NoCheckpoint { dir: String },

    #[error("Checkpoint {path} holds {found} values, problem has {expected} nodes")]
    CheckpointShape {
        path: String,
        found: usize,
        expected: usize,
    },
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "pf-cli")]
#[command(about = "PhaseFlow CLI - adaptive time stepping for phase-change solves", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a run configuration
    Validate {
        /// Path to the run YAML file
        config_path: PathBuf,
    },
    /// Run a melting slab simulation
    Run {
        /// Path to the run YAML file
        config_path: PathBuf,
    },
    /// List snapshots and checkpoints in an output directory
    Snapshots {
        /// Output directory of a run
        output_dir: PathBuf,
    },
    /// Two-phase demo: run to t = 0.02, then restart from its checkpoint
    /// with stronger relaxation
    MeltPcm {
        /// Parent directory for both runs
        #[arg(short, long, default_value = "output/melt_pcm")]
        output_root: PathBuf,
    },
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Run { config_path } => cmd_run(&config_path),
        Commands::Snapshots { output_dir } => cmd_snapshots(&output_dir),
        Commands::MeltPcm { output_root } => cmd_melt_pcm(&output_root),
    }
}

fn cmd_validate(config_path: &Path) -> CliResult<()> {
    println!("Validating config: {}", config_path.display());
    let config = RunConfig::load(config_path)?;
    config.validate()?;
    println!("✓ Config is valid");
    Ok(())
}

fn cmd_run(config_path: &Path) -> CliResult<()> {
    let config = RunConfig::load(config_path)?;
    config.validate()?;
    let run_id = config_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("run")
        .to_string();
    let record = run_config(&run_id, &config)?;
    print_record(&record);
    Ok(())
}

/// Run one configuration, writing snapshots and a manifest under
/// `config.output_dir`.
fn run_config(run_id: &str, config: &RunConfig) -> CliResult<SimRecord> {
    let mut slab = config.slab()?;
    let walls = config.problem.walls;
    let mut opts = config.sim_options();

    let (initial, restarted_from) = match (&config.restart_filepath, config.restart) {
        (Some(path), true) => {
            let checkpoint: Checkpoint<DVector<f64>> = SnapshotStore::load_checkpoint(path)?;
            let expected = slab.params().nodes;
            if checkpoint.state.len() != expected {
                return Err(CliError::CheckpointShape {
                    path: path.display().to_string(),
                    found: checkpoint.state.len(),
                    expected,
                });
            }
            if checkpoint.time != opts.start_time {
                tracing::info!(
                    configured = opts.start_time,
                    checkpoint = checkpoint.time,
                    "start time taken from checkpoint"
                );
            }
            opts.start_time = checkpoint.time;
            (checkpoint.state, Some(path.display().to_string()))
        }
        _ => (
            slab.initial_state(&walls, config.problem.initial_hot_width),
            None,
        ),
    };

    let mut store = SnapshotStore::new(config.output_dir.clone())?;
    store.clear_streams()?;
    let mut manifest = RunManifest {
        run_id: run_id.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        start_time: opts.start_time,
        end_time: opts.end_time,
        restarted_from,
        summary: None,
    };
    store.save_manifest(&manifest)?;

    println!(
        "Running {} from t = {} to t = {} in {}",
        run_id,
        opts.start_time,
        opts.end_time,
        store.root().display()
    );

    let observer = TracingObserver::default();
    let (w, record) = run_sim(&mut slab, initial, &walls, &opts, &mut store, &observer)?;

    manifest.summary = Some(RunSummary::from(&record));
    store.save_manifest(&manifest)?;
    println!("  Melt front: x = {:.4}", slab.melt_front(&w));
    Ok(record)
}

fn print_record(record: &SimRecord) {
    match record.outcome {
        RunOutcome::ReachedEndTime => println!("✓ Reached end time t = {}", record.final_time),
        RunOutcome::Steady { time } => println!("✓ Steady state at t = {time}"),
        RunOutcome::Diverged { time, dt } => {
            println!("✗ Solve did not converge after t = {time} (dt = {dt:.3e})")
        }
        RunOutcome::MaxStepsReached { time } => {
            println!("✗ Step limit reached at t = {time}")
        }
    }
    println!("  Steps:          {}", record.steps);
    println!("  Solve attempts: {}", record.solve_attempts);
    println!("  Final dt:       {:.3e}", record.final_dt);
    if let Some(u) = record.last_unsteadiness {
        println!("  Unsteadiness:   {u:.3e}");
    }
    println!("  Outputs:        {:?}", record.output_times);
}

fn cmd_snapshots(output_dir: &Path) -> CliResult<()> {
    if !output_dir.is_dir() {
        println!("No output directory at {}", output_dir.display());
        return Ok(());
    }
    let store = SnapshotStore::new(output_dir.to_path_buf())?;
    match store.load_manifest() {
        Ok(manifest) => {
            println!("Run {} ({})", manifest.run_id, manifest.timestamp);
            if let Some(from) = &manifest.restarted_from {
                println!("  Restarted from: {from}");
            }
            if let Some(summary) = &manifest.summary {
                println!("  Status: {:?}", summary.status);
            }
        }
        Err(ResultsError::ManifestNotFound { .. }) => {
            println!("No manifest in {}", output_dir.display())
        }
        Err(e) => return Err(e.into()),
    }

    let solutions = store.load_solutions::<DVector<f64>>()?;
    if solutions.is_empty() {
        println!("No solution snapshots");
    } else {
        println!("Solution snapshots:");
        for snapshot in &solutions {
            println!("  t = {}", snapshot.time);
        }
    }

    let debug = store.load_debug::<DVector<f64>>()?;
    if !debug.is_empty() {
        println!("Rejected solve candidates: {}", debug.len());
    }

    let checkpoints = store.list_checkpoints()?;
    if !checkpoints.is_empty() {
        println!("Checkpoints:");
        for (time, path) in checkpoints {
            println!("  t = {time}: {}", path.display());
        }
    }
    Ok(())
}

/// Melt a PCM slab in two runs. The first applies 45% of each Newton update
/// and ends at t = 0.02; the second restarts from that checkpoint at 30%
/// and finishes at t = 0.05.
fn cmd_melt_pcm(output_root: &Path) -> CliResult<()> {
    let first_end = 0.02;
    let mut config = RunConfig {
        time_step_bounds: StepBoundsDef::Fixed(1e-3),
        start_time: 0.0,
        end_time: first_end,
        output_times: OutputSchedule::at_end(),
        stop_when_steady: true,
        steady_tolerance: pf_core::STEADY_RELATIVE_TOLERANCE,
        max_time_steps: 1_000_000,
        debug: true,
        output_dir: output_root.join("melt_pcm_0"),
        restart: false,
        restart_filepath: None,
        nlp: NewtonConfig {
            relaxation: 0.45,
            max_iterations: 40,
            rel_tol: 1e-4,
            ..NewtonConfig::default()
        },
        problem: Default::default(),
    };
    config.validate()?;

    let first = run_config("melt_pcm_0", &config)?;
    print_record(&first);

    // Restart from the latest state the first run saved.
    let first_store = SnapshotStore::new(config.output_dir.clone())?;
    let Some((restart_time, checkpoint)) = first_store.list_checkpoints()?.pop() else {
        return Err(CliError::NoCheckpoint {
            dir: first_store.root().display().to_string(),
        });
    };
    config.restart = true;
    config.restart_filepath = Some(checkpoint);
    config.start_time = restart_time;
    config.end_time = 0.05;
    config.output_dir = output_root.join("melt_pcm_1");
    config.nlp.relaxation = 0.3;
    config.validate()?;

    let second = run_config("melt_pcm_1", &config)?;
    print_record(&second);
    Ok(())
}
