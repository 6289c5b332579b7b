//! CLI entry point for botblocks
//!
//! Loads a block program and runs it against the robot, printing the run's
//! event log as it happens. Ctrl+C requests a stop; a second Ctrl+C triggers
//! an emergency stop.
//!
//! # Usage
//!
//! ```bash
//! botblocks run my_program.json
//! botblocks run --example square --device http://192.168.4.1
//! botblocks save --example dance --slot party
//! botblocks run --slot party
//! botblocks test-connection
//! botblocks --log-format json run --example zigzag --dry-run
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use botblocks::config::BotConfig;
use botblocks::experiment::{RunController, RunOutcome};
use botblocks::hardware::{CommandChannel, HttpCommandChannel, RecordingChannel};
use botblocks::log_capture::{Event, Severity};
use botblocks::program::store::DEFAULT_SLOT;
use botblocks::program::{library, Program, ProgramStore};
use botblocks::tracing_setup::{self, OutputFormat};

#[derive(Parser)]
#[command(name = "botblocks")]
#[command(about = "Run block programs on a Wi-Fi robot", long_about = None)]
struct Cli {
    /// Configuration file (defaults to botblocks.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Robot address, overriding the configuration
    #[arg(long, global = true)]
    device: Option<String>,

    /// Log output format (pretty, compact or json), overriding the configuration
    #[arg(long, global = true)]
    log_format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program
    Run {
        #[command(flatten)]
        source: RunSource,

        /// Record commands instead of sending them to the robot
        #[arg(long)]
        dry_run: bool,
    },

    /// Drive forward and backward briefly to check the robot responds
    TestConnection,

    /// List the built-in example programs
    Examples,

    /// Save a program to a named slot
    Save {
        #[command(flatten)]
        source: SaveSource,

        /// Slot to save into
        #[arg(long, default_value = DEFAULT_SLOT)]
        slot: String,
    },

    /// List saved program slots
    Slots,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct RunSource {
    /// Program JSON file
    file: Option<PathBuf>,

    /// Built-in example name
    #[arg(long)]
    example: Option<String>,

    /// Saved slot name
    #[arg(long)]
    slot: Option<String>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SaveSource {
    /// Program JSON file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Built-in example name
    #[arg(long)]
    example: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref(), cli.device.as_deref())?;
    if let Some(format) = cli.log_format {
        config.application.log_format = format;
    }
    tracing_setup::init_from_config(&config).map_err(anyhow::Error::msg)?;
    let store = ProgramStore::from_config(&config.storage);

    match cli.command {
        Commands::Run { source, dry_run } => {
            let program = load_program(&source, &store)?;
            run_program(&config, &program, dry_run).await
        }
        Commands::TestConnection => test_connection(&config).await,
        Commands::Examples => {
            println!("📚 Example programs:");
            for name in library::names() {
                let program = library::get(name)?;
                println!("   {:<8} {} blocks", name, program.node_count());
            }
            Ok(())
        }
        Commands::Save { source, slot } => {
            let program = match (&source.file, &source.example) {
                (Some(path), _) => read_program_file(path)?,
                (None, Some(name)) => library::get(name)?,
                (None, None) => anyhow::bail!("Nothing to save"),
            };
            let path = store.save(&slot, &program)?;
            println!("💾 Saved to '{}' ({})", slot, path.display());
            Ok(())
        }
        Commands::Slots => {
            let slots = store.list()?;
            if slots.is_empty() {
                println!("No saved programs in {}", store.dir().display());
            }
            for slot in slots {
                println!("   {slot}");
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>, device: Option<&str>) -> Result<BotConfig> {
    let mut config = match path {
        Some(path) => BotConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => BotConfig::load().context("Failed to load configuration")?,
    };

    if let Some(address) = device {
        config.device.address = address.trim().to_string();
        config.validate()?;
    }
    Ok(config)
}

fn load_program(source: &RunSource, store: &ProgramStore) -> Result<Program> {
    if let Some(path) = &source.file {
        return read_program_file(path);
    }
    if let Some(name) = &source.example {
        return Ok(library::get(name)?);
    }
    if let Some(slot) = &source.slot {
        return Ok(store.load(slot)?);
    }
    anyhow::bail!("No program given")
}

fn read_program_file(path: &Path) -> Result<Program> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read program {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid program {}", path.display()))
}

fn command_channel(config: &BotConfig, dry_run: bool) -> Result<Arc<dyn CommandChannel>> {
    if dry_run {
        return Ok(Arc::new(RecordingChannel::with_settle_delay(
            config.device.settle_delay(),
        )));
    }
    Ok(Arc::new(HttpCommandChannel::new(&config.device)?))
}

async fn run_program(config: &BotConfig, program: &Program, dry_run: bool) -> Result<()> {
    if program.is_empty() {
        println!("⚠️  Program has no blocks, nothing to run");
        return Ok(());
    }

    let channel = command_channel(config, dry_run)?;
    let controller = RunController::from_config(channel, config);
    println!(
        "🤖 Robot at {}{}",
        controller.device_address().await,
        if dry_run { " (dry run)" } else { "" }
    );

    let report = supervise(&controller, controller.run(program)).await;

    match report.outcome {
        RunOutcome::Completed if report.node_errors == 0 => {}
        RunOutcome::Completed => println!("⚠️  {} block(s) failed", report.node_errors),
        RunOutcome::Stopped => println!("⏹️  Run stopped early"),
        RunOutcome::AlreadyRunning => println!("⏳ A program is already running"),
    }
    Ok(())
}

async fn test_connection(config: &BotConfig) -> Result<()> {
    let channel = command_channel(config, false)?;
    let controller = RunController::from_config(channel, config);
    println!("📡 Testing {}", controller.device_address().await);

    supervise(&controller, controller.test_connection()).await;
    Ok(())
}

/// Drive `work` to completion while printing events and handling Ctrl+C.
async fn supervise<F: Future>(controller: &RunController, work: F) -> F::Output {
    let mut events = controller.events().subscribe();
    let mut interrupts = 0u32;
    tokio::pin!(work);

    let output = loop {
        tokio::select! {
            output = &mut work => break output,
            event = events.recv() => match event {
                Ok(event) => render(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event output fell behind"),
                Err(RecvError::Closed) => {}
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Could not listen for Ctrl+C");
                    continue;
                }
                interrupts += 1;
                debug!(interrupts, "Interrupt received");
                if interrupts == 1 {
                    controller.stop().await;
                } else {
                    controller.emergency_stop().await;
                }
            }
        }
    };

    while let Ok(event) = events.try_recv() {
        render(&event);
    }
    output
}

fn render(event: &Event) {
    let icon = match event.severity {
        Severity::Info => "  ",
        Severity::Success => "✅",
        Severity::Warning => "⚠️ ",
        Severity::Error => "❌",
    };
    println!("{icon} {event}");
}
