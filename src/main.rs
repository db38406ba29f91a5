//! Command-line runner for FiberKit
//!
//! ```bash
//! fiberkit ports
//! fiberkit preview --project dish.json
//! fiberkit run --project dish.json --port /dev/ttyACM0 --log run.jsonl
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::{self, error::RecvError};

use fiberkit::event_bus::{event_bus, AppEvent, RunEvent};

use fiberkit::{
    build_controller, draw_rectangle, init_logging, list_ports, open_channel, plan_layer,
    render_program, AppConfig, Configuration, Mode, BUILD_DATE, VERSION,
};
use fiberkit_settings::read_project;

#[derive(Parser)]
#[command(name = "fiberkit")]
#[command(about = "Fiber deposition stage driver", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List candidate serial ports
    Ports,

    /// Print the planned geometry without touching the machine
    Preview {
        /// Project file (JSON)
        #[arg(long)]
        project: PathBuf,

        /// Settings file (JSON or TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the full command stream instead of the scan lines
        #[arg(long)]
        commands: bool,

        /// Print the plan (or command stream) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect, home and run a project to completion
    Run {
        /// Project file (JSON)
        #[arg(long)]
        project: PathBuf,

        /// Serial port, overriding the settings file
        #[arg(long)]
        port: Option<String>,

        /// Settings file (JSON or TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the run log here as JSON lines
        #[arg(long)]
        log: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs)?;
    tracing::debug!("fiberkit {} (built {})", VERSION, BUILD_DATE);

    match cli.command {
        Commands::Ports => ports(),
        Commands::Preview {
            project,
            config,
            commands,
            json,
        } => {
            let settings = load_settings(config)?;
            let parameters = load_parameters(&settings, &project)?;
            preview(&parameters, commands, json)
        }
        Commands::Run {
            project,
            port,
            config,
            log,
        } => {
            let mut settings = load_settings(config)?;
            if let Some(port) = port {
                settings.connection.port = port;
            }
            let parameters = load_parameters(&settings, &project)?;
            run(&settings, &parameters, log.as_deref())
        }
    }
}

fn load_settings(path: Option<PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from_file(&path)
            .with_context(|| format!("Could not load settings from {}", path.display())),
        None => AppConfig::load_or_default().context("Could not load settings"),
    }
}

fn load_parameters(settings: &AppConfig, project: &Path) -> Result<Configuration> {
    read_project(project, &settings.initial_configuration())
        .with_context(|| format!("Could not load project {}", project.display()))
}

fn ports() -> Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}\t{}", port.port_name, port.description);
    }
    Ok(())
}

fn preview(parameters: &Configuration, commands: bool, json: bool) -> Result<()> {
    if commands {
        let program = render_program(parameters)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&program)?);
        } else {
            for command in &program {
                println!("{}", command.text());
            }
        }
        return Ok(());
    }

    let plans = (0..parameters.layers)
        .map(|layer| plan_layer(parameters, parameters.mode, layer))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    println!("Mode: {}", parameters.mode);
    println!("Safe: {}", parameters.safe_rect());
    if parameters.mode == Mode::CustomCentered {
        println!("Rect: {}", draw_rectangle(parameters)?);
    }
    for plan in &plans {
        println!("Layer {}: {} lines", plan.layer + 1, plan.line_count());
        for sweep in &plan.sweeps {
            for line in &sweep.lines {
                let (start, end) = (line.start(), line.end());
                println!(
                    "  {:>4}  ({:.3}, {:.3}) -> ({:.3}, {:.3})",
                    line.index + 1,
                    start.x,
                    start.y,
                    end.x,
                    end.y
                );
            }
        }
    }
    Ok(())
}

fn run(settings: &AppConfig, parameters: &Configuration, log: Option<&Path>) -> Result<()> {
    let controller = build_controller(settings, parameters);
    let channel = open_channel(settings).context("Could not open serial port")?;
    controller.connect(channel)?;

    let progress = event_bus().receiver();
    controller.start()?;
    thread::spawn(move || follow_run(progress));
    let result = controller.wait();
    controller.disconnect()?;

    if let Some(path) = log {
        write_run_log(path)
            .with_context(|| format!("Could not write run log to {}", path.display()))?;
    }

    let commands = result?;
    println!("Finished: {} commands", commands);
    Ok(())
}

/// Print layer progress until the run ends
fn follow_run(mut receiver: broadcast::Receiver<AppEvent>) {
    loop {
        match receiver.blocking_recv() {
            Ok(event @ AppEvent::Run(RunEvent::LayerStarted { .. })) => {
                println!("{}", event.description());
            }
            Ok(AppEvent::Run(
                RunEvent::Finished { .. } | RunEvent::Failed { .. } | RunEvent::Cancelled,
            )) => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Progress display skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn write_run_log(path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for entry in event_bus().run_log() {
        writeln!(out, "{}", serde_json::to_string(&entry)?)?;
    }
    out.flush()?;
    Ok(())
}
