mod config;
mod connection;
mod event;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::Config;
use connection::Connection;
use event::{Dispatcher, EnigoSink};

#[derive(Parser)]
#[command(name = "footpad-cli")]
#[command(about = "Host side of the serial foot-pad controller")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "footpad.toml")]
    config: PathBuf,
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Configure the device and handle its key events (default)
    Run,
    /// List available serial ports
    Ports,
    /// Write the default configuration file
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let loaded = Config::load(&cli.config);
            let verbose = cli.verbose || loaded.as_ref().is_ok_and(|cfg| cfg.verbose);
            init_logging(verbose)?;

            let cfg = loaded.unwrap_or_else(|err| Config::recover(&cli.config, &err));
            run(&cfg)?;
        }
        Command::Ports => {
            init_logging(cli.verbose)?;
            connection::list_ports()?;
        }
        Command::Config => {
            init_logging(cli.verbose)?;
            write_default_config(&cli.config)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber")
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    Config::default().save(path)?;
    info!("wrote default configuration to {}", path.display());
    Ok(())
}

/// Run the configured shell command, e.g. to program the device.
fn run_previous_command(cmd: &str) -> Result<()> {
    info!("running '{}'", cmd);
    let status = if cfg!(windows) {
        process::Command::new("cmd").args(["/C", cmd]).status()
    } else {
        process::Command::new("sh").args(["-c", cmd]).status()
    }
    .with_context(|| format!("failed to run '{}'", cmd))?;

    if !status.success() {
        bail!("'{}' failed with {}", cmd, status);
    }
    Ok(())
}

fn run(cfg: &Config) -> Result<()> {
    let port = cfg.resolve_port()?;
    if let Some(cmd) = cfg.previous_command_for(&port) {
        run_previous_command(&cmd)?;
    }

    let mut conn = Connection::open(&port, cfg).context("failed to open connection")?;
    let sink = EnigoSink::new()?;
    let mut dispatcher = Dispatcher::new(&cfg.key_maps, sink);

    info!("handling device events");
    loop {
        let event = conn
            .read_event()
            .context("failed to read event from device")?;
        dispatcher
            .dispatch(event)
            .context("failed to apply key event")?;
    }
}
