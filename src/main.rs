// src/main.rs
//! Telemetry Monitor - live distance and GPS telemetry from microcontrollers

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use telemetry_monitor::{
    display::{ChartSettings, TerminalDisplay},
    transport::serial,
    web::{self, AppState},
    IngestSettings, MonitorConfig, Protocol, SourceKind, TelemetryMonitor, TelemetrySource,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "telemetry-monitor", version, about = "Live distance and GPS telemetry monitor")]
struct Cli {
    /// Config file (defaults to ~/.config/telemetry-monitor/config.json)
    #[arg(long = "config", global = true)]
    config_file: Option<PathBuf>,

    /// Transport to read from
    #[arg(long, value_enum, global = true)]
    source: Option<SourceKind>,

    /// Line protocol spoken by the device
    #[arg(long, value_enum, global = true)]
    protocol: Option<Protocol>,

    /// Serial port, e.g. /dev/ttyUSB0 or COM3
    #[arg(long, global = true)]
    serial: Option<String>,

    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Device host for the TCP client
    #[arg(long, global = true)]
    tcp: Option<String>,

    #[arg(long, global = true)]
    tcp_port: Option<u16>,

    /// Address to accept device connections on
    #[arg(long, global = true)]
    listen: Option<String>,

    /// URL to poll
    #[arg(long, global = true)]
    http: Option<String>,

    #[arg(long, global = true)]
    poll_ms: Option<u64>,

    /// Regenerate this KML file on each GPS update
    #[arg(long, global = true)]
    kml: Option<PathBuf>,

    /// Web server bind address
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest telemetry and serve the live map (default)
    Serve,
    /// Ingest telemetry and draw the live terminal chart
    Plot,
    /// List available serial ports
    Ports,
    /// Check that the configured serial port opens
    Probe,
    /// Print the effective configuration
    Config {
        /// Save it as the default configuration
        #[arg(long)]
        save: bool,
    },
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<MonitorConfig> {
        let mut config = match self.config_file {
            Some(ref path) => MonitorConfig::load_from(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => MonitorConfig::load().unwrap_or_else(|e| {
                warn!("Using default configuration: {}", e);
                MonitorConfig::default()
            }),
        };

        if let Some(source) = self.source {
            config.update_source(source);
        }
        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
        if let Some(ref port) = self.serial {
            let baud = self.baud.unwrap_or(config.serial_baudrate);
            config.update_serial(port.clone(), baud);
        } else if let Some(baud) = self.baud {
            config.serial_baudrate = baud;
        }
        if let Some(ref host) = self.tcp {
            let port = self.tcp_port.unwrap_or(config.tcp_port);
            config.update_tcp(host.clone(), port);
        } else if let Some(port) = self.tcp_port {
            config.tcp_port = port;
        }
        if let Some(ref addr) = self.listen {
            config.update_listen(addr.clone());
        }
        if let Some(ref url) = self.http {
            let interval = self.poll_ms.unwrap_or(config.poll_interval_ms);
            config.update_http(url.clone(), interval);
        } else if let Some(interval) = self.poll_ms {
            config.poll_interval_ms = interval;
        }
        if let Some(ref path) = self.kml {
            config.kml_path = Some(path.clone());
        }
        if let Some(ref bind) = self.bind {
            config.web_bind = bind.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.load_config()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Plot => plot(config).await,
        Command::Ports => {
            serial::list_serial_ports()?;
            Ok(())
        }
        Command::Probe => {
            let port = config
                .serial_port
                .as_deref()
                .context("no serial port configured (use --serial)")?;
            serial::probe_serial(port, config.serial_baudrate)?;
            println!("Connected to {} at {} baud", port, config.serial_baudrate);
            Ok(())
        }
        Command::Config { save } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                config.save()?;
                println!("Saved to {}", MonitorConfig::get_config_path()?.display());
            }
            Ok(())
        }
    }
}

async fn serve(config: MonitorConfig) -> anyhow::Result<()> {
    let source = config.to_source()?;
    if source != TelemetrySource::Push && !config.protocol.carries_position() {
        warn!("Protocol {} carries no position; the map will stay empty", config.protocol);
    }

    let monitor = TelemetryMonitor::new(IngestSettings::from_config(&config));
    monitor.start(source).await?;

    let app = AppState {
        state: monitor.state(),
        kml: monitor.kml_writer(),
        safe_distance_cm: config.safe_distance_cm,
    };
    let result = web::run_server(&config.web_bind, app).await;

    monitor.stop();
    info!("Shutting down");
    result.map_err(Into::into)
}

async fn plot(config: MonitorConfig) -> anyhow::Result<()> {
    let source = config.to_source()?;
    if source == TelemetrySource::Push {
        anyhow::bail!("the push source needs the web server; use `serve`");
    }

    let monitor = TelemetryMonitor::new(IngestSettings::from_config(&config));
    monitor.start(source).await?;

    let display = TerminalDisplay::new(ChartSettings::from_config(&config), config.refresh_interval());
    let result = display.run(monitor.state(), monitor.running()).await;

    monitor.stop();
    result.map_err(Into::into)
}
