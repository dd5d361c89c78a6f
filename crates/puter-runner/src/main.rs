//! Puter CLI.

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use puter_gateway::{AppState, GatewayServer};
use puter_host::{load_host_config, DeviceLink, DeviceManager, Response};
use puter_runner::sim::DEFAULT_TICK_MS;
use puter_runner::{RunnerError, RunnerResult, SimConfig, SimulatedDevice};
use puter_serial::{DeviceIdentity, DEFAULT_BAUD};

/// Simulate Puter devices and send them commands.
#[derive(Debug, Parser)]
#[command(name = "puter", version, about)]
struct Cli {
    /// Log filter (e.g. "info", "puter_host=debug"). Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, global = true)]
    metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a simulated device on a TCP port.
    Sim(SimArgs),
    /// Send one command and print the response.
    Send(SendArgs),
    /// List configured devices and whether they answer.
    Devices(DevicesArgs),
    /// Serve the configured devices over HTTP.
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct SimArgs {
    /// Device id reported by ping and info.
    #[arg(long, default_value = "puter_sim")]
    id: String,
    /// Firmware version reported by ping and info.
    #[arg(long, default_value = "1.0.0")]
    fw: String,
    /// Baud rate reported by info.
    #[arg(long, default_value_t = DEFAULT_BAUD)]
    baud: u32,
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// TCP port to listen on (0 picks a free port).
    #[arg(long, default_value_t = 7000)]
    port: u16,
    /// Poll interval in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TICK_MS)]
    tick_ms: u64,
}

#[derive(Debug, Args)]
struct SendArgs {
    /// Host configuration file.
    #[arg(long, conflicts_with = "address")]
    config: Option<PathBuf>,
    /// Device address (`host:port`) when no configuration is given.
    #[arg(long)]
    address: Option<String>,
    /// Device id.
    #[arg(long, default_value = "device")]
    device: String,
    /// Command name.
    #[arg(long)]
    cmd: String,
    /// Command data as a JSON object.
    #[arg(long)]
    data: Option<String>,
    /// Response timeout in milliseconds (address mode only).
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Args)]
struct DevicesArgs {
    /// Host configuration file.
    #[arg(long)]
    config: PathBuf,
    /// Ask each online device for its firmware version.
    #[arg(long)]
    identify: bool,
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Host configuration file.
    #[arg(long)]
    config: PathBuf,
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// HTTP port.
    #[arg(long, default_value_t = 8000)]
    port: u16,
    /// Device that receives the /servo commands.
    #[arg(long)]
    servo: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    puter_metrics::describe_metrics();
    if let Some(addr) = cli.metrics_addr {
        install_metrics(addr);
    }

    let result = match cli.command {
        Command::Sim(args) => run_sim(args),
        Command::Send(args) => run_send(args),
        Command::Devices(args) => run_devices(args),
        Command::Serve(args) => run_serve(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "prometheus")]
fn install_metrics(addr: SocketAddr) {
    match puter_metrics::install_prometheus(addr) {
        Ok(()) => info!("metrics: serving on http://{}/metrics", addr),
        Err(e) => warn!("metrics: failed to install exporter: {}", e),
    }
}

#[cfg(not(feature = "prometheus"))]
fn install_metrics(addr: SocketAddr) {
    warn!(
        "metrics: --metrics-addr {} ignored, built without the prometheus feature",
        addr
    );
}

fn run_sim(args: SimArgs) -> RunnerResult<ExitCode> {
    let mut config = SimConfig::new(
        DeviceIdentity::new(args.id, args.fw, args.baud),
        format!("{}:{}", args.host, args.port),
    );
    config.tick = Duration::from_millis(args.tick_ms.max(1));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let mut sim = SimulatedDevice::start(config).await?;
        let stop = sim.stop_handle();
        ctrlc::set_handler(move || {
            info!("received Ctrl-C, stopping");
            stop.store(true, Ordering::Release);
        })?;
        sim.run().await
    })?;

    Ok(ExitCode::SUCCESS)
}

fn parse_data(data: Option<&str>) -> RunnerResult<Map<String, Value>> {
    let Some(text) = data else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(RunnerError::InvalidData(format!(
            "expected a JSON object, got {}",
            other
        ))),
        Err(e) => Err(RunnerError::InvalidData(e.to_string())),
    }
}

fn run_send(args: SendArgs) -> RunnerResult<ExitCode> {
    let data = parse_data(args.data.as_deref())?;

    let response = match (&args.config, &args.address) {
        (Some(path), _) => {
            let config = load_host_config(path)?;
            let mut manager = DeviceManager::connect_all(&config);
            manager.send(&args.device, &args.cmd, data)?
        }
        (None, Some(address)) => {
            let mut link = DeviceLink::connect(&args.device, address)?;
            if let Some(ms) = args.timeout_ms {
                link = link.with_timeout(Duration::from_millis(ms));
            }
            link.request(&puter_host::Request::with_data(&args.cmd, data))?
        }
        (None, None) => {
            return Err(RunnerError::Usage(
                "either --config or --address is required".to_string(),
            ))
        }
    };

    let text = serde_json::to_string_pretty(&response.to_value())
        .map_err(|e| RunnerError::InvalidData(e.to_string()))?;
    println!("{}", text);

    Ok(match response {
        Response::Ok(_) => ExitCode::SUCCESS,
        Response::Err(_) => ExitCode::FAILURE,
    })
}

fn run_devices(args: DevicesArgs) -> RunnerResult<ExitCode> {
    let config = load_host_config(&args.config)?;
    let mut manager = DeviceManager::connect_all(&config);

    if args.identify {
        for device in manager.list_devices() {
            if !device.online {
                continue;
            }
            if let Err(e) = manager.identify(&device.id) {
                warn!("{}: identify failed: {}", device.id, e);
            }
        }
    }

    println!("{:<20} {:<22} {:<8} FW", "ID", "ADDRESS", "STATUS");
    for device in manager.list_devices() {
        println!(
            "{:<20} {:<22} {:<8} {}",
            device.id,
            device.address,
            if device.online { "online" } else { "offline" },
            device.fw.as_deref().unwrap_or("-")
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_serve(args: ServeArgs) -> RunnerResult<ExitCode> {
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| RunnerError::Usage(format!("invalid --host/--port: {}", e)))?;

    let config = load_host_config(&args.config)?;
    let manager = DeviceManager::connect_all(&config);
    let mut state = AppState::new(manager, config);
    if let Some(servo) = args.servo {
        state = state.with_servo(servo);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let shutdown = Arc::new(tokio::sync::Notify::new());
    let notify = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("received Ctrl-C, stopping");
        notify.notify_one();
    })?;

    runtime.block_on(
        GatewayServer::new(state, addr).run_until(async move { shutdown.notified().await }),
    )?;

    Ok(ExitCode::SUCCESS)
}
