use clap::Parser;
use dippid::{Capability, ChangeLogger, HubConfig, Mapping, SensorConfig, SensorManager, TransportConfig};
use log::{error, info};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

/// Log every capability change from the configured sensors until Ctrl-C.
#[derive(Parser, Debug)]
#[command(name = "dippid-monitor", version)]
struct Args {
    /// TOML file with `[[sensor]]` entries.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen for a single UDP sensor on this port.
    #[arg(long, default_value_t = 5700)]
    udp: u16,

    /// Bind address for `--udp`.
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn sensor_configs(args: &Args) -> dippid::Result<Vec<SensorConfig>> {
    match &args.config {
        Some(path) => Ok(HubConfig::load(path)?.sensors),
        None => Ok(vec![SensorConfig {
            name: None,
            transport: TransportConfig::Udp {
                port: args.udp,
                bind: args.bind,
            },
        }]),
    }
}

fn run(args: Args) -> dippid::Result<()> {
    let manager = SensorManager::new();
    for config in sensor_configs(&args)? {
        let sensor = manager.connect(&config)?;
        let logger = ChangeLogger::new(sensor.name());
        sensor.register(Mapping::new("monitor", Capability::ALL, logger));
        info!("monitoring {}", sensor.name());
    }
    if manager.is_empty() {
        info!("no sensors configured");
        return Ok(());
    }

    manager.install_interrupt_handler()?;
    info!("press Ctrl+C to exit");
    loop {
        std::thread::park();
    }
}

fn main() -> ExitCode {
    init_logger();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
