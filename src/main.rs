//! XBee sender CLI
//!
//! Opens the local XBee module and sends "Hello Xbee" to a remote module
//! every period until interrupted with Ctrl-C.

use std::io::Write;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use xbee_sender::{
    ApiMode, CancelToken, LogObserver, PeriodicSender, SenderConfig, SerialPortLink, XBeeError,
};

const BANNER: &str = r"
    +----------------------------------------------+
    |       Xbee Data Sender Receiver Example      |
    +----------------------------------------------+
    ";

/// Periodically send a fixed message to a remote XBee module
#[derive(Parser, Debug)]
#[command(name = "xbee-sender", version, about)]
struct Args {
    /// COM port
    #[arg(short = 'c', value_name = "PORT")]
    port: Option<String>,

    /// COM speed
    #[arg(short = 's', value_name = "BAUD")]
    speed: Option<u32>,

    /// Remote Xbee MAC address
    #[arg(short = 'r', value_name = "ADDRESS")]
    remote: Option<String>,

    /// Period in seconds
    #[arg(short = 't', value_name = "SECONDS")]
    period: Option<u64>,

    /// Broadcast (accepted, currently ignored)
    #[arg(
        short = 'b',
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    broadcast: Option<String>,

    /// JSON configuration file, command-line flags take precedence
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Use escaped API framing (API mode 2)
    #[arg(long)]
    escaped: bool,

    /// Milliseconds to wait for a transmit status
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL", default_value = "debug")]
    log_level: String,
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] - {} : {} - {}",
                chrono::Local::now().format("%m-%d-%Y %I:%M:%S"),
                record.level(),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();
}

/// Truthiness of a `-b` value, anything but an explicit false counts
fn broadcast_requested(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

/// Process exit status for an error raised while starting the sender
fn startup_exit_code(err: &XBeeError) -> i32 {
    match err {
        // an unreachable adapter ends the demo without an error status
        XBeeError::Open(_) => 0,
        _ => 1,
    }
}

fn build_config(args: &Args) -> Result<SenderConfig> {
    let mut config = match &args.config {
        Some(path) => SenderConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SenderConfig::default(),
    };

    if let Some(port) = &args.port {
        config.port = port.clone();
    }
    if let Some(speed) = args.speed {
        config.baud_rate = speed;
    }
    if let Some(remote) = &args.remote {
        config.remote_address = remote.clone();
    }
    if let Some(period) = args.period {
        config.period_s = period;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.sync_timeout_ms = timeout_ms;
    }
    if let Some(value) = &args.broadcast {
        config.broadcast = broadcast_requested(value);
    }
    if args.escaped {
        config.api_mode = ApiMode::ApiEscaped;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    println!("{}", BANNER);

    let config = build_config(&args)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("failed to install Ctrl-C handler")?;

    let link = SerialPortLink::new(config.link_settings());
    let mut sender = match PeriodicSender::initialize(&config, link, Box::new(LogObserver)) {
        Ok(sender) => sender,
        Err(e) if startup_exit_code(&e) == 0 => {
            error!("{}", e);
            process::exit(0);
        }
        Err(e) => return Err(e).context("failed to start sender"),
    };

    let stats = sender.run(&cancel);
    info!(
        "Stopped after {} attempts: {} delivered, {} failed",
        stats.attempts, stats.delivered, stats.failed
    );
    Ok(())
}
