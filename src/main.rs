//! `smcp`: command-line front end for SMCP-IV readers over USB HID.
//!
//! ```text
//! smcp ports
//! smcp [--port SERIAL] info
//! smcp [--port SERIAL] buzzer --tone 2 --ms 200
//! smcp [--port SERIAL] led --blue
//! smcp [--port SERIAL] discover --count 3
//! smcp [--port SERIAL] flash firmware.bin
//! ```

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use log::{debug, info, warn};

use smcp::link::hid::HidConnector;
use smcp::protocol::NfcTech;
use smcp::{Engine, EngineConfig, Handlers, Reader, Status, discovery_channel};

/// SMCP-IV reader utility
#[derive(Parser, Debug)]
#[command(name = "smcp", version, long_about = None)]
struct Args {
    /// Reader serial number (defaults to the first attached reader)
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// JSON engine configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List attached readers
    Ports,
    /// Print firmware identity as JSON
    Info,
    /// Sound the buzzer
    Buzzer {
        /// 1: 1 kHz, 2: 2 kHz, 3: 2.7 kHz, 4: 4 kHz
        #[arg(long, default_value_t = 2)]
        tone: u8,
        /// Duration in milliseconds (100 or more)
        #[arg(long, default_value_t = 100)]
        ms: u16,
    },
    /// Switch the indicator LEDs
    Led {
        #[arg(long, default_value_t = false)]
        blue: bool,
        #[arg(long, default_value_t = false)]
        red: bool,
    },
    /// Discover cards and print each record as a JSON line
    Discover {
        /// Technology mask: 16 A, 32 B, 64 F, 128 V (default: all)
        #[arg(long, default_value_t = NfcTech::ALL_MASK)]
        tech: u8,
        /// Stop after this many cards
        #[arg(long, default_value_t = 1)]
        count: usize,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    /// Download a firmware image
    Flash {
        image: PathBuf,
    },
}

fn expect_success(what: &str, status: Status) -> Result<()> {
    if status != Status::Success {
        bail!("{what} failed: {status}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    debug!("config: {:?}", config);

    let connector = Arc::new(HidConnector::new().context("initialising hidapi")?);
    let engine = Engine::new(connector, config)?;

    if let Command::Ports = args.command {
        for port in engine.ports(None)? {
            println!("{port}");
        }
        return Ok(());
    }

    let port = match args.port {
        Some(port) => port,
        None => engine
            .ports(None)?
            .into_iter()
            .next()
            .context("no SMCP reader attached")?,
    };

    let (discovery, cards) = discovery_channel(16);
    engine.set_handlers(
        Handlers::new()
            .on_discovery(discovery)
            .on_debug(|text| debug!("device: {}", text))
            .on_error(|status, payload| warn!("device error {}: {:02X?}", status, payload)),
    );

    let reader = Reader::new(engine);
    reader
        .open(&port)
        .with_context(|| format!("opening reader {port}"))?;
    info!("connected to {}", port);

    match args.command {
        Command::Ports => {}
        Command::Info => {
            let outcome = reader.device_info()?;
            let info = outcome
                .data
                .with_context(|| format!("info failed: {}", outcome.status))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Buzzer { tone, ms } => expect_success("buzzer", reader.buzzer(tone, ms)?)?,
        Command::Led { blue, red } => expect_success("led", reader.led(blue, red)?)?,
        Command::Discover {
            tech,
            count,
            timeout,
        } => {
            expect_success("discovery", reader.discovery(tech, true)?)?;
            let deadline = Instant::now() + Duration::from_secs(timeout);
            let mut seen = 0;
            while seen < count {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match cards.recv_timeout(remaining) {
                    Ok(card) => {
                        println!("{}", serde_json::to_string(&card)?);
                        seen += 1;
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        info!("discovery timed out after {} cards", seen);
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }
        Command::Flash { image } => {
            let file =
                File::open(&image).with_context(|| format!("opening {}", image.display()))?;
            let total = file.metadata()?.len();
            reader.download_firmware(file, |sent| {
                info!("flash: {}/{} bytes", sent, total);
            })?;
            info!("flash: complete, reader restarting");
        }
    }

    reader.close();
    Ok(())
}
