//! Serialcast binary.
//!
//! # Usage
//!
//! ```bash
//! # Bridge the default device to ws://localhost:2567
//! serialcast
//!
//! # Pick the device and listen address
//! serialcast --device /dev/ttyACM0 --baud 9600 --host 0.0.0.0 --port 8080
//!
//! # Show serial ports present on this machine
//! serialcast --list-ports
//! ```

use clap::Parser;
use serialcast::{init_logging, list_ports, load_config, Bridge, BUILD_DATE, VERSION};
use std::path::PathBuf;

/// Serial line to WebSocket broadcast bridge
#[derive(Parser, Debug)]
#[command(name = "serialcast")]
#[command(about = "Broadcast every line from a serial device to WebSocket clients")]
#[command(version)]
struct Args {
    /// Config file (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device path
    #[arg(short, long)]
    device: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Host to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json)?;

    if args.list_ports {
        let ports = list_ports()?;
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            match port.manufacturer {
                Some(mfg) => println!("{}\t{} ({})", port.port_name, port.description, mfg),
                None => println!("{}\t{}", port.port_name, port.description),
            }
        }
        return Ok(());
    }

    let mut config = load_config(args.config.as_deref())?;
    if let Some(device) = args.device {
        config.serial.port = device;
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("serialcast {} (built {})", VERSION, BUILD_DATE);
    tracing::info!(
        "Bridging {} at {} baud to ws://{}",
        config.serial.port,
        config.serial.baud_rate,
        config.server.listen_addr()
    );

    let bridge = Bridge::bind(config).await?;
    bridge
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
