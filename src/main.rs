use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use uhid_gamepad::bridge::{Bridge, InputSource};
use uhid_gamepad::config::DeviceConfig;
use uhid_gamepad::descriptor::build_descriptor;
use uhid_gamepad::gamepad::{AxisUsage, InputChange};
use uhid_gamepad::uhid::{UhidFile, UhidSession};

#[derive(Parser, Debug)]
#[command(name = "uhid-gamepad", version, about = "Virtual USB HID gamepad over Linux UHID")]
struct Args {
    /// Path to a YAML device config
    #[arg(long)]
    config: Option<PathBuf>,
    /// Device name advertised to the kernel
    #[arg(long)]
    name: Option<String>,
    /// Vendor id, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_id)]
    vendor_id: Option<u16>,
    /// Product id, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_id)]
    product_id: Option<u16>,
    /// Number of buttons
    #[arg(long)]
    buttons: Option<u8>,
    /// Advertise a 2-byte rumble output report
    #[arg(long)]
    rumble: bool,
    /// Milliseconds between synthetic input changes
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,
}

fn parse_id(value: &str) -> Result<u16, String> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid id {value:?}: {e}"))
}

/// Synthetic input source sweeping the sticks and cycling through the
/// buttons, for exercising the device end to end with jstest/evtest.
struct SweepSource {
    interval: tokio::time::Interval,
    step: u64,
    button_count: u8,
}

impl SweepSource {
    fn new(period: Duration, button_count: u8) -> Self {
        Self {
            interval: tokio::time::interval(period),
            step: 0,
            button_count,
        }
    }

    fn button(&self, step: u64) -> u8 {
        ((step / 4) % self.button_count as u64) as u8 + 1
    }
}

impl InputSource for SweepSource {
    async fn next_change(&mut self) -> Option<InputChange> {
        self.interval.tick().await;
        let step = self.step;
        self.step = self.step.wrapping_add(1);
        let phase = step as f64 / 16.0;
        Some(match step % 4 {
            0 => InputChange::Axis {
                usage: AxisUsage::X,
                value: (phase.sin() * 32000.0) as i32,
            },
            1 => InputChange::Axis {
                usage: AxisUsage::Y,
                value: (phase.cos() * 32000.0) as i32,
            },
            2 if self.button_count > 0 => InputChange::Button {
                number: self.button(step),
                pressed: true,
            },
            _ if self.button_count > 0 => InputChange::Button {
                number: self.button(step),
                pressed: false,
            },
            _ => InputChange::Reset,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let log_level = match env::var("LOG_LEVEL") {
        Ok(value) => value,
        Err(_) => "info".to_string(),
    };
    env::set_var("RUST_LOG", log_level);
    env_logger::init();
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    log::info!("Starting uhid-gamepad v{}", VERSION);

    let args = Args::parse();
    let mut config = match args.config.as_ref() {
        Some(path) => DeviceConfig::from_yaml_file(path)?,
        None => DeviceConfig::default(),
    };
    if let Some(name) = args.name {
        config.identity.name = name;
    }
    if let Some(vendor_id) = args.vendor_id {
        config.identity.vendor_id = vendor_id;
    }
    if let Some(product_id) = args.product_id {
        config.identity.product_id = product_id;
    }
    if let Some(buttons) = args.buttons {
        config.layout.button_count = buttons;
    }
    if args.rumble {
        config.layout.rumble = true;
    }

    let descriptor = build_descriptor(&config.layout)?;
    let io = UhidFile::open()?;
    let session = UhidSession::create(io, &config.identity, &descriptor)?;
    log::info!(
        "created {} ({:04x}:{:04x}), {} buttons, {} axes",
        config.identity.name,
        config.identity.vendor_id,
        config.identity.product_id,
        config.layout.button_count,
        config.layout.axes.len(),
    );

    // Setup CTRL+C handler
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Unable to listen for shutdown signal: {e}");
        }
        log::info!("Shutting down");
        token.cancel();
    });

    // Log rumble reports coming back from consumers.
    let (output_tx, mut output_rx) = mpsc::channel(8);
    tokio::spawn(async move {
        while let Some(output) = output_rx.recv().await {
            log::info!("rumble: {output:?}");
        }
    });

    let source = SweepSource::new(
        Duration::from_millis(args.interval_ms),
        config.layout.button_count,
    );
    let bridge =
        Bridge::new(session, source, config.layout, shutdown).with_output_reports(output_tx);
    bridge.run().await?;

    log::info!("uhid-gamepad stopped");
    Ok(())
}
