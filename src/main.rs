//! diskwatch: print disk lifecycle events as they happen.
//!
//! Thin binary entry point. All logic lives in the `diskwatch-core` crate.
use clap::Parser;
use diskwatch_core::{DiskEvent, DiskEventManager, DiskEventManagerBuilder};

#[derive(Debug, Parser)]
#[command(
    name = "diskwatch",
    version,
    about = "Watch disks appear, mount, unmount and disappear"
)]
struct Cli {
    /// Only external (non-internal) disks.
    #[arg(long)]
    external: bool,

    /// Only disks attached over USB.
    #[arg(long)]
    usb: bool,

    /// Only removable media.
    #[arg(long)]
    removable: bool,

    /// Only ejectable media.
    #[arg(long)]
    ejectable: bool,

    /// Only writable media.
    #[arg(long)]
    writable: bool,

    /// Minimum media size in bytes.
    #[arg(long, value_name = "BYTES")]
    min_size: Option<u64>,

    /// Maximum media size in bytes.
    #[arg(long, value_name = "BYTES")]
    max_size: Option<u64>,

    /// Device protocol, e.g. USB, SATA, Thunderbolt.
    #[arg(long)]
    protocol: Option<String>,

    /// Filesystem kind, e.g. apfs, exfat, msdos.
    #[arg(long = "fs", value_name = "KIND")]
    volume_kind: Option<String>,

    /// Print one JSON object per event.
    #[arg(long)]
    json: bool,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn configure(&self, mut builder: DiskEventManagerBuilder) -> DiskEventManagerBuilder {
        if self.external {
            builder = builder.external_only();
        }
        if self.usb {
            builder = builder.usb_only();
        }
        if self.removable {
            builder = builder.removable_only();
        }
        if self.ejectable {
            builder = builder.ejectable_only();
        }
        if self.writable {
            builder = builder.writable_only();
        }
        if let Some(bytes) = self.min_size {
            builder = builder.min_size(bytes);
        }
        if let Some(bytes) = self.max_size {
            builder = builder.max_size(bytes);
        }
        if let Some(protocol) = &self.protocol {
            builder = builder.protocol(protocol.as_str());
        }
        if let Some(kind) = &self.volume_kind {
            builder = builder.volume_kind(kind.as_str());
        }
        builder
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let builder = cli.configure(DiskEventManager::builder());
    run(builder, cli.json)
}

#[cfg(target_os = "macos")]
fn run(builder: DiskEventManagerBuilder, json: bool) -> anyhow::Result<()> {
    use diskwatch_core::listener::EVENT_CHANNEL_CAPACITY;
    use diskwatch_core::{run_exit_hooks, ChannelListener};

    let (listener, events) = ChannelListener::bounded(EVENT_CHANNEL_CAPACITY);
    let manager = builder.listener(listener).build()?;

    ctrlc::set_handler(|| {
        tracing::info!("interrupted, shutting down");
        run_exit_hooks();
        std::process::exit(0);
    })?;

    manager.start()?;
    tracing::info!("diskwatch started, press Ctrl+C to stop");

    for event in events.iter() {
        println!("{}", render(&event, json)?);
    }
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn run(_builder: DiskEventManagerBuilder, _json: bool) -> anyhow::Result<()> {
    anyhow::bail!("the DiskArbitration backend is only available on macOS")
}

/// One output line for `event`.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn render(event: &DiskEvent, json: bool) -> anyhow::Result<String> {
    let now = chrono::Local::now();
    let disk = event.disk();

    if json {
        let line = serde_json::json!({
            "time": now.to_rfc3339(),
            "event": event.kind().label(),
            "disk": disk,
        });
        return Ok(serde_json::to_string(&line)?);
    }

    let mount = disk
        .volume
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_owned());
    Ok(format!(
        "{} {:<20} {:<10} {:>10}  {}",
        now.format("%H:%M:%S"),
        event.kind().label(),
        disk.bsd_name,
        disk.formatted_size(),
        mount
    ))
}
