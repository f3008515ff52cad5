//! MIDI Keypad - map MIDI notes to held keyboard key combinations

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midi_keypad::config::AppConfig;
use midi_keypad::console::{self, Mode};
use midi_keypad::device::{
    self, event_queue, DeviceError, MidiInputDevice, PortInfo, PortSelector, RetryPolicy,
};
use midi_keypad::engine::{HoldMode, LearnSession, PlaybackDispatcher};
use midi_keypad::keys::{wait_for_escape, EnigoInjector, KeyInjector, KeyboardFeed, RecordingInjector};
use midi_keypad::mapping::{LoadStatus, MappingStore, MappingTable, SaveResult};
use midi_keypad::paths::AppPaths;

/// MIDI Keypad - hold keyboard shortcuts from a MIDI controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI input ports and exit
    #[arg(long)]
    list_ports: bool,

    /// MIDI input port index or name pattern
    #[arg(short, long)]
    device: Option<String>,

    /// Skip the menu: map keys or start usage directly
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Mapping file
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// How overlapping notes are handled
    #[arg(long, value_enum)]
    hold_mode: Option<HoldMode>,

    /// Log key presses instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Also write logs to stderr
    #[arg(long)]
    log_stderr: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let paths = AppPaths::detect();
    paths.ensure_directories()?;

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_logging(&args.log_level, &paths.logs_dir, args.log_stderr)?;

    info!("Starting MIDI Keypad v{}...", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.clone().unwrap_or_else(|| paths.config.clone());
    let mut config = AppConfig::load_or_default(&config_path).await?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid command line options")?;

    let ports = device::list_input_ports()?;
    if args.list_ports {
        console::print_device_list(&ports);
        return Ok(());
    }

    let port = select_port(&ports, config.midi.device.as_deref())?;

    let mut store = MappingStore::new(paths.mapping_path(&config.mapping.file));
    let load_result = store.load().await;
    if let Err(e) = &load_result {
        if !e.is_not_found() {
            warn!("{}", e);
        }
    }
    let load = LoadStatus::from_result(&load_result);

    let mode = match args.mode {
        Some(mode) => mode,
        None => {
            console::show("")?;
            console::prompt_mode(&port.name, load, store.path())?
        }
    };

    run(port, mode, store, &config, args.dry_run).await?;

    info!("MIDI Keypad shutdown complete");
    Ok(())
}

/// Open the device, optionally learn, then play back until Escape
async fn run(
    port: PortInfo,
    mode: Mode,
    mut store: MappingStore,
    config: &AppConfig,
    dry_run: bool,
) -> Result<()> {
    let (event_tx, mut event_rx) = event_queue(config.midi.queue_capacity);
    let device = match MidiInputDevice::open(&port, event_tx, config.midi.show_sysex) {
        Ok(device) => device,
        Err(e) => {
            let stage = e.stage();
            return Err(e).with_context(|| format!("MIDI In error occurred during {}", stage));
        }
    };
    let device_name = device.name().to_string();

    let mut feed = KeyboardFeed::start().context("Failed to capture keyboard input")?;
    let mut save_result = SaveResult::NotCalled;

    if mode == Mode::Map {
        let table = if config.mapping.keep_existing_on_learn {
            store.table().clone()
        } else {
            MappingTable::new()
        };

        let mut session = LearnSession::new(table);
        let result = session
            .run(&mut event_rx, feed.receiver(), |status| {
                let screen = console::render_learn_screen(&device_name, status);
                if let Err(e) = console::show(&screen) {
                    debug!("Failed to draw learn screen: {}", e);
                }
            })
            .await;
        store.replace(session.into_table());

        match result {
            Ok(()) => {
                save_result = match store.save().await {
                    Ok(()) => SaveResult::Ok,
                    Err(e) => {
                        warn!("{}", e);
                        SaveResult::Nok
                    }
                };
            }
            Err(e) => {
                warn!("Mapping aborted: {}", e);
                console::print_line(&e.to_string());
            }
        }
    }

    let injector: Arc<dyn KeyInjector> = if dry_run {
        Arc::new(RecordingInjector::logging())
    } else {
        Arc::new(EnigoInjector::spawn().context("Failed to start key injection")?)
    };

    let dispatcher = PlaybackDispatcher::new(
        Arc::new(store.table().clone()),
        injector,
        config.hold.interval(),
        config.hold.mode,
    );
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let dispatcher_task = tokio::spawn(dispatcher.run(event_rx, shutdown_rx));

    // The dispatcher is running; nothing may return early before shutdown
    let screen = console::render_usage_screen(&device_name, save_result, config.hold.mode);
    if let Err(e) = console::show(&screen) {
        debug!("Failed to draw usage screen: {}", e);
    }
    info!("Usage started with {} mappings", store.table().len());

    tokio::select! {
        result = wait_for_escape(feed.receiver()) => {
            if let Err(reason) = result {
                warn!("Keyboard input stopped: {}", reason);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    // Stop new events first so nothing restarts a hold during shutdown
    device.begin_teardown();
    let _ = shutdown_tx.send(());
    if let Err(e) = dispatcher_task.await {
        warn!("Dispatcher task failed: {}", e);
    }

    if let Err(e) = device.close(&RetryPolicy::default()) {
        warn!("{}", e);
    }
    drop(feed);

    Ok(())
}

/// Use the configured port or ask for one
fn select_port(ports: &[PortInfo], configured: Option<&str>) -> Result<PortInfo> {
    if ports.is_empty() {
        return Err(DeviceError::NoInputPorts.into());
    }

    if let Some(value) = configured {
        let port = PortSelector::parse(value).resolve(ports)?;
        info!("Using MIDI input {}: {}", port.index, port.name);
        return Ok(port.clone());
    }

    console::print_device_list(ports);
    let count = ports.iter().map(|port| port.index + 1).max().unwrap_or(0);
    loop {
        let index = console::prompt_index("Select the device index: ", count)?;
        match PortSelector::Index(index).resolve(ports) {
            Ok(port) => return Ok(port.clone()),
            Err(_) => console::print_wrong_index(),
        }
    }
}

/// Command line values win over the config file
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(device) = &args.device {
        config.midi.device = Some(device.clone());
    }
    if let Some(mapping) = &args.mapping {
        config.mapping.file = mapping.clone();
    }
    if let Some(hold_mode) = args.hold_mode {
        config.hold.mode = hold_mode;
    }
}

fn init_logging(level: &str, logs_dir: &Path, stderr: bool) -> Result<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // The terminal belongs to the status screens, so logs go to a file
    let file_appender = tracing_appender::rolling::daily(logs_dir, "midi-keypad.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(stderr_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}
