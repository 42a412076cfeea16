//! Sparky Screen picture frame controller
//!
//! A Rust-based service that:
//! - Cycles through a directory of animated images, one at a time
//! - Takes control events from a network socket, the keyboard or GPIO buttons
//! - Follows the media directory live as files come and go
//! - Feeds a full-screen browser viewer over WebSocket
//! - Runs as a systemd service with graceful shutdown

mod config;
mod control;
mod input;
mod media;
mod render;
mod web;

use clap::Parser;
use config::{Config, DEFAULT_CONFIG_PATH};
use control::{
    Channel, ChannelTally, ControlEvent, Controller, DisplayStateMachine, EVENT_QUEUE_DEPTH,
};
use input::{GpioButtons, InputSource, KeyboardSource};
use media::{MediaFilter, MediaLibrary};
use render::{LogSink, RenderSink, SinkKind, ViewerSink};
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use web::WebServer;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "sparky-screen")]
#[command(about = "Animated picture frame controller")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Web server port (overrides config, default: 42069)
    #[arg(long = "http-port")]
    http_port: Option<u16>,

    /// Media directory (overrides config)
    #[arg(long = "media-dir")]
    media_dir: Option<PathBuf>,

    /// Button source (overrides config)
    #[arg(long, value_enum)]
    input: Option<InputSource>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the media files that would be shown and exit
    #[arg(long)]
    scan: bool,

    /// Write the effective configuration to the config path and exit
    #[arg(long = "init-config")]
    init_config: bool,
}

/// Button source kept alive for the lifetime of the service
#[allow(dead_code)]
enum ButtonSource {
    Gpio(GpioButtons),
    Keyboard(KeyboardSource),
}

/// Using current_thread runtime: every control event is handled on one
/// task, and the Pi does not benefit from more threads
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration before logging so the config can raise verbosity
    let loaded = Config::load(&args.config);
    let verbose = args.verbose || loaded.as_ref().is_ok_and(|c| c.verbose);
    init_logging(verbose);

    tracing::info!("Starting Sparky Screen");

    let mut config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from {}: {}", args.config, e);
        tracing::info!("Using default configuration");
        Config::default()
    });

    if let Some(port) = args.http_port {
        config.web_port = port;
    }
    if let Some(dir) = args.media_dir {
        config.media_dir = dir;
    }
    if let Some(input) = args.input {
        config.input_source = input;
    }
    config.validate()?;

    // Handle one-shot commands
    if args.init_config {
        config.save(&args.config)?;
        println!("Configuration written to {}", args.config);
        return Ok(());
    }

    let filter = MediaFilter::new(&config.extensions, config.verify_format);

    if args.scan {
        let items = media::scan(&config.media_dir, &filter)?;
        for item in &items {
            println!("{}", item);
        }
        tracing::info!("{} media files in {}", items.len(), config.media_dir.display());
        return Ok(());
    }

    // Setup shutdown signal handling
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Single serialization point for every control source
    let (event_tx, event_rx) = mpsc::channel::<ControlEvent>(EVENT_QUEUE_DEPTH);
    let (rescan_tx, rescan_rx) = mpsc::channel::<()>(1);
    let (quit_tx, mut quit_rx) = mpsc::channel::<()>(1);

    let (sink, frames) = match config.render_sink {
        SinkKind::Web => {
            let (sink, frames) = ViewerSink::new();
            (Box::new(sink) as Box<dyn RenderSink + Send>, Some(frames))
        }
        SinkKind::Log => (Box::new(LogSink::new()) as Box<dyn RenderSink + Send>, None),
    };

    let machine = DisplayStateMachine::new(config.initial_power)
        .with_no_media_message(config.no_media_message());
    tracing::info!("Initial power state: {:?}", config.initial_power);

    let (controller, status) = Controller::new(machine, sink, event_rx, Some(rescan_tx));

    let mut channels = ChannelTally::new();

    // Network control socket
    let mut web_handle = None;
    if config.network_enabled {
        match WebServer::bind(config.web_port).await {
            Ok(listener) => {
                channels.up();
                let server = WebServer::new(
                    event_tx.clone(),
                    status,
                    frames,
                    config.media_dir.clone(),
                );
                let web_shutdown = shutdown_tx.subscribe();
                let web_events = event_tx.clone();
                web_handle = Some(tokio::spawn(async move {
                    if let Err(e) = server.run_with_shutdown(listener, web_shutdown).await {
                        tracing::error!("Web server error: {}", e);
                        let _ = web_events
                            .send(ControlEvent::ChannelClosed(Channel::Network))
                            .await;
                    }
                }));
            }
            Err(e) => {
                tracing::error!("Network control unavailable: {}", e);
                channels.failed(Channel::Network);
            }
        }
    }

    // Buttons
    let input_source = config.input_source.resolve();
    let buttons = match input_source {
        InputSource::Gpio => match GpioButtons::start(config.button_pins(), event_tx.clone()) {
            Ok(buttons) => Some(ButtonSource::Gpio(buttons)),
            Err(e) => {
                tracing::error!("GPIO buttons unavailable: {}", e);
                channels.failed(Channel::Gpio);
                None
            }
        },
        InputSource::Keyboard => match KeyboardSource::start(event_tx.clone(), quit_tx.clone()) {
            Ok(keyboard) => Some(ButtonSource::Keyboard(keyboard)),
            Err(e) => {
                tracing::error!("Keyboard controls unavailable: {}", e);
                channels.failed(Channel::Keyboard);
                None
            }
        },
        InputSource::None | InputSource::Auto => None,
    };
    if buttons.is_some() {
        channels.up();
    }

    // Sources that failed at startup are surfaced on the frame
    let closed = channels.finish().inspect_err(|e| e.report())?;
    for event in closed {
        let _ = event_tx.try_send(event);
    }

    // Media directory collaborator
    let library = MediaLibrary::new(&config.media_dir, filter);
    let media_events = event_tx.clone();
    let media_shutdown = shutdown_tx.subscribe();
    let media_handle = tokio::spawn(media::run(library, media_events, rescan_rx, media_shutdown));

    // SIGHUP reloads the media directory
    let reload_events = event_tx.clone();
    let reload_shutdown = shutdown_tx.subscribe();
    tokio::spawn(forward_reload_signals(reload_events, reload_shutdown));

    // Spawn controller task
    let controller_shutdown = shutdown_tx.subscribe();
    let controller_handle = tokio::spawn(controller.run(controller_shutdown));

    drop(event_tx);

    // Wait for shutdown signal
    wait_for_shutdown(&mut quit_rx).await;
    tracing::info!("Shutdown signal received");

    // Send shutdown to all tasks
    let _ = shutdown_tx.send(());

    // Wait for tasks to complete with timeout
    tokio::select! {
        _ = controller_handle => {},
        _ = tokio::time::sleep(std::time::Duration::from_secs(5)) => {
            tracing::warn!("Controller shutdown timeout");
        }
    }

    tokio::select! {
        _ = media_handle => {},
        _ = tokio::time::sleep(std::time::Duration::from_secs(5)) => {
            tracing::warn!("Media watcher shutdown timeout");
        }
    }

    if let Some(web_handle) = web_handle {
        tokio::select! {
            _ = web_handle => {},
            _ = tokio::time::sleep(std::time::Duration::from_secs(5)) => {
                tracing::warn!("Web server shutdown timeout");
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
///
/// Default level is "warn" to minimize SD card wear from log writes.
/// Use --verbose flag for "debug" level during development/troubleshooting.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("sparky_screen={}", level).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Turn SIGHUP into reload requests
async fn forward_reload_signals(
    events: mpsc::Sender<ControlEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(sighup) => sighup,
        Err(e) => {
            tracing::warn!("Failed to setup SIGHUP handler: {}", e);
            return;
        }
    };

    loop {
        tokio::select! {
            _ = sighup.recv() => {
                tracing::info!("Received SIGHUP, reloading media");
                if events.send(ControlEvent::ReloadRequested).await.is_err() {
                    break;
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT) or a quit from the keyboard
async fn wait_for_shutdown(quit: &mut mpsc::Receiver<()>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
        Some(()) = quit.recv() => {
            tracing::info!("Quit requested from keyboard");
        }
    }
}
