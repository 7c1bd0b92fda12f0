//! evsd - Extended View System daemon
//!
//! Hosts the camera arbitration service over a mock camera HAL, with a
//! demo viewer client that answers presentation requests and an optional
//! gear-signal simulator.
//!
//! Usage:
//!   evsd [OPTIONS] [config.toml]
//!
//! Options:
//!   --simulate  Toggle the reverse gear on an interval to drive the
//!               automatic rearview flow
//!
//! If no config file is provided, built-in defaults are used.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use evs_core::{ActivityPresenter, CallerId, ServiceType, SessionToken, StreamSignal};
use evs_service::testing::{MockCameraHal, StaticVerifier};
use evs_service::{EvsConfig, EvsService, StreamConsumer, StreamEvent};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Caller id the daemon treats as the privileged system viewer
const SYSTEM_UI_UID: CallerId = 1000;

/// Parsed command-line arguments
struct Args {
    /// Service config file (TOML)
    config_path: Option<String>,
    /// Drive the rearview flow with simulated gear changes
    simulate: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut result = Args {
        config_path: None,
        simulate: false,
    };

    for arg in &args {
        match arg.as_str() {
            "--simulate" | "-s" => {
                result.simulate = true;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                // Positional argument = config file
                result.config_path = Some(arg.to_string());
            }
            _ => {
                tracing::warn!("Unknown argument: {}", arg);
            }
        }
    }

    result
}

fn print_help() {
    eprintln!(
        r#"evsd - Extended View System daemon

Usage: evsd [OPTIONS] [config.toml]

Options:
  -s, --simulate  Toggle the reverse gear on an interval to drive the
                  automatic rearview flow
  -h, --help      Print this help message

Examples:
  # Run with defaults
  evsd

  # Run with a config file and the gear simulator
  evsd --simulate config.toml
"#
    );
}

/// Presenter that hands viewer launch requests to the demo viewer task
struct ChannelPresenter {
    tx: mpsc::UnboundedSender<(ServiceType, Option<SessionToken>)>,
}

impl ActivityPresenter for ChannelPresenter {
    fn present(&self, service_type: ServiceType, token: Option<SessionToken>) {
        tracing::info!(%service_type, with_token = token.is_some(), "Viewer activity requested");
        let _ = self.tx.send((service_type, token));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evsd=info,evs_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting evsd (Extended View System daemon)");

    let args = parse_args();
    let config = load_config(&args)?;

    let hal = Arc::new(MockCameraHal::new());
    let (present_tx, present_rx) = mpsc::unbounded_channel();
    let service = EvsService::new(
        hal.clone(),
        Arc::new(ChannelPresenter { tx: present_tx }),
        Arc::new(StaticVerifier::new(SYSTEM_UI_UID)),
        config,
    );
    service.init();

    // Log every committed transition
    let mut status_listener = service.register_status_listener();
    tokio::spawn(async move {
        while let Some(status) = status_listener.rx.recv().await {
            tracing::info!(
                state = %status.state,
                service_type = %status.service_type,
                "Service status changed"
            );
        }
    });

    // Demo viewer: answers presentation requests by starting a stream
    tokio::spawn(run_viewer(service.clone(), present_rx));

    // Frame source: feeds frames into the service while delivery is on
    tokio::spawn(run_frame_source(service.clone(), hal));

    if args.simulate {
        tokio::spawn(run_gear_simulator(service.clone()));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    service.shutdown();

    Ok(())
}

/// Load configuration from a TOML file, or fall back to defaults
fn load_config(args: &Args) -> anyhow::Result<EvsConfig> {
    match &args.config_path {
        Some(path) => {
            tracing::info!("Loading config from: {}", path);
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        }
        None => {
            tracing::info!("No config file provided, using defaults");
            Ok(EvsConfig::default())
        }
    }
}

/// Acts as the privileged system viewer: starts a stream for every
/// presentation request, consumes frames, and returns the buffers.
async fn run_viewer(
    service: EvsService,
    mut present_rx: mpsc::UnboundedReceiver<(ServiceType, Option<SessionToken>)>,
) {
    while let Some((service_type, token)) = present_rx.recv().await {
        let (consumer, mut signals) = StreamConsumer::new();
        if let Err(e) = service.start_video_stream(service_type, token.as_ref(), consumer) {
            tracing::warn!(error = %e, "Viewer failed to start the stream");
            continue;
        }
        tracing::info!(%service_type, "Viewer stream started");

        let mut frames: u64 = 0;
        while let Some(signal) = signals.recv().await {
            match signal {
                StreamSignal::Frame(frame) => {
                    frames += 1;
                    service.return_frame_buffer(frame.id);
                }
                StreamSignal::Event(StreamEvent::Stopped) => break,
                StreamSignal::Event(event) => {
                    tracing::debug!(?event, "Viewer stream event");
                }
            }
        }
        tracing::info!(frames, "Viewer stream ended");
    }
}

/// Emits a frame roughly every 100ms while the mock HAL is delivering
async fn run_frame_source(service: EvsService, hal: Arc<MockCameraHal>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let mut next_id: u32 = 1;

    loop {
        ticker.tick().await;
        if hal.is_streaming() {
            service.on_frame(next_id, Bytes::from_static(b"\x00\x01\x02\x03"));
            next_id = next_id.wrapping_add(1);
        }
    }
}

/// Shifts the simulated gear in and out of reverse every few seconds
async fn run_gear_simulator(service: EvsService) {
    let started = Instant::now();
    let mut reverse = false;

    loop {
        tokio::time::sleep(Duration::from_secs(5)).await;
        reverse = !reverse;
        let timestamp_ns = started.elapsed().as_nanos() as i64;
        tracing::info!(reverse, "Gear selection changed");
        service.on_external_signal(ServiceType::Rearview, reverse, timestamp_ns);
    }
}
