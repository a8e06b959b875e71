use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use log::{debug, info};
use signcast::config::{Config, FallbackPolicy, StreamPurpose, app_name, app_version};
use signcast::media::{DeviceCapture, HostGate, SourceManager};
use signcast::pipeline::{FallbackSink, StreamCoordinator};
use signcast::transport::{Channel, RecognizeClient, WsConnector};
use std::sync::Arc;
use std::time::Duration;
use std::{panic, process};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new(app_name())
        .version(app_version())
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("server")
                .short('s')
                .long("server")
                .value_name("WS_URL")
                .help("WebSocket endpoint of the recognition service.")
                .num_args(1),
        )
        .arg(
            Arg::new("api")
                .short('a')
                .long("api")
                .value_name("HTTP_URL")
                .help("Base URL of the fallback recognition API.")
                .num_args(1),
        )
        .arg(
            Arg::new("purpose")
                .short('p')
                .long("purpose")
                .value_name("PURPOSE")
                .help("Stream purpose (chat, translation, quiz).")
                .ignore_case(true)
                .default_value("translation")
                .num_args(1),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .value_name("MILLIS")
                .help("Capture interval in milliseconds.")
                .num_args(1),
        )
        .arg(
            Arg::new("no-fallback")
                .long("no-fallback")
                .help("Disable the HTTP fallback even where it is the default.")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let purpose_raw = matches.get_one::<String>("purpose").unwrap();
    let purpose = StreamPurpose::parse(purpose_raw)
        .with_context(|| format!("unknown purpose '{purpose_raw}'"))?;

    let mut config = Config::new(purpose);
    if let Some(url) = matches.get_one::<String>("server") {
        config.ws_url = url.clone();
    }
    if let Some(url) = matches.get_one::<String>("api") {
        config.api_base = url.clone();
    }
    if let Some(raw) = matches.get_one::<String>("interval") {
        let millis: u64 = raw.parse().context("invalid --interval")?;
        config.capture_interval = Duration::from_millis(millis.max(100));
    }
    if matches.get_flag("no-fallback") {
        config.fallback = FallbackPolicy::Disabled;
    }

    // kill the main thread as soon as a secondary thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // invoke the default handler and exit the process
        orig_hook(panic_info);
        process::exit(105);
    }));

    // stop the stream gracefully when receiving SIGINT, SIGTERM, or SIGHUP
    let stop = CancellationToken::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.cancel();
        })
        .expect("Error setting Ctrl-C handler");
    }

    let channel = Channel::new(config.ws_url.clone(), config.purpose, Arc::new(WsConnector));
    let media = SourceManager::new(
        Box::new(DeviceCapture::new()),
        Box::new(HostGate),
        config.profile.clone(),
    );
    let coordinator = StreamCoordinator::new(&config, channel, media);

    if config.fallback == FallbackPolicy::HttpWhenDisconnected {
        let client = RecognizeClient::new(config.api_base.clone());
        coordinator.set_fallback_sink(Arc::new(FallbackSink::new(client, coordinator.results())));
    }

    coordinator.on_frame(|frame| debug!("frame captured ({} bytes)", frame.size()));

    info!("starting {} stream against {}", config.purpose, config.ws_url);
    coordinator.set_visible(true).await;

    stop.cancelled().await;
    info!("shutting down");
    coordinator.set_visible(false).await;
    coordinator.close();

    Ok(())
}
