//! FarmaChat terminal client - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Initialize tracing (stderr, so logs stay out of the transcript)
//! 3. Wire the gateway, camera, attachment slot, session and idle monitor
//! 4. Run the input loop, driving the outstanding gateway reply and the idle
//!    monitor alongside stdin

mod app;
mod cli;
mod commands;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;

use farma_capture::SyntheticCamera;
use farma_chat::HttpChatGateway;
use farma_core::clock::SystemClock;
use farma_core::config::FarmaConfig;

use app::{App, Flow, ReplyFuture};
use cli::CliArgs;
use commands::Command;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = FarmaConfig::load_or_default(&config_file);
    args.apply_overrides(&mut config);

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting FarmaChat v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let gateway = HttpChatGateway::new(&config.gateway);
    tracing::info!(url = %gateway.url(), auth = config.gateway.api_key.is_some(), "Chat gateway configured");

    // No platform camera backend yet; the synthetic one renders a test pattern.
    let camera = SyntheticCamera::new();

    let mut app = App::new(&config, gateway, camera, Arc::new(SystemClock));
    app.render_new_messages();
    flush(&mut app);
    println!("(/help para ver los comandos)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut idle_check = tokio::time::interval(config.inactivity.poll_interval());
    idle_check.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // At most one gateway call is outstanding; input keeps being read meanwhile.
    let mut reply: Option<ReplyFuture> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("Input closed");
                    break;
                };
                let flow = app.handle(Command::parse(&line)).await;
                if let Some(dispatch) = app.take_dispatch() {
                    reply = Some(dispatch);
                }
                flush(&mut app);
                if flow == Flow::Quit {
                    break;
                }
            }
            result = async {
                match reply.as_mut() {
                    Some(pending) => pending.await,
                    None => std::future::pending().await,
                }
            }, if reply.is_some() => {
                reply = None;
                app.finish_turn(result);
                flush(&mut app);
            }
            _ = idle_check.tick() => {
                app.tick();
                flush(&mut app);
            }
        }
    }

    tracing::info!("FarmaChat stopped");
    Ok(())
}

fn flush<G, B>(app: &mut App<G, B>)
where
    G: farma_chat::ChatGateway + 'static,
    B: farma_capture::CameraBackend,
{
    for line in app.take_output() {
        println!("{line}");
    }
}
