use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing_subscriber::EnvFilter;

use torcs_bridge::{BridgeConfig, ControlCycle, ProcessChannel, TelemetrySnapshot};

type SharedCycle = Arc<Mutex<ControlCycle<ProcessChannel>>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Arc::new(BridgeConfig::from_env()?);
    tracing::info!(
        "observation={:?} wire={:?} action={:?} decision={:?}",
        cfg.observation,
        cfg.wire,
        cfg.action,
        cfg.decision_command
    );

    let listener = TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    tracing::info!("listening for simulator on ws://{}", cfg.bind_addr);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::info!("simulator connected from {}", peer);
                tokio::spawn(run_episode(stream, Arc::clone(&cfg)));
            }
            Err(e) => {
                tracing::warn!("accept error: {}", e);
                // small delay to avoid tight loop in case of persistent errors
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        }
    }
}

/// Fork/exec the decision process off the async workers.
async fn spawn_decision(cfg: &BridgeConfig) -> Result<ProcessChannel> {
    let command = cfg.decision_command.clone();
    let timeout = cfg.response_timeout();
    let channel = tokio::task::spawn_blocking(move || ProcessChannel::spawn(&command, timeout))
        .await
        .context("decision process setup panicked")??;
    Ok(channel)
}

/// One websocket connection is one episode.
async fn run_episode(stream: TcpStream, cfg: Arc<BridgeConfig>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!("websocket handshake failed: {}", e);
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let channel = match spawn_decision(&cfg).await {
        Ok(ch) => ch,
        Err(e) => {
            tracing::error!("{:#}", e);
            let _ = write.send(Message::Close(None)).await;
            return;
        }
    };
    let cycle: SharedCycle = Arc::new(Mutex::new(ControlCycle::from_config(channel, &cfg)));

    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("websocket read failed: {}", e);
                break;
            }
        };
        if msg.is_close() {
            break;
        }
        if !msg.is_text() {
            continue;
        }
        let snapshot: TelemetrySnapshot = match serde_json::from_str(msg.to_text().unwrap_or("")) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("skipping malformed telemetry frame: {}", e);
                continue;
            }
        };

        let worker = Arc::clone(&cycle);
        let command = match tokio::task::spawn_blocking(move || worker.lock().tick(&snapshot)).await
        {
            Ok(command) => command,
            Err(e) => {
                tracing::error!("control tick panicked: {}", e);
                break;
            }
        };
        let reply = match serde_json::to_string(&command) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("failed to encode command: {}", e);
                break;
            }
        };
        if let Err(e) = write.send(Message::Text(reply)).await {
            tracing::warn!("websocket write failed: {}", e);
            break;
        }
    }

    match tokio::task::spawn_blocking(move || cycle.lock().finish()).await {
        Ok(Ok(summary)) => {
            tracing::info!("RACED DISTANCE: {:.2}", summary.best_distance);
        }
        Ok(Err(e)) => tracing::warn!("episode teardown failed: {}", e),
        Err(e) => tracing::error!("episode teardown panicked: {}", e),
    }
}
