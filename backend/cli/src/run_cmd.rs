//! `docintake run`: the service loop over a JSON-lines transport.

use std::sync::Arc;

use anyhow::Result;
use docintake_core::InboundEvent;
use docintake_session::{spawn_reaper, sweep_interval, IntakeService};
use docintake_understanding::loader_from_config;
use docintake_workbook::sink_from_config;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::{self, ConfigSource};
use crate::transport::{write_events, WireEvent};

pub async fn run(source: &ConfigSource, raw: &Value, warm: bool) -> Result<()> {
    let config = config::prepare(raw)?;
    info!(config = %source.path().display(), "Starting docintake");

    let loader = loader_from_config(&config.inference())?;
    let sink = sink_from_config(config.workbook.as_ref())?;

    let (out_tx, out_rx) = mpsc::channel(256);
    let writer = tokio::spawn(write_events(out_rx, tokio::io::stdout()));

    let service = Arc::new(IntakeService::new(&config, loader, sink, out_tx));
    if warm {
        service.warm_up().await?;
    }
    let reaper = spawn_reaper(service.clone(), sweep_interval(service.idle_timeout()));

    let (in_tx, in_rx) = mpsc::channel(64);
    let reader = tokio::spawn(read_stdin(in_tx));

    let result = tokio::select! {
        r = service.clone().run(in_rx) => r,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted; shutting down");
            Ok(())
        }
    };

    reader.abort();
    reaper.abort();
    let _ = reaper.await;
    if let Err(e) = service.shutdown().await {
        error!(error = %e, "Failed to release the model");
    }
    // Dropping the last service handle closes the outbound channel.
    drop(service);
    writer.await??;

    result.map_err(Into::into)
}

/// Forward stdin lines as inbound events. Bad lines are logged and skipped.
async fn read_stdin(tx: mpsc::Sender<InboundEvent>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = match WireEvent::parse(line) {
            Ok(wire) => wire.into_inbound().await,
            Err(e) => Err(e),
        };
        match event {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!(error = %format!("{e:#}"), "Skipping inbound line"),
        }
    }
    info!("Input closed");
    Ok(())
}
