// SPDX-License-Identifier: Apache-2.0

use crate::bounded_channel::bounded;
use crate::crypto::init_crypto_provider;
use crate::exporters::securityevent::SecurityEventExporter;
use crate::init::args::AgentRun;
use crate::init::config::build_exporter_config;
use crate::init::wait;
use crate::receivers::otlp_json::OtlpJsonReceiver;
use opentelemetry_proto::tonic::logs::v1::ResourceLogs;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::select;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::{error, info, warn};

type InputReader = Pin<Box<dyn AsyncBufRead + Send>>;

const RECEIVER_STOP_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Agent {
    config: Box<AgentRun>,
    exporter_drain_timeout: Duration,
}

impl Agent {
    pub fn new(config: Box<AgentRun>, exporter_drain_timeout: Duration) -> Self {
        Self {
            config,
            exporter_drain_timeout,
        }
    }

    pub async fn run(self, agent_cancel: CancellationToken) -> Result<(), BoxError> {
        let config = self.config;

        info!("Starting secevent.");

        init_crypto_provider()?;

        let exporter_config = build_exporter_config(&config)?;
        let exporter = SecurityEventExporter::builder(exporter_config).build()?;

        let input = open_input(&config).await?;

        let mut receivers_task_set = JoinSet::new();
        let mut exporters_task_set = JoinSet::new();

        let receivers_cancel = CancellationToken::new();
        let exporters_cancel = CancellationToken::new();

        let (logs_tx, logs_rx) = bounded::<Vec<ResourceLogs>>(config.channel_size.max(1));

        {
            let receiver = OtlpJsonReceiver::new(input, logs_tx);
            let token = receivers_cancel.clone();
            receivers_task_set.spawn(async move { receiver.run(token).await.map(|_| ()) });
        }
        {
            let token = exporters_cancel.clone();
            exporters_task_set.spawn(async move {
                exporter.run(logs_rx, token).await;
                Ok(())
            });
        }

        let mut result = Ok(());
        select! {
            _ = agent_cancel.cancelled() => {
                info!("Agent cancellation signaled.");
            },
            e = wait::wait_for_any_task(&mut receivers_task_set) => {
                match e {
                    Ok(()) => info!("Input finished, draining exporter."),
                    Err(e) => {
                        error!(error = ?e, "Receiver failed.");
                        result = Err(e);
                    }
                }
            },
            e = wait::wait_for_any_task(&mut exporters_task_set) => {
                if let Err(e) = e {
                    return Err(e);
                }
                warn!("Unexpected early exit of exporter.");
                return Ok(());
            },
        }

        // Stopping the receiver drops its sender, which lets the exporter drain what is
        // queued and exit on its own.
        receivers_cancel.cancel();
        if let Err(e) =
            wait::wait_for_tasks_with_timeout(&mut receivers_task_set, RECEIVER_STOP_TIMEOUT).await
        {
            warn!(error = ?e, "Receiver did not stop cleanly.");
        }

        if wait::wait_for_tasks_with_timeout(&mut exporters_task_set, self.exporter_drain_timeout)
            .await
            .is_err()
        {
            warn!("Timed out draining exporter, cancelling in-flight requests.");
            exporters_cancel.cancel();
            wait::wait_for_tasks_with_timeout(&mut exporters_task_set, RECEIVER_STOP_TIMEOUT)
                .await?;
        }

        result
    }
}

async fn open_input(config: &AgentRun) -> Result<InputReader, BoxError> {
    if config.reads_stdin() {
        info!("Reading OTLP/JSON logs from stdin");
        return Ok(Box::pin(BufReader::new(tokio::io::stdin())));
    }

    // reads_stdin() covers the None case
    let path = config.input.as_deref().ok_or("no input configured")?;
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| format!("failed to open input {}: {}", path.display(), e))?;
    info!(path = %path.display(), "Reading OTLP/JSON logs from file");
    Ok(Box::pin(BufReader::new(file)))
}
