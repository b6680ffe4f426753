// SPDX-License-Identifier: Apache-2.0

use crate::init::securityevent_exporter::SecurityEventExporterArgs;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args, Clone)]
pub struct AgentRun {
    /// Newline-delimited OTLP/JSON log requests to read. Reads stdin when absent or "-"
    #[arg(long, env = "SECEVENT_INPUT")]
    pub input: Option<PathBuf>,

    /// TOML or JSON exporter configuration file
    #[arg(long, env = "SECEVENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of pending log requests buffered between the receiver and exporter
    #[arg(long, env = "SECEVENT_CHANNEL_SIZE", default_value = "16")]
    pub channel_size: usize,

    #[command(flatten)]
    pub security_event_exporter: SecurityEventExporterArgs,
}

impl AgentRun {
    pub fn reads_stdin(&self) -> bool {
        match &self.input {
            None => true,
            Some(p) => p.as_os_str() == "-",
        }
    }
}
