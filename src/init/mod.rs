// SPDX-License-Identifier: Apache-2.0

pub mod agent;
pub mod args;
pub mod config;
pub mod securityevent_exporter;
pub mod wait;

mod parse;
