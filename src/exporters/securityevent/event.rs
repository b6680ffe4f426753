// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_SEVERITY: &str = "severity";
pub const FIELD_SEVERITY_NUMBER: &str = "severity_number";
pub const FIELD_TRACE_ID: &str = "trace_id";
pub const FIELD_SPAN_ID: &str = "span_id";
pub const FIELD_MESSAGE: &str = "message";

pub const RESOURCE_PREFIX: &str = "resource.";
pub const ATTRIBUTES_PREFIX: &str = "attributes.";

/// Flat key/value record produced from a single log record. Keys are kept in
/// sorted order so that encoding the same event twice yields the same bytes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SecurityEvent {
    fields: BTreeMap<String, Value>,
}

impl SecurityEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a field, replacing any earlier value under the same key.
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Events accumulated during one call to the exporter, delivered as a unit.
#[derive(Debug, Default)]
pub struct EventBatch {
    events: Vec<SecurityEvent>,
}

impl EventBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&mut self, event: SecurityEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[SecurityEvent] {
        &self.events
    }

    /// Encode as a JSON array of flat objects.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.events)
    }
}
