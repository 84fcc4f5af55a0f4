//! Sink configuration.

use crate::codec::{Compression, Protocol};
use crate::event::DataTypeSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

fn default_timeout_secs() -> u64 {
    30
}

/// Where a sink sends its batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkKind {
    /// Write batches to standard output.
    Console,
    /// POST batches to an external collector.
    Http {
        /// The collector URL.
        endpoint: String,
        /// Extra request headers.
        #[serde(default)]
        headers: BTreeMap<String, String>,
        /// Request timeout in seconds.
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// Keep batches in memory.
    Memory,
}

/// A sink definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Unique sink name.
    #[validate(length(min = 1, message = "Sink name cannot be empty"))]
    pub name: String,

    /// The sink type and its options.
    #[serde(flatten)]
    pub kind: SinkKind,

    /// Wire protocol batches are encoded in.
    pub protocol: Protocol,

    /// Compression applied to batches.
    #[serde(default)]
    pub compression: Compression,

    /// Only deliver events carrying this route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,

    /// Narrows the datatypes taken from the protocol's accepted set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_types: Option<DataTypeSet>,
}

impl SinkConfig {
    /// Creates a sink definition.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: SinkKind, protocol: Protocol) -> Self {
        Self {
            name: name.into(),
            kind,
            protocol,
            compression: Compression::None,
            route: None,
            data_types: None,
        }
    }

    /// Only deliver events carrying this route.
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Sets the compression.
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Narrows the accepted datatypes.
    #[must_use]
    pub fn with_data_types(mut self, data_types: DataTypeSet) -> Self {
        self.data_types = Some(data_types);
        self
    }

    /// Returns the datatypes this sink accepts.
    ///
    /// This is the protocol's accepted set, intersected with `data_types` when
    /// one is configured.
    #[must_use]
    pub fn accepts(&self) -> DataTypeSet {
        let protocol = self.protocol.accepts();
        match self.data_types {
            Some(narrowed) => DataTypeSet::from(
                narrowed
                    .iter()
                    .filter(|data_type| protocol.contains(*data_type))
                    .collect::<Vec<_>>(),
            ),
            None => protocol,
        }
    }
}
