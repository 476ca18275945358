//! Graph configuration (graph.toml)
//!
//! ```toml
//! name = "auv"
//! initial_tick = 0
//! tick_duration = "00:00:01"
//! epoch = "2024-03-01T00:00:00Z"
//! events_log = "logs/graph.jsonl"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tg_clock::{parse_date, parse_duration, Tick, TickClock};

use crate::error::GraphError;

/// Top-level graph configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Graph name, used in logs and error messages.
    #[serde(default = "default_name")]
    pub name: String,

    /// Provisional tick before the first commit.
    #[serde(default)]
    pub initial_tick: Tick,

    /// Real-time length of one tick, as "HH:MM:SS[.f]" or seconds.
    #[serde(default = "default_tick_duration")]
    pub tick_duration: String,

    /// Calendar date of tick 0 (defaults to the Unix epoch).
    #[serde(default)]
    pub epoch: Option<String>,

    /// Log every delivered observation at info level.
    #[serde(default)]
    pub verbose: bool,

    /// Append graph events as JSONL to this file.
    #[serde(default)]
    pub events_log: Option<PathBuf>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            initial_tick: 0,
            tick_duration: default_tick_duration(),
            epoch: None,
            verbose: false,
            events_log: None,
        }
    }
}

// Serde default functions
fn default_name() -> String {
    "tickgraph".to_string()
}

fn default_tick_duration() -> String {
    "00:00:01".to_string()
}

impl GraphConfig {
    /// Load a graph configuration file.
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path).map_err(|source| GraphError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| GraphError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load the configuration, or the defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, GraphError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no graph configuration, using defaults");
            Ok(Self::default())
        }
    }

    /// Build the tick clock described by this configuration.
    pub fn clock(&self) -> Result<TickClock, GraphError> {
        let mut clock = TickClock::new(parse_duration(&self.tick_duration)?)?;
        if let Some(epoch) = &self.epoch {
            clock = clock.with_epoch(parse_date(epoch)?);
        }
        Ok(clock.starting_at(self.initial_tick))
    }
}
