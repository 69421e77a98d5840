use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::adapters::EventSink;
use crate::adapters::ItineraryModel;
use crate::contracts::ModelEvent;
use crate::contracts::ModelRequest;
use crate::contracts::WireEvent;

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid replay file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid replay line {line} in {path}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Replays a recorded answer. Useful offline and in tests; the request is
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct ScriptedModel {
    events: Vec<WireEvent>,
    pace: Duration,
}

impl ScriptedModel {
    pub fn new(events: Vec<WireEvent>) -> Self {
        Self {
            events,
            pace: Duration::ZERO,
        }
    }

    /// Pause between events, to watch the views fill in.
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// Loads `.jsonl` files line by line, anything else as a YAML list.
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let raw = fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_jsonl = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));

        let events = if is_jsonl {
            parse_jsonl(path, &raw)?
        } else {
            serde_yaml::from_str::<Vec<WireEvent>>(&raw).map_err(|source| ScriptError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };
        tracing::debug!(path = %path.display(), events = events.len(), "loaded replay file");
        Ok(Self::new(events))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn parse_jsonl(path: &Path, raw: &str) -> Result<Vec<WireEvent>, ScriptError> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| ScriptError::Json {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })
        })
        .collect()
}

impl ItineraryModel for ScriptedModel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn stream(&self, _request: ModelRequest, sink: EventSink) -> thread::JoinHandle<()> {
        let events = self.events.clone();
        let pace = self.pace;
        thread::spawn(move || {
            for event in events {
                if !pace.is_zero() {
                    thread::sleep(pace);
                }
                let event = ModelEvent::from(event);
                let terminal = event.is_terminal();
                sink(event);
                if terminal {
                    return;
                }
            }
            sink(ModelEvent::Done);
        })
    }
}
