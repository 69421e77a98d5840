use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub view: ViewConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    /// External program speaking JSON lines on stdout.
    #[default]
    Command,
    /// Replays a recorded event file.
    Scripted,
}

impl ModelProvider {
    pub fn label(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Scripted => "scripted",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub program: Option<String>,
    pub args: Vec<String>,
    pub script: Option<PathBuf>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ViewConfig {
    /// Time the timeline panel needs to slide before the map is resized.
    pub timeline_settle_ms: u64,
    pub show_timeline: bool,
    pub log_capacity: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            timeline_settle_ms: 300,
            show_timeline: true,
            log_capacity: 500,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: Option<PathBuf>,
}
