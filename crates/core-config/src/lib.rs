//! Configuration loading and parsing.
//!
//! Parses `ludus.toml` (or an override path provided by the binary). Every
//! section is optional and every field carries a default, so a missing file, an
//! unreadable file, or a parse error all yield `Config::default()`. Unknown
//! fields are ignored to allow forward evolution without immediate warnings.

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "ludus.toml";
pub const APP_DIR_NAME: &str = "ludus-ide";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: Self::default_command(),
            args: Vec::new(),
        }
    }
}

impl EngineConfig {
    fn default_command() -> String {
        "ludus-engine".to_string()
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Delay between reset completion and the re-issued lexical + execution requests.
    #[serde(default = "PipelineConfig::default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Master switch for navigation auto-run. The first-activation gate applies regardless.
    #[serde(default = "PipelineConfig::default_auto_run")]
    pub auto_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: Self::default_settle_delay_ms(),
            auto_run: Self::default_auto_run(),
        }
    }
}

impl PipelineConfig {
    const fn default_settle_delay_ms() -> u64 {
        100
    }
    const fn default_auto_run() -> bool {
        true
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Directory holding the durable session file. Defaults to `<data_dir>/ludus-ide`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl SessionConfig {
    /// Resolve the durable session directory, falling back to the working directory when the
    /// platform exposes no data dir.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct UiConfig {
    #[serde(default = "UiConfig::default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: Self::default_ack_timeout_ms(),
        }
    }
}

impl UiConfig {
    const fn default_ack_timeout_ms() -> u64 {
        3000
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub source: Option<PathBuf>,
    pub file: ConfigFile, // parsed (or default) data
}

/// Best-effort config path: local working directory first, then the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        info!(target: "config", path = %path.display(), "config_absent_using_defaults");
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(
                target: "config",
                path = %path.display(),
                engine = file.engine.command.as_str(),
                settle_delay_ms = file.pipeline.settle_delay_ms,
                auto_run = file.pipeline.auto_run,
                "config_loaded"
            );
            Ok(Config {
                raw: Some(content),
                source: Some(path),
                file,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Override the engine command (CLI `--engine`), keeping configured args.
    pub fn with_engine_command(mut self, command: Option<String>) -> Self {
        if let Some(command) = command {
            self.file.engine.command = command;
        }
        self
    }
}
