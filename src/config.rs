//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione del convertitore.
//!
//! ## Parametri di configurazione:
//! - `ffmpeg_path` / `ffprobe_path`: percorsi espliciti dei tool (default: None = ricerca automatica)
//! - `tools_dir`: directory dei tool inclusi nell'applicazione (default: None = accanto all'eseguibile)
//! - `poll_interval_ms`: intervallo di lettura del log (default: 80)
//! - `output_suffix`: suffisso del file di output suggerito (default: "_waba")
//! - `json_output`: eventi JSON su stdout invece del log testuale (default: false)
//!
//! ## Caricamento:
//! - `--config <file>` oppure `<config_dir>/waba-convert/config.json`
//! - File mancante = valori di default
//! - I flag della CLI sovrascrivono i valori del file
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     poll_interval_ms: 250,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the converter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Explicit ffmpeg binary
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe binary
    pub ffprobe_path: Option<PathBuf>,
    /// Directory holding bundled tools
    pub tools_dir: Option<PathBuf>,
    /// How often the display drains the log, in milliseconds
    pub poll_interval_ms: u64,
    /// Appended to the input stem when no output path is given
    pub output_suffix: String,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            tools_dir: None,
            poll_interval_ms: 80,
            output_suffix: "_waba".to_string(),
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("Poll interval must be greater than 0"));
        }

        if self.output_suffix.is_empty() {
            return Err(anyhow::anyhow!("Output suffix must not be empty"));
        }

        for (name, path) in [("ffmpeg", &self.ffmpeg_path), ("ffprobe", &self.ffprobe_path)] {
            if let Some(path) = path {
                if !path.is_file() {
                    return Err(anyhow::anyhow!(
                        "Configured {} path does not exist: {}",
                        name,
                        path.display()
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `<config_dir>/waba-convert/config.json`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("waba-convert").join("config.json"))
    }

    /// Load configuration from file; a missing file yields the defaults
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
