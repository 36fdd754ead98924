//! Configuration for a conversion run.
//!
//! Every field has a default, so an empty file (or no file at all) is a valid
//! configuration. CLI flags are applied on top of the loaded values.

use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    ReadError(String, std::io::Error),

    #[error("Failed to parse config file '{0}': {1}")]
    ParseError(String, toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidError(String),
}

fn default_true() -> bool {
    true
}

fn default_name_field() -> String {
    "NAMOBJ".to_owned()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub regions: RegionsConfig,
}

/// Which products a run writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_true")]
    pub geojson: bool,
    #[serde(default = "default_true")]
    pub shapefile: bool,
    /// Extract embedded pictures into `Extract Images/`.
    #[serde(default = "default_true")]
    pub images: bool,
    /// Write `Coordinate_Error_Log_<timestamp>.xlsx` when coordinates fail to normalize.
    #[serde(default = "default_true")]
    pub error_log: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { geojson: true, shapefile: true, images: true, error_log: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Remove data rows whose every cell is blank.
    #[serde(default = "default_true")]
    pub drop_blank_rows: bool,
    /// Accept degree-minute-second strings such as `107°18'40.74"E`.
    #[serde(default = "default_true")]
    pub parse_dms: bool,
    /// Glob patterns selecting worksheets; empty converts every sheet.
    #[serde(default)]
    pub sheets: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { drop_blank_rows: true, parse_dms: true, sheets: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionsConfig {
    /// Administrative boundary polygons (`.shp` or `.geojson`).
    #[serde(default)]
    pub boundary: Option<PathBuf>,
    /// Boundary attribute holding the region name.
    #[serde(default = "default_name_field")]
    pub name_field: String,
    /// Folder of `.qml` style documents copied next to each shapefile.
    #[serde(default)]
    pub styles: Option<PathBuf>,
}

impl Default for RegionsConfig {
    fn default() -> Self {
        Self { boundary: None, name_field: default_name_field(), styles: None }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.display().to_string(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.display().to_string(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Collects every problem and reports them together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.regions.name_field.trim().is_empty() {
            errors.push("regions.name_field must not be empty".to_owned());
        }
        if let Some(styles) = &self.regions.styles {
            if styles.exists() && !styles.is_dir() {
                errors.push(format!("regions.styles '{}' is not a folder", styles.display()));
            }
        }
        for pattern in &self.pipeline.sheets {
            if let Err(e) = glob::Pattern::new(pattern) {
                errors.push(format!("pipeline.sheets pattern '{pattern}': {e}"));
            }
        }
        if !self.output.geojson && !self.output.shapefile && !self.output.images {
            errors.push("at least one of output.geojson, output.shapefile or output.images must be enabled".to_owned());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::InvalidError(errors.join("; ")))
        }
    }
}
