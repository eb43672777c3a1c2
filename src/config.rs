//! Session configuration from JSON or environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_KEYFRAME_INTERVAL, MIN_BOX_SIZE};
use crate::doc::{ItemIndex, LabelType};
use crate::input::Keymap;
use crate::notice::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    Parse { var: String, value: String },
    #[error("keyframe interval must be positive")]
    ZeroInterval,
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "E_CONFIG_PARSE",
            Self::ZeroInterval => "E_CONFIG_INTERVAL",
            Self::Read(_) => "E_CONFIG_READ",
            Self::Json(_) => "E_CONFIG_JSON",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Type of label created by a click on empty space.
    pub label_type: LabelType,
    /// Category path given to new labels.
    pub category: Vec<u32>,
    /// New labels start a track.
    pub tracking: bool,
    /// New tracks get a propagated copy on every later item.
    pub propagate_new_tracks: bool,
    /// Boxes smaller than this in either dimension are discarded.
    pub min_box_size: f64,
    /// Spacing of auto-label keyframes.
    pub keyframe_interval: u32,
    pub keymap: Keymap,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            label_type: LabelType::Box2d,
            category: Vec::new(),
            tracking: true,
            propagate_new_tracks: true,
            min_box_size: MIN_BOX_SIZE,
            keyframe_interval: DEFAULT_KEYFRAME_INTERVAL,
            keymap: Keymap::default(),
        }
    }
}

impl SessionConfig {
    /// Build config from environment variables over the defaults.
    ///
    /// Optional:
    /// - `TRACKLABEL_LABEL_TYPE`: `box2d` (default), `polygon2d` or `polyline2d`
    /// - `TRACKLABEL_TRACKING`: `true` (default) or `false`
    /// - `TRACKLABEL_PROPAGATE`: `true` (default) or `false`
    /// - `TRACKLABEL_MIN_BOX_SIZE`: default 5
    /// - `TRACKLABEL_KEYFRAME_INTERVAL`: default 5, must be positive
    ///
    /// # Errors
    ///
    /// `Parse` for malformed values, `ZeroInterval` for a zero interval.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(raw) = env_var("TRACKLABEL_LABEL_TYPE") {
            cfg.label_type = parse_label_type(&raw)?;
        }
        if let Some(raw) = env_var("TRACKLABEL_TRACKING") {
            cfg.tracking = parse_bool("TRACKLABEL_TRACKING", &raw)?;
        }
        if let Some(raw) = env_var("TRACKLABEL_PROPAGATE") {
            cfg.propagate_new_tracks = parse_bool("TRACKLABEL_PROPAGATE", &raw)?;
        }
        if let Some(raw) = env_var("TRACKLABEL_MIN_BOX_SIZE") {
            cfg.min_box_size = raw.parse().map_err(|_| parse_error("TRACKLABEL_MIN_BOX_SIZE", &raw))?;
        }
        if let Some(raw) = env_var("TRACKLABEL_KEYFRAME_INTERVAL") {
            cfg.keyframe_interval = raw.parse().map_err(|_| parse_error("TRACKLABEL_KEYFRAME_INTERVAL", &raw))?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load config from a JSON file. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// `Read`, `Json`, or `ZeroInterval`.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.keyframe_interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

/// Whether `index` falls on the auto-label keyframe grid.
///
/// A zero interval has no keyframes.
#[must_use]
pub fn is_key_frame(index: ItemIndex, interval: u32) -> bool {
    match usize::try_from(interval) {
        Ok(0) | Err(_) => false,
        Ok(interval) => index % interval == 0,
    }
}

fn env_var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

fn parse_error(var: &str, value: &str) -> ConfigError {
    ConfigError::Parse { var: var.to_string(), value: value.to_string() }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(parse_error(var, raw)),
    }
}

fn parse_label_type(raw: &str) -> Result<LabelType, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "box2d" => Ok(LabelType::Box2d),
        "polygon2d" => Ok(LabelType::Polygon2d),
        "polyline2d" => Ok(LabelType::Polyline2d),
        _ => Err(parse_error("TRACKLABEL_LABEL_TYPE", raw)),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
