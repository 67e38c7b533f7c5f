//! Flip configuration system
//!
//! This crate provides configuration for the flip engine and its driver,
//! loading defaults from `flip.toml` with `FLIP_*` environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "flip.toml";

/// Errors raised while loading a config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FlipConfig {
    /// Animation defaults forwarded to the tween engine
    pub animation: AnimationConfig,
    /// Capture and fit defaults
    pub geometry: GeometryConfig,
    /// Logging settings for the driver binary
    pub log: LogConfig,
}

/// Animation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Duration of a flip in milliseconds
    pub duration_ms: f64,
    /// Named ease handed to the tween engine (engine default when unset)
    pub ease: Option<String>,
    /// Delay between consecutive elements in milliseconds
    pub stagger_ms: f64,
}

/// Geometry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeometryConfig {
    /// Capture translation only, skipping matrix decomposition
    pub simple: bool,
    /// Fit size through scale instead of width/height
    pub scale: bool,
    /// Counter-scale non-target children of scaled parents
    pub nested: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing-subscriber` filter directive (e.g. "info", "flip_scene=debug")
    pub filter: String,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 500.0,
            ease: None,
            stagger_ms: 0.0,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

fn parse_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

impl FlipConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from `flip.toml` in the current directory,
    /// or return the default configuration if it is missing or invalid
    pub fn load_or_default() -> Self {
        Self::load_from_file(CONFIG_FILE).unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        // Animation settings
        if let Ok(val) = std::env::var("FLIP_DURATION_MS") {
            if let Ok(duration) = val.parse::<f64>() {
                self.animation.duration_ms = duration.max(0.0);
            }
        }
        if let Ok(ease) = std::env::var("FLIP_EASE") {
            self.animation.ease = Some(ease).filter(|e| !e.is_empty());
        }
        if let Ok(val) = std::env::var("FLIP_STAGGER_MS") {
            if let Ok(stagger) = val.parse::<f64>() {
                self.animation.stagger_ms = stagger;
            }
        }

        // Geometry settings
        if let Ok(val) = std::env::var("FLIP_SIMPLE") {
            self.geometry.simple = parse_flag(&val);
        }
        if let Ok(val) = std::env::var("FLIP_SCALE") {
            self.geometry.scale = parse_flag(&val);
        }
        if let Ok(val) = std::env::var("FLIP_NESTED") {
            self.geometry.nested = parse_flag(&val);
        }

        // Log settings
        if let Ok(filter) = std::env::var("FLIP_LOG") {
            self.log.filter = filter;
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from flip.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}
