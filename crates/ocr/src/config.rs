use std::path::Path;

use ryoshu_extract::AmountConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::TesseractConfig;
use crate::preprocess::PreprocessConfig;
use crate::recognizer::RecognitionConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level settings, one TOML table per stage. Missing tables and keys
/// take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RyoshuConfig {
    pub preprocess: PreprocessConfig,
    pub recognition: RecognitionConfig,
    pub amounts: AmountConfig,
    pub tesseract: TesseractConfig,
}

impl RyoshuConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}
