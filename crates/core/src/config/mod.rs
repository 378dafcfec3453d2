use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{codec::DecodeOptions, Result, UtuError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub codec: CodecConfig,
    pub synthesis: SynthesisConfig,
}

impl AppConfig {
    /// Loads a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        fs::read_to_string(path)
            .map_err(UtuError::from)
            .and_then(|text| serde_json::from_str(&text).map_err(UtuError::from))
            .map_err(|err| err.in_file(path))
    }
}

/// Settings for reading partial documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub validate_partials: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            validate_partials: true,
        }
    }
}

impl CodecConfig {
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            validate_partials: self.validate_partials,
        }
    }
}

/// Configuration specific to the synthesis subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub sample_rate: u32,
    pub gain: f64,
    pub noise_seed: u64,
    /// Longest render, in seconds, a document may ask for.
    pub max_duration: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            gain: 1.0,
            noise_seed: 1,
            max_duration: 600.0,
        }
    }
}
