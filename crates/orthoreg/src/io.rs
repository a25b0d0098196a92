//! JSON configuration and report helpers for registration runs.

use std::{
    fs,
    path::{Path, PathBuf},
};

use orthoreg_core::GeoTransform;
use serde::{Deserialize, Serialize};

use crate::params::RegistrationParams;
use crate::pipeline::RegistrationOutcome;
use crate::{GeoReferencePolicy, RegisterError};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid parameter `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// On-disk run configuration. Every field is optional; missing parameters
/// keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Default location of the JSON run report.
    pub report_path: Option<String>,
    pub params: RegistrationParams,
}

impl RegistrationConfig {
    /// Load a JSON config from disk and validate its parameters.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.params.validate()?;
        Ok(cfg)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the report path, if any.
    pub fn report_path(&self) -> Option<PathBuf> {
        self.report_path.as_ref().map(PathBuf::from)
    }
}

/// Wall-clock time spent per stage, in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimingsMs {
    pub read: u64,
    pub register: u64,
    pub write: u64,
    pub total: u64,
}

/// Machine-readable summary of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationReport {
    pub source_path: String,
    pub target_path: String,
    pub output_path: String,
    #[serde(default)]
    pub source_features: Option<usize>,
    #[serde(default)]
    pub target_features: Option<usize>,
    #[serde(default)]
    pub matches: Option<usize>,
    #[serde(default)]
    pub inliers: Option<usize>,
    #[serde(default)]
    pub iterations: Option<usize>,
    /// Row-major source → target pixel homography.
    #[serde(default)]
    pub homography: Option<[[f64; 3]; 3]>,
    #[serde(default)]
    pub geo_transform: Option<GeoTransform>,
    #[serde(default)]
    pub crs: Option<String>,
    pub geo_policy: GeoReferencePolicy,
    #[serde(default)]
    pub timings_ms: TimingsMs,
    #[serde(default)]
    pub error: Option<String>,
}

impl RegistrationReport {
    /// Base report naming the inputs of a run.
    pub fn new(
        source: &Path,
        target: &Path,
        output: &Path,
        geo_policy: GeoReferencePolicy,
    ) -> Self {
        Self {
            source_path: source.to_string_lossy().into_owned(),
            target_path: target.to_string_lossy().into_owned(),
            output_path: output.to_string_lossy().into_owned(),
            source_features: None,
            target_features: None,
            matches: None,
            inliers: None,
            iterations: None,
            homography: None,
            geo_transform: None,
            crs: None,
            geo_policy,
            timings_ms: TimingsMs::default(),
            error: None,
        }
    }

    /// Populate report fields from a successful registration.
    pub fn set_outcome(&mut self, outcome: &RegistrationOutcome) {
        self.source_features = Some(outcome.source_features);
        self.target_features = Some(outcome.target_features);
        self.matches = Some(outcome.matches);
        self.inliers = Some(outcome.inliers);
        self.iterations = Some(outcome.iterations);
        self.homography = Some(outcome.homography.to_array());
        self.geo_transform = Some(outcome.raster.geo_transform());
        self.crs = Some(outcome.raster.crs().to_string());
        self.error = None;
    }

    /// Record a registration error.
    pub fn set_error(&mut self, err: &RegisterError) {
        self.error = Some(err.to_string());
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
