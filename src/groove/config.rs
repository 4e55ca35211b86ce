// Tracker configuration
// Per-run tracking parameters and the fixed constants of the tracking algorithm

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Maximum difference (s) between IOIs that share a cluster
pub const CLUSTER_WIDTH: f64 = 0.025;

/// Shortest IOI (s) considered during induction
pub const MIN_IOI: f64 = 0.070;

/// Longest IOI (s) considered during induction
pub const MAX_IOI: f64 = 2.500;

/// Shortest beat period (s) returned by induction (200 BPM)
pub const MIN_IBI: f64 = 0.300;

/// Longest beat period (s) returned by induction (60 BPM)
pub const MAX_IBI: f64 = 1.000;

/// Number of tempo hypotheses kept by induction
pub const TOP_N: usize = 10;

/// Deviation (s) from a predicted beat above which an accepting agent forks
pub const INNER_MARGIN: f64 = 0.040;

/// Weight of the timing error in the phase score of an accepted beat
pub const CONF_FACTOR: f64 = 0.5;

/// Reactiveness/inertia balance of tempo adaptation
/// The beat period moves by err / CORRECTION_FACTOR on each accepted beat
pub const CORRECTION_FACTOR: f64 = 50.0;

/// Tempo threshold (s) under which two agents may be duplicates
pub const DEFAULT_BI: f64 = 0.02;

/// Phase threshold (s) under which two agents may be duplicates
pub const DEFAULT_BT: f64 = 0.04;

/// Events before this time (s) may spawn a new phase for an existing tempo
pub const LATE_PHASE_WINDOW: f64 = 5.0;

/// Errors raised while loading or validating tracker parameters
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid tracker parameters: {0}")]
    Invalid(String),
}

/// Parameters of a single tracking run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerParams {
    /// Acceptance window before a predicted beat, as a fraction of the beat period
    pub pre_margin_factor: f64,

    /// Acceptance window after a predicted beat, as a fraction of the beat period
    pub post_margin_factor: f64,

    /// Maximum tempo drift from the initial hypothesis, as a fraction
    pub max_change: f64,

    /// Silence (s) after which an agent is discarded
    pub expiry_time: f64,

    /// Events later than this time (s) are not tracked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<f64>,

    /// Rank agents by mean instead of summed salience
    /// Summed salience favours faster tempi (lower metrical levels)
    pub use_average_salience: bool,
}

impl Default for TrackerParams {
    fn default() -> Self {
        TrackerParams {
            pre_margin_factor: 0.15,
            post_margin_factor: 0.30,
            max_change: 0.20,
            expiry_time: 10.0,
            stop_time: None,
            use_average_salience: false,
        }
    }
}

impl TrackerParams {
    /// Check the parameters describe a usable tracking run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pre_margin_factor >= 0.0) || !(self.post_margin_factor >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "margin factors must be non-negative (pre {}, post {})",
                self.pre_margin_factor, self.post_margin_factor
            )));
        }

        if !(self.max_change > 0.0 && self.max_change < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "max_change must be in (0, 1), got {}",
                self.max_change
            )));
        }

        if !(self.expiry_time > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "expiry_time must be positive, got {}",
                self.expiry_time
            )));
        }

        Ok(())
    }

    /// Serialize parameters to JSON bytes
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Deserialize and validate parameters from JSON bytes
    /// Missing fields take their default values
    pub fn from_json_bytes(data: &[u8]) -> Result<Self, ConfigError> {
        let params: TrackerParams = serde_json::from_slice(data)?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read(path)?;
        Self::from_json_bytes(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let params = TrackerParams::default();

        assert_eq!(params.pre_margin_factor, 0.15);
        assert_eq!(params.post_margin_factor, 0.30);
        assert_eq!(params.max_change, 0.20);
        assert_eq!(params.expiry_time, 10.0);
        assert!(params.stop_time.is_none());
        assert!(!params.use_average_salience);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params = TrackerParams::from_json_bytes(br#"{ "expiry_time": 4.0 }"#).unwrap();

        assert_eq!(params.expiry_time, 4.0);
        assert_eq!(params.pre_margin_factor, 0.15);
    }

    #[test]
    fn test_invalid_max_change_rejected() {
        let result = TrackerParams::from_json_bytes(br#"{ "max_change": 1.5 }"#);

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_negative_margin_rejected() {
        let params = TrackerParams {
            pre_margin_factor: -0.1,
            ..Default::default()
        };

        assert!(params.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        let result = TrackerParams::from_json_bytes(b"{ not json");

        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tracker.json");

        let params = TrackerParams {
            stop_time: Some(30.0),
            use_average_salience: true,
            ..Default::default()
        };
        std::fs::write(&path, params.to_json_bytes().unwrap()).unwrap();

        let loaded = TrackerParams::load(&path).unwrap();
        assert_eq!(loaded, params);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = TrackerParams::load(&temp_dir.path().join("missing.json"));

        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
