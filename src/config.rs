//! Engine configuration.

use crate::dedup::DEFAULT_TTL;
use crate::error::{ConfigError, MAX_TTL};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serializable engine settings.
///
/// ```rust
/// use caught::CaptureConfig;
///
/// let config = CaptureConfig::from_json(r#"{ "ttl_ms": 5000 }"#).unwrap();
/// assert_eq!(config.ttl().as_millis(), 5000);
/// assert!(!config.silent);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Suppression window per fingerprint, in milliseconds.
    pub ttl_ms: u64,
    /// Skip the startup banner when adapters are installed.
    pub silent: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { ttl_ms: DEFAULT_TTL.as_millis() as u64, silent: false }
    }
}

impl CaptureConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ttl(self.ttl())
    }
}

pub(crate) fn validate_ttl(ttl: Duration) -> Result<(), ConfigError> {
    if ttl.is_zero() || ttl > MAX_TTL {
        return Err(ConfigError::InvalidTtl { ttl });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_three_second_window() {
        let config = CaptureConfig::default();
        assert_eq!(config.ttl(), Duration::from_millis(3000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(CaptureConfig::from_json("{}").unwrap(), CaptureConfig::default());
    }

    #[test]
    fn rejects_zero_ttl() {
        let err = CaptureConfig::from_json(r#"{ "ttl_ms": 0 }"#).expect_err("zero ttl is invalid");
        assert!(matches!(err, ConfigError::InvalidTtl { ttl } if ttl == Duration::ZERO));
    }

    #[test]
    fn rejects_ttl_above_max() {
        let too_long = CaptureConfig { ttl_ms: MAX_TTL.as_millis() as u64 + 1, silent: true };
        assert!(matches!(too_long.validate(), Err(ConfigError::InvalidTtl { .. })));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = CaptureConfig::from_json(r#"{ "ttl": 10 }"#).expect_err("unknown field");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
