//! Reassembler settings, loadable from a JSON file

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_PRIVATE_SECTION_LENGTH, MIN_LONG_SECTION_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblerConfig {
    /// Check the CRC-32 trailer of sections with `section_syntax_indicator` set
    pub validate_crc: bool,
    /// Reject packets whose header PID differs from the routing PID
    pub strict_pid_check: bool,
    /// Largest accepted `section_length`; larger declarations are malformed
    pub max_section_length: u16,
    /// Per-PID state untouched for this long is evicted by the runtime loop
    pub stale_after_secs: Option<u64>,
}

impl Default for ReassemblerConfig {
    fn default() -> Self {
        Self {
            validate_crc: true,
            strict_pid_check: true,
            max_section_length: MAX_PRIVATE_SECTION_LENGTH,
            stale_after_secs: Some(30),
        }
    }
}

impl ReassemblerConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid reassembler config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(MIN_LONG_SECTION_LENGTH..=MAX_PRIVATE_SECTION_LENGTH).contains(&self.max_section_length) {
            anyhow::bail!(
                "max_section_length must be within {MIN_LONG_SECTION_LENGTH}..={MAX_PRIVATE_SECTION_LENGTH}, got {}",
                self.max_section_length
            );
        }
        if self.stale_after_secs == Some(0) {
            anyhow::bail!("stale_after_secs must be positive");
        }
        Ok(())
    }

    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ReassemblerConfig::from_json_str(r#"{ "validate_crc": false }"#).unwrap();
        assert!(!config.validate_crc);
        assert!(config.strict_pid_check);
        assert_eq!(config.max_section_length, MAX_PRIVATE_SECTION_LENGTH);
        assert_eq!(config.stale_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn out_of_range_section_length_is_rejected() {
        assert!(ReassemblerConfig::from_json_str(r#"{ "max_section_length": 4095 }"#).is_err());
        assert!(ReassemblerConfig::from_json_str(r#"{ "max_section_length": 2 }"#).is_err());
        assert!(ReassemblerConfig::from_json_str(r#"{ "stale_after_secs": 0 }"#).is_err());
    }

    #[test]
    fn null_disables_eviction() {
        let config = ReassemblerConfig::from_json_str(r#"{ "stale_after_secs": null }"#).unwrap();
        assert_eq!(config.stale_after(), None);
    }
}
