//! Display configuration.
//!
//! Parsed from an optional YAML file; every field has a default so an
//! empty file (or no file at all) is a valid configuration.
//!
//! ```yaml
//! prefix_convention: inclusive   # or: exclusive
//! label_window: 200
//! lane_base: -0.1
//! lane_height: 0.1
//! hover_precision: 3
//! diff_only: false
//! dedupe_sites: false
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::align::PrefixConvention;
use crate::lanes::LaneLayout;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix length rule used when rebuilding gapped sequences
    pub prefix_convention: PrefixConvention,

    /// Base labels are drawn only when fewer positions than this are visible
    pub label_window: usize,

    /// Y of the first binding-site lane
    pub lane_base: f64,

    /// Vertical distance between binding-site lanes
    pub lane_height: f64,

    /// Decimal places of scores in hover labels
    pub hover_precision: usize,

    /// Show only binding sites that differ from the reference
    pub diff_only: bool,

    /// Keep one site per distinct substring within a score file
    pub dedupe_sites: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix_convention: PrefixConvention::default(),
            label_window: 200,
            lane_base: -0.1,
            lane_height: 0.1,
            hover_precision: 3,
            diff_only: false,
            dedupe_sites: false,
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;
        Ok(config)
    }

    /// Parse configuration from YAML text; blank text yields the defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.label_window == 0 {
            anyhow::bail!("label_window must be at least 1");
        }
        if !self.lane_height.is_finite() || self.lane_height <= 0.0 {
            anyhow::bail!("lane_height must be a positive number (got {})", self.lane_height);
        }
        if !self.lane_base.is_finite() {
            anyhow::bail!("lane_base must be finite");
        }
        Ok(())
    }

    pub fn lane_layout(&self) -> LaneLayout {
        LaneLayout::new(self.lane_base, self.lane_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
prefix_convention: exclusive
label_window: 120
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.prefix_convention, PrefixConvention::Exclusive);
        assert_eq!(config.label_window, 120);
        assert_eq!(config.hover_precision, 3);
        assert!(!config.diff_only);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Config::from_yaml_str("").unwrap(), Config::default());
        assert_eq!(Config::default().prefix_convention, PrefixConvention::Inclusive);
    }

    #[test]
    fn test_validation() {
        assert!(Config::from_yaml_str("label_window: 0").is_err());
        assert!(Config::from_yaml_str("lane_height: -1.0").is_err());
        assert!(Config::from_yaml_str("prefix_convention: sideways").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "lane_height: 0.25").unwrap();
        let config = Config::from_yaml(file.path()).unwrap();
        assert_eq!(config.lane_layout().height, 0.25);

        assert!(Config::from_yaml("/nonexistent/bindview.yaml").is_err());
    }
}
