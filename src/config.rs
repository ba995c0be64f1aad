use clock::GeoConfig;
use motion::TrackerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(not(target_os = "espidf"))]
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    pub location: GeoConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub tracker_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Holds calibration.txt and history.csv on the host.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        // Try external file first
        let config: Config = if path.exists() {
            let config_content = fs::read_to_string(path)?;
            let config = toml::from_str(&config_content)?;
            log::info!("Loaded configuration from {}", path.display());
            config
        } else {
            // Fallback to embedded defaults
            let config_content = include_str!("../config.toml.example");
            let config = toml::from_str(config_content)?;
            log::warn!("Using embedded default configuration");
            config
        };

        config.tracker.validate()?;
        if !config.location.is_valid() {
            anyhow::bail!(
                "location out of range: lat {}, lon {}",
                config.location.latitude,
                config.location.longitude
            );
        }
        Ok(config)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let config_content = toml::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        log::info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

// Helper functions for easy access
impl Config {
    pub fn get_latitude(&self) -> f64 {
        self.location.latitude
    }

    pub fn get_longitude(&self) -> f64 {
        self.location.longitude
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn get_altitude(&self) -> f64 {
        self.location.altitude
    }

    pub fn get_tracker_id(&self) -> u32 {
        self.device.tracker_id
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn get_data_dir(&self) -> &Path {
        &self.storage.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clock::TimezonePolicy;

    #[test]
    fn embedded_example_parses_with_defaults() {
        let config = Config::load(Path::new("no/such/config.toml")).unwrap();
        assert_eq!(config.get_tracker_id(), 1);
        assert_eq!(config.location.timezone, TimezonePolicy::AutoEu);
        assert_eq!(config.tracker, TrackerConfig::default());
    }

    #[test]
    fn partial_tracker_table_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [device]
            tracker_id = 7

            [location]
            latitude = 48.1
            longitude = 11.6

            [location.timezone]
            mode = "fixed"
            offset_secs = 3600

            [tracker]
            night_threshold = 150
            "#,
        )
        .unwrap();
        assert_eq!(config.tracker.night_threshold, 150);
        assert_eq!(config.tracker.cloud_threshold, 600);
        assert_eq!(
            config.location.timezone,
            TimezonePolicy::Fixed { offset_secs: 3600 }
        );
        assert_eq!(config.get_data_dir(), Path::new("data"));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::load(Path::new("missing.toml")).unwrap();
        config.location.latitude = -33.9;
        config.tracker.yaw_max = 170;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.get_latitude(), -33.9);
        assert_eq!(loaded.tracker.yaw_max, 170);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[device]\ntracker_id = 1\n[location]\nlatitude = 95.0\nlongitude = 0.0\n",
        )
        .unwrap();
        assert!(Config::load(&path).is_err());
    }
}
