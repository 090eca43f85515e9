use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::catalog::NameCatalog;
use super::collector::{CollectionRequest, Collector};
use super::error::{CollectorError, ConfigError};

/// Structure representing a collection job configuration. Contains pathing and
/// request information. Configs are serializable and deserializable to YAML
/// using serde and serde_yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Override for the Molly data root; None means the lab network share.
    pub molly_path: Option<PathBuf>,
    /// Override for the BET data root; None means the lab network share.
    pub bet_path: Option<PathBuf>,
    /// Override for the SVT data root; None means the lab network share.
    pub svt_path: Option<PathBuf>,
    /// Signal registry file; None means the bundled registry.
    pub registry_path: Option<PathBuf>,
    /// Cache directory; None disables caching.
    pub cache_dir: Option<PathBuf>,
    /// Where the collected series files are written.
    pub output_dir: PathBuf,
    pub start_time: String,
    pub end_time: String,
    pub names: Vec<String>,
    /// Fixed resampling interval in seconds for change-triggered signals.
    pub resample_dt: Option<f64>,
    pub force_reload: bool,
}

impl Default for Config {
    /// Generate a new Config object. Pathing fields default to the lab
    /// shares, the request fields are empty/invalid.
    fn default() -> Self {
        Self {
            molly_path: None,
            bet_path: None,
            svt_path: None,
            registry_path: None,
            cache_dir: None,
            output_dir: PathBuf::from("None"),
            start_time: String::from(""),
            end_time: String::from(""),
            names: Vec::new(),
            resample_dt: None,
            force_reload: false,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Build the collector this configuration describes.
    pub fn make_collector(&self) -> Result<Collector, CollectorError> {
        let catalog = match &self.registry_path {
            Some(path) => NameCatalog::from_file(path)?,
            None => NameCatalog::bundled()?,
        };

        let mut collector = Collector::new(catalog);
        if let Some(path) = &self.molly_path {
            collector = collector.with_molly_path(path.clone());
        }
        if let Some(path) = &self.bet_path {
            collector = collector.with_bet_path(path.clone());
        }
        if let Some(path) = &self.svt_path {
            collector = collector.with_svt_path(path.clone());
        }
        if let Some(dir) = &self.cache_dir {
            collector = collector.with_cache(dir.clone());
        }
        Ok(collector)
    }

    /// Build the request this configuration describes.
    pub fn make_request(&self) -> Result<CollectionRequest, CollectorError> {
        CollectionRequest::parse(
            &self.start_time,
            &self.end_time,
            self.names.clone(),
            self.resample_dt,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collect.yml");
        std::fs::write(
            &path,
            "molly_path: /data/molly\n\
             bet_path: null\n\
             svt_path: null\n\
             registry_path: null\n\
             cache_dir: /data/cache\n\
             output_dir: /data/out\n\
             start_time: \"2019-08-16 01:30\"\n\
             end_time: \"2019-08-16 04:30\"\n\
             names:\n - GM1 pressure\n\
             resample_dt: 2.0\n\
             force_reload: false\n",
        )
        .unwrap();

        let config = Config::read_config_file(&path).unwrap();
        assert_eq!(config.molly_path, Some(PathBuf::from("/data/molly")));
        assert_eq!(config.names, vec!["GM1 pressure".to_string()]);

        let request = config.make_request().unwrap();
        assert_eq!(request.resample_dt, Some(2.0));
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::read_config_file(Path::new("/nonexistent/collect.yml"));
        assert!(matches!(result, Err(ConfigError::BadFilePath(_))));
    }

    #[test]
    fn test_default_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert!(config.names.is_empty());
        assert!(config.cache_dir.is_none());
    }
}
