use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::category::TestCategory;
use super::chip::HicType;
use super::constants::DEFAULT_REFRESH_INTERVAL;
use super::error::ConfigError;

/// Structure representing the application configuration. Contains pathing and run information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub catalog_path: PathBuf,
    pub output_path: PathBuf,
    pub hic_type: HicType,
    pub test: TestCategory,
    /// Reconcile against an existing store instead of redoing everything
    pub resume: bool,
    /// Also reduce the untuned threshold scans
    #[serde(default)]
    pub all_threshold_scans: bool,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: usize,
    #[serde(default)]
    pub hdf_path: Option<PathBuf>,
}

fn default_refresh_interval() -> usize {
    DEFAULT_REFRESH_INTERVAL
}

impl Default for Config {
    /// Generate a new Config object. All paths will be empty/invalid
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            hic_type: HicType::default(),
            test: TestCategory::default(),
            resume: true,
            all_threshold_scans: false,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            hdf_path: None,
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

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        let mut file = std::fs::File::create(config_path)?;
        file.write_all(yaml_str.as_bytes())?;
        Ok(())
    }

    /// Directory holding the tables of this HIC type and test category
    pub fn get_store_directory(&self) -> PathBuf {
        self.output_path.join(self.get_store_str())
    }

    /// Where the previous store is moved to while a resumed run reconciles against it
    pub fn get_old_store_directory(&self) -> PathBuf {
        self.output_path
            .join(format!("{}_old", self.get_store_str()))
    }

    /// Directory for a single activity reduced on its own
    pub fn get_activity_directory(&self, activity_name: &str) -> PathBuf {
        let name: String = activity_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.output_path.join(format!(
            "{}HIC_{}_{}",
            self.hic_type.label(),
            self.test.label(),
            name
        ))
    }

    /// Get the path to the output hdf5 file, if an export was requested
    pub fn get_hdf_file_name(&self) -> Result<Option<PathBuf>, ConfigError> {
        let Some(hdf_path) = self.hdf_path.as_ref() else {
            return Ok(None);
        };
        if hdf_path.exists() {
            Ok(Some(hdf_path.join(format!("{}.h5", self.get_store_str()))))
        } else {
            Err(ConfigError::BadFilePath(hdf_path.clone()))
        }
    }

    /// Construct the store name using the historic output file naming
    fn get_store_str(&self) -> String {
        format!("{}HIC_{}_AllHICs", self.hic_type.label(), self.test.label())
    }

    pub fn is_refresh_interval_valid(&self) -> bool {
        self.refresh_interval >= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_directories() {
        let config = Config {
            output_path: PathBuf::from("/data/reduced"),
            hic_type: HicType::Inner,
            test: TestCategory::DctrlTest,
            ..Default::default()
        };
        assert_eq!(
            config.get_store_directory(),
            PathBuf::from("/data/reduced/IBHIC_DCTRLTest_AllHICs")
        );
        assert_eq!(
            config.get_old_store_directory(),
            PathBuf::from("/data/reduced/IBHIC_DCTRLTest_AllHICs_old")
        );
        assert_eq!(
            config.get_activity_directory("OB-HIC Qualification Test 12"),
            PathBuf::from("/data/reduced/IBHIC_DCTRLTest_OB_HIC_Qualification_Test_12")
        );
    }

    #[test]
    fn test_yaml_defaults() {
        let yaml = "catalog_path: catalog.yml\noutput_path: out\nhic_type: IB\ntest: NoiseScan\nresume: false\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.hic_type, HicType::Inner);
        assert_eq!(config.test, TestCategory::NoiseScan);
        assert_eq!(config.refresh_interval, DEFAULT_REFRESH_INTERVAL);
        assert!(!config.all_threshold_scans);
        assert!(config.hdf_path.is_none());
        assert!(config.is_refresh_interval_valid());
    }

    #[test]
    fn test_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        assert!(matches!(
            Config::read_config_file(&path),
            Err(ConfigError::BadFilePath(_))
        ));

        let config = Config {
            refresh_interval: 0,
            ..Default::default()
        };
        config.write_config_file(&path).unwrap();
        let read = Config::read_config_file(&path).unwrap();
        assert_eq!(read, config);
        assert!(!read.is_refresh_interval_valid());

        std::fs::write(&path, "catalog_path: [").unwrap();
        assert!(matches!(
            Config::read_config_file(&path),
            Err(ConfigError::ParsingError(_))
        ));
    }
}
