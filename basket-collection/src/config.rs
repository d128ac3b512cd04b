// Pipeline configuration
//
// Values are resolved from, lowest priority first:
// 1. Built-in defaults
// 2. A TOML file
// 3. BASKET_* environment variables
// 4. Command-line flags (applied by the binary)

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Settings for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Input CSV, optionally gzip compressed
    pub input: PathBuf,

    /// Destination of the CSV report
    pub report: PathBuf,

    /// Approximate number of records per fragment
    pub line_limit: usize,

    /// Maximum pairs per count-fragment; defaults to `line_limit`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_limit: Option<usize>,

    /// Directory under which the run's scratch space is created
    pub scratch_dir: PathBuf,

    /// Worker threads for the parallel stages; 1 runs everything on the calling thread
    pub workers: usize,

    /// Snappy-compress fragment files
    pub compress_scratch: bool,

    /// Leave fragment files behind after the run
    pub keep_scratch: bool
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            input: PathBuf::from("data_1.csv.gz"),
            report: PathBuf::from("report.csv"),
            line_limit: 1000,
            row_limit: None,
            scratch_dir: env::temp_dir(),
            workers: 1,
            compress_scratch: true,
            keep_scratch: false
        }
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::Config(format!("{} has invalid value {:?}", key, value)))
}

impl PipelineConfig {

    /// Parses a TOML document; missing keys keep their defaults.
    /// ```rust
    ///   use basket_collection::config::PipelineConfig;
    ///
    ///   let config = PipelineConfig::from_toml_str("line_limit = 50\nworkers = 4").unwrap();
    ///   assert_eq!(config.line_limit, 50);
    ///   assert_eq!(config.row_limit(), 50);
    ///   assert_eq!(config.workers, 4);
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Reads a TOML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("can't read {}: {}", path.as_ref().display(), e))
        })?;
        PipelineConfig::from_toml_str(&contents)
    }

    /// Applies `BASKET_LINE_LIMIT`, `BASKET_ROW_LIMIT`, `BASKET_WORKERS` and
    /// `BASKET_SCRATCH_DIR` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Applies overrides from any key lookup
    pub fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) -> Result<()> {
        if let Some(v) = lookup("BASKET_LINE_LIMIT") {
            self.line_limit = parse_var("BASKET_LINE_LIMIT", &v)?;
        }
        if let Some(v) = lookup("BASKET_ROW_LIMIT") {
            self.row_limit = Some(parse_var("BASKET_ROW_LIMIT", &v)?);
        }
        if let Some(v) = lookup("BASKET_WORKERS") {
            self.workers = parse_var("BASKET_WORKERS", &v)?;
        }
        if let Some(v) = lookup("BASKET_SCRATCH_DIR") {
            self.scratch_dir = PathBuf::from(v);
        }
        Ok(())
    }

    /// Effective pairs-per-count-fragment budget
    pub fn row_limit(&self) -> usize {
        self.row_limit.unwrap_or(self.line_limit)
    }

    /// Rejects budgets and worker counts of zero
    pub fn validate(&self) -> Result<()> {
        if self.line_limit == 0 {
            return Err(Error::Config("line_limit must be positive".into()));
        }
        if self.row_limit == Some(0) {
            return Err(Error::Config("row_limit must be positive".into()));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test_config {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.input, PathBuf::from("data_1.csv.gz"));
        assert_eq!(config.report, PathBuf::from("report.csv"));
        assert_eq!(config.line_limit, 1000);
        assert_eq!(config.row_limit(), 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml() {
        let config = PipelineConfig::from_toml_str(r#"
            input = "baskets.csv"
            report = "out.csv"
            line_limit = 10
            row_limit = 7
            compress_scratch = false
        "#).unwrap();
        assert_eq!(config.input, PathBuf::from("baskets.csv"));
        assert_eq!(config.row_limit(), 7);
        assert!(!config.compress_scratch);
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_unknown_key() {
        match PipelineConfig::from_toml_str("line_limt = 3") {
            Err(Error::ConfigFile(_)) => (),
            other => panic!("expected config file error, got {:?}", other)
        }
    }

    #[test]
    fn test_overrides() {
        let mut vars = HashMap::new();
        vars.insert("BASKET_LINE_LIMIT", "25");
        vars.insert("BASKET_WORKERS", "3");
        vars.insert("BASKET_SCRATCH_DIR", "/var/tmp");

        let mut config = PipelineConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.line_limit, 25);
        assert_eq!(config.workers, 3);
        assert_eq!(config.scratch_dir, PathBuf::from("/var/tmp"));
        assert_eq!(config.row_limit(), 25);
    }

    #[test]
    fn test_bad_override() {
        let mut config = PipelineConfig::default();
        let res = config.apply_overrides(|k| if k == "BASKET_ROW_LIMIT" { Some("lots".into()) } else { None });
        assert!(res.is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = PipelineConfig::default();
        config.line_limit = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.row_limit = Some(0);
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.workers = 0;
        assert!(config.validate().is_err());
    }
}
