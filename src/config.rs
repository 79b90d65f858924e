//! Loader configuration
//!
//! Defaults, optionally overridden by a TOML file, optionally overridden again
//! by command-line flags / environment variables in the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Partitioning of each day's work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Logical partitions per day; one batch and one commit each
    #[serde(default = "default_partitions")]
    pub partitions: usize,

    /// Threads in the parse pool
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_partitions() -> usize {
    20
}

fn default_workers() -> usize {
    5
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            partitions: default_partitions(),
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Value for `PRAGMA synchronous`
    #[serde(default = "default_synchronous")]
    pub synchronous: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("ticks.db")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_synchronous() -> String {
    "NORMAL".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            synchronous: default_synchronous(),
        }
    }
}

impl LoaderConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ingest.partitions == 0 {
            anyhow::bail!("ingest.partitions must be at least 1");
        }
        if self.ingest.workers == 0 {
            anyhow::bail!("ingest.workers must be at least 1");
        }
        let sync = self.database.synchronous.to_ascii_uppercase();
        if !matches!(sync.as_str(), "OFF" | "NORMAL" | "FULL" | "EXTRA") {
            anyhow::bail!(
                "database.synchronous must be OFF, NORMAL, FULL or EXTRA (got {})",
                self.database.synchronous
            );
        }
        Ok(())
    }
}

/// Target month in the data tree. The strings are used verbatim as directory
/// names, so `04` and `4` address different directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMonth {
    pub year: String,
    pub month: String,
}

impl TargetMonth {
    pub fn parse(year: &str, month: &str) -> anyhow::Result<Self> {
        let year = year.trim();
        let month = month.trim();
        year.parse::<u32>()
            .map_err(|_| anyhow::anyhow!("invalid year: {:?}", year))?;
        let m: u32 = month
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid month: {:?}", month))?;
        if !(1..=12).contains(&m) {
            anyhow::bail!("month out of range: {}", m);
        }
        Ok(Self {
            year: year.to_string(),
            month: month.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.ingest.partitions, 20);
        assert_eq!(config.ingest.workers, 5);
        assert_eq!(config.database.path, PathBuf::from("ticks.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: LoaderConfig = toml::from_str(
            r#"
            [ingest]
            workers = 8

            [database]
            path = "/data/ticks.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.ingest.workers, 8);
        assert_eq!(config.ingest.partitions, 20);
        assert_eq!(config.database.path, PathBuf::from("/data/ticks.db"));
        assert_eq!(config.database.synchronous, "NORMAL");
    }

    #[test]
    fn test_toml_roundtrip_via_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("loader.toml");
        let mut config = LoaderConfig::default();
        config.ingest.partitions = 4;
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        assert_eq!(LoaderConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let mut config = LoaderConfig::default();
        config.ingest.partitions = 0;
        assert!(config.validate().is_err());

        let mut config = LoaderConfig::default();
        config.database.synchronous = "sometimes".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_month() {
        let t = TargetMonth::parse("2016", " 04").unwrap();
        assert_eq!(t.year, "2016");
        assert_eq!(t.month, "04");
        assert_eq!(TargetMonth::parse("2016", "4").unwrap().month, "4");
        assert!(TargetMonth::parse("2016", "13").is_err());
        assert!(TargetMonth::parse("16x", "01").is_err());
    }
}
