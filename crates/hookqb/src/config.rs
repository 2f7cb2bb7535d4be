//! Database handle configuration.
//!
//! ```toml
//! last_insert_id_sql = "select lastval() as id"
//!
//! [soft_deletes]
//! enabled = true
//! column = "deleted_at"
//!
//! [timestamps]
//! enabled = false
//!
//! [cache]
//! default_ttl_secs = 300
//! max_entries = 4096
//! ```

use crate::error::{OrmError, OrmResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for [`crate::Db`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub soft_deletes: SoftDeleteConfig,
    pub timestamps: TimestampConfig,
    pub cache: CacheConfig,
    /// Overrides the connection's fallback lookup for generated identifiers.
    pub last_insert_id_sql: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftDeleteConfig {
    pub enabled: bool,
    pub column: String,
}

impl Default for SoftDeleteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            column: "deleted_at".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            created_at: "created_at".to_string(),
            updated_at: "updated_at".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live used by `Builder::cache()`.
    pub default_ttl_secs: u64,
    /// Capacity of the in-memory store built by `Db::with_memory_cache`.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 60,
            max_entries: 1024,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> OrmResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OrmError::config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
            .map_err(|e| OrmError::config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> OrmResult<()> {
        if self.soft_deletes.enabled && self.soft_deletes.column.trim().is_empty() {
            return Err(OrmError::config("soft_deletes.column must not be empty"));
        }
        if self.timestamps.enabled {
            if self.timestamps.created_at.trim().is_empty() {
                return Err(OrmError::config("timestamps.created_at must not be empty"));
            }
            if self.timestamps.updated_at.trim().is_empty() {
                return Err(OrmError::config("timestamps.updated_at must not be empty"));
            }
        }
        if self.cache.max_entries == 0 {
            return Err(OrmError::config("cache.max_entries must be greater than zero"));
        }
        Ok(())
    }

    /// Enable or disable soft deletes.
    pub fn with_soft_deletes(mut self, enabled: bool) -> Self {
        self.soft_deletes.enabled = enabled;
        self
    }

    pub fn with_soft_delete_column(mut self, column: impl Into<String>) -> Self {
        self.soft_deletes.column = column.into();
        self
    }

    /// Enable or disable automatic timestamps.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps.enabled = enabled;
        self
    }

    pub fn with_timestamp_columns(
        mut self,
        created_at: impl Into<String>,
        updated_at: impl Into<String>,
    ) -> Self {
        self.timestamps.created_at = created_at.into();
        self.timestamps.updated_at = updated_at.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.default_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_cache_capacity(mut self, max_entries: usize) -> Self {
        self.cache.max_entries = max_entries;
        self
    }

    pub fn with_last_insert_id_sql(mut self, sql: impl Into<String>) -> Self {
        self.last_insert_id_sql = Some(sql.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DbConfig::default();
        assert!(config.soft_deletes.enabled);
        assert_eq!(config.soft_deletes.column, "deleted_at");
        assert!(config.timestamps.enabled);
        assert_eq!(config.cache.default_ttl(), Duration::from_secs(60));
        assert_eq!(config.last_insert_id_sql, None);
        config.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = DbConfig::from_toml_str(
            r#"
            last_insert_id_sql = "select lastval() as id"

            [soft_deletes]
            column = "removed_at"

            [cache]
            default_ttl_secs = 5
            "#,
        )
        .unwrap();
        assert!(config.soft_deletes.enabled);
        assert_eq!(config.soft_deletes.column, "removed_at");
        assert_eq!(config.cache.default_ttl_secs, 5);
        assert_eq!(config.cache.max_entries, 1024);
        assert_eq!(config.timestamps, TimestampConfig::default());
        assert_eq!(config.last_insert_id_sql.as_deref(), Some("select lastval() as id"));
    }

    #[test]
    fn invalid_documents_are_config_errors() {
        let err = DbConfig::from_toml_str("[cache]\nmax_entries = 0\n").unwrap_err();
        assert!(matches!(err, OrmError::Config(_)));

        let err = DbConfig::from_toml_str("[soft_deletes]\ncolumn = \"\"\n").unwrap_err();
        assert!(matches!(err, OrmError::Config(_)));

        let err = DbConfig::from_toml_str("cache = 3").unwrap_err();
        assert!(matches!(err, OrmError::Config(_)));
    }

    #[test]
    fn disabled_features_skip_column_checks() {
        DbConfig::new()
            .with_soft_deletes(false)
            .with_soft_delete_column("")
            .with_timestamps(false)
            .with_timestamp_columns("", "")
            .validate()
            .unwrap();
    }

    #[test]
    fn load_reports_missing_file() {
        let err = DbConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, OrmError::Config(_)));
    }
}
