//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database whose table and column descriptions are written (MSSQL).
    pub target: TargetConfig,

    /// Documentation corpus location.
    #[serde(default)]
    pub documentation: DocumentationConfig,

    /// Sync behavior configuration.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Target database (MSSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Schema holding the described tables (default: "dbo").
    #[serde(default = "default_dbo_schema")]
    pub schema: String,

    /// Encrypt connection (default: "true").
    #[serde(default = "default_true_string")]
    pub encrypt: String,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .finish()
    }
}

impl TargetConfig {
    /// Whether the connection should be encrypted.
    ///
    /// Unrecognized values encrypt.
    pub fn encryption_enabled(&self) -> bool {
        !matches!(
            self.encrypt.to_lowercase().as_str(),
            "false" | "no" | "0" | "disable"
        )
    }
}

/// Documentation corpus configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentationConfig {
    /// Path to the XML documentation file. When unset, the file next to the
    /// running executable is used.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Sync behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Generic definition whose instantiations mark entity collections
    /// (default: "Microsoft.EntityFrameworkCore.DbSet").
    #[serde(default = "default_entity_collection")]
    pub entity_collection: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            entity_collection: default_entity_collection(),
        }
    }
}

fn default_mssql_port() -> u16 {
    1433
}

fn default_dbo_schema() -> String {
    crate::sync::DEFAULT_SCHEMA.to_string()
}

fn default_true_string() -> String {
    "true".to_string()
}

fn default_entity_collection() -> String {
    crate::sync::DEFAULT_ENTITY_COLLECTION.to_string()
}
