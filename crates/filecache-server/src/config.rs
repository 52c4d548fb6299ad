use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DAY_SECS: u64 = 24 * 60 * 60;
/// Upper bound applied to every configured lifetime
const MAX_LIFETIME_SECS: u64 = 100 * 365 * DAY_SECS;

/// Server configuration parsed from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub storage_dir: PathBuf,
    pub max_file_size: u64,
    pub storage_ttl_secs: u64,
    pub transfer_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub tombstone_retention_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8090,
            storage_dir: PathBuf::from("./data/filecache"),
            max_file_size: 2 * 1024 * 1024 * 1024, // 2 GiB
            storage_ttl_secs: 30 * DAY_SECS,
            transfer_ttl_secs: DAY_SECS,
            sweep_interval_secs: 60,
            tombstone_retention_secs: 7 * DAY_SECS,
        }
    }
}

impl ServerConfig {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unset or unparseable values fall back to the defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        let port = lookup("PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(defaults.port);

        let storage_dir = lookup("STORAGE_DIR")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_dir);

        Self {
            port,
            storage_dir,
            max_file_size: number("MAX_FILE_SIZE", defaults.max_file_size),
            storage_ttl_secs: number("STORAGE_TTL_SECS", defaults.storage_ttl_secs),
            transfer_ttl_secs: number("TRANSFER_TTL_SECS", defaults.transfer_ttl_secs),
            sweep_interval_secs: number("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)
                .max(1),
            tombstone_retention_secs: number(
                "TOMBSTONE_RETENTION_SECS",
                defaults.tombstone_retention_secs,
            ),
        }
    }

    pub fn storage_ttl(&self) -> chrono::Duration {
        lifetime(self.storage_ttl_secs)
    }

    pub fn transfer_ttl(&self) -> chrono::Duration {
        lifetime(self.transfer_ttl_secs)
    }

    pub fn tombstone_retention(&self) -> chrono::Duration {
        lifetime(self.tombstone_retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn lifetime(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_LIFETIME_SECS) as i64)
}
