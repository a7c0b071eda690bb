//! Server configuration.
//!
//! Every knob can be overridden through an environment variable:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | WORK_DIR | /var/lib/comanda | Working directory (database, logs) |
//! | HTTP_PORT | 3000 | HTTP API port |
//! | TIMEZONE | America/Mexico_City | Business timezone |
//! | ENVIRONMENT | development | development \| staging \| production |
//! | STALE_ORDER_MINUTES | 30 | Age before an open order is "delayed" |
//! | STALE_DEDUP_MINUTES | 10 | Window suppressing repeat delay alerts |
//! | SWEEP_INTERVAL_SECS | 60 | Stale-order sweep cadence |
//! | DISPATCH_INTERVAL_SECS | 2 | Outbox dispatcher poll cadence |
//! | DISPATCH_MAX_ATTEMPTS | 5 | Attempts before an outbox row fails |

use std::path::PathBuf;

use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory holding database and log files
    pub work_dir: String,
    /// HTTP API port
    pub http_port: u16,
    /// Business timezone for daily numbering and shift dates
    pub timezone: Tz,
    /// Environment: development | staging | production
    pub environment: String,
    /// Minutes before a non-terminal order counts as delayed
    pub stale_order_minutes: i64,
    /// De-duplication window for repeat delay alerts
    pub stale_dedup_minutes: i64,
    /// Stale-order sweep interval
    pub sweep_interval_secs: u64,
    /// Outbox dispatcher poll interval
    pub dispatch_interval_secs: u64,
    /// Dispatch attempts before giving up on an outbox row
    pub dispatch_max_attempts: i32,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let timezone = std::env::var("TIMEZONE")
            .ok()
            .and_then(|tz| tz.parse().ok())
            .unwrap_or(chrono_tz::America::Mexico_City);

        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/comanda".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            timezone,
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            stale_order_minutes: env_parse("STALE_ORDER_MINUTES", 30),
            stale_dedup_minutes: env_parse("STALE_DEDUP_MINUTES", 10),
            sweep_interval_secs: env_parse("SWEEP_INTERVAL_SECS", 60),
            dispatch_interval_secs: env_parse("DISPATCH_INTERVAL_SECS", 2),
            dispatch_max_attempts: env_parse("DISPATCH_MAX_ATTEMPTS", 5),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// Create the work directory layout if missing.
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
