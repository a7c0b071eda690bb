//! Comanda Server - restaurant order management service
//!
//! # Module structure
//!
//! ```text
//! comanda-server/src/
//! ├── core/           # Config, server bootstrap, shared state
//! ├── db/             # SQLite service and repositories
//! ├── orders/         # Order intake and lifecycle
//! ├── shifts/         # Shift ledger (turno / corte de caja)
//! ├── delivery/       # Courier settlement (liquidación)
//! ├── notifications/  # Outbox, dispatcher, stale-order sweep
//! ├── message/        # In-process broadcast bus
//! ├── routes/         # HTTP API
//! └── utils/          # Errors, logging, time helpers
//! ```

pub mod core;
pub mod db;
pub mod delivery;
pub mod message;
pub mod notifications;
pub mod orders;
pub mod routes;
pub mod shifts;
pub mod utils;

pub use crate::core::{Config, Server, ServerState};
pub use crate::utils::{AppError, AppResult};

/// Load .env and initialize logging. In production logs rotate daily under
/// the work directory; in development they go to stdout.
pub fn setup_environment() -> Result<(), AppError> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    config
        .ensure_work_dir_structure()
        .map_err(|e| AppError::internal(format!("Failed to create work directory: {e}")))?;

    let log_level = std::env::var("LOG_LEVEL").ok();
    if config.is_production() {
        utils::logger::init_logger_with_file(
            log_level.as_deref(),
            config.log_dir().to_str(),
        );
    } else {
        utils::logger::init_logger_with_file(log_level.as_deref(), None);
    }
    Ok(())
}
