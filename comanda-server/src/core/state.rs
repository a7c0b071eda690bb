//! Shared server state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::Config;
use crate::db::DbService;
use crate::message::{BusMessage, MessageBus, SyncPayload};
use crate::utils::AppError;

/// Per-resource monotonic version counters for `broadcast_sync`, so clients
/// can order updates without trusting arrival order.
#[derive(Debug, Default)]
pub struct ResourceVersions {
    versions: Mutex<HashMap<String, u64>>,
}

impl ResourceVersions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the version for a resource and return the new value.
    pub fn increment(&self, resource: &str) -> u64 {
        let mut versions = self.versions.lock().unwrap_or_else(|e| e.into_inner());
        let entry = versions.entry(resource.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn get(&self, resource: &str) -> u64 {
        let versions = self.versions.lock().unwrap_or_else(|e| e.into_inner());
        versions.get(resource).copied().unwrap_or(0)
    }
}

/// Server state: shared references to every service. `Clone` is shallow
/// (Arc/pool handles), constructed once at startup and passed everywhere;
/// there is no other global state.
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub db: DbService,
    pub bus: MessageBus,
    pub resource_versions: Arc<ResourceVersions>,
}

impl ServerState {
    /// Initialize working directory, database and bus.
    pub async fn initialize(config: &Config) -> Result<Self, AppError> {
        config
            .ensure_work_dir_structure()
            .map_err(|e| AppError::internal(format!("Failed to create work directory: {e}")))?;

        let db_path = config.database_dir().join("comanda.db");
        let db = DbService::new(&db_path.to_string_lossy()).await?;

        Ok(Self {
            config: config.clone(),
            db,
            bus: MessageBus::new(),
            resource_versions: Arc::new(ResourceVersions::new()),
        })
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.db.pool
    }

    /// Broadcast a resource-change sync message to connected clients.
    /// Best-effort: a full or empty channel never fails the caller.
    pub fn broadcast_sync<T: serde::Serialize>(
        &self,
        resource: &str,
        action: &str,
        id: &str,
        data: Option<&T>,
    ) {
        let version = self.resource_versions.increment(resource);
        let payload = SyncPayload {
            resource: resource.to_string(),
            version,
            action: action.to_string(),
            id: id.to_string(),
            data: data.and_then(|d| serde_json::to_value(d).ok()),
        };
        self.bus.publish(BusMessage::Sync(payload));
    }

    #[cfg(test)]
    pub async fn for_tests(db: DbService) -> Self {
        Self {
            config: Config::from_env(),
            db,
            bus: MessageBus::with_capacity(64),
            resource_versions: Arc::new(ResourceVersions::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_versions_increment_independently() {
        let versions = ResourceVersions::new();
        assert_eq!(versions.increment("order"), 1);
        assert_eq!(versions.increment("order"), 2);
        assert_eq!(versions.increment("shift"), 1);
        assert_eq!(versions.get("order"), 2);
        assert_eq!(versions.get("courier"), 0);
    }
}
