//! Process-wide registry of session managers, one per owner

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::manager::{ConnectResponse, ManagerContext, SessionManager};
use super::state::SessionState;

/// Maps owner ids to their [`SessionManager`]
///
/// Each owner gets an independent manager and state. The map lock is only
/// held for lookups, inserts and removals, never across a manager call.
pub struct SessionRegistry {
    context: ManagerContext,
    managers: Mutex<HashMap<String, Arc<SessionManager>>>,
}

impl SessionRegistry {
    pub fn new(context: ManagerContext) -> Self {
        Self {
            context,
            managers: Mutex::new(HashMap::new()),
        }
    }

    /// Get the owner's manager, creating it on first use
    pub async fn get_or_create(&self, owner_id: &str) -> Arc<SessionManager> {
        let mut managers = self.managers.lock().await;
        managers
            .entry(owner_id.to_string())
            .or_insert_with(|| {
                info!(owner_id, "Creating session manager");
                Arc::new(SessionManager::new(owner_id, self.context.clone()))
            })
            .clone()
    }

    pub async fn get(&self, owner_id: &str) -> Option<Arc<SessionManager>> {
        self.managers.lock().await.get(owner_id).cloned()
    }

    /// Start (or restart) the owner's session
    pub async fn connect(&self, owner_id: &str) -> ConnectResponse {
        self.get_or_create(owner_id).await.connect().await
    }

    /// Disconnect the owner's session, if the owner has a manager
    pub async fn disconnect(&self, owner_id: &str) {
        if let Some(manager) = self.get(owner_id).await {
            manager.disconnect().await;
        }
    }

    pub async fn state(&self, owner_id: &str) -> Option<SessionState> {
        match self.get(owner_id).await {
            Some(manager) => Some(manager.state().await),
            None => None,
        }
    }

    /// Disconnect and forget the owner's manager
    ///
    /// Returns `false` if there was nothing to remove.
    pub async fn remove(&self, owner_id: &str) -> bool {
        let removed = self.managers.lock().await.remove(owner_id);
        match removed {
            Some(manager) => {
                manager.disconnect().await;
                info!(owner_id, "Removed session manager");
                true
            }
            None => false,
        }
    }

    /// Owners with a manager, sorted
    pub async fn owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = self.managers.lock().await.keys().cloned().collect();
        owners.sort();
        owners
    }

    pub async fn len(&self) -> usize {
        self.managers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.managers.lock().await.is_empty()
    }
}
