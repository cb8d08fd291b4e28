//! Admin directory trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::UserId;

use crate::error::OpsError;

/// Trait for resolving a fallback operator identity.
///
/// Restocks are attributed to the operator who performed them; when none
/// is given (automated top-up jobs), the directory supplies an
/// administrator to attribute the restock to.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    /// Returns an administrator, or None if the directory has none.
    async fn find_admin(&self) -> Result<Option<UserId>, OpsError>;
}

#[derive(Debug, Default)]
struct InMemoryDirectoryState {
    admin: Option<UserId>,
    fail_on_lookup: bool,
}

/// In-memory admin directory for testing and local development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<RwLock<InMemoryDirectoryState>>,
}

impl InMemoryDirectory {
    /// Creates a new empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the administrator returned by lookups.
    pub fn set_admin(&self, user_id: UserId) {
        self.state.write().unwrap().admin = Some(user_id);
    }

    /// Clears the administrator.
    pub fn clear_admin(&self) {
        self.state.write().unwrap().admin = None;
    }

    /// Configures the directory to fail lookups.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state.write().unwrap().fail_on_lookup = fail;
    }
}

#[async_trait]
impl AdminDirectory for InMemoryDirectory {
    async fn find_admin(&self) -> Result<Option<UserId>, OpsError> {
        let state = self.state.read().unwrap();
        if state.fail_on_lookup {
            return Err(OpsError::Directory("Directory unavailable".to_string()));
        }
        Ok(state.admin)
    }
}
