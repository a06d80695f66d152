use std::sync::Arc;

use tracing::error;

use crate::errors::ServiceError;
use crate::models::{UserProfile, USERS_COLLECTION};
use crate::store::DocumentStore;

/// Repository for user profile documents, keyed by identity uid
#[derive(Clone)]
pub struct UserRepository {
    docs: Arc<dyn DocumentStore>,
}

impl UserRepository {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    /// Write the profile document, replacing any previous one
    pub async fn save(&self, profile: &UserProfile) -> Result<(), ServiceError> {
        let doc = serde_json::to_value(profile)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        self.docs
            .set(USERS_COLLECTION, &profile.uid, doc)
            .await
            .map_err(|e| {
                error!(uid = %profile.uid, "Failed to write profile: {}", e);
                ServiceError::PersistFailure(e.to_string())
            })
    }

    /// Find the profile stored for an identity uid
    pub async fn find(&self, uid: &str) -> Result<Option<UserProfile>, ServiceError> {
        let doc = self.docs.get(USERS_COLLECTION, uid).await.map_err(|e| {
            error!(uid, "Failed to read profile: {}", e);
            ServiceError::ExternalServiceError(e.to_string())
        })?;

        doc.map(|doc| {
            serde_json::from_value::<UserProfile>(doc)
                .map(|mut profile| {
                    profile.uid = uid.to_string();
                    profile
                })
                .map_err(|e| ServiceError::InternalError(format!("corrupt profile {uid}: {e}")))
        })
        .transpose()
    }
}
