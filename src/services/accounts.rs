use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::IdentityProvider;
use crate::errors::ServiceError;
use crate::models::UserProfile;
use crate::repositories::UserRepository;
use crate::validation::{validate_credentials, validate_registration, Credentials, Registration};

/// Sign-up, login and profile lookup on top of the identity provider
#[derive(Clone)]
pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
    users: UserRepository,
}

impl AccountService {
    pub fn new(identity: Arc<dyn IdentityProvider>, users: UserRepository) -> Self {
        Self { identity, users }
    }

    /// Creates the account and its profile document. A profile that cannot
    /// be written takes the fresh account down with it.
    #[instrument(skip(self, form), fields(email = %form.email, is_seller = form.is_seller))]
    pub async fn register(&self, form: Registration) -> Result<UserProfile, ServiceError> {
        validate_registration(&form)?;

        let handle = self.identity.sign_up(&form.email, &form.password).await?;
        let profile = UserProfile {
            uid: handle.uid,
            user_id: Uuid::new_v4().to_string(),
            email: handle.email,
            nickname: form.nickname,
            is_seller: form.is_seller,
        };

        if let Err(e) = self.users.save(&profile).await {
            warn!(uid = %profile.uid, "Profile write failed, removing account: {}", e);
            if let Err(rollback) = self.identity.delete_user(&profile.uid).await {
                error!(uid = %profile.uid, "Account left without a profile: {}", rollback);
            }
            return Err(e);
        }

        info!(user_id = %profile.user_id, "Account registered");
        Ok(profile)
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: Credentials) -> Result<UserProfile, ServiceError> {
        validate_credentials(&credentials)?;

        let handle = self
            .identity
            .sign_in(&credentials.email, &credentials.password)
            .await?;
        self.profile(&handle.uid).await
    }

    pub async fn logout(&self) -> Result<(), ServiceError> {
        Ok(self.identity.sign_out().await?)
    }

    /// Profile of whoever the identity provider has signed in, if anyone
    pub async fn current_profile(&self) -> Result<Option<UserProfile>, ServiceError> {
        match self.identity.current_user().await {
            Some(handle) => self.users.find(&handle.uid).await,
            None => Ok(None),
        }
    }

    pub async fn profile(&self, uid: &str) -> Result<UserProfile, ServiceError> {
        self.users
            .find(uid)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Profile for {uid}")))
    }
}
