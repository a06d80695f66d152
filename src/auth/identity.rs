//! Identity provider seam: account creation, password sign-in and the
//! provider-side notion of "who is signed in".

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::OsRng;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::models::UserHandle;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Email is already in use")]
    EmailInUse,

    #[error("Email or password is incorrect")]
    InvalidCredential,

    #[error("Identity backend error: {0}")]
    Backend(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<UserHandle, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserHandle, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Removes the account; signs it out if it is the current one.
    async fn delete_user(&self, uid: &str) -> Result<(), IdentityError>;

    async fn current_user(&self) -> Option<UserHandle>;
}

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    email: String,
    password_hash: String,
}

/// Identity provider holding accounts in memory with argon2 password hashes.
pub struct InMemoryIdentityProvider {
    accounts: DashMap<String, Account>,
    current: RwLock<Option<UserHandle>>,
    hasher: Argon2<'static>,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::with_hasher(Argon2::default())
    }
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider with explicit argon2 cost parameters.
    pub fn with_params(params: Params) -> Self {
        Self::with_hasher(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn with_hasher(hasher: Argon2<'static>) -> Self {
        Self {
            accounts: DashMap::new(),
            current: RwLock::new(None),
            hasher,
        }
    }

    fn hash(&self, password: &str) -> Result<String, IdentityError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| IdentityError::Backend(e.to_string()))
    }

    fn verify(&self, password: &str, stored: &str) -> Result<bool, IdentityError> {
        let parsed =
            PasswordHash::new(stored).map_err(|e| IdentityError::Backend(e.to_string()))?;
        Ok(self
            .hasher
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    #[instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<UserHandle, IdentityError> {
        let password_hash = self.hash(password)?;

        let handle = match self.accounts.entry(normalize(email)) {
            Entry::Occupied(_) => return Err(IdentityError::EmailInUse),
            Entry::Vacant(slot) => {
                let account = Account {
                    uid: Uuid::new_v4().to_string(),
                    email: email.trim().to_string(),
                    password_hash,
                };
                let handle = UserHandle {
                    uid: account.uid.clone(),
                    email: account.email.clone(),
                };
                slot.insert(account);
                handle
            }
        };

        debug!(uid = %handle.uid, "account created");
        *self.current.write().await = Some(handle.clone());
        Ok(handle)
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserHandle, IdentityError> {
        let account = self
            .accounts
            .get(&normalize(email))
            .map(|entry| entry.value().clone())
            .ok_or(IdentityError::InvalidCredential)?;

        if !self.verify(password, &account.password_hash)? {
            return Err(IdentityError::InvalidCredential);
        }

        let handle = UserHandle {
            uid: account.uid,
            email: account.email,
        };
        *self.current.write().await = Some(handle.clone());
        Ok(handle)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.current.write().await.take();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, uid: &str) -> Result<(), IdentityError> {
        self.accounts.retain(|_, account| account.uid != uid);

        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|handle| handle.uid == uid) {
            current.take();
        }
        debug!(uid, "account deleted");
        Ok(())
    }

    async fn current_user(&self) -> Option<UserHandle> {
        self.current.read().await.clone()
    }
}
