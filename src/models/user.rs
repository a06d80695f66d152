use serde::{Deserialize, Serialize};

/// Document collection holding user profiles, keyed by identity uid.
pub const USERS_COLLECTION: &str = "users";

/// Account handle returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserHandle {
    pub uid: String,
    pub email: String,
}

/// Profile stored next to the identity account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Identity-provider uid; the document key, not part of the body.
    #[serde(skip)]
    pub uid: String,
    pub user_id: String,
    pub email: String,
    pub nickname: String,
    pub is_seller: bool,
}

impl UserProfile {
    /// Authoring context for this user, if they may list products.
    pub fn seller_context(&self) -> Option<SellerContext> {
        self.is_seller.then(|| SellerContext::new(self.user_id.clone()))
    }
}

/// Explicit identity of the seller an authoring session acts for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SellerContext {
    pub seller_id: String,
}

impl SellerContext {
    pub fn new(seller_id: impl Into<String>) -> Self {
        Self {
            seller_id: seller_id.into(),
        }
    }
}
