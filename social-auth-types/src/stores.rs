use async_trait::async_trait;

use crate::auth::{AccessTokenRecord, AuthError, User, Username};

/// Username-keyed user storage supplied by the host application
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by username; `None` when no such user exists
    async fn get(&self, username: &Username) -> Result<Option<User>, AuthError>;

    /// Create and persist a new user. Fails with [`AuthError::UserExists`]
    /// when the username is taken.
    async fn create(&self, username: &Username) -> Result<User, AuthError>;

    /// Persist changes to an existing user
    async fn save(&self, user: &User) -> Result<(), AuthError>;
}

/// Storage for provider access tokens, one record per user
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Fetch the user's token record, creating an empty one if missing.
    /// The flag is `true` when the record was created by this call.
    async fn get_or_create(&self, user: &User) -> Result<(AccessTokenRecord, bool), AuthError>;

    async fn save(&self, record: &AccessTokenRecord) -> Result<(), AuthError>;

    async fn get(&self, username: &Username) -> Result<Option<AccessTokenRecord>, AuthError>;

    async fn remove(&self, username: &Username) -> Result<bool, AuthError>;
}
