use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use social_auth_types::{AccessTokenRecord, AuthError, TokenStore, User, UserStore, Username};

/// In-memory user store, the default store for both backends
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Username, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, username: &Username) -> Result<Option<User>, AuthError> {
        let users = self.users.read().await;
        Ok(users.get(username).cloned())
    }

    async fn create(&self, username: &Username) -> Result<User, AuthError> {
        let mut users = self.users.write().await;
        if users.contains_key(username) {
            return Err(AuthError::UserExists(username.to_string()));
        }

        let user = User::new(username.clone());
        users.insert(username.clone(), user.clone());
        debug!("Created user record for {}", username);
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        let mut stored = user.clone();
        // The authenticating backend belongs to the session, not the record
        stored.backend = None;
        users.insert(user.username.clone(), stored);
        Ok(())
    }
}

/// In-memory access token store
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<RwLock<HashMap<Username, AccessTokenRecord>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get_or_create(&self, user: &User) -> Result<(AccessTokenRecord, bool), AuthError> {
        let mut tokens = self.tokens.write().await;
        if let Some(record) = tokens.get(&user.username) {
            return Ok((record.clone(), false));
        }

        let record = AccessTokenRecord::new(user.username.clone());
        tokens.insert(user.username.clone(), record.clone());
        Ok((record, true))
    }

    async fn save(&self, record: &AccessTokenRecord) -> Result<(), AuthError> {
        let mut tokens = self.tokens.write().await;
        tokens.insert(record.username.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, username: &Username) -> Result<Option<AccessTokenRecord>, AuthError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(username).cloned())
    }

    async fn remove(&self, username: &Username) -> Result<bool, AuthError> {
        let mut tokens = self.tokens.write().await;
        Ok(tokens.remove(username).is_some())
    }
}
