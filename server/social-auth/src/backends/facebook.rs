use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::memory_store::MemoryUserStore;
use social_auth_types::{
    AuthBackend, AuthError, Authenticated, BackendId, Credentials, FacebookCredentials, Provider,
    UserStore, Username,
};

const PROFILE_NAME_FIELD: &str = "name";

/// Authenticates inbound requests that carry a valid Facebook Connect session
#[derive(Clone)]
pub struct FacebookConnectBackend {
    user_store: Arc<dyn UserStore>,
}

impl Default for FacebookConnectBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FacebookConnectBackend {
    /// Create a backend over the default in-memory user store
    pub fn new() -> Self {
        Self::with_user_store(Arc::new(MemoryUserStore::new()))
    }

    /// Create a backend over an injected user store
    pub fn with_user_store(user_store: Arc<dyn UserStore>) -> Self {
        Self { user_store }
    }

    pub fn user_store(&self) -> &Arc<dyn UserStore> {
        &self.user_store
    }

    async fn authenticate_session(
        &self,
        credentials: &FacebookCredentials,
    ) -> Result<Option<Authenticated>, AuthError> {
        let FacebookCredentials { request, session } = credentials;

        if !session.check_session(request).await? {
            debug!("Facebook session check failed");
            return Ok(None);
        }

        let Some(uid) = session.uid().filter(|uid| !uid.trim().is_empty()) else {
            debug!("Facebook session is valid but carries no user id");
            return Ok(None);
        };
        let username = Username::derive(Provider::Facebook, &uid);

        if let Some(user) = self.user_store.get(&username).await? {
            debug!("Resolved existing user {}", username);
            return Ok(Some(Authenticated::new(user, self.backend_id())));
        }

        let mut user = self.user_store.create(&username).await?;
        user.set_unusable_password();
        self.user_store.save(&user).await?;
        info!("Created user {} from Facebook session", username);

        let profiles = session.get_info(&[uid], &[PROFILE_NAME_FIELD]).await?;
        let name = profiles
            .first()
            .and_then(|profile| profile.get(PROFILE_NAME_FIELD))
            .and_then(|value| value.as_str());
        debug!("Facebook profile name for {}: {:?}", username, name);

        Ok(Some(Authenticated::new(user, self.backend_id())))
    }
}

#[async_trait]
impl AuthBackend for FacebookConnectBackend {
    fn backend_id(&self) -> BackendId {
        BackendId::facebook_connect()
    }

    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<Authenticated>, AuthError> {
        match credentials {
            Credentials::Facebook(facebook) => self.authenticate_session(facebook).await,
            _ => Ok(None),
        }
    }
}
