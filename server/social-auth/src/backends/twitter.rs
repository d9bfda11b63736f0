use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use crate::memory_store::{MemoryTokenStore, MemoryUserStore};
use social_auth_types::{
    AuthBackend, AuthError, Authenticated, BackendId, ConsumerCredentials, Credentials,
    OAuthToken, Provider, ProviderError, TokenStore, TwitterApi, TwitterApiFactory, TwitterConfig,
    TwitterCredentials, UserStore, Username,
};

/// Authenticates an authorized Twitter request token by exchanging it for an
/// access token and resolving the profile it belongs to
#[derive(Clone)]
pub struct TwitterBackend {
    config: TwitterConfig,
    api: Arc<dyn TwitterApiFactory>,
    user_store: Arc<dyn UserStore>,
    token_store: Arc<dyn TokenStore>,
}

impl TwitterBackend {
    /// Create a backend over the default in-memory user and token stores
    pub fn new(config: TwitterConfig, api: Arc<dyn TwitterApiFactory>) -> Self {
        Self {
            config,
            api,
            user_store: Arc::new(MemoryUserStore::new()),
            token_store: Arc::new(MemoryTokenStore::new()),
        }
    }

    pub fn with_user_store(mut self, user_store: Arc<dyn UserStore>) -> Self {
        self.user_store = user_store;
        self
    }

    pub fn with_token_store(mut self, token_store: Arc<dyn TokenStore>) -> Self {
        self.token_store = token_store;
        self
    }

    pub fn user_store(&self) -> &Arc<dyn UserStore> {
        &self.user_store
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.token_store
    }

    pub fn config(&self) -> &TwitterConfig {
        &self.config
    }

    /// Consumer credentials every client built by this backend is signed with
    pub fn consumer(&self) -> ConsumerCredentials {
        self.config.consumer()
    }

    /// Build a client for the configured consumer, bound to `token` if given
    pub fn client(&self, token: Option<&OAuthToken>) -> Arc<dyn TwitterApi> {
        self.api.client(&self.consumer(), token)
    }

    /// URL the user agent is sent to for authorizing `request_token`
    pub fn authorization_url(&self, request_token: &OAuthToken) -> Result<String, AuthError> {
        let mut url = Url::parse(&self.config.authorize_url)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid authorize URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("oauth_token", &request_token.key);
        Ok(url.to_string())
    }

    /// Run the full exchange for an authorized request token.
    ///
    /// Provider failures surface as [`AuthError::TokenExchange`]; store
    /// failures keep their own variants.
    pub async fn exchange(
        &self,
        credentials: &TwitterCredentials,
    ) -> Result<Authenticated, AuthError> {
        let access_token = self
            .client(Some(&credentials.request_token))
            .get_access_token(credentials.verifier.as_deref())
            .await
            .map_err(AuthError::TokenExchange)?;

        let profile = self
            .client(Some(&access_token))
            .get_user_info()
            .await
            .map_err(AuthError::TokenExchange)?;

        if profile.id.trim().is_empty() {
            return Err(AuthError::TokenExchange(ProviderError::InvalidResponse(
                "profile carries no user id".to_string(),
            )));
        }
        let username = Username::derive(Provider::Twitter, &profile.id);

        let user = match self.user_store.get(&username).await? {
            Some(user) => {
                debug!("Resolved existing user {}", username);
                user
            }
            None => {
                let mut user = self.user_store.create(&username).await?;
                user.set_display_name(&profile.name);
                user.set_unusable_password();
                self.user_store.save(&user).await?;
                info!("Created user {} from Twitter profile", username);
                user
            }
        };

        let (mut record, created) = self.token_store.get_or_create(&user).await?;
        record.update_token(&access_token);
        self.token_store.save(&record).await?;
        debug!(
            "Stored Twitter access token for {} (new record: {})",
            username, created
        );

        Ok(Authenticated::new(user, self.backend_id()))
    }
}

#[async_trait]
impl AuthBackend for TwitterBackend {
    fn backend_id(&self) -> BackendId {
        BackendId::twitter()
    }

    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<Authenticated>, AuthError> {
        let Credentials::Twitter(twitter) = credentials else {
            return Ok(None);
        };

        match self.exchange(twitter).await {
            Ok(authenticated) => Ok(Some(authenticated)),
            Err(AuthError::TokenExchange(e)) => {
                if e.is_transport() {
                    warn!("Twitter token exchange failed in transport: {}", e);
                } else {
                    warn!("Twitter rejected the token exchange: {}", e);
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
