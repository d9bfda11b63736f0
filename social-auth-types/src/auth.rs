use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier recorded on a session by the Facebook-Connect backend
pub const FACEBOOK_CONNECT_BACKEND: &str = "social_auth.backends.FacebookConnectBackend";
/// Identifier recorded on a session by the Twitter backend
pub const TWITTER_BACKEND: &str = "social_auth.backends.TwitterBackend";

const USERNAME_SEPARATOR: char = '$';

/// External identity providers that local accounts can be resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Facebook,
    Twitter,
}

impl Provider {
    /// Prefix placed in front of the provider's user id in local usernames
    pub fn username_prefix(&self) -> &'static str {
        match self {
            Provider::Facebook => "fb",
            Provider::Twitter => "tw",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "fb" => Some(Provider::Facebook),
            "tw" => Some(Provider::Twitter),
            _ => None,
        }
    }
}

/// Local username. Accounts created from an external identity use
/// `<provider prefix>$<external id>`, e.g. `fb$12345`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(username: impl Into<String>) -> Self {
        Username(username.into())
    }

    /// Derive the local username for an identity issued by `provider`
    pub fn derive(provider: Provider, external_id: impl fmt::Display) -> Self {
        Username(format!(
            "{}{}{}",
            provider.username_prefix(),
            USERNAME_SEPARATOR,
            external_id
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Provider this username was derived for, if any
    pub fn provider(&self) -> Option<Provider> {
        let (prefix, id) = self.0.split_once(USERNAME_SEPARATOR)?;
        if id.is_empty() {
            return None;
        }
        Provider::from_prefix(prefix)
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Username> for String {
    fn from(username: Username) -> Self {
        username.0
    }
}

/// Identifier of the backend that authenticated a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Self {
        BackendId(id.into())
    }

    pub fn facebook_connect() -> Self {
        BackendId::new(FACEBOOK_CONNECT_BACKEND)
    }

    pub fn twitter() -> Self {
        BackendId::new(TWITTER_BACKEND)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local password state.
///
/// Accounts that only ever authenticate through a provider carry
/// [`Password::Unusable`], which never matches any supplied password.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "hash", rename_all = "snake_case")]
pub enum Password {
    #[default]
    Unset,
    Unusable,
    Hashed(String),
}

impl Password {
    pub fn is_usable(&self) -> bool {
        matches!(self, Password::Hashed(_))
    }
}

/// Local user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: Username,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub password: Password,
    /// Backend that authenticated the current session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendId>,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn new(username: Username) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            first_name: String::new(),
            last_name: String::new(),
            password: Password::Unset,
            backend: None,
            date_joined: Utc::now(),
        }
    }

    pub fn set_unusable_password(&mut self) {
        self.password = Password::Unusable;
    }

    pub fn has_usable_password(&self) -> bool {
        self.password.is_usable()
    }

    /// Split a display name on its first space into first and last name.
    /// A name without a space leaves the last name empty.
    pub fn set_display_name(&mut self, name: &str) {
        let (first, last) = name.split_once(' ').unwrap_or((name, ""));
        self.first_name = first.to_string();
        self.last_name = last.to_string();
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// OAuth token pair (request token or access token)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub key: String,
    pub secret: String,
}

impl OAuthToken {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthToken")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Application credentials registered with an OAuth provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerCredentials {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for ConsumerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Persisted provider access token, one per local user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    pub username: Username,
    pub key: String,
    pub secret: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessTokenRecord {
    pub fn new(username: Username) -> Self {
        let now = Utc::now();
        Self {
            username,
            key: String::new(),
            secret: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the stored key/secret with a freshly issued token
    pub fn update_token(&mut self, token: &OAuthToken) {
        self.key = token.key.clone();
        self.secret = token.secret.clone();
        self.updated_at = Utc::now();
    }

    pub fn token(&self) -> OAuthToken {
        OAuthToken::new(self.key.clone(), self.secret.clone())
    }
}

/// Profile returned by the Twitter user-info call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwitterProfile {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_name: Option<String>,
}

/// Parts of an inbound HTTP request a provider session client inspects
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub cookies: HashMap<String, String>,
    pub params: HashMap<String, String>,
}

impl InboundRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

/// Credentials for the Facebook-Connect backend: the inbound request and the
/// provider session client attached to it
#[derive(Clone)]
pub struct FacebookCredentials {
    pub request: InboundRequest,
    pub session: Arc<dyn FacebookSession>,
}

impl fmt::Debug for FacebookCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacebookCredentials")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Credentials for the Twitter backend: the authorized request token and the
/// verifier the provider handed back with it, if any
#[derive(Debug, Clone)]
pub struct TwitterCredentials {
    pub request_token: OAuthToken,
    pub verifier: Option<String>,
}

impl TwitterCredentials {
    pub fn new(request_token: OAuthToken) -> Self {
        Self {
            request_token,
            verifier: None,
        }
    }

    pub fn with_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.verifier = Some(verifier.into());
        self
    }
}

/// Credential set handed to the authentication chain.
///
/// Each backend only acts on its own variant and abstains on the others.
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    #[default]
    None,
    Facebook(FacebookCredentials),
    Twitter(TwitterCredentials),
}

/// Successful authentication: the resolved user and the backend that resolved it
#[derive(Debug, Clone, PartialEq)]
pub struct Authenticated {
    pub user: User,
    pub backend: BackendId,
}

impl Authenticated {
    pub fn new(mut user: User, backend: BackendId) -> Self {
        user.backend = Some(backend.clone());
        Self { user, backend }
    }
}

/// Errors raised by provider clients
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Provider rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the failure happened at the HTTP/transport level
    pub fn is_transport(&self) -> bool {
        matches!(self, ProviderError::Transport(_) | ProviderError::Http { .. })
    }
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Token exchange failed: {0}")]
    TokenExchange(ProviderError),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Invalid authentication configuration: {0}")]
    InvalidConfig(String),
}

/// A pluggable strategy that resolves a local user from a credential set.
///
/// `Ok(None)` means the backend abstains and the next one should be tried.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    fn backend_id(&self) -> BackendId;

    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<Authenticated>, AuthError>;
}

/// Request-scoped Facebook session client
#[async_trait]
pub trait FacebookSession: Send + Sync {
    /// Validate the provider session carried by the request
    async fn check_session(&self, request: &InboundRequest) -> Result<bool, ProviderError>;

    /// Provider user id of the validated session
    fn uid(&self) -> Option<String>;

    /// Fetch profile fields for the given provider user ids
    async fn get_info(
        &self,
        ids: &[String],
        fields: &[&str],
    ) -> Result<Vec<HashMap<String, serde_json::Value>>, ProviderError>;
}

/// Twitter API client bound to a consumer and, optionally, an OAuth token
#[async_trait]
pub trait TwitterApi: Send + Sync {
    /// Obtain an unauthorized request token
    async fn get_request_token(&self) -> Result<OAuthToken, ProviderError>;

    /// Exchange the bound (authorized) request token for an access token
    async fn get_access_token(&self, verifier: Option<&str>) -> Result<OAuthToken, ProviderError>;

    /// Profile of the user the bound access token belongs to
    async fn get_user_info(&self) -> Result<TwitterProfile, ProviderError>;
}

/// Builds Twitter clients for a consumer and token
pub trait TwitterApiFactory: Send + Sync {
    fn client(
        &self,
        consumer: &ConsumerCredentials,
        token: Option<&OAuthToken>,
    ) -> Arc<dyn TwitterApi>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_uses_provider_prefix() {
        assert_eq!(Username::derive(Provider::Facebook, 12345).as_str(), "fb$12345");
        assert_eq!(Username::derive(Provider::Twitter, "67890").as_str(), "tw$67890");
    }

    #[test]
    fn test_username_is_deterministic_and_distinct() {
        let a = Username::derive(Provider::Facebook, 42);
        let b = Username::derive(Provider::Facebook, 42);
        let c = Username::derive(Provider::Facebook, 43);
        let d = Username::derive(Provider::Twitter, 42);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_username_provider_lookup() {
        assert_eq!(
            Username::derive(Provider::Twitter, 7).provider(),
            Some(Provider::Twitter)
        );
        assert_eq!(Username::new("admin").provider(), None);
        assert_eq!(Username::new("fb$").provider(), None);
        assert_eq!(Username::new("gh$1").provider(), None);
    }

    #[test]
    fn test_display_name_split() {
        let mut user = User::new(Username::new("tw$1"));
        user.set_display_name("Foo Barger");
        assert_eq!(user.first_name, "Foo");
        assert_eq!(user.last_name, "Barger");

        user.set_display_name("Foo van Barger");
        assert_eq!(user.first_name, "Foo");
        assert_eq!(user.last_name, "van Barger");

        user.set_display_name("Cher");
        assert_eq!(user.first_name, "Cher");
        assert_eq!(user.last_name, "");
        assert_eq!(user.full_name(), "Cher");
    }

    #[test]
    fn test_unusable_password() {
        let mut user = User::new(Username::new("fb$1"));
        assert!(!user.has_usable_password());
        user.set_unusable_password();
        assert_eq!(user.password, Password::Unusable);
        assert!(!user.has_usable_password());
        assert!(Password::Hashed("x".to_string()).is_usable());
    }

    #[test]
    fn test_authenticated_records_backend_on_user() {
        let user = User::new(Username::new("fb$1"));
        let auth = Authenticated::new(user, BackendId::facebook_connect());
        assert_eq!(auth.user.backend, Some(BackendId::facebook_connect()));
        assert_eq!(auth.backend.as_str(), FACEBOOK_CONNECT_BACKEND);
    }

    #[test]
    fn test_transport_classification() {
        assert!(ProviderError::Transport("reset".into()).is_transport());
        assert!(ProviderError::Http {
            status: 401,
            body: "".into()
        }
        .is_transport());
        assert!(!ProviderError::Rejected("nope".into()).is_transport());
    }

    #[test]
    fn test_token_debug_redacts_secret() {
        let token = OAuthToken::new("key", "very-secret");
        let rendered = format!("{:?}", token);
        assert!(rendered.contains("key"));
        assert!(!rendered.contains("very-secret"));
    }
}
