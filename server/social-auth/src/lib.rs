// Authentication backends for social-network logins
// Contains the Facebook-Connect and Twitter backends, the chain that runs them,
// reference user/token stores and the login routes

pub mod auth_routes;
pub mod backends;
pub mod chain;
pub mod config;
pub mod file_store;
pub mod memory_store;

#[cfg(test)]
mod tests;

// Re-export commonly used types and traits from social-auth-types
pub use social_auth_types::{
    AccessTokenRecord, AuthBackend, AuthError, Authenticated, BackendId, Credentials,
    FacebookCredentials, FacebookSession, InboundRequest, OAuthToken, ProviderError,
    SocialAuthConfig, TokenStore, TwitterApi, TwitterApiFactory, TwitterCredentials, User,
    UserStore, Username,
};

pub use auth_routes::{configure_auth_routes, AuthState, LoginResponse};
pub use backends::*;
pub use chain::AuthChain;
pub use config::{config_from_env, default_config, load_config_file};
pub use file_store::FileTokenStore;
pub use memory_store::{MemoryTokenStore, MemoryUserStore};
