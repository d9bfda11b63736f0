use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::{AuthError, ConsumerCredentials};

fn default_authorize_url() -> String {
    "http://twitter.com/oauth/authorize".to_string()
}

fn default_api_base_url() -> String {
    "https://api.twitter.com".to_string()
}

/// Root configuration handed to the backends and routes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SocialAuthConfig {
    #[serde(default)]
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub facebook: FacebookConfig,
}

/// Twitter application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TwitterConfig {
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
    /// Page the user agent is sent to for authorizing a request token
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            authorize_url: default_authorize_url(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl TwitterConfig {
    pub fn consumer(&self) -> ConsumerCredentials {
        ConsumerCredentials {
            key: self.consumer_key.clone(),
            secret: self.consumer_secret.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.consumer_key.trim().is_empty() || self.consumer_secret.trim().is_empty() {
            return Err(AuthError::InvalidConfig(
                "Twitter consumer key and secret are required".to_string(),
            ));
        }
        Url::parse(&self.authorize_url)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid authorize URL: {}", e)))?;
        Url::parse(&self.api_base_url)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid API base URL: {}", e)))?;
        Ok(())
    }
}

/// Facebook application settings, consumed by the host's session client
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacebookConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret: String,
}

impl SocialAuthConfig {
    pub fn validate(&self) -> Result<(), AuthError> {
        self.twitter.validate()
    }
}
