use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use social_auth_types::SocialAuthConfig;

/// Environment variables that override configuration values
pub const TWITTER_CONSUMER_KEY_VAR: &str = "TWITTER_CONSUMER_KEY";
pub const TWITTER_CONSUMER_SECRET_VAR: &str = "TWITTER_CONSUMER_SECRET";
pub const TWITTER_AUTHORIZE_URL_VAR: &str = "TWITTER_AUTHORIZE_URL";
pub const TWITTER_API_BASE_URL_VAR: &str = "TWITTER_API_BASE_URL";
pub const FACEBOOK_API_KEY_VAR: &str = "FACEBOOK_API_KEY";
pub const FACEBOOK_SECRET_VAR: &str = "FACEBOOK_SECRET";

/// Load the embedded default configuration
pub fn default_config() -> Result<SocialAuthConfig> {
    let default_config = include_str!("default_config.json");
    serde_json::from_str(default_config).context("Failed to parse default auth configuration")
}

/// Load configuration from a JSON file
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<SocialAuthConfig> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read auth config file: {:?}", path.as_ref()))?;

    serde_json::from_str(&content).context("Failed to parse auth configuration")
}

/// Build configuration from the embedded defaults and the environment.
/// A `.env` file in the working directory is loaded first if present.
pub fn config_from_env() -> Result<SocialAuthConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from {}", path.display());
    }

    let mut config = default_config()?;
    apply_overrides(&mut config, |name| env::var(name).ok());
    Ok(config)
}

/// Apply overrides from `lookup` (normally the process environment)
pub fn apply_overrides<F>(config: &mut SocialAuthConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let twitter = &mut config.twitter;
    let facebook = &mut config.facebook;
    let overrides: [(&str, &mut String); 6] = [
        (TWITTER_CONSUMER_KEY_VAR, &mut twitter.consumer_key),
        (TWITTER_CONSUMER_SECRET_VAR, &mut twitter.consumer_secret),
        (TWITTER_AUTHORIZE_URL_VAR, &mut twitter.authorize_url),
        (TWITTER_API_BASE_URL_VAR, &mut twitter.api_base_url),
        (FACEBOOK_API_KEY_VAR, &mut facebook.api_key),
        (FACEBOOK_SECRET_VAR, &mut facebook.secret),
    ];

    for (name, slot) in overrides {
        if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
            debug!("Auth setting overridden by {}", name);
            *slot = value;
        }
    }
}
