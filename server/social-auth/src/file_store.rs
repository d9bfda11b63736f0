use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use social_auth_types::{AccessTokenRecord, AuthError, TokenStore, User, Username};

const STORE_VERSION: &str = "1.0";

/// File-based persistent implementation of TokenStore
/// Stores access tokens as JSON in the user's home directory
#[derive(Clone)]
pub struct FileTokenStore {
    /// Token file path (e.g., ~/.social-auth/access_tokens.json)
    token_file: PathBuf,
    /// In-memory cache for faster access (synced with the file)
    tokens_cache: Arc<RwLock<HashMap<String, AccessTokenRecord>>>,
}

/// Serializable format for storing access tokens in JSON
#[derive(Debug, Serialize, Deserialize)]
struct StoredTokenData {
    tokens: HashMap<String, AccessTokenRecord>,
    version: String,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl FileTokenStore {
    /// Create a new file-based token store
    /// Tokens will be stored in ~/.social-auth/access_tokens.json
    pub fn new() -> Result<Self, AuthError> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| AuthError::Storage(anyhow::anyhow!("Could not find home directory")))?;

        Self::with_path(home_dir.join(".social-auth").join("access_tokens.json"))
    }

    /// Create a token store backed by an explicit file
    pub fn with_path(token_file: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let token_file = token_file.into();

        if let Some(parent) = token_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    AuthError::Storage(anyhow::anyhow!(
                        "Failed to create token directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(Self {
            token_file,
            tokens_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Open a token store and load existing records from its file
    pub async fn open(token_file: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let store = Self::with_path(token_file)?;
        store.load_from_file().await?;
        Ok(store)
    }

    /// Load all records from the file into the cache
    async fn load_from_file(&self) -> Result<(), AuthError> {
        if !self.token_file.exists() {
            debug!("Token file does not exist, starting fresh");
            return Ok(());
        }

        let content = fs::read_to_string(&self.token_file).map_err(|e| {
            AuthError::Storage(anyhow::anyhow!(
                "Failed to read token file {}: {}",
                self.token_file.display(),
                e
            ))
        })?;

        match serde_json::from_str::<StoredTokenData>(&content) {
            Ok(stored_data) => {
                let mut tokens = self.tokens_cache.write().await;
                *tokens = stored_data.tokens;
                debug!(
                    "Loaded {} access tokens from {}",
                    tokens.len(),
                    self.token_file.display()
                );
            }
            Err(e) => {
                // Keep the unreadable records around instead of overwriting them
                let backup = self.corrupt_backup_path();
                warn!(
                    "Failed to parse token file ({}), moving it to {} and starting fresh",
                    e,
                    backup.display()
                );
                fs::rename(&self.token_file, &backup).map_err(|e| {
                    AuthError::Storage(anyhow::anyhow!(
                        "Failed to move corrupt token file to {}: {}",
                        backup.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Where a token file that cannot be parsed is moved to
    fn corrupt_backup_path(&self) -> PathBuf {
        let mut name = self
            .token_file
            .file_name()
            .map(OsStr::to_os_string)
            .unwrap_or_else(|| OsString::from("access_tokens.json"));
        name.push(".corrupt");
        self.token_file.with_file_name(name)
    }

    /// Save all cached records to the file
    async fn save_to_file(&self) -> Result<(), AuthError> {
        let tokens = self.tokens_cache.read().await;

        let stored_data = StoredTokenData {
            tokens: tokens.clone(),
            version: STORE_VERSION.to_string(),
            updated_at: chrono::Utc::now(),
        };

        let json_content = serde_json::to_string_pretty(&stored_data).map_err(|e| {
            AuthError::Storage(anyhow::anyhow!("Failed to serialize access tokens: {}", e))
        })?;

        // Write a sibling temp file and rename it over the token file
        let dir = self
            .token_file
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
            AuthError::Storage(anyhow::anyhow!("Failed to create temp token file: {}", e))
        })?;
        temp_file
            .write_all(json_content.as_bytes())
            .and_then(|_| temp_file.as_file().sync_all())
            .map_err(|e| {
                AuthError::Storage(anyhow::anyhow!("Failed to write token file: {}", e))
            })?;
        temp_file.persist(&self.token_file).map_err(|e| {
            AuthError::Storage(anyhow::anyhow!("Failed to replace token file: {}", e))
        })?;

        debug!(
            "Saved {} access tokens to {}",
            tokens.len(),
            self.token_file.display()
        );

        Ok(())
    }

    /// Get the path to the token file for external access
    pub fn token_file_path(&self) -> &Path {
        &self.token_file
    }

    /// Clear all stored access tokens
    pub async fn clear_all(&self) -> Result<(), AuthError> {
        info!("Clearing all stored access tokens");

        {
            let mut tokens = self.tokens_cache.write().await;
            tokens.clear();
        }

        self.save_to_file().await
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get_or_create(&self, user: &User) -> Result<(AccessTokenRecord, bool), AuthError> {
        let key = user.username.as_str();

        let record = {
            let mut tokens = self.tokens_cache.write().await;
            if let Some(record) = tokens.get(key) {
                return Ok((record.clone(), false));
            }
            let record = AccessTokenRecord::new(user.username.clone());
            tokens.insert(key.to_string(), record.clone());
            record
        };

        debug!("Created access token record for {}", key);
        self.save_to_file().await?;
        Ok((record, true))
    }

    async fn save(&self, record: &AccessTokenRecord) -> Result<(), AuthError> {
        debug!("Storing access token for {}", record.username);

        {
            let mut tokens = self.tokens_cache.write().await;
            tokens.insert(record.username.to_string(), record.clone());
        }

        self.save_to_file().await
    }

    async fn get(&self, username: &Username) -> Result<Option<AccessTokenRecord>, AuthError> {
        let tokens = self.tokens_cache.read().await;
        Ok(tokens.get(username.as_str()).cloned())
    }

    async fn remove(&self, username: &Username) -> Result<bool, AuthError> {
        debug!("Removing access token for {}", username);

        let removed = {
            let mut tokens = self.tokens_cache.write().await;
            tokens.remove(username.as_str()).is_some()
        };

        if removed {
            self.save_to_file().await?;
        }
        Ok(removed)
    }
}
