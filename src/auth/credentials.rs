//! Credential store interface and implementations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Canonical key for the access token, used for both reads and writes.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Canonical key for the refresh token, used for both reads and writes.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// An access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(alias = "access_token")]
    pub access_token: String,
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
    /// Lifetime hint in seconds as reported by the server. Never derived by
    /// decoding the token.
    #[serde(default, alias = "expires_in", skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_in: None,
        }
    }
}

/// Where the transport reads and replaces tokens.
pub trait CredentialStore: Send + Sync {
    fn access_token(&self) -> Option<String>;

    fn refresh_token(&self) -> Option<String>;

    fn set_tokens(&self, tokens: &TokenPair);

    fn clear(&self);
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    values: RwLock<HashMap<&'static str, String>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: &TokenPair) -> Self {
        let store = Self::new();
        store.set_tokens(tokens);
        store
    }

    fn get(&self, key: &'static str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN_KEY)
    }

    fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN_KEY)
    }

    fn set_tokens(&self, tokens: &TokenPair) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(ACCESS_TOKEN_KEY, tokens.access_token.clone());
        values.insert(REFRESH_TOKEN_KEY, tokens.refresh_token.clone());
    }

    fn clear(&self) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Credential store persisted as a JSON object on disk.
///
/// Every mutation rewrites the file. Write failures are logged; the
/// in-memory view stays authoritative for this process.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
}

impl FileCredentialStore {
    /// Open the store, loading existing tokens if the file exists.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let map: HashMap<String, String> = serde_json::from_reader(reader)?;
            tracing::debug!(path = ?path, "Loaded credentials from file");
            map
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write to a sibling file and rename it over the target, so a failed
    /// write never leaves a truncated store behind.
    fn save(&self, values: &HashMap<String, String>) {
        let staging = self.staging_path();
        let result = File::create(&staging)
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, values).map_err(std::io::Error::from)?;
                writer.flush()?;
                writer.get_ref().sync_all()
            })
            .and_then(|()| std::fs::rename(&staging, &self.path));
        if let Err(e) = result {
            std::fs::remove_file(&staging).unwrap_or_default();
            tracing::error!(path = ?self.path, error = %e, "Failed to persist credentials");
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN_KEY)
    }

    fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN_KEY)
    }

    fn set_tokens(&self, tokens: &TokenPair) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(ACCESS_TOKEN_KEY.to_string(), tokens.access_token.clone());
        values.insert(REFRESH_TOKEN_KEY.to_string(), tokens.refresh_token.clone());
        self.save(&values);
    }

    fn clear(&self) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.clear();
        self.save(&values);
    }
}
