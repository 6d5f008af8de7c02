//! Google OAuth credential resolution.
//!
//! A [`CredentialProvider`] owns the process-wide credential cache. The first
//! caller resolves a credential from inline configuration or the token file
//! (falling back to the interactive browser flow); later callers reuse it and
//! refresh it when it expires. Resolution and refresh run under one async
//! mutex so concurrent first calls never start more than one refresh or flow.

pub mod oauth;

use crate::config::{DEFAULT_TOKEN_URI, InlineCredentials, ServerConfig};
use crate::errors::AuthError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const EXPIRY_SKEW_SECS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// OAuth user credential, stored on disk in Google's "authorized user" JSON
/// layout so token files written by other Google tooling load unchanged.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "token", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

impl Credential {
    pub fn from_inline(inline: &InlineCredentials, token_uri: &str) -> Self {
        Self {
            access_token: None,
            refresh_token: Some(inline.refresh_token.clone()),
            token_uri: token_uri.to_string(),
            client_id: inline.client_id.clone(),
            client_secret: inline.client_secret.clone(),
            scopes: vec![SHEETS_SCOPE.to_string()],
            expiry: None,
        }
    }

    /// A credential without an access token, or within the skew window of
    /// its expiry, must be refreshed before use. No recorded expiry means the
    /// token is taken as valid.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_none() {
            return true;
        }
        match self.expiry {
            Some(expiry) => now + ChronoDuration::seconds(EXPIRY_SKEW_SECS) >= expiry,
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}

#[derive(Debug, Clone)]
pub enum CredentialSource {
    Inline {
        credentials: InlineCredentials,
        token_uri: String,
    },
    TokenFile {
        token_path: PathBuf,
        client_secret_path: PathBuf,
    },
}

impl CredentialSource {
    pub fn from_config(config: &ServerConfig) -> Self {
        match config.inline_credentials.as_ref() {
            Some(credentials) => Self::Inline {
                credentials: credentials.clone(),
                token_uri: config.token_uri.clone(),
            },
            None => Self::TokenFile {
                token_path: config.token_file(),
                client_secret_path: config.client_secret_file(),
            },
        }
    }
}

pub struct CredentialProvider {
    source: CredentialSource,
    http: reqwest::Client,
    cached: Mutex<Option<Credential>>,
}

impl CredentialProvider {
    pub fn new(source: CredentialSource, timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Refresh(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            source,
            http,
            cached: Mutex::new(None),
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, AuthError> {
        Self::new(
            CredentialSource::from_config(config),
            config.request_timeout(),
        )
    }

    /// Returns a credential whose access token is currently valid.
    pub async fn credential(&self) -> Result<Credential, AuthError> {
        let mut cached = self.cached.lock().await;

        if let Some(credential) = cached.as_mut() {
            if !credential.is_expired() {
                return Ok(credential.clone());
            }
            if credential.can_refresh() {
                oauth::refresh(&self.http, credential).await?;
                info!("refreshed Google OAuth credentials");
                self.persist(credential).await?;
                return Ok(credential.clone());
            }
            warn!("cached credential expired without a refresh token; resolving again");
            *cached = None;
        }

        let credential = self.resolve().await?;
        *cached = Some(credential.clone());
        Ok(credential)
    }

    pub async fn access_token(&self) -> Result<String, AuthError> {
        let credential = self.credential().await?;
        credential
            .access_token
            .ok_or_else(|| AuthError::Refresh("token endpoint returned no access token".into()))
    }

    /// Drops the cached credential so the next call resolves from scratch.
    pub async fn reset(&self) {
        self.cached.lock().await.take();
    }

    async fn resolve(&self) -> Result<Credential, AuthError> {
        match &self.source {
            CredentialSource::Inline {
                credentials,
                token_uri,
            } => {
                debug!("resolving credentials from inline configuration");
                let mut credential = Credential::from_inline(credentials, token_uri);
                oauth::refresh(&self.http, &mut credential).await?;
                info!("refreshed Google OAuth credentials from inline configuration");
                Ok(credential)
            }
            CredentialSource::TokenFile {
                token_path,
                client_secret_path,
            } => self.resolve_from_files(token_path, client_secret_path).await,
        }
    }

    async fn resolve_from_files(
        &self,
        token_path: &Path,
        client_secret_path: &Path,
    ) -> Result<Credential, AuthError> {
        if let Some(mut credential) = read_token_file(token_path).await? {
            if !credential.is_expired() {
                debug!(path = ?token_path, "using stored token");
                return Ok(credential);
            }
            if credential.can_refresh() {
                oauth::refresh(&self.http, &mut credential).await?;
                info!("refreshed Google OAuth credentials");
                write_token_file(token_path, &credential).await?;
                return Ok(credential);
            }
            warn!(path = ?token_path, "stored token expired and cannot be refreshed");
        }

        if !client_secret_path.is_file() {
            return Err(AuthError::Configuration(client_secret_path.to_path_buf()));
        }

        let secrets = oauth::ClientSecrets::load(client_secret_path).await?;
        let credential =
            oauth::run_installed_flow(&self.http, &secrets, &[SHEETS_SCOPE.to_string()]).await?;
        info!("obtained new Google OAuth credentials");
        write_token_file(token_path, &credential).await?;
        Ok(credential)
    }

    async fn persist(&self, credential: &Credential) -> Result<(), AuthError> {
        match &self.source {
            CredentialSource::Inline { .. } => Ok(()),
            CredentialSource::TokenFile { token_path, .. } => {
                write_token_file(token_path, credential).await
            }
        }
    }
}

pub async fn read_token_file(path: &Path) -> Result<Option<Credential>, AuthError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AuthError::io(path, e)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| AuthError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

pub async fn write_token_file(path: &Path, credential: &Credential) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AuthError::io(parent, e))?;
    }
    let body = serde_json::to_string_pretty(credential).map_err(|source| AuthError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    tokio::fs::write(path, body)
        .await
        .map_err(|e| AuthError::io(path, e))?;
    restrict_permissions(path);
    debug!(path = ?path, "stored OAuth token");
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        warn!(path = ?path, "failed to restrict token file permissions: {e}");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
