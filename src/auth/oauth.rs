//! OAuth2 token endpoint calls and the installed-app loopback flow.

use super::Credential;
use crate::errors::AuthError;
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
};
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info, warn};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const FLOW_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// One section of a downloaded Google OAuth client file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "super::default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub async fn load(path: &Path) -> Result<Self, AuthError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AuthError::io(path, e))?;
        Self::parse(&contents).map_err(|source| AuthError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let file: ClientSecretsFile = serde_json::from_str(contents)?;
        match file.installed.or(file.web) {
            Some(secrets) => Ok(secrets),
            None => serde_json::from_str(contents),
        }
    }
}

/// Exchanges the refresh token for a new access token, updating `credential`
/// in place.
pub async fn refresh(http: &reqwest::Client, credential: &mut Credential) -> Result<(), AuthError> {
    let refresh_token = credential
        .refresh_token
        .clone()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::Refresh("credential has no refresh token".into()))?;

    let mut params = HashMap::new();
    params.insert("grant_type", "refresh_token");
    params.insert("client_id", credential.client_id.as_str());
    params.insert("client_secret", credential.client_secret.as_str());
    params.insert("refresh_token", refresh_token.as_str());

    let response = post_form(http, &credential.token_uri, &params)
        .await
        .map_err(AuthError::Refresh)?;
    apply_token_response(credential, response);
    Ok(())
}

pub async fn exchange_code(
    http: &reqwest::Client,
    secrets: &ClientSecrets,
    code: &str,
    code_verifier: &str,
    redirect_uri: &str,
) -> Result<TokenResponse, AuthError> {
    info!("exchanging authorization code for tokens");

    let mut params = HashMap::new();
    params.insert("grant_type", "authorization_code");
    params.insert("client_id", secrets.client_id.as_str());
    params.insert("client_secret", secrets.client_secret.as_str());
    params.insert("code", code);
    params.insert("code_verifier", code_verifier);
    params.insert("redirect_uri", redirect_uri);

    post_form(http, &secrets.token_uri, &params)
        .await
        .map_err(AuthError::Flow)
}

fn apply_token_response(credential: &mut Credential, response: TokenResponse) {
    credential.access_token = Some(response.access_token);
    if let Some(refresh_token) = response.refresh_token.filter(|t| !t.is_empty()) {
        credential.refresh_token = Some(refresh_token);
    }
    let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    credential.expiry = Some(Utc::now() + ChronoDuration::seconds(expires_in));
    if let Some(scope) = response.scope {
        credential.scopes = scope.split_whitespace().map(str::to_string).collect();
    }
}

async fn post_form(
    http: &reqwest::Client,
    url: &str,
    params: &HashMap<&str, &str>,
) -> Result<TokenResponse, String> {
    let response = http
        .post(url)
        .form(params)
        .send()
        .await
        .map_err(|e| format!("HTTP request failed: {e}"))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| format!("failed to read response body: {e}"))?;

    if !status.is_success() {
        error!("token endpoint returned {status}");
        return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(desc) => format!("{}: {}", err.error, desc),
                None => err.error,
            },
            Err(_) => format!("HTTP {status}: {body}"),
        });
    }

    serde_json::from_str(&body).map_err(|e| format!("invalid token response: {e}"))
}

/// Runs the installed-app authorization flow: opens the consent page in the
/// browser and waits on a loopback listener for the redirect.
pub async fn run_installed_flow(
    http: &reqwest::Client,
    secrets: &ClientSecrets,
    scopes: &[String],
) -> Result<Credential, AuthError> {
    let code_verifier = generate_code_verifier();
    let code_challenge = code_challenge(&code_verifier);
    let state = generate_state();

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| AuthError::Flow(format!("failed to bind local server: {e}")))?;
    let port = listener
        .local_addr()
        .map_err(|e| AuthError::Flow(format!("failed to read local address: {e}")))?
        .port();
    let redirect_uri = format!("http://127.0.0.1:{port}");
    debug!("OAuth callback server listening on {redirect_uri}");

    let auth_url = authorize_url(secrets, scopes, &state, &code_challenge, &redirect_uri);
    info!("opening browser for Google authorization");
    if let Err(e) = open::that(&auth_url) {
        warn!("failed to open browser: {e}");
    }
    // stdout belongs to the stdio transport
    eprintln!("Authorize this application by visiting:\n{auth_url}");

    let code = wait_for_code(listener, &state, FLOW_TIMEOUT).await?;

    let tokens = exchange_code(http, secrets, &code, &code_verifier, &redirect_uri).await?;
    let mut credential = Credential {
        access_token: None,
        refresh_token: None,
        token_uri: secrets.token_uri.clone(),
        client_id: secrets.client_id.clone(),
        client_secret: secrets.client_secret.clone(),
        scopes: scopes.to_vec(),
        expiry: None,
    };
    apply_token_response(&mut credential, tokens);
    Ok(credential)
}

pub fn authorize_url(
    secrets: &ClientSecrets,
    scopes: &[String],
    state: &str,
    code_challenge: &str,
    redirect_uri: &str,
) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&code_challenge={}&code_challenge_method=S256&access_type=offline&prompt=consent",
        secrets.auth_uri,
        urlencoding::encode(&secrets.client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes.join(" ")),
        urlencoding::encode(state),
        urlencoding::encode(code_challenge),
    )
}

#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

struct CallbackState {
    expected_state: String,
    outcome: Mutex<Option<oneshot::Sender<Result<String, AuthError>>>>,
}

impl CallbackState {
    async fn finish(&self, outcome: Result<String, AuthError>) {
        if let Some(tx) = self.outcome.lock().await.take() {
            let _ = tx.send(outcome);
        }
    }
}

async fn oauth_callback(
    State(callback): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<String>) {
    if let Some(error) = params.error {
        let desc = params
            .error_description
            .unwrap_or_else(|| "unknown error".to_string());
        callback
            .finish(Err(AuthError::Flow(format!("{error}: {desc}"))))
            .await;
        return (StatusCode::BAD_REQUEST, page("Authorization failed."));
    }

    let (Some(code), Some(state)) = (params.code, params.state) else {
        return (StatusCode::NOT_FOUND, page("Waiting for authorization."));
    };

    if state != callback.expected_state {
        callback
            .finish(Err(AuthError::Flow(
                "state mismatch in authorization response".into(),
            )))
            .await;
        return (StatusCode::BAD_REQUEST, page("Invalid state parameter."));
    }

    callback.finish(Ok(code)).await;
    (
        StatusCode::OK,
        page("Authentication successful. You can close this tab."),
    )
}

fn page(message: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html><head><title>Google Sheets MCP</title></head><body><p>{message}</p></body></html>"
    ))
}

/// Serves the loopback redirect on `listener` until a callback carrying a
/// code, an error, or a wrong `state` arrives, or `timeout` elapses.
async fn wait_for_code(
    listener: TcpListener,
    expected_state: &str,
    timeout: Duration,
) -> Result<String, AuthError> {
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let callback = Arc::new(CallbackState {
        expected_state: expected_state.to_string(),
        outcome: Mutex::new(Some(outcome_tx)),
    });
    let router = Router::new()
        .route("/", get(oauth_callback))
        .with_state(callback);

    let mut server = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("OAuth callback server error: {e}");
        }
        debug!("OAuth callback server stopped");
    });

    let outcome = tokio::time::timeout(timeout, outcome_rx).await;
    let _ = shutdown_tx.send(());
    if tokio::time::timeout(Duration::from_secs(5), &mut server)
        .await
        .is_err()
    {
        warn!("OAuth callback server did not stop in time");
        server.abort();
    }

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(AuthError::Flow("callback server stopped unexpectedly".into())),
        Err(_) => Err(AuthError::Flow(format!(
            "authorization timed out after {} seconds",
            timeout.as_secs()
        ))),
    }
}

pub fn generate_code_verifier() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64_url_encode(&bytes)
}

/// S256 PKCE challenge for `verifier`.
pub fn code_challenge(verifier: &str) -> String {
    use sha2::{Digest, Sha256};
    base64_url_encode(&Sha256::digest(verifier.as_bytes()))
}

fn generate_state() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64_url_encode(&bytes)
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    URL_SAFE_NO_PAD.encode(data)
}
