use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const TOKEN_FILE_NAME: &str = "sheets-token.json";
pub const CLIENT_SECRET_FILE_NAME: &str = "gcp-oauth.keys.json";

const DEFAULT_CREDS_SUBDIR: &str = "mcp-gdrive";
const DEFAULT_HTTP_BIND: &str = "0.0.0.0:8000";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[value(alias = "stream-http", alias = "stream_http")]
    #[serde(alias = "stream-http", alias = "stream_http")]
    Http,
    Stdio,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Http => write!(f, "http"),
            TransportKind::Stdio => write!(f, "stdio"),
        }
    }
}

/// Client id, client secret and refresh token supplied directly through
/// configuration. When all three are present the token file is never read.
#[derive(Clone, PartialEq, Eq)]
pub struct InlineCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for InlineCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding `gcp-oauth.keys.json` and `sheets-token.json`.
    pub creds_dir: PathBuf,
    pub inline_credentials: Option<InlineCredentials>,
    pub token_uri: String,
    pub api_base_url: String,
    pub transport: TransportKind,
    pub http_bind_address: SocketAddr,
    pub enabled_tools: Option<HashSet<String>>,
    pub request_timeout_ms: u64,
    pub log_level: String,
}

impl ServerConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            creds_dir: cli_creds_dir,
            client_id: cli_client_id,
            client_secret: cli_client_secret,
            refresh_token: cli_refresh_token,
            token_uri: cli_token_uri,
            api_base_url: cli_api_base_url,
            transport: cli_transport,
            http_bind: cli_http_bind,
            enabled_tools: cli_enabled_tools,
            request_timeout_ms: cli_request_timeout_ms,
            log_level: cli_log_level,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            creds_dir: file_creds_dir,
            client_id: file_client_id,
            client_secret: file_client_secret,
            refresh_token: file_refresh_token,
            token_uri: file_token_uri,
            api_base_url: file_api_base_url,
            transport: file_transport,
            http_bind: file_http_bind,
            enabled_tools: file_enabled_tools,
            request_timeout_ms: file_request_timeout_ms,
            log_level: file_log_level,
        } = file_config;

        let creds_dir = cli_creds_dir
            .or(file_creds_dir)
            .map(expand_home)
            .unwrap_or_else(default_creds_dir);

        let inline_credentials = match (
            non_empty(cli_client_id.or(file_client_id)),
            non_empty(cli_client_secret.or(file_client_secret)),
            non_empty(cli_refresh_token.or(file_refresh_token)),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                Some(InlineCredentials {
                    client_id,
                    client_secret,
                    refresh_token,
                })
            }
            _ => None,
        };

        let token_uri = non_empty(cli_token_uri.or(file_token_uri))
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        let api_base_url = non_empty(cli_api_base_url.or(file_api_base_url))
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let transport = cli_transport
            .or(file_transport)
            .unwrap_or(TransportKind::Stdio);

        let http_bind_address = match cli_http_bind.or(file_http_bind) {
            Some(addr) => addr,
            None => DEFAULT_HTTP_BIND
                .parse()
                .context("default bind address is invalid")?,
        };

        let enabled_tools = cli_enabled_tools
            .or(file_enabled_tools)
            .map(|tools| {
                tools
                    .into_iter()
                    .map(|tool| tool.trim().to_ascii_lowercase())
                    .filter(|tool| !tool.is_empty())
                    .collect::<HashSet<_>>()
            })
            .filter(|set| !set.is_empty());

        let request_timeout_ms = cli_request_timeout_ms
            .or(file_request_timeout_ms)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        anyhow::ensure!(
            request_timeout_ms > 0,
            "request timeout must be greater than zero"
        );

        let log_level = non_empty(cli_log_level.or(file_log_level))
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
            .to_ascii_lowercase();

        Ok(Self {
            creds_dir,
            inline_credentials,
            token_uri,
            api_base_url,
            transport,
            http_bind_address,
            enabled_tools,
            request_timeout_ms,
            log_level,
        })
    }

    pub fn token_file(&self) -> PathBuf {
        self.creds_dir.join(TOKEN_FILE_NAME)
    }

    pub fn client_secret_file(&self) -> PathBuf {
        self.creds_dir.join(CLIENT_SECRET_FILE_NAME)
    }

    /// True when a credential source exists without consulting the network.
    pub fn credentials_configured(&self) -> bool {
        self.inline_credentials.is_some() || self.client_secret_file().is_file()
    }

    pub fn is_tool_enabled(&self, tool: &str) -> bool {
        match &self.enabled_tools {
            Some(set) => set.contains(&tool.to_ascii_lowercase()),
            None => true,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(name = "sheets-mcp", about = "Google Sheets MCP server", version)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "GDRIVE_CREDS_DIR",
        value_name = "DIR",
        help = "Directory holding gcp-oauth.keys.json and sheets-token.json (default: ~/.config/mcp-gdrive)"
    )]
    pub creds_dir: Option<PathBuf>,

    #[arg(long, env = "GOOGLE_CLIENT_ID", value_name = "ID", help = "OAuth client id")]
    pub client_id: Option<String>,

    #[arg(
        long,
        env = "GOOGLE_CLIENT_SECRET",
        value_name = "SECRET",
        hide_env_values = true,
        help = "OAuth client secret"
    )]
    pub client_secret: Option<String>,

    #[arg(
        long,
        env = "GOOGLE_REFRESH_TOKEN",
        value_name = "TOKEN",
        hide_env_values = true,
        help = "OAuth refresh token; with client id and secret this skips the token file"
    )]
    pub refresh_token: Option<String>,

    #[arg(
        long,
        env = "GOOGLE_TOKEN_URI",
        value_name = "URL",
        help = "OAuth token endpoint used for inline credentials"
    )]
    pub token_uri: Option<String>,

    #[arg(
        long,
        env = "SHEETS_MCP_API_BASE_URL",
        value_name = "URL",
        help = "Google Sheets API base URL"
    )]
    pub api_base_url: Option<String>,

    #[arg(
        long,
        env = "MCP_TRANSPORT",
        value_enum,
        value_name = "TRANSPORT",
        help = "Transport to expose (stdio or http)"
    )]
    pub transport: Option<TransportKind>,

    #[arg(
        long,
        env = "MCP_HTTP_BIND",
        value_name = "ADDR",
        help = "HTTP bind address when using http transport"
    )]
    pub http_bind: Option<SocketAddr>,

    #[arg(
        long,
        env = "SHEETS_MCP_ENABLED_TOOLS",
        value_name = "TOOL",
        value_delimiter = ',',
        help = "Restrict execution to the provided tool names"
    )]
    pub enabled_tools: Option<Vec<String>>,

    #[arg(
        long,
        env = "SHEETS_MCP_REQUEST_TIMEOUT_MS",
        value_name = "MS",
        help = "Timeout for each Google API request in milliseconds (default: 30000)",
        value_parser = clap::value_parser!(u64)
    )]
    pub request_timeout_ms: Option<u64>,

    #[arg(
        long,
        env = "LOG_LEVEL",
        value_name = "LEVEL",
        help = "Log level used when RUST_LOG is not set (default: info)"
    )]
    pub log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    creds_dir: Option<PathBuf>,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    token_uri: Option<String>,
    api_base_url: Option<String>,
    transport: Option<TransportKind>,
    http_bind: Option<SocketAddr>,
    enabled_tools: Option<Vec<String>>,
    request_timeout_ms: Option<u64>,
    log_level: Option<String>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_creds_dir() -> PathBuf {
    // Always ~/.config, also on macOS, so existing token files are found.
    dirs::home_dir()
        .map(|home| home.join(".config"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_CREDS_SUBDIR)
}

fn expand_home(path: PathBuf) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path;
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path,
    }
}
