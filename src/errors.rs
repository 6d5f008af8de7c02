use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct InvalidParamsError {
    tool: &'static str,
    message: String,
    path: Option<String>,
}

impl InvalidParamsError {
    pub fn new(tool: &'static str, message: impl Into<String>) -> Self {
        Self {
            tool,
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn tool(&self) -> &'static str {
        self.tool
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(
        "no Google credentials configured: set GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET and \
         GOOGLE_REFRESH_TOKEN, or provide an OAuth client secret file at {0:?}"
    )]
    Configuration(PathBuf),
    #[error("token refresh failed: {0}")]
    Refresh(String),
    #[error("authorization flow failed: {0}")]
    Flow(String),
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed credentials file {path:?}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl AuthError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A request rejected by the Google Sheets API. `details` carries the
/// `error` object from the response body when one was returned.
#[derive(Debug, Clone, Error)]
#[error("Google Sheets API error {status}: {message}")]
pub struct RemoteApiError {
    pub status: u16,
    pub message: String,
    pub details: Option<Value>,
}

impl RemoteApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Error)]
#[error("tool '{tool_name}' is disabled by server configuration")]
pub struct ToolDisabledError {
    tool_name: String,
}

impl ToolDisabledError {
    pub fn new(tool_name: &str) -> Self {
        Self {
            tool_name: tool_name.to_ascii_lowercase(),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown tool '{name}'")]
pub struct UnknownToolError {
    name: String,
}

impl UnknownToolError {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}
