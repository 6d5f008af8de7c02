#![allow(dead_code)]

pub mod mcp;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use sheets_mcp::config::{CliArgs, ServerConfig};
use sheets_mcp::errors::RemoteApiError;
use sheets_mcp::sheets::{SheetsApi, SheetsCall};
use sheets_mcp::state::AppState;
use sheets_mcp::tools::Dispatcher;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Temporary credentials directory plus a config rooted in it. Nothing is
/// read from the process environment.
pub struct TestWorkspace {
    _tempdir: TempDir,
    root: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let root = tempdir.path().to_path_buf();
        Self {
            _tempdir: tempdir,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("write file");
        path
    }

    pub fn args(&self) -> CliArgs {
        CliArgs {
            creds_dir: Some(self.root.clone()),
            ..CliArgs::default()
        }
    }

    pub fn config(&self) -> ServerConfig {
        ServerConfig::from_args(self.args()).expect("config")
    }

    pub fn config_with<F>(&self, f: F) -> ServerConfig
    where
        F: FnOnce(&mut ServerConfig),
    {
        let mut config = self.config();
        f(&mut config);
        config
    }
}

/// In-memory [`SheetsApi`] that records every call and answers from a queue
/// of canned replies. An empty queue answers `{}`.
#[derive(Default)]
pub struct RecordingSheetsApi {
    calls: Mutex<Vec<SheetsCall>>,
    replies: Mutex<VecDeque<Result<Value, RemoteApiError>>>,
}

impl RecordingSheetsApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, value: Value) {
        self.replies.lock().push_back(Ok(value));
    }

    pub fn fail(&self, error: RemoteApiError) {
        self.replies.lock().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<SheetsCall> {
        self.calls.lock().clone()
    }

    pub fn single_call(&self) -> SheetsCall {
        let calls = self.calls();
        assert_eq!(calls.len(), 1, "expected exactly one call, got {calls:?}");
        calls.into_iter().next().expect("one call")
    }

    /// The only request of the only batchUpdate that was sent.
    pub fn single_request(&self) -> Value {
        let call = self.single_call();
        let requests = call.requests().expect("batchUpdate call");
        assert_eq!(requests.len(), 1, "expected one request, got {requests:?}");
        requests[0].clone()
    }
}

#[async_trait]
impl SheetsApi for RecordingSheetsApi {
    async fn execute(&self, call: &SheetsCall) -> Result<Value> {
        self.calls.lock().push(call.clone());
        match self.replies.lock().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(err)) => Err(err.into()),
            None => Ok(Value::Object(serde_json::Map::new())),
        }
    }
}

pub fn app_state_with_api(config: ServerConfig, api: Arc<RecordingSheetsApi>) -> Arc<AppState> {
    Arc::new(AppState::with_api(Arc::new(config), api))
}

pub fn dispatcher(config: ServerConfig, api: Arc<RecordingSheetsApi>) -> Dispatcher {
    Dispatcher::new(Arc::new(config), api)
}

pub fn parse_output(text: &str) -> Value {
    serde_json::from_str(text).expect("tool output is JSON")
}
