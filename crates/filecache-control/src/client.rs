//! Control channel client with lazy, self-healing connection
//!
//! The connection is opened on first use and reused afterwards. Any transport
//! failure or timeout drops it, so the next call reconnects. Calls are
//! serialized: one request is in flight at a time.

use crate::error::{ControlError, Result};
use crate::protocol::{
    ControlRequest, CreateFileParams, FileHandle, RpcRequest, RpcResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const DEFAULT_URL: &str = "ws://127.0.0.1:8090/control";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

type Connection = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct ControlClientConfig {
    pub url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ControlClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ControlClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

pub struct ControlClient {
    config: ControlClientConfig,
    conn: Mutex<Option<Connection>>,
    next_id: AtomicU64,
}

impl ControlClient {
    pub fn new(config: ControlClientConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    pub async fn create_file_for_storage(
        &self,
        account_id: &str,
        content_type: &str,
        content_length: Option<u64>,
    ) -> Result<FileHandle> {
        let request = ControlRequest::CreateFileForStorage(CreateFileParams {
            account_id: account_id.to_string(),
            content_type: content_type.to_string(),
            content_length,
        });
        let result = self.call(&request).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn create_file_for_transfer(
        &self,
        account_id: &str,
        content_type: &str,
        content_length: Option<u64>,
    ) -> Result<FileHandle> {
        let request = ControlRequest::CreateFileForTransfer(CreateFileParams {
            account_id: account_id.to_string(),
            content_type: content_type.to_string(),
            content_length,
        });
        let result = self.call(&request).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        let request = ControlRequest::DeleteFile {
            file_id: file_id.to_string(),
        };
        self.call(&request).await?;
        Ok(())
    }

    /// Returns the number of files deleted
    pub async fn delete_account(&self, account_id: &str) -> Result<u64> {
        let request = ControlRequest::DeleteAccount {
            account_id: account_id.to_string(),
        };
        let result = self.call(&request).await?;
        result
            .as_u64()
            .ok_or_else(|| ControlError::Protocol(format!("expected a count, got {}", result)))
    }

    /// Send one request and wait for its reply
    pub async fn call(&self, request: &ControlRequest) -> Result<Value> {
        let mut conn = self.conn.lock().await;
        if conn.is_none() {
            *conn = Some(self.connect().await?);
        }
        let ws = match conn.as_mut() {
            Some(ws) => ws,
            None => return Err(ControlError::Disconnected("not connected".to_string())),
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let text = serde_json::to_string(&RpcRequest::new(id, request))?;
        let outcome = timeout(self.config.request_timeout, exchange(ws, id, text)).await;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                if e.is_connection_error() {
                    warn!(method = request.method(), error = %e, "Dropping control connection");
                    *conn = None;
                }
                return Err(e);
            }
            Err(_) => {
                warn!(method = request.method(), "Control request timed out");
                *conn = None;
                return Err(ControlError::Timeout("request"));
            }
        };

        match (response.result, response.error) {
            (_, Some(error)) => Err(ControlError::Rpc {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ControlError::Protocol(
                "response carries neither result nor error".to_string(),
            )),
        }
    }

    async fn connect(&self) -> Result<Connection> {
        debug!(url = %self.config.url, "Connecting control channel");
        match timeout(self.config.connect_timeout, connect_async(&self.config.url)).await {
            Ok(Ok((ws, _))) => {
                info!(url = %self.config.url, "Control channel connected");
                Ok(ws)
            }
            Ok(Err(e)) => Err(ControlError::Disconnected(e.to_string())),
            Err(_) => Err(ControlError::Timeout("connect")),
        }
    }
}

/// Write the request and read frames until the matching reply arrives
async fn exchange(ws: &mut Connection, id: u64, text: String) -> Result<RpcResponse> {
    ws.send(Message::Text(text.into())).await?;

    let expected = json!(id);
    while let Some(msg) = ws.next().await {
        match msg? {
            Message::Text(text) => {
                let response: RpcResponse = serde_json::from_str(&text)
                    .map_err(|e| ControlError::Protocol(format!("invalid reply: {}", e)))?;
                if response.id == expected {
                    return Ok(response);
                }
                debug!(id = %response.id, "Ignoring reply to an earlier request");
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Err(ControlError::Disconnected("connection closed".to_string()))
}
