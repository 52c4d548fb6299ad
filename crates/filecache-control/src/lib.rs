//! Control channel for minting and destroying file handles
//!
//! An upstream service (a messaging server, say) creates files and receives
//! `{fileId, uploadToken, downloadToken}` triples, and deletes files or whole
//! accounts. Calls are JSON-RPC 2.0 over a WebSocket.
//!
//! # Example
//!
//! ```no_run
//! use filecache_control::{ControlClient, ControlClientConfig};
//!
//! # async fn example() -> Result<(), filecache_control::ControlError> {
//! let client = ControlClient::new(ControlClientConfig::new("ws://localhost:8090/control"));
//!
//! // Size unknown up front: the first upload request fixes it
//! let handle = client.create_file_for_transfer("acct-1", "image/jpeg", None).await?;
//! println!("upload with {}", handle.upload_token);
//!
//! client.delete_file(&handle.file_id).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod protocol;

pub use client::{ControlClient, ControlClientConfig};
pub use error::{ControlError, Result};
pub use protocol::{
    codes, decode_request, methods, ControlRequest, CreateFileParams, FileHandle, RpcError,
    RpcRequest, RpcResponse, JSONRPC_VERSION,
};
