//! Dispatches control channel calls to the store

use filecache_control::{
    decode_request, ControlRequest, CreateFileParams, FileHandle, RpcError, RpcResponse,
};
use filecache_store::{FileKind, FileStore, NewCacheFile, StoreError};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Reply sent if a response cannot be encoded
const ENCODE_FAILURE: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"internal error"}}"#;

pub struct ControlService {
    store: Arc<dyn FileStore>,
    storage_ttl: chrono::Duration,
    transfer_ttl: chrono::Duration,
    max_file_size: u64,
}

impl ControlService {
    pub fn new(
        store: Arc<dyn FileStore>,
        storage_ttl: chrono::Duration,
        transfer_ttl: chrono::Duration,
        max_file_size: u64,
    ) -> Self {
        Self {
            store,
            storage_ttl,
            transfer_ttl,
            max_file_size,
        }
    }

    /// Answer one JSON-RPC text frame
    pub async fn dispatch(&self, text: &str) -> String {
        let response = match decode_request(text) {
            Ok((id, call)) => match self.execute(call).await {
                Ok(result) => RpcResponse::success(id, result),
                Err(e) => RpcResponse::failure(id, e),
            },
            Err((id, e)) => {
                warn!(code = e.code, error = %e.message, "Rejected control request");
                RpcResponse::failure(id, e)
            }
        };

        serde_json::to_string(&response).unwrap_or_else(|e| {
            error!(error = %e, "Failed to encode control response");
            ENCODE_FAILURE.to_string()
        })
    }

    pub async fn execute(&self, call: ControlRequest) -> Result<Value, RpcError> {
        match call {
            ControlRequest::CreateFileForStorage(params) => {
                self.create(params, FileKind::Storage, self.storage_ttl).await
            }
            ControlRequest::CreateFileForTransfer(params) => {
                self.create(params, FileKind::Transfer, self.transfer_ttl).await
            }
            ControlRequest::DeleteFile { file_id } => {
                self.store.delete(&file_id).await.map_err(rpc_error)?;
                Ok(json!(true))
            }
            ControlRequest::DeleteAccount { account_id } => {
                let deleted = self
                    .store
                    .delete_all_for_account(&account_id)
                    .await
                    .map_err(rpc_error)?;
                Ok(json!(deleted))
            }
        }
    }

    async fn create(
        &self,
        params: CreateFileParams,
        kind: FileKind,
        ttl: chrono::Duration,
    ) -> Result<Value, RpcError> {
        if let Some(len) = params.content_length {
            if len > self.max_file_size {
                return Err(RpcError::invalid_params(format!(
                    "contentLength {} exceeds maximum of {} bytes",
                    len, self.max_file_size
                )));
            }
        }

        let new = NewCacheFile::new(params.account_id, kind, ttl)
            .with_content_type(params.content_type)
            .with_total_length(params.content_length);
        let file = self.store.create(new).await.map_err(rpc_error)?;
        info!(file_id = %file.file_id, account_id = %file.account_id, kind = %kind, "Minted file handles");

        let handle = FileHandle {
            file_id: file.file_id,
            upload_token: file.upload_token,
            download_token: file.download_token,
        };
        serde_json::to_value(handle).map_err(|e| {
            error!(error = %e, "Failed to encode file handle");
            RpcError::internal()
        })
    }
}

fn rpc_error(err: StoreError) -> RpcError {
    match err {
        StoreError::NotFound => RpcError::not_found(),
        other => {
            error!(error = %other, "Control call failed");
            RpcError::internal()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filecache_control::codes;
    use filecache_store::{FileState, LocalFileStore};
    use tempfile::tempdir;

    async fn service() -> (tempfile::TempDir, Arc<LocalFileStore>, ControlService) {
        let dir = tempdir().unwrap();
        let store = Arc::new(LocalFileStore::new(dir.path()));
        store.init().await.unwrap();
        let service = ControlService::new(
            store.clone(),
            chrono::Duration::days(30),
            chrono::Duration::hours(24),
            1024,
        );
        (dir, store, service)
    }

    async fn call(service: &ControlService, request: Value) -> Value {
        let reply = service.dispatch(&request.to_string()).await;
        serde_json::from_str(&reply).unwrap()
    }

    #[tokio::test]
    async fn test_create_file_for_storage() {
        let (_dir, store, service) = service().await;

        let reply = call(
            &service,
            json!({"jsonrpc": "2.0", "id": 1, "method": "createFileForStorage",
                   "params": {"accountId": "a1", "contentType": "image/png", "contentLength": 100}}),
        )
        .await;
        assert_eq!(reply["id"], 1);

        let file_id = reply["result"]["fileId"].as_str().unwrap();
        let file = store.find_by_file_id(file_id).await.unwrap();
        assert_eq!(file.kind, FileKind::Storage);
        assert_eq!(file.state, FileState::New);
        assert_eq!(file.total_length, Some(100));
        assert_eq!(file.content_type.as_deref(), Some("image/png"));
        assert_eq!(reply["result"]["uploadToken"], file.upload_token.as_str());
        assert_eq!(reply["result"]["downloadToken"], file.download_token.as_str());
    }

    #[tokio::test]
    async fn test_create_file_for_transfer_uses_transfer_ttl() {
        let (_dir, store, service) = service().await;

        let reply = call(
            &service,
            json!({"jsonrpc": "2.0", "id": 2, "method": "createFileForTransfer",
                   "params": ["a1", "", null]}),
        )
        .await;
        let file = store
            .find_by_file_id(reply["result"]["fileId"].as_str().unwrap())
            .await
            .unwrap();
        assert_eq!(file.kind, FileKind::Transfer);
        assert_eq!(file.total_length, None);
        assert_eq!(file.expires_at - file.created_at, chrono::Duration::hours(24));
    }

    #[tokio::test]
    async fn test_oversized_create_is_invalid_params() {
        let (_dir, _store, service) = service().await;

        let reply = call(
            &service,
            json!({"jsonrpc": "2.0", "id": 3, "method": "createFileForStorage",
                   "params": {"accountId": "a1", "contentLength": 4096}}),
        )
        .await;
        assert_eq!(reply["error"]["code"], codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_delete_file_and_account() {
        let (_dir, store, service) = service().await;
        let a = store
            .create(NewCacheFile::new("a1", FileKind::Storage, chrono::Duration::hours(1)))
            .await
            .unwrap();
        store
            .create(NewCacheFile::new("a1", FileKind::Transfer, chrono::Duration::hours(1)))
            .await
            .unwrap();
        store
            .create(NewCacheFile::new("a1", FileKind::Transfer, chrono::Duration::hours(1)))
            .await
            .unwrap();

        let reply = call(
            &service,
            json!({"jsonrpc": "2.0", "id": 4, "method": "deleteFile", "params": {"fileId": a.file_id}}),
        )
        .await;
        assert_eq!(reply["result"], true);

        let reply = call(
            &service,
            json!({"jsonrpc": "2.0", "id": 5, "method": "deleteFile", "params": [a.file_id]}),
        )
        .await;
        assert_eq!(reply["error"]["code"], codes::FILE_NOT_FOUND);

        let reply = call(
            &service,
            json!({"jsonrpc": "2.0", "id": 6, "method": "deleteAccount", "params": {"accountId": "a1"}}),
        )
        .await;
        assert_eq!(reply["result"], 2);
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let (_dir, _store, service) = service().await;

        let reply: Value = serde_json::from_str(&service.dispatch("not json").await).unwrap();
        assert_eq!(reply["error"]["code"], codes::PARSE_ERROR);
        assert!(reply["id"].is_null());

        let reply = call(
            &service,
            json!({"jsonrpc": "2.0", "id": 7, "method": "renameFile", "params": {}}),
        )
        .await;
        assert_eq!(reply["error"]["code"], codes::METHOD_NOT_FOUND);
        assert_eq!(reply["id"], 7);
    }
}
