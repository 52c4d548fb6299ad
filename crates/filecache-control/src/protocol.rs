//! JSON-RPC 2.0 messages spoken over the control channel
//!
//! Both ends share these types: the client encodes [`ControlRequest`]s and
//! decodes [`RpcResponse`]s, the server does the reverse.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";

pub mod methods {
    pub const CREATE_FILE_FOR_STORAGE: &str = "createFileForStorage";
    pub const CREATE_FILE_FOR_TRANSFER: &str = "createFileForTransfer";
    pub const DELETE_FILE: &str = "deleteFile";
    pub const DELETE_ACCOUNT: &str = "deleteAccount";
}

pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const FILE_NOT_FOUND: i64 = -32001;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: u64, request: &ControlRequest) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: json!(id),
            method: request.method().to_string(),
            params: request.params(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    pub fn not_found() -> Self {
        Self::new(codes::FILE_NOT_FOUND, "file not found")
    }

    pub fn internal() -> Self {
        Self::new(codes::INTERNAL_ERROR, "internal error")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Handles returned when a file is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHandle {
    pub file_id: String,
    pub upload_token: String,
    pub download_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFileParams {
    pub account_id: String,
    pub content_type: String,
    /// `None` when the size is not known up front
    pub content_length: Option<u64>,
}

/// A decoded control call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    CreateFileForStorage(CreateFileParams),
    CreateFileForTransfer(CreateFileParams),
    DeleteFile { file_id: String },
    DeleteAccount { account_id: String },
}

impl ControlRequest {
    pub fn method(&self) -> &'static str {
        match self {
            ControlRequest::CreateFileForStorage(_) => methods::CREATE_FILE_FOR_STORAGE,
            ControlRequest::CreateFileForTransfer(_) => methods::CREATE_FILE_FOR_TRANSFER,
            ControlRequest::DeleteFile { .. } => methods::DELETE_FILE,
            ControlRequest::DeleteAccount { .. } => methods::DELETE_ACCOUNT,
        }
    }

    /// Named parameters for the wire
    pub fn params(&self) -> Value {
        match self {
            ControlRequest::CreateFileForStorage(p) | ControlRequest::CreateFileForTransfer(p) => {
                json!({
                    "accountId": p.account_id,
                    "contentType": p.content_type,
                    "contentLength": p.content_length.map_or(json!(-1), |len| json!(len)),
                })
            }
            ControlRequest::DeleteFile { file_id } => json!({ "fileId": file_id }),
            ControlRequest::DeleteAccount { account_id } => json!({ "accountId": account_id }),
        }
    }

    /// Decode a method call; params may be given by name or by position
    pub fn parse(method: &str, params: &Value) -> Result<Self, RpcError> {
        match method {
            methods::CREATE_FILE_FOR_STORAGE => {
                Ok(ControlRequest::CreateFileForStorage(create_params(params)?))
            }
            methods::CREATE_FILE_FOR_TRANSFER => {
                Ok(ControlRequest::CreateFileForTransfer(create_params(params)?))
            }
            methods::DELETE_FILE => Ok(ControlRequest::DeleteFile {
                file_id: required_string(params, "fileId", 0)?,
            }),
            methods::DELETE_ACCOUNT => Ok(ControlRequest::DeleteAccount {
                account_id: required_string(params, "accountId", 0)?,
            }),
            other => Err(RpcError::new(
                codes::METHOD_NOT_FOUND,
                format!("unknown method: {}", other),
            )),
        }
    }
}

/// Decode one text frame into its request id and call.
///
/// On failure returns the id to answer with (null if unknown) and the error.
pub fn decode_request(text: &str) -> Result<(Value, ControlRequest), (Value, RpcError)> {
    let raw: Value = serde_json::from_str(text)
        .map_err(|e| (Value::Null, RpcError::new(codes::PARSE_ERROR, e.to_string())))?;
    let id = raw.get("id").cloned().unwrap_or(Value::Null);

    let request: RpcRequest = serde_json::from_value(raw)
        .map_err(|e| (id.clone(), RpcError::new(codes::INVALID_REQUEST, e.to_string())))?;
    if request.jsonrpc != JSONRPC_VERSION {
        return Err((
            id,
            RpcError::new(codes::INVALID_REQUEST, "jsonrpc must be \"2.0\""),
        ));
    }

    match ControlRequest::parse(&request.method, &request.params) {
        Ok(call) => Ok((request.id, call)),
        Err(e) => Err((request.id, e)),
    }
}

fn param<'a>(params: &'a Value, name: &str, position: usize) -> Option<&'a Value> {
    match params {
        Value::Object(map) => map.get(name),
        Value::Array(items) => items.get(position),
        _ => None,
    }
}

fn required_string(params: &Value, name: &str, position: usize) -> Result<String, RpcError> {
    match param(params, name, position) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(RpcError::invalid_params(format!("{} must be a non-empty string", name))),
    }
}

fn create_params(params: &Value) -> Result<CreateFileParams, RpcError> {
    let account_id = required_string(params, "accountId", 0)?;
    let content_type = match param(params, "contentType", 1) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(RpcError::invalid_params("contentType must be a string")),
    };
    let content_length = match param(params, "contentLength", 2) {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_i64() {
            Some(-1) => None,
            Some(len) if len >= 0 => Some(len as u64),
            _ => match value.as_u64() {
                Some(len) => Some(len),
                None => {
                    return Err(RpcError::invalid_params(
                        "contentLength must be a non-negative integer or -1",
                    ))
                }
            },
        },
    };

    Ok(CreateFileParams {
        account_id,
        content_type,
        content_length,
    })
}
