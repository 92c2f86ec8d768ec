//! JSON-RPC 2.0 envelopes.
//!
//! Inbound text is classified by shape: an object carrying `method` is a call,
//! anything else is a response. A call without an `id` (or with `id: null`) is
//! a notification and never answered.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;

/// Protocol version written into every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Error code for calls to a method the receiver does not expose.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Error code for failures reported by a local method implementation.
pub const APPLICATION_ERROR: i64 = -32099;

/// The `error` member of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn method_not_found() -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: "Procedure not found.".to_string(),
            data: None,
        }
    }

    /// An error raised by a local method implementation.
    pub fn application(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code: APPLICATION_ERROR,
            message: message.into(),
            data,
        }
    }
}

impl From<ErrorObject> for Value {
    fn from(error: ErrorObject) -> Self {
        let mut value = json!({ "code": error.code, "message": error.message });
        if let (Some(data), Some(object)) = (error.data, value.as_object_mut()) {
            object.insert("data".to_string(), data);
        }
        value
    }
}

/// A request or notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: String,
    pub params: Option<Value>,
    pub id: Option<Value>,
}

impl Call {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Positional view of `params`: arrays as-is, absent as empty, any other
    /// value as a single element.
    pub fn params_list(&self) -> Vec<Value> {
        match &self.params {
            Some(Value::Array(items)) => items.clone(),
            None => Vec::new(),
            Some(other) => vec![other.clone()],
        }
    }
}

/// A reply to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// `Value::Null` when the sender omitted it.
    pub id: Value,
    pub outcome: std::result::Result<Value, ErrorObject>,
}

/// Any message exchanged by the RPC layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Call(Call),
    Response(Response),
}

#[derive(Serialize, Deserialize)]
struct Wire {
    #[serde(default = "default_version")]
    jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorObject>,
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

impl Envelope {
    pub fn request(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self::Call(Call {
            method: method.into(),
            params: Some(params),
            id: Some(Value::from(id)),
        })
    }

    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self::Call(Call {
            method: method.into(),
            params: Some(params),
            id: None,
        })
    }

    pub fn result(id: Value, result: Value) -> Self {
        Self::Response(Response {
            id,
            outcome: Ok(result),
        })
    }

    pub fn error(id: Value, error: ErrorObject) -> Self {
        Self::Response(Response {
            id,
            outcome: Err(error),
        })
    }

    /// Parse one envelope from its JSON text.
    pub fn parse(raw: &str) -> Result<Self> {
        let wire: Wire = serde_json::from_str(raw)?;
        if let Some(method) = wire.method {
            return Ok(Self::Call(Call {
                method,
                params: wire.params,
                id: wire.id,
            }));
        }

        let outcome = match wire.error {
            Some(error) => Err(error),
            None => Ok(wire.result.unwrap_or(Value::Null)),
        };
        Ok(Self::Response(Response {
            id: wire.id.unwrap_or(Value::Null),
            outcome,
        }))
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String> {
        let wire = match self {
            Self::Call(call) => Wire {
                jsonrpc: default_version(),
                method: Some(call.method.clone()),
                params: call.params.clone(),
                id: call.id.clone(),
                result: None,
                error: None,
            },
            Self::Response(response) => {
                let (result, error) = match &response.outcome {
                    Ok(result) => (Some(result.clone()), None),
                    Err(error) => (None, Some(error.clone())),
                };
                Wire {
                    jsonrpc: default_version(),
                    method: None,
                    params: None,
                    id: Some(response.id.clone()),
                    result,
                    error,
                }
            }
        };
        Ok(serde_json::to_string(&wire)?)
    }
}
