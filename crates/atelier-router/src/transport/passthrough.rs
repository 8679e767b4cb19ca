//! Local backend that returns its source media unchanged.

use serde_json::Value;

use crate::error::{Result, RouterError};
use crate::pool::ConnectionHandle;
use crate::registry::{BackendDescriptor, BackendKind};
use crate::types::{Payload, RawResponse};

pub fn connect(backend: &BackendDescriptor) -> ConnectionHandle {
    ConnectionHandle::new(backend.endpoint.clone(), "local://passthrough", BackendKind::Passthrough)
}

/// Echo the payload's `source` field as a bare media reference.
pub fn echo(payload: &Payload) -> Result<RawResponse> {
    match payload.get("source") {
        Some(Value::String(s)) => Ok(RawResponse::Json(Value::String(s.clone()))),
        _ => Err(RouterError::InvalidResponse("passthrough payload has no source".into())),
    }
}
