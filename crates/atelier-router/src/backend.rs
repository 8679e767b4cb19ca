//! The [`BackendClient`] trait: the seam between the router and the network.
//!
//! The router never speaks HTTP itself. It asks a `BackendClient` to open a
//! connection to a backend and to invoke it with a prepared payload. The
//! production implementation is
//! [`HttpBackendClient`](crate::transport::HttpBackendClient); tests plug in
//! scripted fakes.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Result, RouterError};
use crate::normalize::normalize;
use crate::pool::ConnectionHandle;
use crate::registry::BackendDescriptor;
use crate::types::{Modality, NormalizedPayload, Payload, RawResponse};

/// Opens connections to backends and invokes them.
///
/// # Example
///
/// ```rust,ignore
/// use atelier_router::{BackendClient, BackendRegistry, build_payload};
///
/// async fn call(client: &dyn BackendClient) -> atelier_router::Result<()> {
///     let registry = BackendRegistry::builtin();
///     let backend = registry.lookup("flux-schnell").unwrap();
///     let handle = client.connect(backend).await?;
///     let payload = build_payload(backend, &Default::default());
///     let raw = client.invoke(&handle, backend, &payload).await?;
///     println!("{raw:?}");
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Resolve the backend's endpoint into a usable connection.
    ///
    /// Called by the [`ConnectionPool`](crate::pool::ConnectionPool) at most
    /// once per endpoint until the connection is invalidated.
    async fn connect(&self, backend: &BackendDescriptor) -> Result<ConnectionHandle>;

    /// Invoke the backend once and return its raw response.
    async fn invoke(
        &self,
        handle: &ConnectionHandle,
        backend: &BackendDescriptor,
        payload: &Payload,
    ) -> Result<RawResponse>;

    /// Invoke a chat backend, sending incremental text chunks on `tx`.
    ///
    /// Returns the complete response text. The default implementation makes
    /// a single buffered call and sends the whole reply as one chunk.
    async fn invoke_stream(
        &self,
        handle: &ConnectionHandle,
        backend: &BackendDescriptor,
        payload: &Payload,
        tx: mpsc::Sender<String>,
    ) -> Result<String> {
        let raw = self.invoke(handle, backend, payload).await?;
        send_whole(&raw, backend, &tx).await
    }
}

/// Normalize a buffered chat response and send it on `tx` as one chunk.
///
/// # Errors
///
/// Returns [`RouterError::EmptyResponse`] when the response carries no text.
pub async fn send_whole(
    raw: &RawResponse,
    backend: &BackendDescriptor,
    tx: &mpsc::Sender<String>,
) -> Result<String> {
    let text = match normalize(raw, backend, Modality::Chat) {
        NormalizedPayload::Text { response, .. } => response,
        NormalizedPayload::Media { .. } => String::new(),
    };
    if text.is_empty() {
        return Err(RouterError::EmptyResponse(backend.id.clone()));
    }
    // A closed receiver means the caller went away; the text is still
    // returned so the router can log it.
    let _ = tx.send(text.clone()).await;
    Ok(text)
}
