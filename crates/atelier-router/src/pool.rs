//! Per-endpoint connection cache.
//!
//! A [`ConnectionPool`] lazily opens one [`ConnectionHandle`] per endpoint and
//! shares it between requests. Concurrent acquirers of an endpoint that is
//! not yet connected wait on the same setup instead of starting their own.
//! A failed setup leaves the slot empty, so the next acquirer retries.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::backend::BackendClient;
use crate::error::Result;
use crate::registry::{BackendDescriptor, BackendKind};

/// An open connection to one backend endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionHandle {
    /// The endpoint this handle was opened for.
    pub endpoint: String,
    /// Base URL requests are sent to.
    pub root_url: String,
    pub kind: BackendKind,
    /// Path prefix in front of every Gradio REST route (`""` or e.g.
    /// `"/gradio_api"`).
    api_prefix: String,
    /// Gradio named endpoints and their parameter names, in call order.
    named_endpoints: HashMap<String, Vec<String>>,
}

impl ConnectionHandle {
    pub fn new(endpoint: impl Into<String>, root_url: impl Into<String>, kind: BackendKind) -> Self {
        Self {
            endpoint: endpoint.into(),
            root_url: root_url.into(),
            kind,
            api_prefix: String::new(),
            named_endpoints: HashMap::new(),
        }
    }

    /// Set the route prefix. Accepts `""`, `"/"`, `"gradio_api"` or
    /// `"/gradio_api/"` and stores the canonical `"/gradio_api"` form.
    pub fn with_api_prefix(mut self, prefix: &str) -> Self {
        let trimmed = prefix.trim().trim_matches('/');
        self.api_prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    /// `root_url` joined with the route prefix and `path`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}{path}", self.root_url, self.api_prefix)
    }

    /// Attach the parameter order discovered for each named endpoint.
    pub fn with_named_endpoints(mut self, named: HashMap<String, Vec<String>>) -> Self {
        self.named_endpoints = named;
        self
    }

    /// Parameter names of `api_path` in positional order, if known.
    pub fn parameter_order(&self, api_path: &str) -> Option<&[String]> {
        self.named_endpoints.get(api_path).map(Vec::as_slice)
    }
}

type Slot = Arc<OnceCell<Arc<ConnectionHandle>>>;

/// Caches connections by endpoint.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    slots: Mutex<HashMap<String, Slot>>,
    setups: AtomicU64,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached connection for `backend`'s endpoint, opening it
    /// through `client` if necessary.
    ///
    /// # Errors
    ///
    /// Propagates the error from [`BackendClient::connect`]. Nothing is
    /// cached on failure.
    pub async fn acquire(
        &self,
        backend: &BackendDescriptor,
        client: &dyn BackendClient,
    ) -> Result<Arc<ConnectionHandle>> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(backend.endpoint.clone()).or_default().clone()
        };

        let handle = slot
            .get_or_try_init(|| async {
                self.setups.fetch_add(1, Ordering::SeqCst);
                debug!(backend = %backend.id, endpoint = %backend.endpoint, "opening connection");
                client.connect(backend).await.map(Arc::new)
            })
            .await?;

        Ok(Arc::clone(handle))
    }

    /// Drop the cached connection for `endpoint`. No-op when absent.
    pub async fn invalidate(&self, endpoint: &str) {
        if self.slots.lock().await.remove(endpoint).is_some() {
            debug!(endpoint, "connection invalidated");
        }
    }

    /// Number of connection setups started since the pool was created.
    pub fn setup_count(&self) -> u64 {
        self.setups.load(Ordering::SeqCst)
    }

    /// Whether a live connection is cached for `endpoint`.
    pub async fn is_connected(&self, endpoint: &str) -> bool {
        self.slots
            .lock()
            .await
            .get(endpoint)
            .is_some_and(|slot| slot.initialized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RouterError;
    use crate::payload;
    use crate::registry::Category;
    use crate::types::{Payload, RawResponse};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct SlowConnector {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl BackendClient for SlowConnector {
        async fn connect(&self, backend: &BackendDescriptor) -> Result<ConnectionHandle> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(RouterError::RequestFailed("space sleeping".into()));
            }
            Ok(ConnectionHandle::new(
                backend.endpoint.clone(),
                "http://localhost",
                backend.kind,
            ))
        }

        async fn invoke(
            &self,
            _handle: &ConnectionHandle,
            _backend: &BackendDescriptor,
            _payload: &Payload,
        ) -> Result<RawResponse> {
            unreachable!("pool tests never invoke")
        }
    }

    fn backend(id: &str) -> BackendDescriptor {
        BackendDescriptor::new(
            id,
            id,
            "",
            format!("owner/{id}"),
            Category::ImageGen,
            BackendKind::GradioSpace,
            payload::generic_image,
        )
    }

    #[tokio::test]
    async fn concurrent_acquire_sets_up_once() {
        let pool = ConnectionPool::new();
        let client = SlowConnector {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let b = backend("a");

        let (h1, h2) = tokio::join!(pool.acquire(&b, &client), pool.acquire(&b, &client));
        let (h1, h2) = (h1.unwrap(), h2.unwrap());

        assert!(Arc::ptr_eq(&h1, &h2));
        assert_eq!(pool.setup_count(), 1);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_new_setup() {
        let pool = ConnectionPool::new();
        let client = SlowConnector {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let b = backend("a");

        pool.acquire(&b, &client).await.unwrap();
        assert!(pool.is_connected("owner/a").await);
        pool.invalidate("owner/a").await;
        assert!(!pool.is_connected("owner/a").await);
        pool.acquire(&b, &client).await.unwrap();

        assert_eq!(pool.setup_count(), 2);
    }

    #[tokio::test]
    async fn failed_setup_is_not_cached() {
        let pool = ConnectionPool::new();
        let client = SlowConnector {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let b = backend("a");

        assert!(pool.acquire(&b, &client).await.is_err());
        assert!(pool.acquire(&b, &client).await.is_err());
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
        assert!(!pool.is_connected("owner/a").await);
    }

    #[tokio::test]
    async fn invalidate_unknown_endpoint_is_noop() {
        let pool = ConnectionPool::new();
        pool.invalidate("nobody/home").await;
        assert_eq!(pool.setup_count(), 0);
    }

    #[test]
    fn parameter_order_lookup() {
        let mut named = HashMap::new();
        named.insert("/infer".to_string(), vec!["prompt".to_string(), "seed".to_string()]);
        let h = ConnectionHandle::new("e", "http://x", BackendKind::GradioSpace)
            .with_named_endpoints(named);
        assert_eq!(h.parameter_order("/infer").unwrap(), ["prompt", "seed"]);
        assert!(h.parameter_order("/other").is_none());
    }

    #[test]
    fn api_prefix_is_canonicalised() {
        let h = ConnectionHandle::new("e", "https://s.hf.space", BackendKind::GradioSpace);
        assert_eq!(h.api_url("/info"), "https://s.hf.space/info");
        for raw in ["gradio_api", "/gradio_api", "/gradio_api/", " gradio_api/ "] {
            let h = h.clone().with_api_prefix(raw);
            assert_eq!(h.api_prefix(), "/gradio_api");
            assert_eq!(h.api_url("/call/infer"), "https://s.hf.space/gradio_api/call/infer");
        }
        assert_eq!(h.with_api_prefix("/").api_prefix(), "");
    }
}
