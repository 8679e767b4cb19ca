//! The fallback router: resolve a logical model, then try candidate backends
//! in order until one produces a usable result.
//!
//! For each candidate the router builds the backend's payload, acquires its
//! connection from the [`ConnectionPool`], invokes it under the modality's
//! timeout, and normalizes the answer. Any failure (connection, remote
//! error, timeout, empty result) invalidates that endpoint's connection,
//! is recorded, and moves on to the next candidate. Candidates are tried one
//! at a time and never twice in the same request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::BackendClient;
use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::normalize::normalize;
use crate::payload::build_payload;
use crate::pool::ConnectionPool;
use crate::registry::{BackendDescriptor, BackendRegistry};
use crate::routes::Routes;
use crate::types::{Attempt, GenerationRequest, GenerationResult, Modality, NormalizedPayload};

/// Result of a connection probe against one backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Routes generation requests across backends with ordered fallback.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use atelier_router::{FallbackRouter, GenerationRequest, HttpBackendClient, Modality, RouterConfig};
///
/// let config = RouterConfig::default();
/// let router = FallbackRouter::new(Arc::new(HttpBackendClient::new(config.clone())), config);
/// let request = GenerationRequest::with_prompt("a red fox");
/// let result = router.route(Modality::ImageGeneration, Some("flux"), &request).await;
/// println!("{:?} via {:?}", result.status(), result.backend_used());
/// ```
pub struct FallbackRouter {
    registry: BackendRegistry,
    routes: Routes,
    pool: Arc<ConnectionPool>,
    client: Arc<dyn BackendClient>,
    config: RouterConfig,
}

impl FallbackRouter {
    /// A router over the built-in registry and route tables with a fresh
    /// connection pool.
    pub fn new(client: Arc<dyn BackendClient>, config: RouterConfig) -> Self {
        Self {
            registry: BackendRegistry::builtin(),
            routes: Routes::builtin(),
            pool: Arc::new(ConnectionPool::new()),
            client,
            config,
        }
    }

    pub fn with_registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_routes(mut self, routes: Routes) -> Self {
        self.routes = routes;
        self
    }

    /// Share a connection pool with other routers.
    pub fn with_pool(mut self, pool: Arc<ConnectionPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Resolve a logical model id to the primary backend id for `modality`.
    /// Unknown or absent ids resolve to the modality default.
    pub fn resolve_backend(&self, modality: Modality, logical: Option<&str>) -> String {
        self.routes.table(modality).resolve(logical, &self.registry)
    }

    /// Ordered, deduplicated candidate backends for a logical id.
    pub fn candidates(&self, modality: Modality, logical: Option<&str>) -> Vec<String> {
        let table = self.routes.table(modality);
        let primary = table.resolve(logical, &self.registry);
        table.candidates(&primary)
    }

    fn timeout_for(&self, modality: Modality) -> Duration {
        if modality.is_text() {
            self.config.chat_timeout()
        } else {
            self.config.generation_timeout()
        }
    }

    /// Route a request, falling back through the candidate list.
    ///
    /// Never returns an error: total failure is a failed
    /// [`GenerationResult`] carrying the last error and every attempt.
    pub async fn route(
        &self,
        modality: Modality,
        logical: Option<&str>,
        request: &GenerationRequest,
    ) -> GenerationResult {
        let started = Instant::now();
        let candidates = self.candidates(modality, logical);
        let total = candidates.len();
        let mut attempts: Vec<Attempt> = Vec::with_capacity(total);
        let mut last_error = String::new();

        debug!(%modality, logical = ?logical, candidates = ?candidates, "routing request");

        for (idx, id) in candidates.into_iter().enumerate() {
            let outcome = match self.registry.lookup(&id) {
                Some(backend) => self.attempt(backend, modality, request).await,
                None => Err(RouterError::UnknownBackend(id.clone())),
            };

            match outcome {
                Ok(payload) => {
                    let elapsed = elapsed_ms(started);
                    let mut done = attempts.clone();
                    done.push(Attempt {
                        backend: id.clone(),
                        error: None,
                    });
                    if let Some(result) = GenerationResult::completed(&id, payload, elapsed, done) {
                        info!(
                            backend = %id,
                            %modality,
                            attempt = idx + 1,
                            elapsed_ms = elapsed,
                            "generation completed"
                        );
                        return result;
                    }
                    last_error = RouterError::EmptyResponse(id.clone()).to_string();
                    attempts.push(Attempt {
                        backend: id,
                        error: Some(last_error.clone()),
                    });
                }
                Err(err) => {
                    warn!(
                        backend = %id,
                        attempt = idx + 1,
                        total_candidates = total,
                        error = %err,
                        "backend failed, trying next candidate"
                    );
                    if let Some(backend) = self.registry.lookup(&id) {
                        self.pool.invalidate(&backend.endpoint).await;
                    }
                    last_error = err.to_string();
                    attempts.push(Attempt {
                        backend: id,
                        error: Some(last_error.clone()),
                    });
                }
            }
        }

        let elapsed = elapsed_ms(started);
        warn!(
            %modality,
            attempted = ?attempts.iter().map(|a| a.backend.as_str()).collect::<Vec<_>>(),
            last_error = %last_error,
            elapsed_ms = elapsed,
            "all candidate backends failed"
        );
        GenerationResult::failed(last_error, elapsed, attempts)
    }

    /// One attempt against one backend, bounded by the modality timeout.
    async fn attempt(
        &self,
        backend: &BackendDescriptor,
        modality: Modality,
        request: &GenerationRequest,
    ) -> Result<NormalizedPayload> {
        let payload = build_payload(backend, request);
        let limit = self.timeout_for(modality);

        let call = async {
            let handle = self.pool.acquire(backend, self.client.as_ref()).await?;
            let raw = self.client.invoke(&handle, backend, &payload).await?;
            Ok::<_, RouterError>(normalize(&raw, backend, modality))
        };

        let normalized = tokio::time::timeout(limit, call)
            .await
            .map_err(|_| RouterError::Timeout(limit.as_secs()))??;

        if normalized.is_empty() {
            return Err(RouterError::EmptyResponse(backend.id.clone()));
        }
        Ok(normalized)
    }

    /// Stream a chat reply from the single resolved backend.
    ///
    /// Incremental text chunks are sent on `tx`; the complete text is
    /// returned. There is no fallback: a failure is returned to the caller,
    /// which reports it on the stream. Cancelling `cancel` aborts the remote
    /// call at its next suspension point.
    pub async fn stream_chat(
        &self,
        logical: Option<&str>,
        request: &GenerationRequest,
        tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<String> {
        let id = self.resolve_backend(Modality::Chat, logical);
        let backend = self
            .registry
            .lookup(&id)
            .ok_or_else(|| RouterError::UnknownBackend(id.clone()))?;
        let payload = build_payload(backend, request);
        let limit = self.config.stream_timeout();

        debug!(backend = %id, "streaming chat");

        let call = async {
            let handle = self.pool.acquire(backend, self.client.as_ref()).await?;
            self.client
                .invoke_stream(&handle, backend, &payload, tx)
                .await
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(RouterError::Cancelled),
            res = tokio::time::timeout(limit, call) => {
                res.map_err(|_| RouterError::Timeout(limit.as_secs())).and_then(|r| r)
            }
        };

        match &outcome {
            Ok(text) => debug!(backend = %id, chars = text.len(), "chat stream finished"),
            Err(RouterError::Cancelled) => debug!(backend = %id, "chat stream cancelled"),
            Err(err) => {
                warn!(backend = %id, error = %err, "chat stream failed");
                self.pool.invalidate(&backend.endpoint).await;
            }
        }
        outcome
    }

    /// Open a fresh connection to `id` and report how long it took.
    ///
    /// Bypasses the pool so a cached handle cannot mask an outage.
    pub async fn probe(&self, id: &str) -> Result<ProbeReport> {
        let backend = self
            .registry
            .lookup(id)
            .ok_or_else(|| RouterError::UnknownBackend(id.to_string()))?;
        let started = Instant::now();
        let limit = self.config.chat_timeout();

        let outcome = tokio::time::timeout(limit, self.client.connect(backend))
            .await
            .map_err(|_| RouterError::Timeout(limit.as_secs()))
            .and_then(|r| r);

        Ok(match outcome {
            Ok(_) => ProbeReport {
                available: true,
                latency_ms: Some(elapsed_ms(started)),
                error: None,
            },
            Err(err) => ProbeReport {
                available: false,
                latency_ms: None,
                error: Some(err.to_string()),
            },
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
