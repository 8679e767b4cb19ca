//! Multi-provider generation routing for atelier.
//!
//! This crate turns a loosely named model ("flux", "llama", "upscale") and a
//! normalized request into a call against one of several hosted inference
//! services, falling back through an ordered list of alternatives when a
//! backend is down, slow, or returns nothing usable.
//!
//! # Architecture
//!
//! - [`BackendRegistry`] is the closed table of supported backends
//! - [`build_payload`] maps a [`GenerationRequest`] to one backend's parameters
//! - [`ConnectionPool`] caches one connection per endpoint
//! - [`normalize`] folds heterogeneous responses into a [`NormalizedPayload`]
//! - [`FallbackRouter`] resolves aliases and tries candidates in order
//! - [`HttpBackendClient`] speaks Gradio, HF Inference and Cloudflare over HTTP
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use atelier_router::{FallbackRouter, GenerationRequest, HttpBackendClient, Modality, RouterConfig};
//!
//! let config = RouterConfig::default();
//! let client = Arc::new(HttpBackendClient::new(config.clone()));
//! let router = FallbackRouter::new(client, config);
//!
//! let result = router
//!     .route(Modality::ImageGeneration, Some("flux"), &GenerationRequest::with_prompt("a red fox"))
//!     .await;
//! if let Some(payload) = result.payload() {
//!     println!("{:?}", payload.urls());
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod normalize;
pub mod payload;
pub mod pool;
pub mod presets;
pub mod registry;
pub mod router;
pub mod routes;
pub mod sse;
pub mod transport;
pub mod types;

pub use backend::BackendClient;
pub use config::RouterConfig;
pub use error::{Result, RouterError};
pub use normalize::normalize;
pub use payload::build_payload;
pub use pool::{ConnectionHandle, ConnectionPool};
pub use presets::{
    MotionPreset, complete_dimensions, dimensions_for_aspect_ratio, motion_preset, motion_presets,
};
pub use registry::{BackendDescriptor, BackendKind, BackendRegistry, BackendSummary, Category};
pub use router::{FallbackRouter, ProbeReport};
pub use routes::{RouteTable, Routes};
pub use transport::HttpBackendClient;
pub use types::{
    Attempt, ChatTurn, GenerationRequest, GenerationResult, GenerationStatus, Modality,
    NormalizedPayload, Payload, RawResponse,
};
