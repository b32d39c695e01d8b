//! # Aegis Middleware
//!
//! The composable security pipeline.
//!
//! A fixed base of built-in stages is extended by independently authored
//! [`StagePlugin`]s. Each plugin names a target stage and a position; the
//! [`PipelineAssembler`] resolves all of them once, at startup, into an
//! immutable [`Pipeline`].
//!
//! ```text
//! Request → cors → csrf → security_headers → token_verification → authorization → Handler
//! ```
//!
//! The authorization stage publishes every decision through an
//! [`AuditPublisher`]. Publishing failures are logged and dropped.
//!
//! ## Example
//!
//! ```
//! use aegis_middleware::stages::{AuthorizationMiddleware, SecurityHeadersMiddleware};
//! use aegis_middleware::{AuditPublisher, PipelineAssembler, StageDescriptor};
//! use std::sync::Arc;
//!
//! let pipeline = PipelineAssembler::new()
//!     .base_stage("security_headers", Arc::new(SecurityHeadersMiddleware::default()))
//!     .base_stage("authorization", Arc::new(AuthorizationMiddleware::new(AuditPublisher::default())))
//!     .register_descriptor(
//!         StageDescriptor::new("extra_headers", SecurityHeadersMiddleware::default())
//!             .after("security_headers"),
//!     )
//!     .assemble()
//!     .unwrap();
//!
//! assert_eq!(
//!     pipeline.stage_names(),
//!     vec!["security_headers", "extra_headers", "authorization"]
//! );
//! ```

#![doc(html_root_url = "https://docs.rs/aegis-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod assembly;
pub mod audit;
pub mod context;
pub mod middleware;
pub mod path;
pub mod pipeline;
pub mod stages;
pub mod types;

pub use assembly::{AssemblyError, PipelineAssembler, StageDescriptor, StagePlugin, StagePosition};
pub use audit::{
    AuditDecision, AuditError, AuditEvent, AuditPublisher, AuditSink, MemoryAuditSink,
    TracingAuditSink,
};
pub use context::MiddlewareContext;
pub use middleware::{BoxFuture, Middleware, Next};
pub use path::PathPattern;
pub use pipeline::{BoxedMiddleware, BuiltinStage, Pipeline, PipelineStage};
pub use types::{ApiEnvelope, Request, Response, ResponseExt};
