//! # Aegis
//!
//! **Pluggable authentication and a composable security pipeline.**
//!
//! - Authentication providers dispatched by credential type
//! - Signed bearer tokens with enforced key strength
//! - A pipeline of built-in stages that plugins extend by naming a target
//! - An audit event for every authorization decision
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use aegis::prelude::*;
//!
//! let config = ConfigLoader::new().with_optional_file("aegis.toml")?.with_env().load()?;
//! let security = Security::builder(config)
//!     .subject_store(Arc::new(store))
//!     .access_rule(AccessRule::new("/api/admin/**", Requirement::authority("ROLE_ADMIN")))
//!     .init_telemetry(true)
//!     .build()?;
//!
//! let mut ctx = MiddlewareContext::new();
//! let response = security
//!     .handle(&mut ctx, request, |ctx, _req| {
//!         let who = ctx.identity().log_id().to_string();
//!         Box::pin(async move { Response::json(StatusCode::OK, &who) })
//!     })
//!     .await;
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! Request → cors → csrf → security_headers → token_verification → authorization → Handler
//! ```
//!
//! Stages switched off in configuration are left out. Requests under
//! `endpoints.base_path` are answered by [`AuthEndpoints`] after passing
//! through the same pipeline.

#![doc(html_root_url = "https://docs.rs/aegis/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod endpoints;
mod error;
mod security;

pub use endpoints::{AuthEndpoints, AuthRoute, LoginRequest, LoginResponse, RefreshRequest};
pub use error::{SecurityError, SecurityResult};
pub use security::{telemetry_config, Security, SecurityBuilder};

pub use aegis_auth as auth;
pub use aegis_config as config;
pub use aegis_core as core;
pub use aegis_middleware as middleware;
pub use aegis_telemetry as telemetry;
pub use aegis_token as token;

/// Common imports.
pub mod prelude {
    pub use crate::{AuthEndpoints, Security, SecurityBuilder, SecurityError};

    pub use aegis_auth::{
        AuthenticationProvider, BcryptHasher, InMemorySubjectStore, PasswordHasher,
        ProviderRegistry, StoredSubject, SubjectStore,
    };
    pub use aegis_config::{ConfigLoader, SecurityConfig};
    pub use aegis_core::{
        AegisError, AegisResult, AuthenticationResult, CallerIdentity, Credentials, Subject,
        Token, TokenError,
    };
    pub use aegis_middleware::stages::{AccessRule, Requirement};
    pub use aegis_middleware::{
        AuditEvent, AuditSink, BoxFuture, Middleware, MiddlewareContext, Next, Request, Response,
        ResponseExt, StageDescriptor, StagePlugin, StagePosition,
    };
    pub use aegis_token::TokenManager;
}
