//! The assembled, immutable stage sequence.
//!
//! ## Built-in stages
//!
//! | # | Stage                | Present when                 |
//! |---|----------------------|------------------------------|
//! | 1 | `cors`               | cross-origin policy enabled  |
//! | 2 | `csrf`               | CSRF protection enabled      |
//! | 3 | `security_headers`   | response headers enabled     |
//! | 4 | `token_verification` | a token manager is available |
//! | 5 | `authorization`      | always                       |
//!
//! Plugged-in stages are spliced around these by the
//! [`PipelineAssembler`](crate::PipelineAssembler).

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use std::fmt;
use std::sync::Arc;

/// A shareable stage handler.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Built-in stages, in base order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinStage {
    /// Cross-origin resource sharing.
    Cors,
    /// Double-submit CSRF protection.
    Csrf,
    /// Browser hardening headers.
    SecurityHeaders,
    /// Bearer token resolution.
    TokenVerification,
    /// Access rules and audit.
    Authorization,
}

impl BuiltinStage {
    /// Returns all built-in stages in base order.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Cors,
            Self::Csrf,
            Self::SecurityHeaders,
            Self::TokenVerification,
            Self::Authorization,
        ]
    }

    /// Returns the stage name other stages target.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cors => "cors",
            Self::Csrf => "csrf",
            Self::SecurityHeaders => "security_headers",
            Self::TokenVerification => "token_verification",
            Self::Authorization => "authorization",
        }
    }
}

impl fmt::Display for BuiltinStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named stage in a pipeline.
#[derive(Clone)]
pub struct PipelineStage {
    name: String,
    middleware: BoxedMiddleware,
}

impl fmt::Debug for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStage")
            .field("name", &self.name)
            .field("middleware", &self.middleware.name())
            .finish()
    }
}

impl PipelineStage {
    /// Creates a stage.
    #[must_use]
    pub fn new(name: impl Into<String>, middleware: BoxedMiddleware) -> Self {
        Self {
            name: name.into(),
            middleware,
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage handler.
    #[must_use]
    pub fn middleware(&self) -> &BoxedMiddleware {
        &self.middleware
    }
}

/// An ordered, immutable chain of stages.
///
/// Built once by the assembler and shared across requests.
///
/// # Example
///
/// ```ignore
/// let mut ctx = MiddlewareContext::new();
/// let response = pipeline
///     .process(&mut ctx, request, |ctx, _req| {
///         let who = ctx.identity().log_id().to_string();
///         Box::pin(async move { Response::json(StatusCode::OK, &who) })
///     })
///     .await;
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<PipelineStage>,
}

impl Pipeline {
    pub(crate) fn from_stages(stages: Vec<PipelineStage>) -> Self {
        Self { stages }
    }

    /// Runs `request` through every stage and then `handler`.
    ///
    /// Any stage may answer early, in which case later stages and the
    /// handler never see the request.
    pub async fn process<H>(
        &self,
        ctx: &mut MiddlewareContext,
        request: Request,
        handler: H,
    ) -> Response
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let next = self.build_chain(handler);
        next.run(ctx, request).await
    }

    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        let mut next = Next::handler(handler);
        for stage in self.stages.iter().rev() {
            next = Next::new(stage.middleware.as_ref(), next);
        }
        next
    }

    /// Returns stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(PipelineStage::name).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    /// Returns true if a stage with this name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stages.iter().any(|s| s.name == name)
    }
}
