//! Request-scoped state carried through the pipeline.

use aegis_core::{AuthState, CallerIdentity, RequestId};
use aegis_telemetry::logging::fields::REQUEST_ID;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Mutable state for one request.
///
/// Stages enrich it as the request moves down the chain: the token stage
/// attaches a [`CallerIdentity`], the authorization stage records its
/// outcome, and either may stash typed extensions for the handler.
///
/// # Example
///
/// ```
/// use aegis_core::{AuthState, CallerIdentity};
/// use aegis_middleware::MiddlewareContext;
///
/// let mut ctx = MiddlewareContext::new();
/// ctx.set_identity(CallerIdentity::authenticated("admin", vec!["ROLE_ADMIN".into()]));
/// assert!(ctx.advance_auth_state(AuthState::Authenticated));
/// assert!(!ctx.advance_auth_state(AuthState::Anonymous));
/// ```
#[derive(Debug)]
pub struct MiddlewareContext {
    request_id: RequestId,
    identity: CallerIdentity,
    auth_state: AuthState,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareContext {
    /// Creates a context with a fresh request ID and an anonymous caller.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context for an upstream-assigned request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            identity: CallerIdentity::Anonymous,
            auth_state: AuthState::Unauthenticated,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the caller identity.
    #[must_use]
    pub fn identity(&self) -> &CallerIdentity {
        &self.identity
    }

    /// Sets the caller identity.
    pub fn set_identity(&mut self, identity: CallerIdentity) {
        self.identity = identity;
    }

    /// Drops the caller identity back to anonymous.
    pub fn clear_identity(&mut self) {
        self.identity = CallerIdentity::Anonymous;
    }

    /// Returns the authentication state.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.auth_state
    }

    /// Moves the authentication state forward.
    ///
    /// Returns false, leaving the state untouched, if the transition is not
    /// an edge of the state machine.
    pub fn advance_auth_state(&mut self, next: AuthState) -> bool {
        if self.auth_state.can_advance_to(next) {
            self.auth_state = next;
            true
        } else {
            tracing::debug!(
                { REQUEST_ID } = %self.request_id,
                from = ?self.auth_state,
                to = ?next,
                "Rejected auth state transition"
            );
            false
        }
    }

    /// Returns the time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension, replacing any previous value of that type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns the extension of type `T`, if present.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Returns a mutable reference to the extension of type `T`.
    pub fn get_extension_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// Removes and returns the extension of type `T`.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Returns true if an extension of type `T` is present.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Tenant(&'static str);

    #[test]
    fn test_new_context_is_anonymous_and_unauthenticated() {
        let ctx = MiddlewareContext::new();
        assert!(ctx.identity().is_anonymous());
        assert_eq!(ctx.auth_state(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_auth_state_never_revisited() {
        let mut ctx = MiddlewareContext::new();
        assert!(ctx.advance_auth_state(AuthState::Anonymous));
        assert!(ctx.advance_auth_state(AuthState::Denied));
        assert!(!ctx.advance_auth_state(AuthState::Allowed));
        assert!(!ctx.advance_auth_state(AuthState::Unauthenticated));
        assert_eq!(ctx.auth_state(), AuthState::Denied);
    }

    #[test]
    fn test_clear_identity() {
        let mut ctx = MiddlewareContext::new();
        ctx.set_identity(CallerIdentity::authenticated("u1", vec![]));
        ctx.clear_identity();
        assert!(ctx.identity().is_anonymous());
    }

    #[test]
    fn test_extensions() {
        let mut ctx = MiddlewareContext::new();
        assert!(!ctx.has_extension::<Tenant>());

        ctx.set_extension(Tenant("acme"));
        assert_eq!(ctx.get_extension::<Tenant>(), Some(&Tenant("acme")));

        if let Some(tenant) = ctx.get_extension_mut::<Tenant>() {
            tenant.0 = "globex";
        }
        assert_eq!(ctx.remove_extension::<Tenant>(), Some(Tenant("globex")));
        assert!(!ctx.has_extension::<Tenant>());
    }
}
