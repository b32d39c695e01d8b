//! Stage registration and pipeline assembly.
//!
//! Independently authored stages declare where they belong relative to a
//! target stage. The assembler linearizes the base stages plus every
//! enabled registration into one [`Pipeline`], once, at startup.
//!
//! For each target the spliced layout is:
//!
//! ```text
//! [BEFORE by (order, registration)] target [AT ...] [AFTER ...]
//! ```
//!
//! Targets may name other registered stages. Resolution runs in passes,
//! splicing every group whose target is already placed, until nothing is
//! left or a pass makes no progress.
//!
//! # Example
//!
//! ```ignore
//! let pipeline = PipelineAssembler::new()
//!     .base_stage("authorization", Arc::new(authorization))
//!     .register_descriptor(
//!         StageDescriptor::new("rate_limit", RateLimiter::default())
//!             .before("authorization")
//!             .with_order(10),
//!     )
//!     .assemble()?;
//! ```

use crate::middleware::Middleware;
use crate::pipeline::{BoxedMiddleware, BuiltinStage, Pipeline, PipelineStage};
use aegis_core::AegisError;
use aegis_telemetry::logging::fields::STAGE;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Target used when a stage does not name one.
pub const DEFAULT_TARGET: &str = BuiltinStage::Authorization.name();

/// Where a stage goes relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StagePosition {
    /// Immediately before the target.
    #[default]
    Before,
    /// Immediately after the target and any `At` stages.
    After,
    /// Next to the target, which stays in place.
    At,
}

/// Errors detected while assembling a pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// A stage names a target that never appears in the sequence.
    ///
    /// Covers both missing targets and cycles between registered stages.
    #[error("stage '{stage}' targets unknown stage '{target}'")]
    UnresolvedTarget {
        /// The stage that could not be placed.
        stage: String,
        /// The target it names.
        target: String,
    },

    /// Two stages share a name.
    #[error("duplicate stage name: {0}")]
    DuplicateName(String),
}

impl From<AssemblyError> for AegisError {
    fn from(err: AssemblyError) -> Self {
        AegisError::configuration(err.to_string())
    }
}

/// A pluggable pipeline stage.
///
/// Only [`name`](Self::name) and [`handler`](Self::handler) are required.
/// The handler accessor must return the same instance on every call.
pub trait StagePlugin: Send + Sync {
    /// Unique stage name.
    fn name(&self) -> &str;

    /// Returns the stage handler.
    fn handler(&self) -> BoxedMiddleware;

    /// Placement relative to [`target`](Self::target).
    fn position(&self) -> StagePosition {
        StagePosition::Before
    }

    /// The stage this one is placed against.
    fn target(&self) -> &str {
        DEFAULT_TARGET
    }

    /// Tie-break among stages sharing position and target. Lower runs first.
    fn order(&self) -> i32 {
        0
    }

    /// Disabled stages are left out entirely.
    fn enabled(&self) -> bool {
        true
    }
}

/// A ready-made [`StagePlugin`].
#[derive(Clone)]
pub struct StageDescriptor {
    name: String,
    handler: BoxedMiddleware,
    position: StagePosition,
    target: String,
    order: i32,
    enabled: bool,
}

impl fmt::Debug for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageDescriptor")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("target", &self.target)
            .field("order", &self.order)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl StageDescriptor {
    /// Creates a descriptor with default placement: before `authorization`,
    /// order 0, enabled.
    pub fn new(name: impl Into<String>, handler: impl Middleware) -> Self {
        Self::from_arc(name, Arc::new(handler))
    }

    /// Creates a descriptor around an existing handler.
    #[must_use]
    pub fn from_arc(name: impl Into<String>, handler: BoxedMiddleware) -> Self {
        Self {
            name: name.into(),
            handler,
            position: StagePosition::Before,
            target: DEFAULT_TARGET.to_string(),
            order: 0,
            enabled: true,
        }
    }

    /// Places the stage before `target`.
    #[must_use]
    pub fn before(self, target: impl Into<String>) -> Self {
        self.placed(StagePosition::Before, target)
    }

    /// Places the stage after `target`.
    #[must_use]
    pub fn after(self, target: impl Into<String>) -> Self {
        self.placed(StagePosition::After, target)
    }

    /// Places the stage at `target`, alongside it.
    #[must_use]
    pub fn at(self, target: impl Into<String>) -> Self {
        self.placed(StagePosition::At, target)
    }

    /// Sets placement explicitly.
    #[must_use]
    pub fn placed(mut self, position: StagePosition, target: impl Into<String>) -> Self {
        self.position = position;
        self.target = target.into();
        self
    }

    /// Sets the order.
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Enables or disables the stage.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl StagePlugin for StageDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn handler(&self) -> BoxedMiddleware {
        Arc::clone(&self.handler)
    }

    fn position(&self) -> StagePosition {
        self.position
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

struct Pending {
    seq: usize,
    order: i32,
    position: StagePosition,
    stage: PipelineStage,
}

/// Collects base stages and plugins, then linearizes them.
#[derive(Default, Clone)]
pub struct PipelineAssembler {
    base: Vec<PipelineStage>,
    plugins: Vec<Arc<dyn StagePlugin>>,
}

impl fmt::Debug for PipelineAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineAssembler")
            .field("base", &self.base)
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PipelineAssembler {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage to the base ordering.
    #[must_use]
    pub fn base_stage(mut self, name: impl Into<String>, middleware: BoxedMiddleware) -> Self {
        self.base.push(PipelineStage::new(name, middleware));
        self
    }

    /// Registers a plugin.
    #[must_use]
    pub fn register(mut self, plugin: Arc<dyn StagePlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Registers a [`StageDescriptor`].
    #[must_use]
    pub fn register_descriptor(self, descriptor: StageDescriptor) -> Self {
        self.register(Arc::new(descriptor))
    }

    /// Number of registered plugins, enabled or not.
    #[must_use]
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Linearizes the base stages and every enabled plugin.
    ///
    /// Assembling the same assembler twice yields the same ordering.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::DuplicateName`] if two stages share a name,
    /// and [`AssemblyError::UnresolvedTarget`] if a target can never be placed.
    pub fn assemble(&self) -> Result<Pipeline, AssemblyError> {
        let mut names: HashSet<&str> = HashSet::new();
        for stage in &self.base {
            if !names.insert(stage.name()) {
                return Err(AssemblyError::DuplicateName(stage.name().to_string()));
            }
        }

        let mut pending: BTreeMap<String, Vec<Pending>> = BTreeMap::new();
        for (seq, plugin) in self.plugins.iter().enumerate() {
            let name = plugin.name();
            if !plugin.enabled() {
                tracing::debug!({ STAGE } = name, "Stage disabled, excluded from pipeline");
                continue;
            }
            if !names.insert(name) {
                return Err(AssemblyError::DuplicateName(name.to_string()));
            }

            let handler = plugin.handler();
            if !Arc::ptr_eq(&handler, &plugin.handler()) {
                tracing::warn!(
                    { STAGE } = name,
                    "Stage handler accessor returned a different instance on a second call; using the first"
                );
            }

            pending
                .entry(plugin.target().to_string())
                .or_default()
                .push(Pending {
                    seq,
                    order: plugin.order(),
                    position: plugin.position(),
                    stage: PipelineStage::new(name, handler),
                });
        }

        let mut sequence = self.base.clone();
        while !pending.is_empty() {
            let ready: Vec<String> = pending
                .keys()
                .filter(|target| sequence.iter().any(|s| s.name() == target.as_str()))
                .cloned()
                .collect();

            if ready.is_empty() {
                let (target, group) = pending
                    .iter()
                    .next()
                    .map(|(t, g)| (t.clone(), g.first().map(|p| p.stage.name().to_string())))
                    .unwrap_or_default();
                return Err(AssemblyError::UnresolvedTarget {
                    stage: group.unwrap_or_default(),
                    target,
                });
            }

            for target in ready {
                if let Some(group) = pending.remove(&target) {
                    splice(&mut sequence, &target, group);
                }
            }
        }

        let pipeline = Pipeline::from_stages(sequence);
        tracing::info!(
            stages = ?pipeline.stage_names(),
            plugins = self.plugins.len(),
            "Security pipeline assembled"
        );
        Ok(pipeline)
    }
}

fn splice(sequence: &mut Vec<PipelineStage>, target: &str, mut group: Vec<Pending>) {
    let Some(idx) = sequence.iter().position(|s| s.name() == target) else {
        return;
    };
    group.sort_by_key(|p| (p.order, p.seq));

    let mut before = Vec::new();
    let mut at = Vec::new();
    let mut after = Vec::new();
    for pending in group {
        match pending.position {
            StagePosition::Before => before.push(pending.stage),
            StagePosition::At => at.push(pending.stage),
            StagePosition::After => after.push(pending.stage),
        }
    }

    let tail = sequence.split_off(idx + 1);
    let Some(anchor) = sequence.pop() else {
        return;
    };
    sequence.extend(before);
    sequence.push(anchor);
    sequence.extend(at);
    sequence.extend(after);
    sequence.extend(tail);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MiddlewareContext;
    use crate::middleware::{BoxFuture, Next};
    use crate::types::{Request, Response};

    struct Noop;

    impl Middleware for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(next.run(ctx, request))
        }
    }

    fn base() -> PipelineAssembler {
        PipelineAssembler::new()
            .base_stage("csrf", Arc::new(Noop))
            .base_stage("authorization", Arc::new(Noop))
    }

    fn names(assembler: &PipelineAssembler) -> Vec<String> {
        assembler
            .assemble()
            .unwrap()
            .stage_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_descriptor_defaults() {
        let descriptor = StageDescriptor::new("audit_trail", Noop);
        assert_eq!(StagePlugin::position(&descriptor), StagePosition::Before);
        assert_eq!(StagePlugin::target(&descriptor), "authorization");
        assert_eq!(StagePlugin::order(&descriptor), 0);
        assert!(StagePlugin::enabled(&descriptor));
    }

    #[test]
    fn test_no_plugins_keeps_base() {
        assert_eq!(names(&base()), vec!["csrf", "authorization"]);
    }

    #[test]
    fn test_full_layout_around_target() {
        let assembler = base()
            .register_descriptor(StageDescriptor::new("after", Noop).after("csrf"))
            .register_descriptor(StageDescriptor::new("at", Noop).at("csrf"))
            .register_descriptor(StageDescriptor::new("before", Noop).before("csrf"));
        assert_eq!(
            names(&assembler),
            vec!["before", "csrf", "at", "after", "authorization"]
        );
    }

    #[test]
    fn test_equal_order_ties_break_by_registration() {
        let assembler = base()
            .register_descriptor(StageDescriptor::new("b", Noop))
            .register_descriptor(StageDescriptor::new("a", Noop));
        assert_eq!(names(&assembler), vec!["csrf", "b", "a", "authorization"]);
    }

    #[test]
    fn test_target_may_be_registered_stage() {
        let assembler = base()
            .register_descriptor(StageDescriptor::new("child", Noop).after("parent"))
            .register_descriptor(StageDescriptor::new("parent", Noop));
        assert_eq!(
            names(&assembler),
            vec!["csrf", "parent", "child", "authorization"]
        );
    }

    #[test]
    fn test_duplicate_base_name() {
        let assembler = base().base_stage("csrf", Arc::new(Noop));
        assert_eq!(
            assembler.assemble().unwrap_err(),
            AssemblyError::DuplicateName("csrf".into())
        );
    }

    #[test]
    fn test_assembly_error_is_configuration() {
        let err: AegisError = AssemblyError::DuplicateName("x".into()).into();
        assert!(err.is_configuration());
    }
}
