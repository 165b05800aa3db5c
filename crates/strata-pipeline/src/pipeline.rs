//! Pipeline registration and execution.
//!
//! A [`Pipeline`] is built once at startup and executed many times. Stages
//! and branches are registered in order; the pipeline seals itself on the
//! first [`Pipeline::execute`] (or an explicit [`Pipeline::seal`]) and
//! rejects every registration afterwards.
//!
//! # Example
//!
//! ```
//! use strata_pipeline::{Chain, Context, FnStage, Flow, Pipeline};
//! use strata_pipeline::testing::empty_request;
//!
//! # tokio_test::block_on(async {
//! let mut pipeline = Pipeline::new("api");
//! pipeline.register(FnStage::new("logging"))?;
//! pipeline.branch(
//!     "admin",
//!     |ctx| ctx.path().starts_with("/admin"),
//!     Chain::new().stage(FnStage::new("audit")),
//!     Chain::new(),
//! )?;
//! pipeline.register(FnStage::new("handler").before(|_| Ok(Flow::Continue)))?;
//!
//! let execution = pipeline.execute(Context::new(empty_request("/admin/users"))).await;
//! assert!(execution.outcome().is_completed());
//! assert!(pipeline.is_sealed());
//! # Ok::<(), strata_pipeline::ConfigurationError>(())
//! # }).unwrap();
//! ```

use crate::chain::{Branch, BranchMode, Chain, Node};
use crate::context::Context;
use crate::error::ConfigurationError;
use crate::execution::{self, Execution};
use crate::stage::Stage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tunables for a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Upper bound on registered stages, counting stages nested in branches.
    pub max_stages: Option<usize>,

    /// Whether executions record a [`TraceEvent`](crate::TraceEvent) list.
    pub record_trace: bool,

    /// Hooks slower than this are logged at `warn`.
    pub slow_stage_threshold: Option<Duration>,
}

impl PipelineOptions {
    /// Sets the stage limit.
    #[must_use]
    pub fn with_max_stages(mut self, max: usize) -> Self {
        self.max_stages = Some(max);
        self
    }

    /// Enables or disables trace recording.
    #[must_use]
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.record_trace = enabled;
        self
    }

    /// Sets the slow stage threshold.
    #[must_use]
    pub fn with_slow_stage_threshold(mut self, threshold: Duration) -> Self {
        self.slow_stage_threshold = Some(threshold);
        self
    }
}

/// An ordered, sealable stage pipeline.
///
/// `Pipeline` is `Send + Sync`. Once built, wrap it in an [`Arc`] and call
/// [`Pipeline::execute`] from as many tasks as needed; each call owns its
/// [`Context`].
pub struct Pipeline {
    name: String,
    chain: Chain,
    options: PipelineOptions,
    sealed: AtomicBool,
}

impl Pipeline {
    /// Creates an empty pipeline with default options.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, PipelineOptions::default())
    }

    /// Creates an empty pipeline with the given options.
    #[must_use]
    pub fn with_options(name: impl Into<String>, options: PipelineOptions) -> Self {
        Self {
            name: name.into(),
            chain: Chain::new(),
            options,
            sealed: AtomicBool::new(false),
        }
    }

    /// Creates a pipeline builder.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Appends a stage.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::Sealed`] once the pipeline is sealed.
    /// - [`ConfigurationError::EmptyName`] if the stage name is empty.
    /// - [`ConfigurationError::TooManyStages`] if the stage limit would be
    ///   exceeded.
    ///
    /// A failed registration leaves the pipeline unchanged.
    pub fn register<S: Stage>(&mut self, stage: S) -> Result<&mut Self, ConfigurationError> {
        self.register_shared(Arc::new(stage))
    }

    /// Appends a shared stage.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::register`].
    pub fn register_shared(
        &mut self,
        stage: Arc<dyn Stage>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.push(Node::Stage(stage))
    }

    /// Registers a rejoining branch with an infallible predicate.
    ///
    /// The predicate runs once per execution when the branch is reached. The
    /// chosen sub-chain runs as if its stages were registered at this
    /// position, then the pipeline continues with the next registration.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::register`], checked against the branch name and
    /// every stage in both arms.
    pub fn branch<P>(
        &mut self,
        name: impl Into<String>,
        predicate: P,
        on_true: Chain,
        on_false: Chain,
    ) -> Result<&mut Self, ConfigurationError>
    where
        P: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.try_branch(name, move |ctx| Ok(predicate(ctx)), on_true, on_false)
    }

    /// Registers a rejoining branch with a fallible predicate.
    ///
    /// A predicate error fails the execution with a
    /// [`StageError`](crate::StageError) in the
    /// [`Predicate`](crate::Phase::Predicate) phase.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::branch`].
    pub fn try_branch<P>(
        &mut self,
        name: impl Into<String>,
        predicate: P,
        on_true: Chain,
        on_false: Chain,
    ) -> Result<&mut Self, ConfigurationError>
    where
        P: Fn(&Context) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.push(Node::Branch(Branch::new(
            name.into(),
            Arc::new(predicate),
            on_true,
            on_false,
            BranchMode::Rejoin,
        )))
    }

    /// Registers a terminal branch.
    ///
    /// The chosen sub-chain ends the inbound path; later registrations are
    /// not entered when this branch is reached.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::branch`].
    pub fn branch_terminal<P>(
        &mut self,
        name: impl Into<String>,
        predicate: P,
        on_true: Chain,
        on_false: Chain,
    ) -> Result<&mut Self, ConfigurationError>
    where
        P: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.try_branch_terminal(name, move |ctx| Ok(predicate(ctx)), on_true, on_false)
    }

    /// Registers a terminal branch with a fallible predicate.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::branch`].
    pub fn try_branch_terminal<P>(
        &mut self,
        name: impl Into<String>,
        predicate: P,
        on_true: Chain,
        on_false: Chain,
    ) -> Result<&mut Self, ConfigurationError>
    where
        P: Fn(&Context) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.push(Node::Branch(Branch::new(
            name.into(),
            Arc::new(predicate),
            on_true,
            on_false,
            BranchMode::Terminal,
        )))
    }

    fn push(&mut self, node: Node) -> Result<&mut Self, ConfigurationError> {
        if self.is_sealed() {
            return Err(ConfigurationError::Sealed {
                pipeline: self.name.clone(),
                stage: node.name().to_string(),
            });
        }
        if node.has_empty_name() {
            return Err(ConfigurationError::EmptyName {
                pipeline: self.name.clone(),
            });
        }
        if let Some(max) = self.options.max_stages {
            let attempted = self.chain.stage_count() + node.stage_count();
            if attempted > max {
                return Err(ConfigurationError::TooManyStages {
                    pipeline: self.name.clone(),
                    stage: node.name().to_string(),
                    max,
                    attempted,
                });
            }
        }

        tracing::debug!(pipeline = %self.name, stage = node.name(), "registered");
        self.chain.push(node);
        Ok(self)
    }

    /// Seals the pipeline. Idempotent.
    pub fn seal(&self) {
        if !self.sealed.swap(true, Ordering::AcqRel) {
            tracing::debug!(
                pipeline = %self.name,
                stages = self.chain.stage_count(),
                "pipeline sealed"
            );
        }
    }

    /// Whether the pipeline is sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Runs the pipeline against `ctx`, sealing it first if needed.
    ///
    /// Stage failures never panic or escape as `Err`; they are reported in
    /// the returned [`Execution`]'s outcome.
    pub async fn execute(&self, ctx: Context) -> Execution {
        self.seal();
        execution::run(&self.name, &self.chain, &self.options, ctx).await
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the options.
    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Returns the root chain.
    #[must_use]
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Names of every stage in registration order, with branch arms
    /// flattened.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.chain.stage_names()
    }

    /// Number of registered stages, counting stages nested in branches.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.chain.stage_count()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("chain", &self.chain)
            .field("options", &self.options)
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

/// Builder for a [`Pipeline`].
///
/// Registration errors are deferred to [`PipelineBuilder::build`], which
/// reports the first one.
///
/// # Example
///
/// ```
/// use strata_pipeline::{Chain, FnStage, Pipeline, PipelineOptions};
///
/// let pipeline = Pipeline::builder("api")
///     .options(PipelineOptions::default().with_max_stages(8))
///     .stage(FnStage::new("request-id"))
///     .branch("beta", |ctx| ctx.path().starts_with("/beta"), Chain::new(), Chain::new())
///     .stage(FnStage::new("handler"))
///     .build()
///     .unwrap();
///
/// assert_eq!(pipeline.stage_names(), vec!["request-id", "handler"]);
/// ```
pub struct PipelineBuilder {
    name: String,
    options: PipelineOptions,
    nodes: Vec<Node>,
}

impl PipelineBuilder {
    /// Creates a builder for a pipeline named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: PipelineOptions::default(),
            nodes: Vec::new(),
        }
    }

    /// Sets the pipeline options.
    #[must_use]
    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage<S: Stage>(mut self, stage: S) -> Self {
        self.nodes.push(Node::Stage(Arc::new(stage)));
        self
    }

    /// Appends a shared stage.
    #[must_use]
    pub fn shared(mut self, stage: Arc<dyn Stage>) -> Self {
        self.nodes.push(Node::Stage(stage));
        self
    }

    /// Appends a rejoining branch with an infallible predicate.
    #[must_use]
    pub fn branch<P>(
        self,
        name: impl Into<String>,
        predicate: P,
        on_true: Chain,
        on_false: Chain,
    ) -> Self
    where
        P: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.try_branch(name, move |ctx| Ok(predicate(ctx)), on_true, on_false)
    }

    /// Appends a rejoining branch with a fallible predicate.
    #[must_use]
    pub fn try_branch<P>(
        mut self,
        name: impl Into<String>,
        predicate: P,
        on_true: Chain,
        on_false: Chain,
    ) -> Self
    where
        P: Fn(&Context) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.nodes.push(Node::Branch(Branch::new(
            name.into(),
            Arc::new(predicate),
            on_true,
            on_false,
            BranchMode::Rejoin,
        )));
        self
    }

    /// Appends a terminal branch with an infallible predicate.
    #[must_use]
    pub fn branch_terminal<P>(
        self,
        name: impl Into<String>,
        predicate: P,
        on_true: Chain,
        on_false: Chain,
    ) -> Self
    where
        P: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.try_branch_terminal(name, move |ctx| Ok(predicate(ctx)), on_true, on_false)
    }

    /// Appends a terminal branch with a fallible predicate.
    #[must_use]
    pub fn try_branch_terminal<P>(
        mut self,
        name: impl Into<String>,
        predicate: P,
        on_true: Chain,
        on_false: Chain,
    ) -> Self
    where
        P: Fn(&Context) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.nodes.push(Node::Branch(Branch::new(
            name.into(),
            Arc::new(predicate),
            on_true,
            on_false,
            BranchMode::Terminal,
        )));
        self
    }

    /// Builds an unsealed pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] any registration raises.
    pub fn build(self) -> Result<Pipeline, ConfigurationError> {
        let mut pipeline = Pipeline::with_options(self.name, self.options);
        for node in self.nodes {
            pipeline.push(node)?;
        }
        Ok(pipeline)
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}
