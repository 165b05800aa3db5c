//! The execution engine and its result type.
//!
//! Execution runs in two phases over an explicit stack, so chain depth never
//! grows the call stack:
//!
//! 1. **Inbound** walks the chain, calling each stage's `before` and
//!    pushing it onto the entered stack. Branches push their chosen
//!    sub-chain as a new frame. The phase ends at the end of the chain, on
//!    [`Flow::Stop`], when the context is terminated, or on the first
//!    failure.
//! 2. **Outbound** pops the entered stack. Without a pending fault each
//!    stage's `after` runs. With a pending fault, stages run `after` until
//!    the innermost entered trap, whose `recover` decides whether the fault
//!    is absorbed or re-raised. A fault with no trap left to catch it stops
//!    unwinding at once. A trap never catches the failure of its own
//!    `before`; it unwinds like any other stage.
//!
//! ```text
//!   inbound   ──► before(A) ──► before(B) ──► before(C)
//!                                                 │
//!   outbound  ◄── after(A)  ◄── after(B)  ◄── after(C)
//! ```

use crate::chain::{BranchMode, Chain, Node};
use crate::context::Context;
use crate::error::{Phase, StageError};
use crate::pipeline::PipelineOptions;
use crate::stage::{Flow, Stage};
use std::time::{Duration, Instant};
use strata_core::names::{self, labels};

/// How an execution ended.
#[derive(Debug)]
pub enum Outcome {
    /// Every entered stage ran its post-logic without an unhandled failure.
    ///
    /// This includes executions that a stage short-circuited with
    /// [`Flow::Stop`]; see [`Execution::short_circuited_by`].
    Completed,

    /// A stage called [`Context::terminate`].
    Terminated {
        /// The stage that terminated, if it was called from within a stage.
        stage: Option<String>,
    },

    /// A failure was not absorbed by any trap stage.
    Faulted(StageError),
}

impl Outcome {
    /// Returns the outcome name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Terminated { .. } => "terminated",
            Self::Faulted(_) => "faulted",
        }
    }

    /// Whether the execution completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether the execution was terminated.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated { .. })
    }

    /// Whether the execution faulted.
    #[must_use]
    pub const fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted(_))
    }

    /// Returns the unhandled failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&StageError> {
        match self {
            Self::Faulted(error) => Some(error),
            _ => None,
        }
    }
}

/// Which way control was travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Pre-logic and branch selection.
    Inbound,
    /// Post-logic and recovery.
    Outbound,
}

/// What happened at one step of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `before` returned [`Flow::Continue`].
    Entered,
    /// `before` returned [`Flow::Stop`].
    ShortCircuited,
    /// The stage terminated the context.
    Terminated,
    /// A branch predicate chose an arm.
    BranchTaken(bool),
    /// `after` ran.
    Exited,
    /// A hook failed.
    Failed(Phase),
    /// A trap absorbed the pending fault.
    Recovered,
    /// A trap passed the pending fault on.
    Reraised,
}

/// One recorded step of an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Position on the entered path; 0 is the outermost stage.
    pub depth: usize,
    /// Stage or branch name.
    pub stage: String,
    /// Direction of travel.
    pub direction: Direction,
    /// What happened.
    pub step: Step,
}

/// The result of one [`Pipeline::execute`] call.
///
/// [`Pipeline::execute`]: crate::Pipeline::execute
#[derive(Debug)]
pub struct Execution {
    context: Context,
    outcome: Outcome,
    short_circuited_by: Option<String>,
    elapsed: Duration,
    trace: Option<Vec<TraceEvent>>,
}

impl Execution {
    /// Returns the context.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the context mutably.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Consumes the execution, returning the context.
    #[must_use]
    pub fn into_context(self) -> Context {
        self.context
    }

    /// Returns the outcome.
    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Name of the stage that returned [`Flow::Stop`], if any.
    #[must_use]
    pub fn short_circuited_by(&self) -> Option<&str> {
        self.short_circuited_by.as_deref()
    }

    /// Wall time spent in the engine.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The recorded steps, when tracing is enabled on the pipeline.
    #[must_use]
    pub fn trace(&self) -> Option<&[TraceEvent]> {
        self.trace.as_deref()
    }

    /// Splits the execution into its context and outcome.
    #[must_use]
    pub fn into_parts(self) -> (Context, Outcome) {
        (self.context, self.outcome)
    }

    /// Converts the execution into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the unhandled [`StageError`] if the execution faulted.
    pub fn into_result(self) -> Result<Context, StageError> {
        match self.outcome {
            Outcome::Faulted(error) => Err(error),
            Outcome::Completed | Outcome::Terminated { .. } => Ok(self.context),
        }
    }
}

/// A position within one chain on the inbound walk.
struct Frame<'p> {
    nodes: &'p [Node],
    next: usize,
    mode: BranchMode,
}

/// State for a single execution.
struct Runner<'p> {
    pipeline: &'p str,
    options: &'p PipelineOptions,
    ctx: Context,
    entered: Vec<&'p dyn Stage>,
    /// Depth of the stage whose `before` failed.
    failed_before: Option<usize>,
    short_circuited_by: Option<String>,
    trace: Option<Vec<TraceEvent>>,
}

/// Runs `chain` against `ctx`.
pub(crate) async fn run(
    pipeline: &str,
    chain: &Chain,
    options: &PipelineOptions,
    ctx: Context,
) -> Execution {
    let started = Instant::now();
    let mut runner = Runner {
        pipeline,
        options,
        ctx,
        entered: Vec::new(),
        failed_before: None,
        short_circuited_by: None,
        trace: options.record_trace.then(Vec::new),
    };

    let fault = runner.inbound(chain).await;
    let fault = runner.outbound(fault).await;
    runner.finish(fault, started.elapsed())
}

impl<'p> Runner<'p> {
    async fn inbound(&mut self, chain: &'p Chain) -> Option<StageError> {
        let mut frames = vec![Frame {
            nodes: chain.nodes(),
            next: 0,
            mode: BranchMode::Rejoin,
        }];

        loop {
            if self.ctx.is_terminated() {
                return None;
            }
            let Some(frame) = frames.last_mut() else {
                return None;
            };
            let nodes = frame.nodes;
            let Some(node) = nodes.get(frame.next) else {
                let mode = frame.mode;
                frames.pop();
                if mode == BranchMode::Terminal {
                    return None;
                }
                continue;
            };
            frame.next += 1;

            match node {
                Node::Stage(stage) => {
                    let stage: &'p dyn Stage = stage.as_ref();
                    let depth = self.entered.len();
                    self.entered.push(stage);

                    let name = stage.name();
                    tracing::debug!(pipeline = self.pipeline, stage = name, depth, "entering stage");

                    self.ctx.enter_stage(name);
                    let hook_started = Instant::now();
                    let result = stage.before(&mut self.ctx).await;
                    self.ctx.leave_stage();
                    self.check_slow(name, Phase::Before, hook_started.elapsed());

                    match result {
                        Ok(_) if self.ctx.is_terminated() => {
                            self.record(depth, name, Direction::Inbound, Step::Terminated);
                            return None;
                        }
                        Ok(Flow::Continue) => {
                            self.record(depth, name, Direction::Inbound, Step::Entered);
                        }
                        Ok(Flow::Stop) => {
                            tracing::debug!(pipeline = self.pipeline, stage = name, "short-circuited");
                            self.record(depth, name, Direction::Inbound, Step::ShortCircuited);
                            self.short_circuited_by = Some(name.to_string());
                            return None;
                        }
                        Err(cause) => {
                            let error = StageError::attribute(name, Phase::Before, cause);
                            self.record(depth, name, Direction::Inbound, Step::Failed(Phase::Before));
                            self.count_failure(&error);
                            self.failed_before = Some(depth);
                            return Some(error);
                        }
                    }
                }
                Node::Branch(branch) => {
                    let depth = self.entered.len();
                    match branch.evaluate(&self.ctx) {
                        Ok(taken) => {
                            tracing::debug!(
                                pipeline = self.pipeline,
                                branch = branch.name(),
                                taken,
                                "branch selected"
                            );
                            self.record(
                                depth,
                                branch.name(),
                                Direction::Inbound,
                                Step::BranchTaken(taken),
                            );
                            frames.push(Frame {
                                nodes: branch.arm(taken).nodes(),
                                next: 0,
                                mode: branch.mode(),
                            });
                        }
                        Err(cause) => {
                            let error = StageError::predicate(branch.name(), cause);
                            self.record(
                                depth,
                                branch.name(),
                                Direction::Inbound,
                                Step::Failed(Phase::Predicate),
                            );
                            self.count_failure(&error);
                            return Some(error);
                        }
                    }
                }
            }
        }
    }

    async fn outbound(&mut self, mut fault: Option<StageError>) -> Option<StageError> {
        let mut traps_remaining = self
            .entered
            .iter()
            .enumerate()
            .filter(|&(depth, stage)| self.catches_at(depth, *stage))
            .count();

        loop {
            if fault.is_some() && traps_remaining == 0 {
                break;
            }
            let Some(stage) = self.entered.pop() else {
                break;
            };
            let depth = self.entered.len();
            let name = stage.name();
            let is_trap = self.catches_at(depth, stage);
            if is_trap {
                traps_remaining -= 1;
            }

            let phase = if is_trap && fault.is_some() {
                Phase::Recover
            } else {
                Phase::After
            };

            self.ctx.enter_stage(name);
            let hook_started = Instant::now();
            fault = match fault.take() {
                None => match stage.after(&mut self.ctx).await {
                    Ok(()) => {
                        self.record(depth, name, Direction::Outbound, Step::Exited);
                        None
                    }
                    Err(cause) => {
                        let error = StageError::attribute(name, Phase::After, cause);
                        self.record(depth, name, Direction::Outbound, Step::Failed(Phase::After));
                        self.count_failure(&error);
                        Some(error)
                    }
                },
                Some(error) if is_trap => {
                    tracing::debug!(
                        pipeline = self.pipeline,
                        stage = name,
                        failed_stage = error.stage(),
                        "trap handling fault"
                    );
                    match stage.recover(&mut self.ctx, error).await {
                        Ok(()) => {
                            self.record(depth, name, Direction::Outbound, Step::Recovered);
                            metrics::counter!(
                                names::RECOVERIES_TOTAL,
                                labels::PIPELINE => self.pipeline.to_string(),
                                labels::STAGE => name.to_string()
                            )
                            .increment(1);
                            None
                        }
                        Err(cause) => {
                            let error = StageError::attribute(name, Phase::Recover, cause);
                            self.record(depth, name, Direction::Outbound, Step::Reraised);
                            if error.phase() == Phase::Recover {
                                self.count_failure(&error);
                            }
                            Some(error)
                        }
                    }
                }
                Some(error) => {
                    if let Err(secondary) = stage.after(&mut self.ctx).await {
                        tracing::warn!(
                            pipeline = self.pipeline,
                            stage = name,
                            error = %secondary,
                            pending = %error,
                            "discarding post-logic failure while unwinding"
                        );
                    }
                    self.record(depth, name, Direction::Outbound, Step::Exited);
                    Some(error)
                }
            };
            self.ctx.leave_stage();
            self.check_slow(name, phase, hook_started.elapsed());
        }

        fault
    }

    /// Whether the entered stage at `depth` acts as a trap while unwinding.
    fn catches_at(&self, depth: usize, stage: &dyn Stage) -> bool {
        self.failed_before != Some(depth) && stage.is_trap()
    }

    fn finish(self, fault: Option<StageError>, elapsed: Duration) -> Execution {
        let outcome = match fault {
            Some(error) => Outcome::Faulted(error),
            None if self.ctx.is_terminated() => Outcome::Terminated {
                stage: self.ctx.terminated_by().map(str::to_string),
            },
            None => Outcome::Completed,
        };

        match &outcome {
            Outcome::Faulted(error) => tracing::error!(
                pipeline = self.pipeline,
                request_id = %self.ctx.request_id(),
                stage = error.stage(),
                phase = %error.phase(),
                error = %error.cause(),
                "execution faulted"
            ),
            _ => tracing::debug!(
                pipeline = self.pipeline,
                request_id = %self.ctx.request_id(),
                outcome = outcome.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                "execution finished"
            ),
        }

        metrics::counter!(
            names::EXECUTIONS_TOTAL,
            labels::PIPELINE => self.pipeline.to_string(),
            labels::OUTCOME => outcome.as_str()
        )
        .increment(1);
        metrics::histogram!(
            names::EXECUTION_DURATION_SECONDS,
            labels::PIPELINE => self.pipeline.to_string()
        )
        .record(elapsed.as_secs_f64());

        Execution {
            context: self.ctx,
            outcome,
            short_circuited_by: self.short_circuited_by,
            elapsed,
            trace: self.trace,
        }
    }

    fn record(&mut self, depth: usize, stage: &str, direction: Direction, step: Step) {
        if let Some(trace) = self.trace.as_mut() {
            trace.push(TraceEvent {
                depth,
                stage: stage.to_string(),
                direction,
                step,
            });
        }
    }

    fn count_failure(&self, error: &StageError) {
        metrics::counter!(
            names::STAGE_FAILURES_TOTAL,
            labels::PIPELINE => self.pipeline.to_string(),
            labels::STAGE => error.stage().to_string(),
            labels::PHASE => error.phase().as_str()
        )
        .increment(1);
    }

    fn check_slow(&self, stage: &str, phase: Phase, elapsed: Duration) {
        if let Some(threshold) = self.options.slow_stage_threshold {
            if elapsed > threshold {
                tracing::warn!(
                    pipeline = self.pipeline,
                    stage,
                    phase = phase.as_str(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    threshold_ms = threshold.as_millis() as u64,
                    "slow stage"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::FnStage;
    use crate::testing::empty_request;
    use http::StatusCode;
    use strata_core::{Response, ResponseExt};

    fn traced() -> PipelineOptions {
        PipelineOptions {
            record_trace: true,
            ..PipelineOptions::default()
        }
    }

    async fn run_chain(chain: &Chain, options: &PipelineOptions) -> Execution {
        run("test", chain, options, Context::new(empty_request("/"))).await
    }

    fn steps(execution: &Execution) -> Vec<(String, Direction, Step)> {
        execution
            .trace()
            .unwrap()
            .iter()
            .map(|event| (event.stage.clone(), event.direction, event.step))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_chain_completes() {
        let execution = run_chain(&Chain::new(), &traced()).await;
        assert!(execution.outcome().is_completed());
        assert!(execution.trace().unwrap().is_empty());
        assert!(execution.short_circuited_by().is_none());
    }

    #[tokio::test]
    async fn test_trace_records_onion() {
        let chain = Chain::new()
            .stage(FnStage::new("a"))
            .stage(FnStage::new("b"));
        let execution = run_chain(&chain, &traced()).await;

        assert_eq!(
            steps(&execution),
            vec![
                ("a".to_string(), Direction::Inbound, Step::Entered),
                ("b".to_string(), Direction::Inbound, Step::Entered),
                ("b".to_string(), Direction::Outbound, Step::Exited),
                ("a".to_string(), Direction::Outbound, Step::Exited),
            ]
        );
        let depths: Vec<_> = execution.trace().unwrap().iter().map(|e| e.depth).collect();
        assert_eq!(depths, vec![0, 1, 1, 0]);
    }

    #[tokio::test]
    async fn test_trace_disabled_by_default() {
        let chain = Chain::new().stage(FnStage::new("a"));
        let execution = run_chain(&chain, &PipelineOptions::default()).await;
        assert!(execution.trace().is_none());
    }

    #[tokio::test]
    async fn test_terminate_reports_stage() {
        let chain = Chain::new()
            .stage(FnStage::new("outer"))
            .stage(FnStage::new("auth").before(|ctx| {
                ctx.terminate(Response::text(StatusCode::UNAUTHORIZED, "denied"));
                Ok(Flow::Continue)
            }))
            .stage(FnStage::new("handler"));
        let execution = run_chain(&chain, &traced()).await;

        match execution.outcome() {
            Outcome::Terminated { stage } => assert_eq!(stage.as_deref(), Some("auth")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            steps(&execution),
            vec![
                ("outer".to_string(), Direction::Inbound, Step::Entered),
                ("auth".to_string(), Direction::Inbound, Step::Terminated),
                ("auth".to_string(), Direction::Outbound, Step::Exited),
                ("outer".to_string(), Direction::Outbound, Step::Exited),
            ]
        );
    }

    #[tokio::test]
    async fn test_pre_terminated_context_enters_nothing() {
        let chain = Chain::new().stage(FnStage::new("a"));
        let mut ctx = Context::new(empty_request("/"));
        ctx.terminate(Response::text(StatusCode::OK, "cached"));

        let execution = run("test", &chain, &traced(), ctx).await;
        assert!(execution.outcome().is_terminated());
        assert!(execution.trace().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_branch_ends_inbound() {
        let chain = Chain::new()
            .branch_terminal(
                "map",
                |_| true,
                Chain::new().stage(FnStage::new("mapped")),
                Chain::new(),
            )
            .stage(FnStage::new("after-branch"));
        let execution = run_chain(&chain, &traced()).await;
        assert!(execution.outcome().is_completed());
        assert_eq!(
            steps(&execution),
            vec![
                ("map".to_string(), Direction::Inbound, Step::BranchTaken(true)),
                ("mapped".to_string(), Direction::Inbound, Step::Entered),
                ("mapped".to_string(), Direction::Outbound, Step::Exited),
            ]
        );
    }

    #[tokio::test]
    async fn test_predicate_failure_is_attributed_to_branch() {
        let chain = Chain::new().try_branch(
            "by-tenant",
            |_| Err(anyhow::anyhow!("tenant header missing")),
            Chain::new(),
            Chain::new(),
        );
        let execution = run_chain(&chain, &traced()).await;

        let error = execution.outcome().error().unwrap();
        assert!(error.is_predicate_failure());
        assert_eq!(error.stage(), "by-tenant");
    }

    #[tokio::test]
    async fn test_after_failure_without_trap_stops_unwinding() {
        let chain = Chain::new()
            .stage(FnStage::new("outer"))
            .stage(FnStage::new("inner").after(|_| Err(anyhow::anyhow!("flush failed"))));
        let execution = run_chain(&chain, &traced()).await;

        let error = execution.outcome().error().unwrap();
        assert_eq!(error.stage(), "inner");
        assert_eq!(error.phase(), Phase::After);
        assert_eq!(
            steps(&execution).last().unwrap(),
            &("inner".to_string(), Direction::Outbound, Step::Failed(Phase::After))
        );
    }

    #[tokio::test]
    async fn test_secondary_failure_is_discarded() {
        let chain = Chain::new()
            .stage(FnStage::new("boundary").recover(|_, _| Ok(())))
            .stage(FnStage::new("noisy").after(|_| Err(anyhow::anyhow!("secondary"))))
            .stage(FnStage::new("handler").before(|_| Err(anyhow::anyhow!("primary"))));
        let execution = run_chain(&chain, &traced()).await;

        assert!(execution.outcome().is_completed());
        assert!(steps(&execution).contains(&(
            "boundary".to_string(),
            Direction::Outbound,
            Step::Recovered
        )));
    }

    #[tokio::test]
    async fn test_into_result() {
        let ok = run_chain(&Chain::new(), &PipelineOptions::default()).await;
        assert!(ok.into_result().is_ok());

        let chain =
            Chain::new().stage(FnStage::new("bad").before(|_| Err(anyhow::anyhow!("nope"))));
        let err = run_chain(&chain, &PipelineOptions::default())
            .await
            .into_result()
            .unwrap_err();
        assert_eq!(err.stage(), "bad");
    }
}
