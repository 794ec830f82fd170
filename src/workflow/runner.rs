//! Workflow runner - executes plans step by step or all at once
//!
//! Every step is resolved first; the corrected action is written back into
//! the plan before anything is dispatched. Dispatch goes through the
//! [`ActionExecutor`] boundary.

use super::record::{StepResult, WorkflowRecord, WorkflowRegistry, WorkflowStatus, WorkflowSummary};
use crate::command::{
    ActionExecutor, ActionResolver, DynamicResolution, ExecutionContext, ResolutionSource,
};
use crate::core::config::WorkflowConfig;
use crate::core::error::{PipelineError, Result};
use crate::core::types::WorkflowId;
use crate::events::{Event, EventBus};
use crate::plan::{Plan, Step, Strategy};
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// How a step will be dispatched
#[derive(Debug, Clone)]
enum Dispatch {
    Action(ResolutionSource),
    Composite(DynamicResolution),
    Unresolved(String),
}

pub struct WorkflowRunner {
    executor: Arc<dyn ActionExecutor>,
    resolver: ActionResolver,
    registry: WorkflowRegistry,
    bus: Option<Arc<EventBus>>,
}

impl WorkflowRunner {
    pub fn new(
        executor: Arc<dyn ActionExecutor>,
        resolver: ActionResolver,
        config: &WorkflowConfig,
    ) -> Self {
        Self {
            executor,
            resolver,
            registry: WorkflowRegistry::new(config.max_retained),
            bus: None,
        }
    }

    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    pub fn status(&self, id: WorkflowId) -> Option<WorkflowSummary> {
        self.registry.summary(id)
    }

    /// Run `plan` to completion and return its record
    ///
    /// Fails only for structurally invalid plans; step failures are recorded.
    pub async fn execute(&self, mut plan: Plan, ctx: &ExecutionContext) -> Result<WorkflowRecord> {
        plan.validate()?;

        let id = WorkflowId::new();
        self.registry.register(WorkflowRecord::new(id, plan.clone()));
        info!(workflow = %id, strategy = %plan.strategy, steps = plan.steps.len(), "workflow started");
        self.emit(Event::WorkflowStarted {
            workflow: id,
            strategy: plan.strategy,
            steps: plan.steps.len(),
        });

        let dispatches: Vec<Dispatch> = plan
            .steps
            .iter_mut()
            .map(|step| self.resolve_step(step, &ctx.request_text))
            .collect();
        let corrected = plan.clone();
        self.registry.update(id, |r| r.plan = corrected);

        let abort = match plan.strategy {
            Strategy::Sequential => self.run_sequential(id, &plan, dispatches, ctx).await,
            Strategy::Parallel => {
                self.run_parallel(id, &plan, dispatches, ctx).await;
                None
            }
        };

        let status = if abort.is_some() {
            WorkflowStatus::Failed
        } else {
            WorkflowStatus::Completed
        };
        // Running records are never evicted, so the snapshot is taken before
        // the record becomes evictable
        let record = self
            .registry
            .update_and_get(id, |r| {
                r.status = status;
                r.error = abort;
                r.finished_at = Some(SystemTime::now());
            })
            .ok_or_else(|| PipelineError::Execution(format!("workflow {} is not registered", id)))?;
        info!(workflow = %id, ?status, "workflow finished");
        self.emit(Event::WorkflowFinished { workflow: id, status });

        Ok(record)
    }

    /// Resolve the step's action and write the corrected identifier back
    fn resolve_step(&self, step: &mut Step, request_text: &str) -> Dispatch {
        let resolution =
            self.resolver
                .resolve_with_context(&step.action, request_text, &step.parameters);
        let resolved = resolution.action;

        if !resolved.is_resolved() {
            let message = PipelineError::Resolution(step.action.clone()).to_string();
            warn!(step = %step.id, action = %step.action, "unresolvable action");
            return Dispatch::Unresolved(message);
        }

        if resolved.canonical != step.action {
            debug!(
                step = %step.id,
                from = %step.action,
                to = %resolved.canonical,
                source = ?resolved.source,
                confidence = resolved.confidence,
                "action corrected"
            );
            step.action = resolved.canonical.clone();
        }

        match resolution.dynamic {
            Some(dynamic) => Dispatch::Composite(dynamic),
            None => Dispatch::Action(resolved.source),
        }
    }

    /// Returns the abort error when a critical step failed
    async fn run_sequential(
        &self,
        id: WorkflowId,
        plan: &Plan,
        dispatches: Vec<Dispatch>,
        ctx: &ExecutionContext,
    ) -> Option<String> {
        for (index, (step, dispatch)) in plan.steps.iter().zip(dispatches).enumerate() {
            self.registry.update(id, |r| r.step_cursor = index);

            let result = run_step(self.executor.clone(), step.clone(), dispatch, ctx.clone()).await;
            self.record_result(id, &result);

            if !result.success && step.critical {
                let message = result.error.unwrap_or_else(|| "critical step failed".into());
                warn!(workflow = %id, step = %step.id, error = %message, "critical step failed, halting");
                return Some(message);
            }
        }
        None
    }

    async fn run_parallel(
        &self,
        id: WorkflowId,
        plan: &Plan,
        dispatches: Vec<Dispatch>,
        ctx: &ExecutionContext,
    ) {
        let handles: Vec<_> = plan
            .steps
            .iter()
            .zip(dispatches)
            .map(|(step, dispatch)| {
                tokio::spawn(run_step(
                    self.executor.clone(),
                    step.clone(),
                    dispatch,
                    ctx.clone(),
                ))
            })
            .collect();

        let settled = join_all(handles).await;
        self.registry.update(id, |r| r.step_cursor = plan.steps.len().saturating_sub(1));

        // `critical` only halts sequential plans; a parallel plan has already run every step
        for (step, joined) in plan.steps.iter().zip(settled) {
            let result = joined.unwrap_or_else(|e| {
                error!(workflow = %id, step = %step.id, error = %e, "step task panicked");
                StepResult::failed(
                    &step.id,
                    &step.action,
                    ResolutionSource::None,
                    format!("step task failed: {}", e),
                )
            });
            self.record_result(id, &result);
        }
    }

    fn record_result(&self, id: WorkflowId, result: &StepResult) {
        self.emit(Event::StepCompleted {
            workflow: id,
            step_id: result.step_id.clone(),
            action: result.action.clone(),
            success: result.success,
        });
        let result = result.clone();
        self.registry.update(id, |r| r.results.push(result));
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = &self.bus {
            bus.emit(&event);
        }
    }
}

async fn run_step(
    executor: Arc<dyn ActionExecutor>,
    step: Step,
    dispatch: Dispatch,
    ctx: ExecutionContext,
) -> StepResult {
    let started = Instant::now();

    let mut result = match dispatch {
        Dispatch::Unresolved(message) => {
            StepResult::failed(&step.id, &step.action, ResolutionSource::None, message)
        }
        Dispatch::Action(source) => {
            let outcome = executor.execute(&step.action, &step.parameters, &ctx).await;
            StepResult {
                step_id: step.id.clone(),
                action: step.action.clone(),
                source,
                success: outcome.success,
                details: outcome.details,
                error: outcome.error,
                elapsed: Default::default(),
            }
        }
        Dispatch::Composite(resolution) => run_composite(&*executor, &step, resolution, &ctx).await,
    };

    result.elapsed = started.elapsed();
    debug!(step = %result.step_id, action = %result.action, success = result.success, "step finished");
    result
}

/// Execute every operation a composite pattern derived, stopping at the first failure
async fn run_composite(
    executor: &dyn ActionExecutor,
    step: &Step,
    resolution: DynamicResolution,
    ctx: &ExecutionContext,
) -> StepResult {
    let mut details: Vec<Value> = Vec::with_capacity(resolution.operations.len());
    let mut error = None;

    for operation in &resolution.operations {
        let action = operation.capability.as_str();
        let outcome = executor.execute(action, &operation.parameters, ctx).await;
        details.push(json!({ "action": action, "details": outcome.details }));
        if !outcome.success {
            error = Some(outcome.error.unwrap_or_else(|| format!("{} failed", action)));
            break;
        }
    }

    StepResult {
        step_id: step.id.clone(),
        action: step.action.clone(),
        source: ResolutionSource::Dynamic,
        success: error.is_none(),
        details: json!({
            "pattern": resolution.pattern,
            "note": resolution.note,
            "operations": details,
        }),
        error,
        elapsed: Default::default(),
    }
}
