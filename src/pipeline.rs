//! End-to-end request handling
//!
//! text -> ResponseGenerator -> Plan -> (ApprovalGate) -> WorkflowRunner -> report

use crate::approval::{ApprovalGate, ApprovalState};
use crate::command::{ActionExecutor, ActionResolver, ExecutionContext};
use crate::core::config::PipelineConfig;
use crate::core::error::{PipelineError, Result};
use crate::events::{Event, EventBus};
use crate::llm::{parse_plan, prompt, CompletionBackend, GenerationSource, ResponseGenerator};
use crate::plan::Plan;
use crate::workflow::{WorkflowRunner, WorkflowStatus, WorkflowSummary};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

const NOT_UNDERSTOOD: &str = "Sorry, I could not understand that request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Executed,
    Rejected,
    Expired,
    NotUnderstood,
}

/// What happened to one request, ready to show to the requester
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub outcome: Outcome,
    pub source: Option<GenerationSource>,
    pub workflow: Option<WorkflowSummary>,
    pub messages: Vec<String>,
}

impl PipelineReport {
    fn without_workflow(outcome: Outcome, source: Option<GenerationSource>, message: impl Into<String>) -> Self {
        Self {
            outcome,
            source,
            workflow: None,
            messages: vec![message.into()],
        }
    }

    /// Executed with every step succeeding
    pub fn succeeded(&self) -> bool {
        self.outcome == Outcome::Executed
            && self
                .workflow
                .as_ref()
                .is_some_and(|w| w.status == WorkflowStatus::Completed && w.failed == 0)
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    system_prompt: String,
    generator: ResponseGenerator,
    resolver: ActionResolver,
    gate: ApprovalGate,
    runner: WorkflowRunner,
    bus: Arc<EventBus>,
}

impl Pipeline {
    /// Wire every component to one shared event bus
    pub fn new(
        config: PipelineConfig,
        backend: Option<Arc<dyn CompletionBackend>>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Result<Self> {
        config.validate()?;
        let bus = Arc::new(EventBus::new());
        let resolver = ActionResolver::new(&config.resolver);

        Ok(Self {
            system_prompt: prompt::plan_system_prompt(),
            generator: ResponseGenerator::new(backend, &config).with_bus(bus.clone()),
            gate: ApprovalGate::new(&config.approval).with_bus(bus.clone()),
            runner: WorkflowRunner::new(executor, resolver.clone(), &config.workflow)
                .with_bus(bus.clone()),
            resolver,
            bus,
            config,
        })
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    pub fn runner(&self) -> &WorkflowRunner {
        &self.runner
    }

    pub async fn handle(&self, request_text: &str, requester: &str) -> PipelineReport {
        self.handle_request(ExecutionContext::for_request(requester, request_text))
            .await
    }

    /// Handle a request with full context; never fails, errors become reports
    pub async fn handle_request(&self, ctx: ExecutionContext) -> PipelineReport {
        let requester = ctx.requester.clone().unwrap_or_default();

        let generated = match self
            .generator
            .generate(&self.system_prompt, &ctx.request_text)
            .await
        {
            Ok(generated) => generated,
            Err(e) => {
                warn!(requester = %requester, error = %e, "generation failed");
                return PipelineReport::without_workflow(Outcome::NotUnderstood, None, NOT_UNDERSTOOD);
            }
        };
        let source = Some(generated.source);

        let mut plan = match parse_plan(&generated.raw_text) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(requester = %requester, error = %e, "generated plan unusable");
                return PipelineReport::without_workflow(Outcome::NotUnderstood, source, NOT_UNDERSTOOD);
            }
        };

        // The requester approves what will actually run
        self.resolver.canonicalize(&mut plan, &ctx.request_text);
        let requires_approval = self.requires_approval(&plan);
        info!(
            requester = %requester,
            steps = plan.steps.len(),
            strategy = %plan.strategy,
            requires_approval,
            "plan ready"
        );
        self.bus.emit(&Event::PlanGenerated {
            source: generated.source,
            steps: plan.steps.len(),
            requires_approval,
        });

        if requires_approval {
            let outcome = self.gate.propose(&plan, &requester).await;
            match outcome.state() {
                ApprovalState::Approved => {}
                ApprovalState::Rejected => {
                    return PipelineReport::without_workflow(
                        Outcome::Rejected,
                        source,
                        PipelineError::ApprovalRejected.to_string(),
                    );
                }
                ApprovalState::Expired | ApprovalState::Proposed => {
                    return PipelineReport::without_workflow(
                        Outcome::Expired,
                        source,
                        PipelineError::ApprovalTimeout.to_string(),
                    );
                }
            }
        }

        match self.runner.execute(plan, &ctx).await {
            Ok(record) => {
                let messages = record
                    .results
                    .iter()
                    .filter(|r| !r.success)
                    .map(|r| {
                        format!(
                            "step {} ({}) failed: {}",
                            r.step_id,
                            r.action,
                            r.error.as_deref().unwrap_or("unknown error")
                        )
                    })
                    .collect();
                PipelineReport {
                    outcome: Outcome::Executed,
                    source,
                    workflow: Some(record.summary()),
                    messages,
                }
            }
            Err(e) => {
                warn!(requester = %requester, error = %e, "plan rejected by runner");
                PipelineReport::without_workflow(Outcome::NotUnderstood, source, NOT_UNDERSTOOD)
            }
        }
    }

    /// Flagged by the generator, or touching a destructive capability when configured
    fn requires_approval(&self, plan: &Plan) -> bool {
        if plan.requires_approval {
            return true;
        }
        self.config.approval.require_for_destructive
            && plan.steps.iter().any(|step| {
                self.resolver
                    .resolve(&step.action)
                    .capability
                    .is_some_and(|cap| cap.is_destructive())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::DryRunExecutor;
    use crate::plan::Step;

    fn pipeline(config: PipelineConfig) -> Pipeline {
        Pipeline::new(config, None, Arc::new(DryRunExecutor)).unwrap()
    }

    #[test]
    fn test_destructive_steps_force_approval() {
        let p = pipeline(PipelineConfig::default());
        let plan = Plan::sequential(vec![Step::new("1", "ban.member").with_param("user", "1")]);
        assert!(p.requires_approval(&plan));

        let harmless = Plan::sequential(vec![Step::new("1", "message.create")]);
        assert!(!p.requires_approval(&harmless));
        assert!(p.requires_approval(&harmless.with_approval()));
    }

    #[test]
    fn test_destructive_rule_can_be_disabled() {
        let mut config = PipelineConfig::default();
        config.approval.require_for_destructive = false;
        let p = pipeline(config);
        let plan = Plan::sequential(vec![Step::new("1", "channel.delete")]);
        assert!(!p.requires_approval(&plan));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PipelineConfig::default();
        config.generation.max_attempts = 0;
        assert!(Pipeline::new(config, None, Arc::new(DryRunExecutor)).is_err());
    }

    #[tokio::test]
    async fn test_offline_request_executes() {
        let report = pipeline(PipelineConfig::default())
            .handle("send hello 3 times", "alice")
            .await;
        assert_eq!(report.outcome, Outcome::Executed);
        assert_eq!(report.source, Some(GenerationSource::Fallback));
        assert!(report.succeeded());
        assert_eq!(report.workflow.unwrap().succeeded, 3);
    }
}
