//! Domain events published by the pipeline components
//!
//! Components never talk to the chat surface directly. Anything a frontend
//! might want to show (notices, approval prompts, progress) is emitted here.

use crate::approval::ApprovalState;
use crate::core::types::{SessionId, UserId, WorkflowId};
use crate::llm::generator::GenerationSource;
use crate::plan::Strategy;
use crate::workflow::WorkflowStatus;
use serde::Serialize;

/// Topic names used on the bus
pub mod topics {
    pub const PLAN_GENERATED: &str = "plan.generated";
    pub const APPROVAL_REQUESTED: &str = "approval.requested";
    pub const APPROVAL_RESOLVED: &str = "approval.resolved";
    pub const WORKFLOW_STARTED: &str = "workflow.started";
    pub const STEP_COMPLETED: &str = "workflow.step_completed";
    pub const WORKFLOW_FINISHED: &str = "workflow.finished";
    pub const NOTICE: &str = "notice";

    /// Subscribers on this topic receive every event
    pub const ALL: &str = "*";
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PlanGenerated {
        source: GenerationSource,
        steps: usize,
        requires_approval: bool,
    },
    ApprovalRequested {
        session: SessionId,
        requester: UserId,
        summary: String,
        window_secs: u64,
    },
    ApprovalResolved {
        session: SessionId,
        state: ApprovalState,
    },
    WorkflowStarted {
        workflow: WorkflowId,
        strategy: Strategy,
        steps: usize,
    },
    StepCompleted {
        workflow: WorkflowId,
        step_id: String,
        action: String,
        success: bool,
    },
    WorkflowFinished {
        workflow: WorkflowId,
        status: WorkflowStatus,
    },
    /// Informational message meant for the requester
    Notice {
        requester: Option<UserId>,
        message: String,
    },
}

impl Event {
    pub fn topic(&self) -> &'static str {
        match self {
            Event::PlanGenerated { .. } => topics::PLAN_GENERATED,
            Event::ApprovalRequested { .. } => topics::APPROVAL_REQUESTED,
            Event::ApprovalResolved { .. } => topics::APPROVAL_RESOLVED,
            Event::WorkflowStarted { .. } => topics::WORKFLOW_STARTED,
            Event::StepCompleted { .. } => topics::STEP_COMPLETED,
            Event::WorkflowFinished { .. } => topics::WORKFLOW_FINISHED,
            Event::Notice { .. } => topics::NOTICE,
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Event::Notice {
            requester: None,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_topics() {
        assert_eq!(Event::notice("hi").topic(), "notice");
        let finished = Event::WorkflowFinished {
            workflow: WorkflowId::new(),
            status: WorkflowStatus::Completed,
        };
        assert_eq!(finished.topic(), "workflow.finished");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(Event::notice("fallback used")).unwrap();
        assert_eq!(json["type"], "notice");
        assert_eq!(json["message"], "fallback used");
    }
}
