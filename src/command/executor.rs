//! Action execution boundary
//!
//! The pipeline never talks to the chat platform itself. Every resolved
//! action is handed to an [`ActionExecutor`] together with its parameters.

use crate::actions::Capability;
use crate::core::types::{Params, UserId};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

/// Ambient information about the request a step belongs to
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionContext {
    /// Who asked for the plan
    pub requester: Option<UserId>,
    /// Channel the request came from
    pub channel: Option<String>,
    /// Community the request applies to
    pub guild: Option<String>,
    /// Original request text (used for composite-pattern matching)
    pub request_text: String,
}

impl ExecutionContext {
    pub fn for_request(requester: impl Into<UserId>, request_text: impl Into<String>) -> Self {
        Self {
            requester: Some(requester.into()),
            request_text: request_text.into(),
            ..Self::default()
        }
    }
}

/// What the executor reports for one call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub details: Value,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn ok(details: Value) -> Self {
        Self {
            success: true,
            details,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            details: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Executes a single canonical action against the moderation surface
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &str, params: &Params, ctx: &ExecutionContext) -> ExecutionOutcome;
}

/// Executor that validates arguments and logs instead of touching a platform
#[derive(Debug, Default, Clone)]
pub struct DryRunExecutor;

#[async_trait]
impl ActionExecutor for DryRunExecutor {
    async fn execute(&self, action: &str, params: &Params, ctx: &ExecutionContext) -> ExecutionOutcome {
        let Some(capability) = Capability::from_canonical(action) else {
            return ExecutionOutcome::failed(format!("unsupported action '{}'", action));
        };

        if let Some(missing) = missing_params(capability, params).first() {
            return ExecutionOutcome::failed(format!(
                "{} requires parameter '{}'",
                capability, missing
            ));
        }

        tracing::info!(
            action,
            requester = ctx.requester.as_deref().unwrap_or("-"),
            params = %serde_json::Value::Object(params.clone()),
            "dry run"
        );
        ExecutionOutcome::ok(json!({ "dry_run": true, "action": action }))
    }
}

/// Required parameters absent from `params`
pub fn missing_params(capability: Capability, params: &Params) -> Vec<&'static str> {
    capability
        .required_params()
        .iter()
        .copied()
        .filter(|key| params.get(*key).map_or(true, Value::is_null))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_dry_run_accepts_complete_call() {
        let outcome = DryRunExecutor
            .execute(
                "member.ban",
                &params(json!({"user": "42"})),
                &ExecutionContext::default(),
            )
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.details["action"], "member.ban");
    }

    #[tokio::test]
    async fn test_dry_run_reports_missing_param() {
        let outcome = DryRunExecutor
            .execute("member.timeout", &params(json!({"user": "42"})), &ExecutionContext::default())
            .await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("member.timeout requires parameter 'duration_secs'")
        );
    }

    #[tokio::test]
    async fn test_dry_run_rejects_non_canonical() {
        let outcome = DryRunExecutor
            .execute("member.roles.remove", &Params::new(), &ExecutionContext::default())
            .await;
        assert!(!outcome.success);
    }

    #[test]
    fn test_missing_params_treats_null_as_missing() {
        let missing = missing_params(
            Capability::RoleAdd,
            &params(json!({"user": "1", "role": null})),
        );
        assert_eq!(missing, vec!["role"]);
    }
}
