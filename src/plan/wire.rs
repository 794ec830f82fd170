//! JSON wire format exchanged with the generation backend
//!
//! ```json
//! {"steps": [{"id": "1", "tool": "moderation", "params": {"action": "member.ban", "user": "42"}}],
//!  "meta": {"strategy": "sequential"},
//!  "requiresApproval": true}
//! ```

use super::model::{Plan, Step, Strategy, DEFAULT_TOOL};
use crate::core::error::{PipelineError, Result};
use crate::core::types::Params;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePlan {
    #[serde(default)]
    pub steps: Vec<WireStep>,
    #[serde(default)]
    pub meta: WireMeta,
    #[serde(
        rename = "requiresApproval",
        alias = "requires_approval",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub requires_approval: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMeta {
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

impl Default for WireMeta {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
        }
    }
}

fn default_strategy() -> String {
    Strategy::Sequential.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireStep {
    /// Generators emit both strings and numbers here
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub params: Params,
    /// Some generators put the action next to `params` instead of inside
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub critical: bool,
}

impl WirePlan {
    /// Convert into a validated plan
    pub fn into_plan(self) -> Result<Plan> {
        let strategy: Strategy = self.meta.strategy.parse()?;
        let mut steps = Vec::with_capacity(self.steps.len());

        for (index, wire) in self.steps.into_iter().enumerate() {
            let id = match wire.id {
                Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                Some(Value::Number(n)) => n.to_string(),
                _ => format!("step_{}", index + 1),
            };

            let mut params = wire.params;
            let action = match params.remove("action") {
                Some(Value::String(a)) => a,
                _ => wire.action.ok_or_else(|| {
                    PipelineError::InvalidPlan(format!("step '{}' has no action", id))
                })?,
            };
            let critical = wire.critical
                || params
                    .remove("critical")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);

            steps.push(Step {
                id,
                tool: wire.tool.unwrap_or_else(|| DEFAULT_TOOL.to_string()),
                action,
                parameters: params,
                critical,
            });
        }

        let plan = Plan {
            steps,
            strategy,
            requires_approval: self.requires_approval,
        };
        plan.validate()?;
        Ok(plan)
    }
}

impl From<&Plan> for WirePlan {
    fn from(plan: &Plan) -> Self {
        let steps = plan
            .steps
            .iter()
            .map(|step| {
                let mut params = Params::new();
                params.insert("action".into(), Value::String(step.action.clone()));
                params.extend(step.parameters.clone());
                WireStep {
                    id: Some(Value::String(step.id.clone())),
                    tool: Some(step.tool.clone()),
                    params,
                    action: None,
                    critical: step.critical,
                }
            })
            .collect();

        Self {
            steps,
            meta: WireMeta {
                strategy: plan.strategy.to_string(),
            },
            requires_approval: plan.requires_approval,
        }
    }
}

impl Plan {
    /// Serialize in the wire format
    pub fn to_wire_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&WirePlan::from(self))?)
    }
}
