//! Plans and steps - the structured form of a moderation request

use crate::core::error::{PipelineError, Result};
use crate::core::types::Params;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// How the steps of a plan are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One step at a time, in order; critical failures halt the plan
    #[default]
    Sequential,
    /// All steps at once, every outcome collected
    Parallel,
}

impl FromStr for Strategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Strategy::Sequential),
            "parallel" => Ok(Strategy::Parallel),
            other => Err(PipelineError::InvalidPlan(format!(
                "unknown execution strategy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Sequential => write!(f, "sequential"),
            Strategy::Parallel => write!(f, "parallel"),
        }
    }
}

/// One unit of work within a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    /// Tool family the generator addressed (informational)
    pub tool: String,
    /// Raw action identifier; replaced by its canonical form right before dispatch
    pub action: String,
    pub parameters: Params,
    /// Halts a sequential plan when it fails
    pub critical: bool,
}

impl Step {
    pub fn new(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool: DEFAULT_TOOL.to_string(),
            action: action.into(),
            parameters: Params::new(),
            critical: false,
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// String parameter lookup (numbers are rendered as text)
    pub fn param_str(&self, key: &str) -> Option<String> {
        match self.parameters.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Tool name used when the generator does not supply one
pub const DEFAULT_TOOL: &str = "moderation";

/// Ordered set of steps plus scheduling metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<Step>,
    pub strategy: Strategy,
    pub requires_approval: bool,
}

impl Plan {
    pub fn new(steps: Vec<Step>, strategy: Strategy) -> Self {
        Self {
            steps,
            strategy,
            requires_approval: false,
        }
    }

    pub fn sequential(steps: Vec<Step>) -> Self {
        Self::new(steps, Strategy::Sequential)
    }

    pub fn parallel(steps: Vec<Step>) -> Self {
        Self::new(steps, Strategy::Parallel)
    }

    pub fn with_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    /// Check the structural invariants a runnable plan must hold
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(PipelineError::InvalidPlan("plan has no steps".into()));
        }
        let mut seen = AHashSet::new();
        for step in &self.steps {
            if step.id.is_empty() {
                return Err(PipelineError::InvalidPlan("step with empty id".into()));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(PipelineError::InvalidPlan(format!(
                    "duplicate step id '{}'",
                    step.id
                )));
            }
        }
        Ok(())
    }

    /// Human-readable listing used when asking for confirmation
    pub fn summary(&self) -> String {
        let mut s = format!("{} step(s), {}:\n", self.steps.len(), self.strategy);
        for (i, step) in self.steps.iter().enumerate() {
            let params: Vec<String> = step
                .parameters
                .iter()
                .map(|(k, v)| match v {
                    Value::String(text) => format!("{}={}", k, text),
                    other => format!("{}={}", k, other),
                })
                .collect();
            s.push_str(&format!("  {}. {}", i + 1, step.action));
            if !params.is_empty() {
                s.push_str(&format!(" ({})", params.join(", ")));
            }
            s.push('\n');
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("sequential".parse::<Strategy>().unwrap(), Strategy::Sequential);
        assert_eq!(" Parallel ".parse::<Strategy>().unwrap(), Strategy::Parallel);
        assert!(matches!(
            "round-robin".parse::<Strategy>(),
            Err(PipelineError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let plan = Plan::sequential(vec![
            Step::new("a", "message.create"),
            Step::new("a", "message.delete"),
        ]);
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate step id 'a'"));
    }

    #[test]
    fn test_validate_rejects_empty_plan() {
        assert!(Plan::parallel(vec![]).validate().is_err());
    }

    #[test]
    fn test_param_str_renders_numbers() {
        let step = Step::new("s1", "member.timeout")
            .with_param("user", "123")
            .with_param("duration", 600);
        assert_eq!(step.param_str("user").as_deref(), Some("123"));
        assert_eq!(step.param_str("duration").as_deref(), Some("600"));
        assert_eq!(step.param_str("missing"), None);
    }

    #[test]
    fn test_summary_lists_steps() {
        let plan = Plan::sequential(vec![Step::new("s1", "member.ban").with_param("user", "spammer")])
            .with_approval();
        let summary = plan.summary();
        assert!(summary.contains("1. member.ban (user=spammer)"));
        assert!(summary.starts_with("1 step(s), sequential"));
    }
}
