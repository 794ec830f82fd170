//! Prompt shaping for plan generation

use crate::actions::Capability;
use crate::llm::generator::GenerationRequest;

const SYSTEM_HEADER: &str = r#"You translate moderation requests for a chat community into an executable plan.

Respond with a single JSON object in exactly this shape:
{
  "steps": [
    {"id": "1", "tool": "moderation", "params": {"action": "<action>", "...": "..."}, "critical": false}
  ],
  "meta": {"strategy": "sequential" | "parallel"},
  "requiresApproval": true | false
}

Rules:
- Use only the actions listed below, spelled exactly as shown.
- Step ids must be unique.
- Use "parallel" only when the steps are independent of each other.
- Mark a step "critical" when later steps make no sense if it fails.
- Set "requiresApproval" for bans, kicks, bulk deletions and channel or role deletion.
"#;

const JSON_ONLY_SYSTEM: &str =
    "Output ONLY valid JSON. No markdown, no code fences, no commentary before or after the object.";

const JSON_ONLY_USER: &str = "Respond with the JSON object only.";

/// System prompt listing every canonical action and its parameters
pub fn plan_system_prompt() -> String {
    let mut s = String::from(SYSTEM_HEADER);
    s.push_str("\nAVAILABLE ACTIONS:\n");
    for cap in Capability::ALL {
        s.push_str(&format!(
            "- {} (params: {})\n",
            cap.as_str(),
            cap.required_params().join(", ")
        ));
    }
    s
}

/// Wrap both prompts with JSON-only output instructions
pub fn json_only(system_prompt: &str, user_prompt: &str) -> GenerationRequest {
    GenerationRequest {
        system_prompt: format!("{}\n\n{}", system_prompt.trim_end(), JSON_ONLY_SYSTEM),
        user_prompt: format!("{}\n\n{}", user_prompt.trim_end(), JSON_ONLY_USER),
    }
}
