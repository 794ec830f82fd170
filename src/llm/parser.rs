//! Turn generated text into a [`Plan`]

use crate::core::error::{PipelineError, Result};
use crate::llm::client::truncate;
use crate::plan::wire::WirePlan;
use crate::plan::Plan;

/// Parse generated (and possibly repaired) text into a validated plan
pub fn parse_plan(response: &str) -> Result<Plan> {
    let json_str = extract_json(response)?;

    let wire: WirePlan = serde_json::from_str(json_str).map_err(|e| {
        PipelineError::Parse(format!(
            "Failed to parse plan: {} - Response: {}",
            e,
            truncate(response, 200)
        ))
    })?;

    wire.into_plan()
        .map_err(|e| PipelineError::Parse(e.to_string()))
}

/// Extract JSON object from a model response (handles surrounding text)
fn extract_json(response: &str) -> Result<&str> {
    let start = response
        .find('{')
        .ok_or_else(|| PipelineError::Parse("No JSON found in response".into()))?;
    let end = response
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| PipelineError::Parse("No closing brace found in response".into()))?;
    Ok(&response[start..=end])
}
