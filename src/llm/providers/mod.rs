pub mod ollama;
pub mod remote;

use serde_json::Value;
use tracing::{debug, info};

use crate::llm::LlmError;

/// Pulls a JSON object out of model output, tolerating markdown fences and
/// chatter around the payload.
pub fn extract_json(content: &str) -> Result<Value, LlmError> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    // Try to extract JSON from between ```json and ``` markers
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            if let Ok(value) = serde_json::from_str::<Value>(after[..end].trim()) {
                info!("Extracted JSON from fenced code block");
                return Ok(value);
            }
        }
    }

    // Fall back to the outermost braces
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                info!("Extracted JSON by brace scanning");
                return Ok(value);
            }
        }
    }

    debug!("Unparseable model output: {}", content);
    Err(LlmError::ResponseError(
        "Model output did not contain a JSON object".to_string(),
    ))
}
