//! Current-time tool.

use chrono::Utc;
use colloquy_conversation::{BlockingTool, ToolError};
use serde_json::{Value as JsonValue, json};

/// Reports the current date and time.
pub struct ClockTool;

impl BlockingTool for ClockTool {
    fn invoke(&self, _args: JsonValue) -> Result<JsonValue, ToolError> {
        let now = Utc::now();
        Ok(json!({
            "utc": now.to_rfc3339(),
            "unix_seconds": now.timestamp(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_current_time() {
        let value = ClockTool.invoke(JsonValue::Null).expect("invoke");
        assert!(value["utc"].is_string());
        assert!(value["unix_seconds"].as_i64().unwrap() > 0);
    }
}
