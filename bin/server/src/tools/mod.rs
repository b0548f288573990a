//! Concrete tool capabilities and the declarative registration table.

pub mod clock;
pub mod weather;

use crate::config::ServerConfig;
use colloquy_conversation::{ToolHandle, ToolRow};
use std::sync::Arc;

pub use clock::ClockTool;
pub use weather::WeatherTool;

/// The startup registration table.
///
/// Rows carry the outcome of constructing each capability; failures land
/// in the startup report without aborting the others.
pub fn tool_table(config: &ServerConfig) -> Vec<ToolRow> {
    vec![
        ToolRow::from_result(
            "weather",
            "Looks up current weather conditions",
            &["天气", "weather"],
            WeatherTool::new(&config.weather)
                .map(|tool| ToolHandle::Suspending(Arc::new(tool))),
        ),
        ToolRow::blocking(
            "clock",
            "Tells the current date and time",
            &["时间", "几点", "time"],
            Arc::new(ClockTool),
        ),
    ]
}
