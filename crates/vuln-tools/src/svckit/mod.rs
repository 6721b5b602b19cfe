//! Service Kit - Agent Tools
//!
//! The tools the vlagentic agent registers. Classifier-backed tools
//! implement `agent_core::Tool`; the self-contained ones are plain functions
//! wrapped with `ToolSpec::from_fn`.

mod calculator;
mod current_time;
mod cwe;
mod cwe_lookup;
mod severity;
mod weather;

pub use calculator::{calculate_math_tool, evaluate};
pub use current_time::current_time_tool;
pub use cwe::ClassifyCweTool;
pub use cwe_lookup::VulnerabilityInfoTool;
pub use severity::ClassifySeverityTool;
pub use weather::{lookup_weather, weather_tool};
