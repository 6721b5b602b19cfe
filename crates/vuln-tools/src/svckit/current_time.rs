//! Current Time Tool

use agent_core::{ParamType, ParameterSchema, ToolError, ToolSchema, ToolSpec};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde_json::json;

pub fn current_time_tool() -> ToolSpec {
    let schema = ToolSchema::new("get_current_time", "Get the current date and time").param(
        ParameterSchema::optional(
            "format",
            ParamType::String,
            "'local' (YYYY-MM-DD HH:MM:SS, default), 'iso' (RFC 3339 UTC) or 'unix' (seconds)",
        )
        .with_default("local")
        .with_enum(vec![json!("local"), json!("iso"), json!("unix")]),
    );

    ToolSpec::from_fn(schema, |args| {
        let format = args.opt_str("format").unwrap_or("local");
        render(Utc::now(), format)
    })
}

fn render(now: DateTime<Utc>, format: &str) -> Result<String, ToolError> {
    match format {
        "local" => Ok(now.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()),
        "iso" => Ok(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
        "unix" => Ok(now.timestamp().to_string()),
        other => Err(ToolError::Fault(format!("format '{other}' passed validation"))),
    }
}
