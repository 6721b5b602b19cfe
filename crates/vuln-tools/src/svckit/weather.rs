//! Weather Tool
//!
//! Simulated conditions for a handful of cities.

use agent_core::{ParamType, ParameterSchema, ToolSchema, ToolSpec};

use crate::error::{Result, ToolkitError};

const WEATHER: &[(&str, &str)] = &[
    ("madrid", "22°C, sunny"),
    ("london", "15°C, cloudy"),
    ("new york", "18°C, rainy"),
    ("tokyo", "25°C, clear"),
    ("paris", "19°C, partly cloudy"),
    ("barcelona", "24°C, sunny"),
    ("luxembourg", "2.3°C, cloudy"),
];

/// Conditions for `city`, matched case-insensitively
pub fn lookup_weather(city: &str) -> Result<&'static str> {
    let key = city.trim().to_lowercase();
    WEATHER
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, conditions)| *conditions)
        .ok_or_else(|| ToolkitError::UnknownCity(city.trim().to_string()))
}

pub fn weather_tool() -> ToolSpec {
    let schema = ToolSchema::new("get_weather", "Get weather information for a city").param(
        ParameterSchema::required("city", ParamType::String, "City name (e.g., 'Madrid', 'London')"),
    );

    ToolSpec::from_fn(schema, |args| Ok(lookup_weather(args.str("city")?)?.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{ToolCall, ToolExecutor, ToolRegistry};
    use std::sync::Arc;

    #[test]
    fn lookup_ignores_case_and_padding() {
        assert_eq!(lookup_weather("Madrid").unwrap(), "22°C, sunny");
        assert_eq!(lookup_weather("  NEW YORK ").unwrap(), "18°C, rainy");
    }

    #[test]
    fn unknown_city_names_the_city() {
        let err = lookup_weather("Atlantis").unwrap_err();
        assert_eq!(err.to_string(), "No weather data available for Atlantis");
    }

    #[tokio::test]
    async fn executes_through_the_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(weather_tool()).unwrap();
        let executor = ToolExecutor::new(Arc::new(registry));

        let ok = executor
            .execute(&ToolCall::new("get_weather").arg("city", "Luxembourg"))
            .await
            .unwrap();
        assert_eq!(ok.output(), "2.3°C, cloudy");

        let missing = executor
            .execute(&ToolCall::new("get_weather").arg("city", "Atlantis"))
            .await
            .unwrap();
        assert!(!missing.is_success());
    }
}
