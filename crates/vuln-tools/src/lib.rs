//! # vuln-tools
//!
//! The tool set of the vlagentic security assistant: vulnerability triage
//! backed by a pluggable classifier, plus a few general-assistance tools.
//!
//! ```text
//! ┌──────────────────────────────┐     ┌──────────────────────────┐
//! │ classify_severity            │     │ VulnClassifier           │
//! │ classify_cwe                 │────▶│  HttpClassifier (remote) │
//! │ vulnerability_info_by_cwe    │     │  KeywordClassifier       │
//! ├──────────────────────────────┤     └──────────────────────────┘
//! │ get_weather                  │
//! │ get_current_time             │  self-contained
//! │ calculate_math               │
//! └──────────────────────────────┘
//! ```

pub mod classifier;
pub mod error;
pub mod model;
pub mod svckit;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use agent_core::{ToolRegistry, ToolSpec};

pub use classifier::{HttpClassifier, KeywordClassifier, VulnClassifier};
pub use error::{Result, ToolkitError};
pub use model::{CweId, CweMatch, Severity, SeverityAssessment, Vulnerability};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        ClassifyCweTool, ClassifySeverityTool, VulnerabilityInfoTool, calculate_math_tool, current_time_tool,
        weather_tool,
    };
}

/// One registrable tool. Declaration order is the canonical registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolKind {
    Severity,
    Cwe,
    CweLookup,
    Weather,
    Time,
    Math,
}

impl ToolKind {
    pub const ALL: [Self; 6] = [
        Self::Severity,
        Self::Cwe,
        Self::CweLookup,
        Self::Weather,
        Self::Time,
        Self::Math,
    ];

    /// Name the model sees
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Severity => "classify_severity",
            Self::Cwe => "classify_cwe",
            Self::CweLookup => "vulnerability_info_by_cwe",
            Self::Weather => "get_weather",
            Self::Time => "get_current_time",
            Self::Math => "calculate_math",
        }
    }

    /// Short name used on the command line
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Severity => "severity",
            Self::Cwe => "cwe",
            Self::CweLookup => "cwe-lookup",
            Self::Weather => "weather",
            Self::Time => "time",
            Self::Math => "math",
        }
    }

    fn spec(self, classifier: &Arc<dyn VulnClassifier>) -> ToolSpec {
        match self {
            Self::Severity => ToolSpec::new(tools::ClassifySeverityTool::new(classifier.clone())),
            Self::Cwe => ToolSpec::new(tools::ClassifyCweTool::new(classifier.clone())),
            Self::CweLookup => ToolSpec::new(tools::VulnerabilityInfoTool::new(classifier.clone())),
            Self::Weather => tools::weather_tool(),
            Self::Time => tools::current_time_tool(),
            Self::Math => tools::calculate_math_tool(),
        }
    }
}

impl FromStr for ToolKind {
    type Err = ToolkitError;

    /// Accepts the short name or the tool name, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.short_name() == wanted || kind.tool_name() == wanted)
            .ok_or_else(|| ToolkitError::UnknownTool(s.trim().to_string()))
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool_name())
    }
}

/// Register `kinds` in canonical order, ignoring repeats.
pub fn build_registry(kinds: &[ToolKind], classifier: Arc<dyn VulnClassifier>) -> agent_core::Result<ToolRegistry> {
    let mut selected = kinds.to_vec();
    selected.sort_unstable();
    selected.dedup();

    let mut registry = ToolRegistry::new();
    for kind in selected {
        registry.register(kind.spec(&classifier))?;
    }
    tracing::info!(tools = ?registry.names(), classifier = classifier.name(), "Tool registry ready");
    Ok(registry)
}

/// Every tool, classified with `classifier`
pub fn default_registry(classifier: Arc<dyn VulnClassifier>) -> agent_core::Result<ToolRegistry> {
    build_registry(&ToolKind::ALL, classifier)
}

/// System prompt for the security assistant
pub const DEFAULT_SYSTEM_PROMPT: &str = r"You are a security-focused assistant with access to specialized tools.

You can use the following tools when appropriate:
- classify_cwe: classify a vulnerability description into CWE categories
- classify_severity: classify a vulnerability severity
- vulnerability_info_by_cwe: retrieve recent vulnerabilities for a given CWE ID
- get_current_time, calculate_math, get_weather for general assistance

Tool usage guidelines:
- If the user provides a vulnerability description and asks for classification, use classify_cwe and/or classify_severity.
- If the user asks for recent or known vulnerabilities for a specific CWE (e.g. 'recent vulnerabilities for CWE-119'), use vulnerability_info_by_cwe.
- Do NOT invent vulnerability data; always use tools for factual vulnerability information.

Response style:
- Be concise and factual.
- Assume the audience has security knowledge.
- Summarize vulnerabilities briefly (title, short description, affected vendor/product, link).
- Avoid unnecessary verbosity or speculation.

If no tool is relevant, respond directly in plain text.";

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::testing::ScriptedProvider;
    use agent_core::{AgentBuilder, Reply, ToolCall, Turn};

    fn keyword() -> Arc<dyn VulnClassifier> {
        Arc::new(KeywordClassifier::new())
    }

    #[test]
    fn default_registry_is_in_canonical_order() {
        let registry = default_registry(keyword()).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "classify_severity",
                "classify_cwe",
                "vulnerability_info_by_cwe",
                "get_weather",
                "get_current_time",
                "calculate_math",
            ]
        );
    }

    #[test]
    fn selection_is_sorted_and_deduplicated() {
        let registry = build_registry(&[ToolKind::Math, ToolKind::Weather, ToolKind::Math], keyword()).unwrap();
        assert_eq!(registry.names(), vec!["get_weather", "calculate_math"]);
    }

    #[test]
    fn kinds_parse_from_either_name() {
        assert_eq!("cwe-lookup".parse::<ToolKind>().unwrap(), ToolKind::CweLookup);
        assert_eq!("Get_Weather".parse::<ToolKind>().unwrap(), ToolKind::Weather);
        assert!("stocks".parse::<ToolKind>().is_err());
    }

    #[tokio::test]
    async fn agent_triages_a_description_with_two_tools() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_tools(vec![
                    ToolCall::new("classify_cwe").arg("description", "SQL injection in the search API"),
                    ToolCall::new("classify_severity").arg("description", "SQL injection in the search API"),
                ])
                .then_respond(|history| {
                    let outputs: Vec<String> = history
                        .iter()
                        .filter_map(|turn| match turn {
                            Turn::ToolResult(result) => Some(result.output().to_string()),
                            _ => None,
                        })
                        .collect();
                    Reply::Final(outputs.join(" | "))
                }),
        );
        let agent = AgentBuilder::new()
            .provider(provider)
            .tools(Arc::new(default_registry(keyword()).unwrap()))
            .system_prompt(DEFAULT_SYSTEM_PROMPT)
            .build()
            .unwrap();

        let answer = agent.ask("Classify: SQL injection in the search API").await.unwrap();
        assert!(answer.starts_with("CWE-89 "), "{answer}");
        assert!(answer.contains("Severity: CRITICAL"), "{answer}");
    }
}
