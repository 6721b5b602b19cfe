//! CWE Classification Tool

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{Arguments, ParamType, ParameterSchema, Tool, ToolError, ToolSchema};

use crate::classifier::VulnClassifier;

const DEFAULT_TOP_K: usize = 3;
const MAX_TOP_K: usize = 10;

/// Maps a vulnerability description to likely CWE categories
pub struct ClassifyCweTool {
    classifier: Arc<dyn VulnClassifier>,
}

impl ClassifyCweTool {
    pub fn new(classifier: Arc<dyn VulnClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Tool for ClassifyCweTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "classify_cwe",
            "Classify a vulnerability description into CWE (Common Weakness Enumeration) categories.",
        )
        .param(ParameterSchema::required(
            "description",
            ParamType::String,
            "Free-text vulnerability description",
        ))
        .param(
            ParameterSchema::optional("top_k", ParamType::Number, "Maximum number of categories to return")
                .with_default(DEFAULT_TOP_K),
        )
    }

    async fn call(&self, args: &Arguments) -> Result<String, ToolError> {
        let description = args.str("description")?.trim();
        if description.is_empty() {
            return Err(ToolError::Execution("description is empty".into()));
        }
        let top_k = args.opt_number("top_k").map_or(DEFAULT_TOP_K, |k| k.max(1.0) as usize).min(MAX_TOP_K);

        let matches = self.classifier.classify_cwe(description, top_k).await?;
        tracing::debug!(classifier = self.classifier.name(), matches = matches.len(), "Classified CWE");

        if matches.is_empty() {
            return Ok("No CWE category matched the description.".into());
        }

        let lines: Vec<String> = matches
            .iter()
            .map(|m| format!("{} {} (confidence {:.2})", m.id, m.name, m.confidence))
            .collect();
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::KeywordClassifier;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    fn args(tool: &ClassifyCweTool, pairs: &[(&str, Value)]) -> Arguments {
        let raw: HashMap<String, Value> = pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect();
        tool.schema().validate(&raw).unwrap()
    }

    #[tokio::test]
    async fn lists_matching_categories() {
        let tool = ClassifyCweTool::new(Arc::new(KeywordClassifier::new()));
        let output = tool
            .call(&args(&tool, &[("description", json!("Path traversal via ../ sequences in the download endpoint"))]))
            .await
            .unwrap();
        assert!(output.starts_with("CWE-22 Improper Limitation"), "{output}");
    }

    #[tokio::test]
    async fn top_k_limits_output() {
        let tool = ClassifyCweTool::new(Arc::new(KeywordClassifier::new()));
        let description = json!("SQL injection and cross-site scripting leading to denial of service");
        let output = tool
            .call(&args(&tool, &[("description", description), ("top_k", json!(1))]))
            .await
            .unwrap();
        assert_eq!(output.lines().count(), 1);
    }

    #[tokio::test]
    async fn no_match_is_not_an_error() {
        let tool = ClassifyCweTool::new(Arc::new(KeywordClassifier::new()));
        let output = tool
            .call(&args(&tool, &[("description", json!("The button is the wrong colour"))]))
            .await
            .unwrap();
        assert_eq!(output, "No CWE category matched the description.");
    }
}
