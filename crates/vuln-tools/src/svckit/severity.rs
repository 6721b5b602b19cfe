//! Severity Classification Tool

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{Arguments, ParamType, ParameterSchema, Tool, ToolError, ToolSchema};

use crate::classifier::VulnClassifier;

/// Rates a free-text vulnerability description
pub struct ClassifySeverityTool {
    classifier: Arc<dyn VulnClassifier>,
}

impl ClassifySeverityTool {
    pub fn new(classifier: Arc<dyn VulnClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Tool for ClassifySeverityTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "classify_severity",
            "Get the severity classification (CVSS rating) of a vulnerability based on its description.",
        )
        .param(ParameterSchema::required(
            "description",
            ParamType::String,
            "Free-text vulnerability description",
        ))
    }

    async fn call(&self, args: &Arguments) -> Result<String, ToolError> {
        let description = args.str("description")?.trim();
        if description.is_empty() {
            return Err(ToolError::Execution("description is empty".into()));
        }

        let assessment = self.classifier.classify_severity(description).await?;
        tracing::debug!(classifier = self.classifier.name(), severity = %assessment.severity, "Classified severity");

        let mut output = format!("Severity: {}", assessment.severity);
        if let Some(score) = assessment.score {
            output.push_str(&format!(" (CVSS {score:.1})"));
        }
        if !assessment.rationale.is_empty() {
            output.push_str(&format!("\nRationale: {}", assessment.rationale));
        }
        Ok(output)
    }
}
