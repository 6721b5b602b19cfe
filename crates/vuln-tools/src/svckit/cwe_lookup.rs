//! Vulnerability Lookup Tool
//!
//! Recent vulnerabilities for a CWE, summarized for a security audience.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{Arguments, ParamType, ParameterSchema, Tool, ToolError, ToolSchema};

use crate::classifier::VulnClassifier;
use crate::model::CweId;

const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: f64 = 20.0;

pub struct VulnerabilityInfoTool {
    classifier: Arc<dyn VulnClassifier>,
}

impl VulnerabilityInfoTool {
    pub fn new(classifier: Arc<dyn VulnClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Tool for VulnerabilityInfoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "vulnerability_info_by_cwe",
            "Retrieve recent known vulnerabilities for a given CWE ID (e.g. 'CWE-119').",
        )
        .param(ParameterSchema::required("cwe_id", ParamType::String, "CWE identifier, e.g. 'CWE-79'"))
        .param(
            ParameterSchema::optional("limit", ParamType::Number, "Maximum number of vulnerabilities (1-20)")
                .with_default(DEFAULT_LIMIT),
        )
    }

    async fn call(&self, args: &Arguments) -> Result<String, ToolError> {
        let cwe: CweId = args.str("cwe_id")?.parse()?;
        let limit = match args.opt_number("limit") {
            None => DEFAULT_LIMIT,
            Some(n) if (1.0..=MAX_LIMIT).contains(&n) && n.fract() == 0.0 => n as usize,
            Some(n) => {
                return Err(ToolError::Execution(format!(
                    "limit must be a whole number between 1 and {MAX_LIMIT}, got {n}"
                )));
            }
        };

        let vulns = self.classifier.vulnerabilities_by_cwe(cwe, limit).await?;
        tracing::debug!(classifier = self.classifier.name(), %cwe, found = vulns.len(), "Looked up vulnerabilities");

        if vulns.is_empty() {
            return Ok(format!("No known vulnerabilities recorded for {cwe}."));
        }

        let mut output = format!("Known vulnerabilities for {cwe}:\n");
        for vuln in &vulns {
            output.push_str(&format!("- {}\n", vuln.summary()));
        }
        Ok(output.trim_end().to_string())
    }
}
