//! Vulnerability Classification
//!
//! Abstractions and implementations for the classification backend behind
//! the security tools.

mod http;
mod keyword;

pub use http::HttpClassifier;
pub use keyword::KeywordClassifier;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{CweId, CweMatch, SeverityAssessment, Vulnerability};

/// Classification backend (Strategy pattern)
///
/// Implement this for each service: a remote model, a vulnerability
/// database, or the offline keyword tables.
#[async_trait]
pub trait VulnClassifier: Send + Sync {
    /// Rate the severity of a free-text vulnerability description
    async fn classify_severity(&self, description: &str) -> Result<SeverityAssessment>;

    /// Most likely CWE categories for a description, best first
    async fn classify_cwe(&self, description: &str, top_k: usize) -> Result<Vec<CweMatch>>;

    /// Known vulnerabilities filed under `cwe`, most recent first
    async fn vulnerabilities_by_cwe(&self, cwe: CweId, limit: usize) -> Result<Vec<Vulnerability>>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Backend name
    fn name(&self) -> &str;
}
