//! Domain Models
//!
//! Severity ratings, CWE categories and vulnerability records exchanged with
//! the classifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ToolkitError;

/// CVSS v3 qualitative severity rating
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Rating for a CVSS base score (0.0 to 10.0)
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 9.0 => Self::Critical,
            s if s >= 7.0 => Self::High,
            s if s >= 4.0 => Self::Medium,
            s if s > 0.0 => Self::Low,
            _ => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a severity classification
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeverityAssessment {
    pub severity: Severity,

    /// Estimated CVSS base score, when the classifier produces one
    #[serde(default)]
    pub score: Option<f64>,

    /// Short explanation of what drove the rating
    #[serde(default)]
    pub rationale: String,
}

/// Normalized CWE identifier, always rendered as `CWE-<n>`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CweId(u32);

impl CweId {
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    pub const fn number(self) -> u32 {
        self.0
    }
}

impl FromStr for CweId {
    type Err = ToolkitError;

    /// Accepts `CWE-79`, `cwe 79`, `CWE79` and `79`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .get(..3)
            .filter(|prefix| prefix.eq_ignore_ascii_case("cwe"))
            .map_or(trimmed, |_| &trimmed[3..])
            .trim_start_matches(['-', ' ', '_']);

        match digits.parse::<u32>() {
            Ok(n) if n > 0 => Ok(Self(n)),
            _ => Err(ToolkitError::InvalidCweId(s.to_string())),
        }
    }
}

impl fmt::Display for CweId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CWE-{}", self.0)
    }
}

impl Serialize for CweId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CweId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A candidate CWE category for a description
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CweMatch {
    pub id: CweId,
    pub name: String,

    /// 0.0 to 1.0
    pub confidence: f64,
}

/// A published vulnerability
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    /// CVE identifier
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    pub cwe: CweId,
    #[serde(default)]
    pub link: Option<String>,
}

impl Vulnerability {
    /// One-paragraph summary: title, description, affected product, link
    pub fn summary(&self) -> String {
        let mut out = format!("{} - {}", self.id, self.title);
        if !self.description.is_empty() {
            out.push_str(&format!("\n  {}", self.description));
        }
        match (&self.vendor, &self.product) {
            (Some(vendor), Some(product)) => out.push_str(&format!("\n  Affected: {vendor} {product}")),
            (Some(only), None) | (None, Some(only)) => out.push_str(&format!("\n  Affected: {only}")),
            (None, None) => {}
        }
        if let Some(link) = &self.link {
            out.push_str(&format!("\n  {link}"));
        }
        out
    }
}
