//! Keyword Classifier
//!
//! Offline, deterministic classification from static keyword tables. Used
//! when no classifier service is configured, and in tests.

use async_trait::async_trait;

use super::VulnClassifier;
use crate::error::Result;
use crate::model::{CweId, CweMatch, Severity, SeverityAssessment, Vulnerability};

struct CweEntry {
    id: u32,
    name: &'static str,
    keywords: &'static [&'static str],
    /// Broader category this one refines
    parent: Option<u32>,
}

const CWE_TABLE: &[CweEntry] = &[
    CweEntry {
        id: 79,
        name: "Improper Neutralization of Input During Web Page Generation ('Cross-site Scripting')",
        keywords: &["cross-site scripting", "xss", "script injection", "javascript", "<script>"],
        parent: Some(74),
    },
    CweEntry {
        id: 89,
        name: "Improper Neutralization of Special Elements used in an SQL Command ('SQL Injection')",
        keywords: &["sql injection", "sqli", "sql query", "sql command", "database query"],
        parent: Some(74),
    },
    CweEntry {
        id: 78,
        name: "Improper Neutralization of Special Elements used in an OS Command ('OS Command Injection')",
        keywords: &["command injection", "os command", "shell command", "shell metacharacters", "system()"],
        parent: Some(74),
    },
    CweEntry {
        id: 22,
        name: "Improper Limitation of a Pathname to a Restricted Directory ('Path Traversal')",
        keywords: &["path traversal", "directory traversal", "../", "arbitrary file read"],
        parent: None,
    },
    CweEntry {
        id: 119,
        name: "Improper Restriction of Operations within the Bounds of a Memory Buffer",
        keywords: &["buffer overflow", "memory corruption", "buffer overrun", "memory buffer"],
        parent: None,
    },
    CweEntry {
        id: 787,
        name: "Out-of-bounds Write",
        keywords: &["out-of-bounds write", "heap overflow", "heap-based buffer overflow", "stack-based buffer overflow"],
        parent: Some(119),
    },
    CweEntry {
        id: 125,
        name: "Out-of-bounds Read",
        keywords: &["out-of-bounds read", "over-read", "buffer over-read", "memory disclosure"],
        parent: Some(119),
    },
    CweEntry {
        id: 416,
        name: "Use After Free",
        keywords: &["use after free", "use-after-free", "freed memory", "dangling pointer"],
        parent: None,
    },
    CweEntry {
        id: 502,
        name: "Deserialization of Untrusted Data",
        keywords: &["deserialization", "deserialize", "unserialize", "object injection", "jndi"],
        parent: None,
    },
    CweEntry {
        id: 352,
        name: "Cross-Site Request Forgery (CSRF)",
        keywords: &["cross-site request forgery", "csrf", "xsrf"],
        parent: None,
    },
    CweEntry {
        id: 287,
        name: "Improper Authentication",
        keywords: &["authentication bypass", "improper authentication", "bypass authentication", "auth bypass"],
        parent: None,
    },
    CweEntry {
        id: 918,
        name: "Server-Side Request Forgery (SSRF)",
        keywords: &["server-side request forgery", "ssrf", "internal network requests"],
        parent: None,
    },
    CweEntry {
        id: 200,
        name: "Exposure of Sensitive Information to an Unauthorized Actor",
        keywords: &["information disclosure", "information exposure", "sensitive information", "leaks"],
        parent: None,
    },
    CweEntry {
        id: 400,
        name: "Uncontrolled Resource Consumption",
        keywords: &["denial of service", "resource exhaustion", "excessive memory", "cpu exhaustion", "dos"],
        parent: None,
    },
    CweEntry {
        id: 20,
        name: "Improper Input Validation",
        keywords: &["input validation", "improper validation", "malformed input", "crafted input"],
        parent: None,
    },
];

/// (indicator, CVSS base score it suggests)
const SEVERITY_INDICATORS: &[(&str, f64)] = &[
    ("remote code execution", 9.8),
    ("arbitrary code", 9.8),
    ("rce", 9.8),
    ("command injection", 9.8),
    ("deserialization", 9.8),
    ("sql injection", 9.8),
    ("authentication bypass", 9.1),
    ("privilege escalation", 8.8),
    ("use after free", 8.8),
    ("use-after-free", 8.8),
    ("buffer overflow", 8.8),
    ("heap overflow", 8.8),
    ("out-of-bounds write", 8.8),
    ("server-side request forgery", 8.6),
    ("ssrf", 8.6),
    ("path traversal", 7.5),
    ("directory traversal", 7.5),
    ("out-of-bounds read", 7.5),
    ("denial of service", 7.5),
    ("cross-site request forgery", 6.5),
    ("csrf", 6.5),
    ("cross-site scripting", 6.1),
    ("xss", 6.1),
    ("information disclosure", 5.3),
    ("open redirect", 4.7),
];

const NETWORK_VECTORS: &[&str] = &["remote", "unauthenticated", "without authentication", "network"];
const LOCAL_VECTORS: &[&str] = &["local", "authenticated user", "physical access", "requires user interaction"];

/// Score when nothing in the description indicates impact
const BASELINE_SCORE: f64 = 3.1;

struct CatalogEntry {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    vendor: &'static str,
    product: &'static str,
    cwe: u32,
}

/// Well-known published vulnerabilities, newest first
const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        id: "CVE-2023-34362",
        title: "MOVEit Transfer SQL injection",
        description: "SQL injection in the MOVEit Transfer web application allows an unauthenticated attacker to gain access to its database.",
        vendor: "Progress",
        product: "MOVEit Transfer",
        cwe: 89,
    },
    CatalogEntry {
        id: "CVE-2023-4863",
        title: "libwebp heap buffer overflow",
        description: "Heap buffer overflow in libwebp allows a remote attacker to perform an out-of-bounds memory write via a crafted WebP image.",
        vendor: "Google",
        product: "libwebp",
        cwe: 787,
    },
    CatalogEntry {
        id: "CVE-2021-44228",
        title: "Log4Shell",
        description: "JNDI features in Apache Log4j2 allow an attacker who can control log messages to execute arbitrary code loaded from LDAP servers.",
        vendor: "Apache",
        product: "Log4j",
        cwe: 502,
    },
    CatalogEntry {
        id: "CVE-2021-41773",
        title: "Apache HTTP Server path traversal",
        description: "A path normalization flaw in Apache HTTP Server 2.4.49 lets an attacker map URLs to files outside the expected document root.",
        vendor: "Apache",
        product: "HTTP Server",
        cwe: 22,
    },
    CatalogEntry {
        id: "CVE-2021-26855",
        title: "ProxyLogon",
        description: "Server-side request forgery in Microsoft Exchange Server lets an unauthenticated attacker send arbitrary HTTP requests and authenticate as the Exchange server.",
        vendor: "Microsoft",
        product: "Exchange Server",
        cwe: 918,
    },
    CatalogEntry {
        id: "CVE-2019-0708",
        title: "BlueKeep",
        description: "Use after free in Remote Desktop Services allows an unauthenticated attacker to execute code by sending specially crafted requests.",
        vendor: "Microsoft",
        product: "Windows Remote Desktop Services",
        cwe: 416,
    },
    CatalogEntry {
        id: "CVE-2017-5638",
        title: "Apache Struts Jakarta Multipart parser RCE",
        description: "Incorrect exception handling in the Jakarta Multipart parser allows remote attackers to execute arbitrary commands via a crafted Content-Type header.",
        vendor: "Apache",
        product: "Struts",
        cwe: 20,
    },
    CatalogEntry {
        id: "CVE-2014-6271",
        title: "Shellshock",
        description: "GNU Bash processes trailing strings after function definitions in environment variables, allowing remote attackers to execute arbitrary code.",
        vendor: "GNU",
        product: "Bash",
        cwe: 78,
    },
    CatalogEntry {
        id: "CVE-2014-0160",
        title: "Heartbleed",
        description: "The TLS heartbeat extension in OpenSSL does not properly handle packets, letting remote attackers read process memory.",
        vendor: "OpenSSL",
        product: "OpenSSL",
        cwe: 125,
    },
];

/// Offline classifier backed by static keyword tables
#[derive(Debug, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn cwe_entry(id: u32) -> Option<&'static CweEntry> {
        CWE_TABLE.iter().find(|entry| entry.id == id)
    }

    /// True when `id` is `ancestor` or refines it
    fn falls_under(id: u32, ancestor: u32) -> bool {
        let mut current = Some(id);
        while let Some(cwe) = current {
            if cwe == ancestor {
                return true;
            }
            current = Self::cwe_entry(cwe).and_then(|entry| entry.parent);
        }
        false
    }

    fn assess(description: &str) -> SeverityAssessment {
        let text = description.to_lowercase();

        let strongest = SEVERITY_INDICATORS
            .iter()
            .filter(|(indicator, _)| contains_word(&text, indicator))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let Some(&(indicator, base)) = strongest else {
            return SeverityAssessment {
                severity: Severity::from_score(BASELINE_SCORE),
                score: Some(BASELINE_SCORE),
                rationale: "no high-impact indicators in the description".into(),
            };
        };

        let mut score = base;
        let mut rationale = format!("indicates {indicator}");
        if LOCAL_VECTORS.iter().any(|v| text.contains(v)) {
            score -= 1.5;
            rationale.push_str("; requires local or authenticated access");
        } else if NETWORK_VECTORS.iter().any(|v| text.contains(v)) {
            score += 0.2;
            rationale.push_str("; reachable over the network");
        }
        let score = (score.clamp(0.0, 10.0) * 10.0).round() / 10.0;

        SeverityAssessment {
            severity: Severity::from_score(score),
            score: Some(score),
            rationale,
        }
    }

    fn match_cwes(description: &str, top_k: usize) -> Vec<CweMatch> {
        let text = description.to_lowercase();

        let mut matches: Vec<CweMatch> = CWE_TABLE
            .iter()
            .filter_map(|entry| {
                let hits = entry.keywords.iter().filter(|k| contains_word(&text, k)).count();
                (hits > 0).then(|| CweMatch {
                    id: CweId::new(entry.id),
                    name: entry.name.to_string(),
                    confidence: (0.6 + 0.15 * (hits as f64 - 1.0)).min(0.95),
                })
            })
            .collect();

        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence).then(a.id.cmp(&b.id)));
        matches.truncate(top_k);
        matches
    }
}

/// Substring match that respects word boundaries for short alphanumeric
/// keywords such as "xss" or "dos".
fn contains_word(text: &str, keyword: &str) -> bool {
    if keyword.len() > 4 || !keyword.chars().all(char::is_alphanumeric) {
        return text.contains(keyword);
    }
    text.split(|c: char| !c.is_alphanumeric()).any(|word| word == keyword)
}

#[async_trait]
impl VulnClassifier for KeywordClassifier {
    async fn classify_severity(&self, description: &str) -> Result<SeverityAssessment> {
        Ok(Self::assess(description))
    }

    async fn classify_cwe(&self, description: &str, top_k: usize) -> Result<Vec<CweMatch>> {
        Ok(Self::match_cwes(description, top_k))
    }

    async fn vulnerabilities_by_cwe(&self, cwe: CweId, limit: usize) -> Result<Vec<Vulnerability>> {
        Ok(CATALOG
            .iter()
            .filter(|entry| Self::falls_under(entry.cwe, cwe.number()))
            .take(limit)
            .map(|entry| Vulnerability {
                id: entry.id.to_string(),
                title: entry.title.to_string(),
                description: entry.description.to_string(),
                vendor: Some(entry.vendor.to_string()),
                product: Some(entry.product.to_string()),
                cwe: CweId::new(entry.cwe),
                link: Some(format!("https://nvd.nist.gov/vuln/detail/{}", entry.id)),
            })
            .collect())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "keyword"
    }
}
