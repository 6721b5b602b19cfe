//! HTTP Classifier
//!
//! Client for a JSON classification service:
//!
//! | call | request |
//! |------|---------|
//! | severity | `POST {base}/severity` `{"description"}` |
//! | CWE | `POST {base}/cwe` `{"description", "top_k"}` |
//! | lookup | `GET {base}/cwe/{id}/vulnerabilities?limit=n` |
//! | health | `GET {base}/health` |

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::VulnClassifier;
use crate::error::{Result, ToolkitError};
use crate::model::{CweId, CweMatch, SeverityAssessment, Vulnerability};

#[derive(Serialize)]
struct DescriptionRequest<'a> {
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<usize>,
}

#[derive(Deserialize)]
struct CweResponse {
    #[serde(default)]
    matches: Vec<CweMatch>,
}

#[derive(Deserialize)]
struct VulnerabilityResponse {
    #[serde(default)]
    vulnerabilities: Vec<Vulnerability>,
}

/// Classifier backed by a remote service
pub struct HttpClassifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClassifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read<T: serde::de::DeserializeOwned>(&self, response: reqwest::Result<reqwest::Response>) -> Result<T> {
        let response = response.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ToolkitError::ClassifierUnavailable(format!("{}: {e}", self.base_url))
            } else {
                ToolkitError::Network(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Classifier returned error");
            return Err(ToolkitError::Classifier(format!("HTTP {status}")));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl VulnClassifier for HttpClassifier {
    async fn classify_severity(&self, description: &str) -> Result<SeverityAssessment> {
        let response = self
            .client
            .post(format!("{}/severity", self.base_url))
            .json(&DescriptionRequest { description, top_k: None })
            .send()
            .await;
        self.read(response).await
    }

    async fn classify_cwe(&self, description: &str, top_k: usize) -> Result<Vec<CweMatch>> {
        let response = self
            .client
            .post(format!("{}/cwe", self.base_url))
            .json(&DescriptionRequest {
                description,
                top_k: Some(top_k),
            })
            .send()
            .await;
        let mut parsed: CweResponse = self.read(response).await?;
        parsed.matches.truncate(top_k);
        Ok(parsed.matches)
    }

    async fn vulnerabilities_by_cwe(&self, cwe: CweId, limit: usize) -> Result<Vec<Vulnerability>> {
        let response = self
            .client
            .get(format!("{}/cwe/{}/vulnerabilities", self.base_url, cwe.number()))
            .query(&[("limit", limit)])
            .send()
            .await;
        let mut parsed: VulnerabilityResponse = self.read(response).await?;
        parsed.vulnerabilities.truncate(limit);
        Ok(parsed.vulnerabilities)
    }

    async fn health_check(&self) -> bool {
        match self.client.get(format!("{}/health", self.base_url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("Classifier health check failed: {}", e);
                false
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one request and hand back the raw request text.
    async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&request) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{addr}"), handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn severity_is_posted_and_parsed() {
        let body = json!({"severity": "high", "score": 8.1, "rationale": "heap overflow"}).to_string();
        let (base, server) = serve_once("200 OK", body).await;
        let classifier = HttpClassifier::new(base, Duration::from_secs(5)).unwrap();

        let assessment = classifier.classify_severity("heap overflow in parser").await.unwrap();
        assert_eq!(assessment.severity, Severity::High);
        assert_eq!(assessment.score, Some(8.1));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /severity"));
        assert!(request.contains("heap overflow in parser"));
    }

    #[tokio::test]
    async fn lookup_passes_limit_and_normalized_id() {
        let body = json!({"vulnerabilities": [{
            "id": "CVE-2014-0160",
            "title": "Heartbleed",
            "cwe": "CWE-125"
        }]})
        .to_string();
        let (base, server) = serve_once("200 OK", body).await;
        let classifier = HttpClassifier::new(base, Duration::from_secs(5)).unwrap();

        let vulns = classifier.vulnerabilities_by_cwe(CweId::new(125), 3).await.unwrap();
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].cwe, CweId::new(125));

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /cwe/125/vulnerabilities?limit=3"));
    }

    #[tokio::test]
    async fn error_status_is_a_classifier_error() {
        let (base, _server) = serve_once("503 Service Unavailable", "{}".into()).await;
        let classifier = HttpClassifier::new(base, Duration::from_secs(5)).unwrap();

        let err = classifier.classify_cwe("anything", 3).await.unwrap_err();
        assert!(matches!(err, ToolkitError::Classifier(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let classifier = HttpClassifier::new(format!("http://{addr}/"), Duration::from_secs(5)).unwrap();
        assert!(!classifier.health_check().await);
        let err = classifier.classify_severity("x").await.unwrap_err();
        assert!(matches!(err, ToolkitError::ClassifierUnavailable(_)));
    }
}
