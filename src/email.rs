//! Email payload parsing and PDF attachment link discovery
//!
//! The payload is a JSON message description:
//!
//! ```json
//! {
//!   "sender": { "email": "jane@example.com" },
//!   "subject": "Bill of sale",
//!   "payload": { "parts": [ { "filename": "contract.pdf", "body": { ... } } ] }
//! }
//! ```
//!
//! Attachment bytes are not inlined; the part metadata carries a link to a
//! storage provider, which is located with a regex.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::source::fetch_bytes;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sender {
    email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessageBody {
    parts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct EmailPayload {
    #[serde(default)]
    sender: Sender,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    payload: MessageBody,
}

/// Sender, subject and attachment links pulled out of an email payload
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ParsedEmail {
    pub sender: String,
    pub subject: String,
    pub pdf_count: usize,
    /// Every link found, in encounter order
    pub pdf_urls: Vec<String>,
}

impl ParsedEmail {
    /// The attachment the pipeline works on
    pub fn first_pdf_url(&self) -> Option<&str> {
        self.pdf_urls.first().map(String::as_str)
    }
}

/// Compile the storage-provider link pattern
pub fn link_matcher(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidConfig {
        reason: format!("attachment link pattern: {}", e),
    })
}

/// Fetch the payload at `source_url` and parse it
pub async fn parse_email(
    source_url: &str,
    config: &ServerConfig,
    links: &Regex,
) -> Result<ParsedEmail> {
    let body = fetch_bytes(source_url, config).await?;
    let parsed = parse_email_payload(&body, links)?;
    tracing::info!(
        source_url,
        sender = %parsed.sender,
        attachments = parsed.pdf_count,
        "parsed email"
    );
    Ok(parsed)
}

/// Parse a raw JSON payload
pub fn parse_email_payload(body: &[u8], links: &Regex) -> Result<ParsedEmail> {
    let email: EmailPayload =
        serde_json::from_slice(body).map_err(|e| Error::MalformedPayload {
            reason: e.to_string(),
        })?;

    let mut pdf_urls = Vec::new();
    for part in &email.payload.parts {
        if is_pdf_part(part) {
            collect_links(part, links, &mut pdf_urls);
        }
    }

    Ok(ParsedEmail {
        sender: email.sender.email,
        subject: email.subject,
        pdf_count: pdf_urls.len(),
        pdf_urls,
    })
}

fn is_pdf_part(part: &Value) -> bool {
    part.get("filename")
        .and_then(Value::as_str)
        .map(|name| name.to_ascii_lowercase().ends_with(".pdf"))
        .unwrap_or(false)
}

/// Depth-first walk over every string in `value`, collecting link matches
fn collect_links(value: &Value, links: &Regex, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.extend(links.find_iter(s).map(|m| m.as_str().to_string())),
        Value::Array(items) => {
            for item in items {
                collect_links(item, links, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_links(item, links, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LINK_PATTERN;
    use pretty_assertions::assert_eq;

    fn drive() -> Regex {
        link_matcher(DEFAULT_LINK_PATTERN).unwrap()
    }

    #[test]
    fn test_single_pdf_attachment() {
        let body = br#"{
            "sender": {"email": "jane@example.com", "name": "Jane"},
            "subject": "Please fill this out",
            "payload": {"parts": [
                {"filename": "", "mimeType": "text/plain", "body": {"data": "see attached"}},
                {"filename": "contract.pdf", "body": {
                    "attachmentId": "x1",
                    "url": "https://drive.google.com/uc?id=abc123&export=download"
                }}
            ]}
        }"#;

        let parsed = parse_email_payload(body, &drive()).unwrap();
        assert_eq!(parsed.sender, "jane@example.com");
        assert_eq!(parsed.subject, "Please fill this out");
        assert_eq!(
            parsed.pdf_urls,
            vec!["https://drive.google.com/uc?id=abc123&export=download".to_string()]
        );
        assert_eq!(parsed.pdf_count, 1);
    }

    #[test]
    fn test_links_in_encounter_order_across_parts() {
        let body = br#"{
            "subject": "two forms",
            "payload": {"parts": [
                {"filename": "a.pdf", "body": {"note": "https://drive.google.com/a1 and https://drive.google.com/a2"}},
                {"filename": "notes.txt", "body": {"url": "https://drive.google.com/ignored"}},
                {"filename": "B.PDF", "headers": [{"value": "https://drive.google.com/b1"}]}
            ]}
        }"#;

        let parsed = parse_email_payload(body, &drive()).unwrap();
        assert_eq!(
            parsed.pdf_urls,
            vec![
                "https://drive.google.com/a1".to_string(),
                "https://drive.google.com/a2".to_string(),
                "https://drive.google.com/b1".to_string(),
            ]
        );
        assert_eq!(parsed.first_pdf_url(), Some("https://drive.google.com/a1"));
        assert_eq!(parsed.sender, "");
    }

    #[test]
    fn test_pdf_part_without_link_yields_nothing() {
        let body = br#"{"payload": {"parts": [{"filename": "scan.pdf", "body": {"size": 1024}}]}}"#;
        let parsed = parse_email_payload(body, &drive()).unwrap();
        assert!(parsed.pdf_urls.is_empty());
        assert_eq!(parsed.first_pdf_url(), None);
    }

    #[test]
    fn test_missing_parts_is_empty_success() {
        let parsed = parse_email_payload(br#"{"subject": "hi"}"#, &drive()).unwrap();
        assert_eq!(parsed.subject, "hi");
        assert_eq!(parsed.pdf_count, 0);
    }

    #[test]
    fn test_malformed_payloads() {
        for body in [
            &b"not json"[..],
            &b"[1, 2, 3]"[..],
            &br#"{"payload": {"parts": "contract.pdf"}}"#[..],
        ] {
            let result = parse_email_payload(body, &drive());
            assert!(
                matches!(result, Err(Error::MalformedPayload { .. })),
                "expected malformed payload for {:?}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_invalid_link_pattern() {
        assert!(matches!(
            link_matcher("https://(unclosed"),
            Err(Error::InvalidConfig { .. })
        ));
    }
}
