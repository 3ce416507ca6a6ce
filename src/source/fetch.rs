//! Fetching remote resources into memory or the working directory

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use futures_util::StreamExt;
use reqwest::header::LOCATION;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::net::IpAddr;
use std::path::Path;
use url::Url;

/// Stem used when a URL has no usable final path segment
pub const FALLBACK_STEM: &str = "downloaded";

/// Hex digits of the URL digest appended to every download name
const URL_DIGEST_LEN: usize = 12;

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 10;

/// A PDF persisted to the working directory
#[derive(Debug, Clone, Serialize)]
pub struct DownloadedPdf {
    /// Where the body was written
    pub filepath: String,
    /// Body length in bytes
    pub size_bytes: u64,
}

/// Parse `raw` and require an absolute http(s) URL
pub fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme \"{}\"", other),
        }),
    }
}

/// Check if an IP address is private/reserved (loopback, link-local, private ranges, etc.)
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local() // includes cloud metadata
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64 // CGNAT 100.64/10
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xFE00) == 0xFC00 // fc00::/7
                || (first & 0xFFC0) == 0xFE80 // fe80::/10
        }
    }
}

/// Resolve the URL's host and reject it if any address is private
async fn check_ssrf(url: &Url) -> Result<()> {
    let host = url.host_str().ok_or_else(|| Error::InvalidUrl {
        url: url.to_string(),
        reason: "URL has no host".to_string(),
    })?;
    let port = url.port_or_known_default().unwrap_or(443);

    let addrs = tokio::net::lookup_host(format!("{}:{}", host, port))
        .await
        .map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: format!("DNS resolution failed for {}: {}", host, e),
        })?;

    for addr in addrs {
        if is_private_ip(&addr.ip()) {
            return Err(Error::SsrfBlocked {
                url: url.to_string(),
            });
        }
    }

    Ok(())
}

/// Resolve a redirect `location` against `current` and vet the target
/// with the same rules as the original URL.
async fn redirect_target(current: &Url, location: &str, config: &ServerConfig) -> Result<Url> {
    let target = current.join(location).map_err(|e| Error::InvalidUrl {
        url: location.to_string(),
        reason: format!("bad redirect location: {}", e),
    })?;
    let target = parse_http_url(target.as_str())?;
    if !config.allow_private_urls {
        check_ssrf(&target).await?;
    }
    Ok(target)
}

/// GET `url` once, following redirects, and return the full body.
///
/// Redirects are followed by hand so every hop passes the SSRF check.
/// Bounded by `config.fetch_timeout` and `config.max_download_bytes`.
pub async fn fetch_bytes(url: &str, config: &ServerConfig) -> Result<Vec<u8>> {
    let mut current = parse_http_url(url)?;
    if !config.allow_private_urls {
        check_ssrf(&current).await?;
    }

    let client = reqwest::Client::builder()
        .timeout(config.fetch_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    let mut hops = 0;
    let response = loop {
        let response = client.get(current.clone()).send().await?;
        if !response.status().is_redirection() {
            break response;
        }
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let Some(location) = location else {
            break response;
        };

        hops += 1;
        if hops > MAX_REDIRECTS {
            return Err(Error::TooManyRedirects {
                url: url.to_string(),
            });
        }
        let next = redirect_target(&current, &location, config).await?;
        tracing::debug!(from = %current, to = %next, "following redirect");
        current = next;
    };

    if !response.status().is_success() {
        return Err(Error::HttpStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let max_size = config.max_download_bytes;
    if let Some(content_length) = response.content_length() {
        if content_length > max_size {
            return Err(Error::DownloadTooLarge {
                size: content_length,
                max_size,
            });
        }
    }

    let mut data = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        data.extend_from_slice(&chunk?);
        if data.len() as u64 > max_size {
            return Err(Error::DownloadTooLarge {
                size: data.len() as u64,
                max_size,
            });
        }
    }

    Ok(data)
}

/// File name for a download: `<stem>-<digest>.pdf`.
///
/// The stem is the last non-empty path segment without a `.pdf` extension,
/// reduced to filename-safe characters. The digest covers the whole URL,
/// query included, so distinct links never share a file.
pub fn download_filename(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| {
            if s.to_ascii_lowercase().ends_with(".pdf") {
                &s[..s.len() - 4]
            } else {
                s
            }
        });

    let stem: String = segment
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };

    format!("{}-{}.pdf", stem, url_digest(url))
}

fn url_digest(url: &Url) -> String {
    Sha256::digest(url.as_str().as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()[..URL_DIGEST_LEN]
        .to_string()
}

/// Download a PDF into `config.work_dir`
pub async fn download_pdf(url: &str, config: &ServerConfig) -> Result<DownloadedPdf> {
    let parsed = parse_http_url(url)?;
    let data = fetch_bytes(url, config).await?;

    if !data.starts_with(b"%PDF") {
        tracing::warn!(url, "downloaded body does not start with a PDF header");
    }

    let filepath = config.work_dir.join(download_filename(&parsed));
    write_file(&filepath, &data).await?;

    tracing::info!(url, path = %filepath.display(), bytes = data.len(), "downloaded PDF");

    Ok(DownloadedPdf {
        filepath: filepath.display().to_string(),
        size_bytes: data.len() as u64,
    })
}

async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    tokio::fs::write(path, data)
        .await
        .map_err(|e| Error::DocumentWrite {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}
