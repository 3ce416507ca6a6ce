//! Error types for the form fill server

use thiserror::Error;

/// Result type alias for the form fill server
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse failure domain of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fetch failed, timed out, or returned a non-2xx status
    Network,
    /// A payload or argument could not be decoded
    MalformedInput,
    /// The email carried no PDF attachment link
    NoAttachment,
    /// The source document could not be opened or read
    DocumentRead,
    /// The filled document could not be produced or saved
    DocumentWrite,
    /// The value generation call failed
    Generation,
    /// Server configuration is unusable
    Config,
}

/// Error types for the form fill server
#[derive(Error, Debug)]
pub enum Error {
    /// URL is not an absolute http(s) URL
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP request to {url} failed with status {status}")]
    HttpStatus { url: String, status: u16 },

    /// SSRF blocked (URL resolves to private/reserved IP)
    #[error("SSRF blocked: {url}")]
    SsrfBlocked { url: String },

    /// Redirect chain longer than the allowed number of hops
    #[error("Too many redirects: {url}")]
    TooManyRedirects { url: String },

    /// Download too large
    #[error("Download too large: {size} bytes (max: {max_size} bytes)")]
    DownloadTooLarge { size: u64, max_size: u64 },

    /// Email payload is missing required structure
    #[error("Malformed email payload: {reason}")]
    MalformedPayload { reason: String },

    /// No PDF attachment link in the email
    #[error("No PDF found in email")]
    NoAttachmentFound,

    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected
    #[error("PDF is password protected")]
    PasswordRequired,

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// Writing a file failed
    #[error("Failed to write {path}: {reason}")]
    DocumentWrite { path: String, reason: String },

    /// Value generation failed
    #[error("Value generation failed: {reason}")]
    Generation { reason: String },

    /// Generated content was not a flat name/value object
    #[error("Malformed generation response: {reason}")]
    MalformedGeneration { reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Failure domain this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::HttpRequest(_)
            | Error::HttpStatus { .. }
            | Error::SsrfBlocked { .. }
            | Error::TooManyRedirects { .. }
            | Error::DownloadTooLarge { .. } => ErrorKind::Network,
            Error::InvalidUrl { .. }
            | Error::MalformedPayload { .. }
            | Error::MalformedGeneration { .. } => ErrorKind::MalformedInput,
            Error::NoAttachmentFound => ErrorKind::NoAttachment,
            Error::PdfNotFound { .. }
            | Error::InvalidPdf { .. }
            | Error::PasswordRequired
            | Error::Pdfium { .. }
            | Error::PathAccessDenied { .. } => ErrorKind::DocumentRead,
            Error::DocumentWrite { .. } => ErrorKind::DocumentWrite,
            Error::Generation { .. } => ErrorKind::Generation,
            Error::InvalidConfig { .. } => ErrorKind::Config,
        }
    }

    /// Return a sanitized error message safe to send to clients.
    /// Library internals are omitted; log the full error via tracing first.
    pub fn client_message(&self) -> String {
        match self {
            Error::InvalidUrl { url, reason } => format!("Invalid URL {}: {}", url, reason),
            Error::HttpRequest(e) if e.is_timeout() => "HTTP request timed out".to_string(),
            Error::HttpRequest(_) => "HTTP request failed".to_string(),
            Error::HttpStatus { status, .. } => {
                format!("HTTP request failed with status {}", status)
            }
            Error::SsrfBlocked { .. } => "URL not allowed".to_string(),
            Error::TooManyRedirects { .. } => "Too many redirects".to_string(),
            Error::DownloadTooLarge { max_size, .. } => {
                format!("Download exceeds maximum size of {} bytes", max_size)
            }
            Error::MalformedPayload { reason } => format!("Malformed email payload: {}", reason),
            Error::NoAttachmentFound => "No PDF found in email".to_string(),
            Error::PdfNotFound { path } => format!("PDF not found: {}", path),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PasswordRequired => "PDF is password protected".to_string(),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::DocumentWrite { path, .. } => format!("Could not write {}", path),
            Error::Generation { reason } => reason.clone(),
            Error::MalformedGeneration { reason } => {
                format!("Generated values were not a flat mapping: {}", reason)
            }
            Error::InvalidConfig { reason } => format!("Invalid configuration: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_groups_network_failures() {
        let status = Error::HttpStatus {
            url: "https://example.com/a.pdf".to_string(),
            status: 404,
        };
        assert_eq!(status.kind(), ErrorKind::Network);
        assert_eq!(
            Error::SsrfBlocked {
                url: "http://127.0.0.1/".to_string()
            }
            .kind(),
            ErrorKind::Network
        );

        let redirects = Error::TooManyRedirects {
            url: "https://example.com/loop".to_string(),
        };
        assert_eq!(redirects.kind(), ErrorKind::Network);
        assert_eq!(redirects.client_message(), "Too many redirects");
    }

    #[test]
    fn test_kind_for_document_and_generation() {
        assert_eq!(
            Error::PdfNotFound {
                path: "/x.pdf".to_string()
            }
            .kind(),
            ErrorKind::DocumentRead
        );
        assert_eq!(
            Error::MalformedGeneration {
                reason: "not an object".to_string()
            }
            .kind(),
            ErrorKind::MalformedInput
        );
        assert_eq!(
            Error::Generation {
                reason: "timeout".to_string()
            }
            .kind(),
            ErrorKind::Generation
        );
    }

    #[test]
    fn test_client_message_hides_pdfium_detail() {
        let err = Error::Pdfium {
            reason: "FPDF_LoadMemDocument returned 3 at 0x7fff".to_string(),
        };
        assert_eq!(err.client_message(), "PDF processing error");
    }
}
