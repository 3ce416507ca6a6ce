//! Remote resource fetching

pub mod fetch;

pub use fetch::{download_filename, download_pdf, fetch_bytes, parse_http_url, DownloadedPdf};
