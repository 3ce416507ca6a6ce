//! Form Fill MCP Server Library
//!
//! Turns an email that links to a PDF form into a filled copy of that form:
//! - `download_pdf`: Fetch a PDF into the working directory
//! - `parse_email`: Extract sender, subject and PDF attachment links from email JSON
//! - `extract_form_fields`: List the form widgets of a PDF
//! - `generate_form_values`: Ask a text generation service for sample values
//! - `fill_pdf_form`: Normalize values and write them into the form
//! - `process_email_automation`: All of the above in one pipeline run

pub mod config;
pub mod email;
pub mod error;
pub mod fill;
pub mod pdf;
pub mod pipeline;
pub mod server;
pub mod source;
pub mod synthesis;
pub mod values;

pub use config::{GenerationConfig, ServerConfig};
pub use error::{Error, ErrorKind, Result};
pub use pipeline::{AutomationOutcome, AutomationReport, FormAutomation};
pub use server::{run_server, run_server_with_config, FormFillServer, Status, ToolResponse};
pub use values::FieldValueMap;
