//! MCP Server implementation using rmcp

use crate::config::ServerConfig;
use crate::error::Error;
use crate::pdf::PdfiumForms;
use crate::pipeline::{AutomationOutcome, FormAutomation};
use crate::synthesis::OpenAiGenerator;
use crate::values::FieldValueMap;
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome discriminator shared by every tool response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Info,
}

/// Tool response envelope: `status`, optional `message`, payload fields flattened
#[derive(Debug, Serialize)]
pub struct ToolResponse<T: Serialize> {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T: Serialize> ToolResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: Status::Success,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl ToolResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            status: Status::Info,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Error response with the operation prefix and the sanitized error text
fn failure(context: &str, e: &Error) -> String {
    ToolResponse::error(format!("{}: {}", context, e.client_message())).to_json()
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DownloadPdfParams {
    /// http(s) URL of the PDF to download
    pub url: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ParseEmailParams {
    /// URL returning the email as JSON
    pub email_json_url: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractFormFieldsParams {
    /// Path to a local PDF file
    pub pdf_path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateFormValuesParams {
    /// Exact form field names to generate values for
    pub field_names: Vec<String>,
    /// Field names to leave out of the request
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FillPdfFormParams {
    /// Path to a local PDF file
    pub pdf_path: String,
    /// Field name to value mapping
    #[schemars(with = "std::collections::HashMap<String, String>")]
    pub field_values: FieldValueMap,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProcessEmailParams {
    /// URL returning the email as JSON
    pub email_json_url: String,
}

#[derive(Debug, Serialize)]
pub struct GeneratedValues {
    pub generated_values: FieldValueMap,
    pub fields_filled: usize,
}

// ============================================================================

/// Form fill MCP Server
#[derive(Clone)]
pub struct FormFillServer {
    tool_router: ToolRouter<Self>,
    automation: Arc<FormAutomation>,
}

#[tool_router]
impl FormFillServer {
    pub fn new(automation: FormAutomation) -> Self {
        Self {
            tool_router: Self::tool_router(),
            automation: Arc::new(automation),
        }
    }

    /// Download a PDF into the working directory
    #[tool(
        description = "Download a PDF from an http(s) URL into the server's working directory. Returns the local filepath and size in bytes."
    )]
    async fn download_pdf(&self, Parameters(params): Parameters<DownloadPdfParams>) -> String {
        match self.automation.download_pdf(&params.url).await {
            Ok(pdf) => {
                let message = format!("Downloaded PDF to {}", pdf.filepath);
                ToolResponse::success(pdf).with_message(message).to_json()
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %params.url, "download_pdf failed");
                failure("Failed to download PDF", &e)
            }
        }
    }

    /// Parse an email JSON document
    #[tool(
        description = "Fetch an email JSON document and extract the sender, subject and links to PDF attachments."
    )]
    async fn parse_email(&self, Parameters(params): Parameters<ParseEmailParams>) -> String {
        match self.automation.parse_email(&params.email_json_url).await {
            Ok(email) => ToolResponse::success(email).to_json(),
            Err(e) => {
                tracing::warn!(error = %e, "parse_email failed");
                failure("Failed to parse email", &e)
            }
        }
    }

    /// Inspect the form widgets of a local PDF
    #[tool(
        description = "List the fillable form fields of a local PDF with their type, current value and 0-based page index."
    )]
    async fn extract_form_fields(
        &self,
        Parameters(params): Parameters<ExtractFormFieldsParams>,
    ) -> String {
        match self.automation.extract_form_fields(&params.pdf_path).await {
            Ok(inventory) => ToolResponse::success(inventory).to_json(),
            Err(e) => {
                tracing::warn!(error = %e, path = %params.pdf_path, "extract_form_fields failed");
                failure("Failed to extract form fields", &e)
            }
        }
    }

    /// Generate sample values for form fields
    #[tool(
        description = "Generate realistic sample values for the given form field names. Names listed in exclude are left out."
    )]
    async fn generate_form_values(
        &self,
        Parameters(params): Parameters<GenerateFormValuesParams>,
    ) -> String {
        match self
            .automation
            .generate_form_values(&params.field_names, &params.exclude)
            .await
        {
            Ok(values) => ToolResponse::success(GeneratedValues {
                fields_filled: values.len(),
                generated_values: values,
            })
            .to_json(),
            Err(e) => {
                tracing::warn!(error = %e, "generate_form_values failed");
                failure("Failed to generate values", &e)
            }
        }
    }

    /// Fill a PDF form and save the result next to it
    #[tool(
        description = "Normalize the given field values, write them into a local PDF form and save it as <name>_filled.pdf. The filled PDF is also returned base64 encoded."
    )]
    async fn fill_pdf_form(&self, Parameters(params): Parameters<FillPdfFormParams>) -> String {
        match self
            .automation
            .fill_pdf_form(&params.pdf_path, params.field_values)
            .await
        {
            Ok(filled) => {
                let message = format!("Filled {} fields", filled.fields_filled);
                ToolResponse::success(filled).with_message(message).to_json()
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %params.pdf_path, "fill_pdf_form failed");
                failure("Failed to fill PDF", &e)
            }
        }
    }

    /// Run the complete email to filled PDF pipeline
    #[tool(
        description = "Fetch an email JSON document, download its first PDF attachment, generate values for every form field and return the filled PDF base64 encoded."
    )]
    async fn process_email_automation(
        &self,
        Parameters(params): Parameters<ProcessEmailParams>,
    ) -> String {
        let outcome = self.automation.process_email(&params.email_json_url).await;
        automation_response(outcome)
    }
}

/// Render a pipeline outcome as a tool response
pub fn automation_response(outcome: AutomationOutcome) -> String {
    match outcome {
        AutomationOutcome::Completed(report) => {
            let message = format!("Successfully filled {} fields!", report.fields_filled);
            ToolResponse::success(report).with_message(message).to_json()
        }
        AutomationOutcome::NoFillableFields => {
            ToolResponse::info("PDF has no fillable form fields").to_json()
        }
        AutomationOutcome::Failed {
            error: Error::NoAttachmentFound,
            ..
        } => ToolResponse::error(Error::NoAttachmentFound.client_message()).to_json(),
        AutomationOutcome::Failed { context, error } => failure(context, &error),
    }
}

#[tool_handler]
impl ServerHandler for FormFillServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Form fill MCP Server downloads PDF attachments referenced by email JSON documents, \
                 inspects their form fields, generates sample values and returns filled copies. \
                 Use process_email_automation for the whole pipeline or the individual tools step by step."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with configuration taken from the environment
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::from_env()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    std::fs::create_dir_all(&config.work_dir)?;

    let generator = OpenAiGenerator::new(config.generation.clone())?;
    if config.generation.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; value generation will fail");
    }

    if !PdfiumForms::is_available() {
        tracing::warn!("PDFium library not found; form inspection and filling will fail");
    }

    tracing::info!(work_dir = %config.work_dir.display(), "using working directory");
    let automation = FormAutomation::new(config, Arc::new(PdfiumForms), Arc::new(generator))?;
    let server = FormFillServer::new(automation);

    tracing::info!("Form fill MCP Server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
