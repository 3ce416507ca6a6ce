//! End-to-end email → filled PDF automation
//!
//! Each operation is also exposed on its own. [`FormAutomation::process_email`]
//! runs them as a linear state machine:
//!
//! ```text
//! ParseEmail → Download → Inspect → CheckFieldCount → Synthesize → Fill → Done
//! ```
//!
//! Every transition either yields the next [`Stage`] or a terminal
//! [`AutomationOutcome`]; the first failure ends the run. Nothing is retried.

use crate::config::ServerConfig;
use crate::email::{link_matcher, parse_email, ParsedEmail};
use crate::error::{Error, Result};
use crate::fill::{fill_form, normalize::YEAR_DIGIT_FIELDS, FilledForm};
use crate::pdf::{inspect, FieldInventory, FormBackend};
use crate::source::{download_pdf, DownloadedPdf};
use crate::synthesis::ValueGenerator;
use crate::values::FieldValueMap;
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;

/// Success payload of a full run
#[derive(Debug, Clone, Serialize)]
pub struct AutomationReport {
    pub email_subject: String,
    pub sender: String,
    pub original_pdf: String,
    pub filled_pdf: String,
    pub fields_filled: u32,
    pub pdf_base64: String,
    pub download_instructions: &'static str,
}

/// Terminal state of a run
#[derive(Debug)]
pub enum AutomationOutcome {
    Completed(AutomationReport),
    /// The attachment has no form widgets; informational, not a failure
    NoFillableFields,
    Failed {
        /// Operation prefix of the stage that failed
        context: &'static str,
        error: Error,
    },
}

/// Pipeline position together with everything gathered so far
#[derive(Debug)]
pub enum Stage {
    ParseEmail {
        source_url: String,
    },
    Download {
        email: ParsedEmail,
        pdf_url: String,
    },
    Inspect {
        email: ParsedEmail,
        pdf: DownloadedPdf,
    },
    CheckFieldCount {
        email: ParsedEmail,
        pdf: DownloadedPdf,
        inventory: FieldInventory,
    },
    Synthesize {
        email: ParsedEmail,
        pdf: DownloadedPdf,
        field_names: Vec<String>,
    },
    Fill {
        email: ParsedEmail,
        pdf: DownloadedPdf,
        values: FieldValueMap,
    },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ParseEmail { .. } => "parse_email",
            Stage::Download { .. } => "download",
            Stage::Inspect { .. } => "inspect",
            Stage::CheckFieldCount { .. } => "check_field_count",
            Stage::Synthesize { .. } => "synthesize",
            Stage::Fill { .. } => "fill",
        }
    }

    /// Message prefix used when this stage fails
    pub fn failure_context(&self) -> &'static str {
        match self {
            Stage::ParseEmail { .. } => "Failed to parse email",
            Stage::Download { .. } => "Failed to download PDF",
            Stage::Inspect { .. } | Stage::CheckFieldCount { .. } => {
                "Failed to extract form fields"
            }
            Stage::Synthesize { .. } => "Failed to generate values",
            Stage::Fill { .. } => "Failed to fill PDF",
        }
    }
}

/// Result of one transition
#[derive(Debug)]
pub enum Transition {
    Next(Stage),
    Done(AutomationOutcome),
    Fail(Error),
}

impl From<Error> for Transition {
    fn from(e: Error) -> Self {
        Transition::Fail(e)
    }
}

/// The operations behind every tool, sharing one configuration
#[derive(Clone)]
pub struct FormAutomation {
    config: Arc<ServerConfig>,
    links: Regex,
    forms: Arc<dyn FormBackend>,
    generator: Arc<dyn ValueGenerator>,
}

impl FormAutomation {
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] when the attachment link pattern does not compile.
    pub fn new(
        config: ServerConfig,
        forms: Arc<dyn FormBackend>,
        generator: Arc<dyn ValueGenerator>,
    ) -> Result<Self> {
        let links = link_matcher(&config.attachment_link_pattern)?;
        Ok(Self {
            config: Arc::new(config),
            links,
            forms,
            generator,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn download_pdf(&self, url: &str) -> Result<DownloadedPdf> {
        download_pdf(url, &self.config).await
    }

    pub async fn parse_email(&self, source_url: &str) -> Result<ParsedEmail> {
        parse_email(source_url, &self.config, &self.links).await
    }

    pub async fn extract_form_fields(&self, path: &str) -> Result<FieldInventory> {
        let path = self.validate_path_access(path)?;
        let forms = Arc::clone(&self.forms);
        tokio::task::spawn_blocking(move || inspect(&path, forms.as_ref()))
            .await
            .map_err(|e| Error::Pdfium {
                reason: format!("Task join error: {}", e),
            })?
    }

    /// Request values for `field_names` minus anything in `exclude`
    pub async fn generate_form_values(
        &self,
        field_names: &[String],
        exclude: &[String],
    ) -> Result<FieldValueMap> {
        let names: Vec<String> = field_names
            .iter()
            .filter(|name| !exclude.contains(*name))
            .cloned()
            .collect();
        self.generator.generate(&names).await
    }

    pub async fn fill_pdf_form(&self, path: &str, values: FieldValueMap) -> Result<FilledForm> {
        let path = self.validate_path_access(path)?;
        let forms = Arc::clone(&self.forms);
        tokio::task::spawn_blocking(move || fill_form(&path, values, forms.as_ref()))
            .await
            .map_err(|e| Error::DocumentWrite {
                path: "<task>".to_string(),
                reason: format!("Task join error: {}", e),
            })?
    }

    /// Run the whole pipeline for the email at `source_url`
    pub async fn process_email(&self, source_url: &str) -> AutomationOutcome {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("automation", %run_id, source_url);

        async {
            let mut stage = Stage::ParseEmail {
                source_url: source_url.to_string(),
            };
            loop {
                let name = stage.name();
                let context = stage.failure_context();
                tracing::debug!(stage = name, "entering stage");
                match self.advance(stage).await {
                    Transition::Next(next) => stage = next,
                    Transition::Fail(error) => {
                        tracing::warn!(stage = name, error = %error, "automation failed");
                        return AutomationOutcome::Failed { context, error };
                    }
                    Transition::Done(outcome) => {
                        match &outcome {
                            AutomationOutcome::Completed(report) => tracing::info!(
                                fields_filled = report.fields_filled,
                                output = %report.filled_pdf,
                                "automation completed"
                            ),
                            AutomationOutcome::NoFillableFields => {
                                tracing::info!("attachment has no fillable fields")
                            }
                            AutomationOutcome::Failed { .. } => {}
                        }
                        return outcome;
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Perform the work of `stage` and decide where to go next
    pub async fn advance(&self, stage: Stage) -> Transition {
        match stage {
            Stage::ParseEmail { source_url } => match self.parse_email(&source_url).await {
                Ok(email) => match email.first_pdf_url().map(str::to_string) {
                    Some(pdf_url) => Transition::Next(Stage::Download { email, pdf_url }),
                    None => Error::NoAttachmentFound.into(),
                },
                Err(e) => e.into(),
            },
            Stage::Download { email, pdf_url } => match self.download_pdf(&pdf_url).await {
                Ok(pdf) => Transition::Next(Stage::Inspect { email, pdf }),
                Err(e) => e.into(),
            },
            Stage::Inspect { email, pdf } => {
                // The downloaded file lives in the work dir; no sandbox check needed
                let path = PathBuf::from(&pdf.filepath);
                let forms = Arc::clone(&self.forms);
                let inspected = tokio::task::spawn_blocking(move || inspect(&path, forms.as_ref()))
                    .await
                    .map_err(|e| Error::Pdfium {
                        reason: format!("Task join error: {}", e),
                    })
                    .and_then(|r| r);
                match inspected {
                    Ok(inventory) => Transition::Next(Stage::CheckFieldCount {
                        email,
                        pdf,
                        inventory,
                    }),
                    Err(e) => e.into(),
                }
            }
            Stage::CheckFieldCount {
                email,
                pdf,
                inventory,
            } => {
                if inventory.num_fields() == 0 {
                    return Transition::Done(AutomationOutcome::NoFillableFields);
                }
                Transition::Next(Stage::Synthesize {
                    field_names: inventory.synthesis_candidates(&YEAR_DIGIT_FIELDS),
                    email,
                    pdf,
                })
            }
            Stage::Synthesize {
                email,
                pdf,
                field_names,
            } => match self.generator.generate(&field_names).await {
                Ok(values) => Transition::Next(Stage::Fill { email, pdf, values }),
                Err(e) => e.into(),
            },
            Stage::Fill { email, pdf, values } => {
                let path = PathBuf::from(&pdf.filepath);
                let forms = Arc::clone(&self.forms);
                let filled = tokio::task::spawn_blocking(move || {
                    fill_form(&path, values, forms.as_ref())
                })
                .await
                .map_err(|e| Error::DocumentWrite {
                    path: pdf.filepath.clone(),
                    reason: format!("Task join error: {}", e),
                })
                .and_then(|r| r);
                match filled {
                    Ok(filled) => Transition::Done(AutomationOutcome::Completed(AutomationReport {
                        email_subject: email.subject,
                        sender: email.sender,
                        original_pdf: pdf.filepath,
                        filled_pdf: filled.output_path,
                        fields_filled: filled.fields_filled,
                        pdf_base64: filled.pdf_base64,
                        download_instructions: filled.download_instructions,
                    })),
                    Err(e) => e.into(),
                }
            }
        }
    }

    /// Check a caller-supplied path against `resource_dirs`.
    /// With no resource dirs configured every path is allowed.
    pub fn validate_path_access(&self, path: &str) -> Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| Error::PathAccessDenied {
            path: path.to_string(),
        })?;

        let allowed = self.config.resource_dirs.iter().any(|dir| {
            std::fs::canonicalize(dir)
                .map(|d| canonical.starts_with(d))
                .unwrap_or(false)
        });

        if allowed {
            Ok(canonical)
        } else {
            Err(Error::PathAccessDenied {
                path: path.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{FieldKind, FormField, WrittenForm};
    use async_trait::async_trait;

    struct NoForms;

    impl FormBackend for NoForms {
        fn read_fields(&self, _: &[u8]) -> Result<Vec<FormField>> {
            Ok(vec![])
        }
        fn write_fields(&self, data: &[u8], _: &FieldValueMap) -> Result<WrittenForm> {
            Ok(WrittenForm {
                data: data.to_vec(),
                fields_filled: 0,
                fields_skipped: vec![],
            })
        }
    }

    struct Echo;

    #[async_trait]
    impl ValueGenerator for Echo {
        async fn generate(&self, field_names: &[String]) -> Result<FieldValueMap> {
            Ok(field_names.iter().map(|n| (n.as_str(), n.as_str())).collect())
        }
    }

    fn automation(config: ServerConfig) -> FormAutomation {
        FormAutomation::new(config, Arc::new(NoForms), Arc::new(Echo)).unwrap()
    }

    #[test]
    fn test_invalid_link_pattern_rejected() {
        let result = FormAutomation::new(
            ServerConfig {
                attachment_link_pattern: "(".to_string(),
                ..ServerConfig::default()
            },
            Arc::new(NoForms),
            Arc::new(Echo),
        );
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn test_generate_applies_exclusions() {
        let values = automation(ServerConfig::default())
            .generate_form_values(
                &["Name".to_string(), "Year-1".to_string()],
                &["Year-1".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(values.names().collect::<Vec<_>>(), vec!["Name"]);
    }

    #[tokio::test]
    async fn test_zero_fields_is_informational() {
        let inventory = FieldInventory::from_widgets("/tmp/empty.pdf", vec![]);
        let stage = Stage::CheckFieldCount {
            email: ParsedEmail {
                sender: String::new(),
                subject: String::new(),
                pdf_count: 1,
                pdf_urls: vec!["https://drive.google.com/x".to_string()],
            },
            pdf: DownloadedPdf {
                filepath: "/tmp/empty.pdf".to_string(),
                size_bytes: 0,
            },
            inventory,
        };

        let transition = automation(ServerConfig::default()).advance(stage).await;
        assert!(matches!(
            transition,
            Transition::Done(AutomationOutcome::NoFillableFields)
        ));
    }

    #[tokio::test]
    async fn test_check_field_count_excludes_buttons_and_year_digits() {
        let widgets = vec![
            FormField {
                name: "Name".to_string(),
                kind: FieldKind::Text,
                value: String::new(),
                page: 0,
            },
            FormField {
                name: "Submit".to_string(),
                kind: FieldKind::PushButton,
                value: String::new(),
                page: 0,
            },
            FormField {
                name: "Year-3".to_string(),
                kind: FieldKind::Text,
                value: String::new(),
                page: 0,
            },
        ];
        let stage = Stage::CheckFieldCount {
            email: ParsedEmail {
                sender: String::new(),
                subject: String::new(),
                pdf_count: 1,
                pdf_urls: vec![],
            },
            pdf: DownloadedPdf {
                filepath: "/tmp/a.pdf".to_string(),
                size_bytes: 0,
            },
            inventory: FieldInventory::from_widgets("/tmp/a.pdf", widgets),
        };

        match automation(ServerConfig::default()).advance(stage).await {
            Transition::Next(Stage::Synthesize { field_names, .. }) => {
                assert_eq!(field_names, vec!["Name".to_string()]);
            }
            other => panic!("unexpected transition: {:?}", other),
        }
    }

    #[test]
    fn test_validate_path_no_resource_dirs_allows_all() {
        let result = automation(ServerConfig::default()).validate_path_access("/any/where.pdf");
        assert_eq!(result.unwrap(), PathBuf::from("/any/where.pdf"));
    }

    #[test]
    fn test_validate_path_within_and_outside_resource_dir() {
        let allowed = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let inside = allowed.path().join("form.pdf");
        let outside = other.path().join("form.pdf");
        std::fs::write(&inside, b"%PDF-1.7").unwrap();
        std::fs::write(&outside, b"%PDF-1.7").unwrap();

        let automation = automation(ServerConfig {
            resource_dirs: vec![allowed.path().to_string_lossy().to_string()],
            ..ServerConfig::default()
        });

        assert!(automation
            .validate_path_access(&inside.to_string_lossy())
            .is_ok());
        assert!(matches!(
            automation.validate_path_access(&outside.to_string_lossy()),
            Err(Error::PathAccessDenied { .. })
        ));

        let traversal = format!("{}/../{}", allowed.path().display(), "etc");
        assert!(matches!(
            automation.validate_path_access(&traversal),
            Err(Error::PathAccessDenied { .. })
        ));
    }
}
