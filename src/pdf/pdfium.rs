//! [`FormBackend`] implemented on PDFium

use super::forms::{
    plan_write, toggle_value, FieldKind, FieldWrite, FormBackend, FormField, SkippedField,
    WrittenForm,
};
use crate::error::{Error, Result};
use crate::values::FieldValueMap;
use pdfium_render::prelude::*;

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

fn check_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

fn map_load_error(e: PdfiumError) -> Error {
    match e {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::PasswordRequired
        }
        _ => Error::Pdfium {
            reason: format!("{}", e),
        },
    }
}

fn write_error(name: &str, e: PdfiumError) -> Error {
    Error::DocumentWrite {
        path: "<memory>".to_string(),
        reason: format!("Failed to set field \"{}\": {}", name, e),
    }
}

fn field_kind(field: &PdfFormField) -> FieldKind {
    if field.as_text_field().is_some() {
        FieldKind::Text
    } else if field.as_checkbox_field().is_some() {
        FieldKind::Checkbox
    } else if field.as_radio_button_field().is_some() {
        FieldKind::RadioButton
    } else if field.as_combo_box_field().is_some() {
        FieldKind::ComboBox
    } else if field.as_list_box_field().is_some() {
        FieldKind::ListBox
    } else if field.as_push_button_field().is_some() {
        FieldKind::PushButton
    } else if field.as_signature_field().is_some() {
        FieldKind::Signature
    } else {
        FieldKind::Unknown
    }
}

fn current_value(field: &PdfFormField) -> String {
    if let Some(text) = field.as_text_field() {
        text.value().unwrap_or_default()
    } else if let Some(checkbox) = field.as_checkbox_field() {
        toggle_value(checkbox.is_checked().unwrap_or(false)).to_string()
    } else if let Some(radio) = field.as_radio_button_field() {
        toggle_value(radio.is_checked().unwrap_or(false)).to_string()
    } else {
        String::new()
    }
}

/// PDFium-backed form access
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumForms;

impl PdfiumForms {
    /// Whether the PDFium library can be bound on this host
    pub fn is_available() -> bool {
        create_pdfium().is_ok()
    }
}

impl FormBackend for PdfiumForms {
    fn read_fields(&self, data: &[u8]) -> Result<Vec<FormField>> {
        check_header(data)?;

        let pdfium = create_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(map_load_error)?;

        let mut fields = Vec::new();
        let pages = document.pages();

        for page_index in 0..pages.len() {
            let page = pages.get(page_index).map_err(|e| Error::Pdfium {
                reason: format!("Failed to get page {}: {}", page_index + 1, e),
            })?;

            for annotation in page.annotations().iter() {
                let Some(field) = annotation.as_form_field() else {
                    continue;
                };
                let Some(name) = field.name() else {
                    continue;
                };

                fields.push(FormField {
                    name,
                    kind: field_kind(field),
                    value: current_value(field),
                    page: page_index as u32,
                });
            }
        }

        Ok(fields)
    }

    fn write_fields(&self, data: &[u8], values: &FieldValueMap) -> Result<WrittenForm> {
        check_header(data)?;

        let pdfium = create_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(map_load_error)?;

        let mut fields_filled = 0u32;
        let mut fields_skipped = Vec::new();
        let pages = document.pages();

        for page_index in 0..pages.len() {
            let page = pages.get(page_index).map_err(|e| Error::Pdfium {
                reason: format!("Failed to get page {}: {}", page_index + 1, e),
            })?;

            for mut annotation in page.annotations().iter() {
                let Some(field) = annotation.as_form_field_mut() else {
                    continue;
                };
                let Some(name) = field.name() else {
                    continue;
                };
                let Some(value) = values.get(&name) else {
                    continue;
                };

                // Unsupported kinds are skipped; a failed write aborts the fill
                let outcome = match plan_write(field_kind(field), value) {
                    FieldWrite::Text(text) => match field.as_text_field_mut() {
                        Some(text_field) => {
                            text_field
                                .set_value(&text)
                                .map_err(|e| write_error(&name, e))?;
                            Ok(())
                        }
                        None => Err("Field is not a text field".to_string()),
                    },
                    FieldWrite::Checked(checked) => {
                        if let Some(checkbox) = field.as_checkbox_field_mut() {
                            checkbox
                                .set_checked(checked)
                                .map_err(|e| write_error(&name, e))?;
                            Ok(())
                        } else if let Some(radio) = field.as_radio_button_field_mut() {
                            // A radio group is cleared by selecting a sibling
                            if checked {
                                radio.set_checked().map_err(|e| write_error(&name, e))?;
                            }
                            Ok(())
                        } else {
                            Err("Field is not a toggle".to_string())
                        }
                    }
                    FieldWrite::Unsupported(reason) => Err(reason.to_string()),
                };

                match outcome {
                    Ok(()) => fields_filled += 1,
                    Err(reason) => fields_skipped.push(SkippedField { name, reason }),
                }
            }
        }

        let data = document.save_to_bytes().map_err(|e| Error::DocumentWrite {
            path: "<memory>".to_string(),
            reason: format!("Failed to save modified PDF: {}", e),
        })?;

        Ok(WrittenForm {
            data,
            fields_filled,
            fields_skipped,
        })
    }
}
