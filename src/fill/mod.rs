//! Normalizing synthesized values and writing them into a form

pub mod normalize;

use crate::error::{Error, Result};
use crate::pdf::{read_document, FormBackend, SkippedField};
use crate::values::FieldValueMap;
use base64::Engine;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub use normalize::normalize;

/// Appended to the source stem to name the filled copy
pub const FILLED_SUFFIX: &str = "_filled";

pub const DOWNLOAD_INSTRUCTIONS: &str = "Decode pdf_base64 from base64 and save as .pdf";

/// A saved, filled copy of a form
#[derive(Debug, Clone, Serialize)]
pub struct FilledForm {
    pub output_path: String,
    pub fields_filled: u32,
    pub fields_skipped: Vec<SkippedField>,
    /// The saved file, base64 encoded
    pub pdf_base64: String,
    pub download_instructions: &'static str,
}

/// `<dir>/<stem>_filled<.ext>` for a source at `<dir>/<stem><.ext>`
pub fn filled_output_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match source.extension() {
        Some(ext) => format!("{}{}.{}", stem, FILLED_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, FILLED_SUFFIX),
    };
    source.with_file_name(name)
}

/// Normalize `values`, write them into the document at `path`, and save the
/// result next to it.
///
/// Nothing is written to disk unless every widget update and the serialization
/// succeed.
pub fn fill_form(
    path: &Path,
    values: FieldValueMap,
    backend: &dyn FormBackend,
) -> Result<FilledForm> {
    let data = read_document(path)?;
    let values = normalize(values);

    let written = backend.write_fields(&data, &values)?;

    let output_path = filled_output_path(path);
    std::fs::write(&output_path, &written.data).map_err(|e| Error::DocumentWrite {
        path: output_path.display().to_string(),
        reason: e.to_string(),
    })?;

    tracing::info!(
        source = %path.display(),
        output = %output_path.display(),
        filled = written.fields_filled,
        skipped = written.fields_skipped.len(),
        "filled form"
    );

    Ok(FilledForm {
        output_path: output_path.display().to_string(),
        fields_filled: written.fields_filled,
        fields_skipped: written.fields_skipped,
        pdf_base64: base64::engine::general_purpose::STANDARD.encode(&written.data),
        download_instructions: DOWNLOAD_INSTRUCTIONS,
    })
}
