//! PDF form access
//!
//! Widgets are read and written through [`FormBackend`]; [`PdfiumForms`] is
//! the production implementation.

mod forms;
mod pdfium;

pub use forms::{
    inspect, is_checked_value, plan_write, read_document, toggle_value, FieldInventory,
    FieldKind, FieldWrite, FormBackend, FormField, SkippedField, WrittenForm,
};
pub use pdfium::PdfiumForms;
