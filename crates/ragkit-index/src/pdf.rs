//! Text extraction for PDF files through an external helper (`pdftotext`).

use std::path::Path;
use std::process::Command;

use ragkit_core::RagError;

/// Text pulled out of a PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfText {
    pub text: String,
    pub page_count: usize,
}

/// Run `<command> -layout <file> -` and capture its stdout.
///
/// # Errors
///
/// Returns [`RagError::Extraction`] if the helper is missing, exits with a
/// failure status, or prints nothing but whitespace.
pub fn extract_text(command: &str, file: &Path) -> Result<PdfText, RagError> {
    let output = Command::new(command)
        .arg("-layout")
        .arg(file)
        .arg("-")
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RagError::Extraction(format!("{command} is not installed")),
            _ => RagError::Extraction(format!("failed to run {command}: {e}")),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RagError::Extraction(format!(
            "{command} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    if text.trim().is_empty() {
        return Err(RagError::Extraction(format!("{command} produced no text")));
    }
    Ok(PdfText {
        page_count: page_count(&text),
        text,
    })
}

/// Pages are separated by form feeds.
pub fn page_count(text: &str) -> usize {
    text.matches('\u{c}').count() + 1
}
