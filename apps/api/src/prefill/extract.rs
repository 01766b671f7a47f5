//! Document text extraction for uploaded résumés.

use crate::prefill::PrefillError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::PlainText => "txt",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::PlainText => "text/plain",
        }
    }
}

/// Detects the document kind from its magic bytes, then content type, then file name.
pub fn detect_kind(
    file_name: Option<&str>,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<DocumentKind, PrefillError> {
    if bytes.starts_with(b"%PDF") {
        return Ok(DocumentKind::Pdf);
    }
    let content_type = content_type.unwrap_or_default().to_lowercase();
    let file_name = file_name.unwrap_or_default().to_lowercase();

    if content_type == "application/pdf" || file_name.ends_with(".pdf") {
        return Ok(DocumentKind::Pdf);
    }
    if content_type.starts_with("text/")
        || file_name.ends_with(".txt")
        || file_name.ends_with(".md")
    {
        return Ok(DocumentKind::PlainText);
    }
    Err(PrefillError::UnsupportedDocument(format!(
        "expected a PDF or plain-text résumé, got '{}'",
        if content_type.is_empty() {
            file_name
        } else {
            content_type
        }
    )))
}

pub fn extract_text(kind: DocumentKind, bytes: &[u8]) -> Result<String, PrefillError> {
    let raw = match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| PrefillError::Extraction(e.to_string()))?,
        DocumentKind::PlainText => String::from_utf8_lossy(bytes).into_owned(),
    };
    let text = normalize_whitespace(&raw);
    if text.is_empty() {
        return Err(PrefillError::Extraction(
            "document contains no extractable text".to_string(),
        ));
    }
    Ok(text)
}

/// Trims every line and collapses runs of blank lines to one.
fn normalize_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = false;
    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            if !blank_run && !out.is_empty() {
                out.push('\n');
            }
            blank_run = true;
            continue;
        }
        blank_run = false;
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_string()
}
