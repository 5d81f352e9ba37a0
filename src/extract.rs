//! PDF text extraction.
//!
//! Turns a raw PDF byte buffer into per-page plain text. A page whose text cannot be
//! recovered simply contributes an empty string; the chunker produces nothing for it and
//! the rest of the document continues.

use thiserror::Error;

/// Errors raised while extracting text from a PDF.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The byte stream could not be parsed as a PDF.
    #[error("failed to read PDF: {0}")]
    Parse(#[from] pdf_extract::OutputError),
    /// The document exceeds the configured page ceiling.
    #[error("PDF has {pages} pages, maximum allowed is {max}")]
    TooManyPages {
        /// Pages found in the document.
        pages: usize,
        /// Configured ceiling.
        max: usize,
    },
}

/// Extract per-page plain text from a PDF byte buffer.
///
/// Page order is preserved; index `i` in the returned vector is page `i + 1`.
pub fn extract_pages(bytes: &[u8], max_pages: usize) -> Result<Vec<String>, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)?;
    if pages.len() > max_pages {
        return Err(ExtractError::TooManyPages {
            pages: pages.len(),
            max: max_pages,
        });
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let error = extract_pages(b"not a pdf at all", 10).unwrap_err();
        assert!(matches!(error, ExtractError::Parse(_)));
    }
}
