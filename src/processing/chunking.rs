//! Sentence-boundary chunking for extracted page text.
//!
//! Page text is split into sentence-like units on `.`, `!`, and `?`, each unit is cleaned
//! (whitespace normalized, characters outside the allow-list dropped) and discarded when
//! shorter than the significance threshold. Cleaned sentences accumulate greedily into
//! chunks that stay under the configured chunk size; a single sentence that alone exceeds
//! the size becomes its own over-long chunk and is not split further.

use super::types::{ChunkingError, DocumentChunk};

/// Punctuation retained by the cleaning allow-list alongside word characters.
const KEPT_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '-', '(', ')'];

/// Split one page of text into bounded chunks.
///
/// `max_chunks` caps the page's own output independently of other pages, preserving
/// chunk order. Unreadable or insignificant text yields an empty vector rather than
/// an error.
pub fn chunk_page(
    text: &str,
    chunk_size: usize,
    min_sentence_length: usize,
    max_chunks: usize,
    page_number: u32,
    document_name: &str,
    owner_id: &str,
) -> Result<Vec<DocumentChunk>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;

    let flush = |buffer: &mut String, buffer_chars: &mut usize, chunks: &mut Vec<DocumentChunk>| {
        let content = buffer.trim_end().to_string();
        if !content.is_empty() {
            chunks.push(DocumentChunk {
                page_number,
                content,
                document_name: document_name.to_string(),
                owner_id: owner_id.to_string(),
            });
        }
        buffer.clear();
        *buffer_chars = 0;
    };

    for raw in text.split(['.', '!', '?']) {
        let Some(sentence) = clean_sentence(raw, min_sentence_length) else {
            continue;
        };
        let sentence_chars = sentence.chars().count();

        if buffer_chars + sentence_chars >= chunk_size {
            flush(&mut buffer, &mut buffer_chars, &mut chunks);
        }
        buffer.push_str(&sentence);
        buffer.push(' ');
        buffer_chars += sentence_chars + 1;
    }
    flush(&mut buffer, &mut buffer_chars, &mut chunks);

    chunks.truncate(max_chunks);
    Ok(chunks)
}

/// Normalize whitespace, drop disallowed characters, and reject insignificant fragments.
pub(crate) fn clean_sentence(raw: &str, min_length: usize) -> Option<String> {
    let filtered: String = raw
        .chars()
        .filter(|c| {
            c.is_alphanumeric() || *c == '_' || c.is_whitespace() || KEPT_PUNCTUATION.contains(c)
        })
        .collect();

    let cleaned = filtered.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().count() < min_length {
        None
    } else {
        Some(cleaned)
    }
}
