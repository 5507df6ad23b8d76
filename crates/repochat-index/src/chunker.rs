//! Paragraph-boundary chunking.
//!
//! Paragraphs (separated by a blank line) are packed greedily into chunks of at
//! most `max_size` characters. A paragraph is never split: one that is longer
//! than `max_size` on its own becomes a single oversized chunk.

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Separator between paragraphs, and between paragraphs packed into one chunk.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

const SEPARATOR_LEN: usize = PARAGRAPH_SEPARATOR.len();

/// Split `text` into paragraph-aligned chunks of at most `max_size` characters.
///
/// Lengths are counted in `char`s. Empty input yields no chunks. An empty
/// paragraph at the start of a chunk is absorbed by the paragraph after it.
#[must_use]
pub fn chunk(text: &str, max_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0;

    for paragraph in text.split(PARAGRAPH_SEPARATOR) {
        let paragraph_len = paragraph.chars().count();

        if buffer.is_empty() {
            buffer.push_str(paragraph);
            buffer_len = paragraph_len;
        } else if buffer_len + SEPARATOR_LEN + paragraph_len > max_size {
            chunks.push(std::mem::take(&mut buffer));
            buffer.push_str(paragraph);
            buffer_len = paragraph_len;
        } else {
            buffer.push_str(PARAGRAPH_SEPARATOR);
            buffer.push_str(paragraph);
            buffer_len += SEPARATOR_LEN + paragraph_len;
        }
    }

    if !buffer.is_empty() {
        chunks.push(buffer);
    }

    chunks
}
