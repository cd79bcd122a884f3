//! Heading-boundary document chunker.
//!
//! Splits a document's text into retrieval-sized passages along markdown
//! heading boundaries (`#`, `##`, `###`). Headings act as segment
//! boundaries, not separate chunks: each segment keeps its heading line.
//!
//! Each emitted [`Chunk`] carries two texts:
//!
//! - `embed_text`: the segment prefixed with the document title, used as
//!   embedding input so short sections inherit document context.
//! - `original_text`: the segment exactly as it appears in the source.
//!   This is what gets shown to users and located again by the insert
//!   resolver, so it is taken as a byte slice of the input, never rebuilt.
//!
//! Segments that are empty or at most [`MIN_CHUNK_CHARS`] characters after
//! trimming are discarded as noise, so very short documents may produce
//! zero chunks; callers must tolerate that.

use crate::models::Chunk;

/// Trimmed segments at or under this length are discarded.
pub const MIN_CHUNK_CHARS: usize = 12;

/// Split `text` into chunks on markdown heading boundaries.
///
/// Pure function of its inputs: same text, id, and title always produce
/// the same chunks in the same order. A document with no heading markers
/// yields a single segment spanning the whole text (or nothing, if the
/// text is under the length floor).
pub fn split_document(text: &str, document_id: &str, title: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for segment in heading_segments(text) {
        if segment.trim().chars().count() <= MIN_CHUNK_CHARS {
            continue;
        }
        chunks.push(Chunk {
            document_id: document_id.to_string(),
            title: title.to_string(),
            embed_text: format!("{}\n{}", title, segment),
            original_text: segment.to_string(),
        });
    }

    chunks
}

/// Split `text` into byte slices, each starting at a level 1-3 heading
/// line (except possibly the first, which covers any preamble).
fn heading_segments(text: &str) -> Vec<&str> {
    let mut starts = Vec::new();
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if offset > 0 && is_heading(line) {
            starts.push(offset);
        }
        offset += line.len();
    }

    let mut segments = Vec::with_capacity(starts.len() + 1);
    let mut prev = 0;
    for start in starts {
        segments.push(&text[prev..start]);
        prev = start;
    }
    segments.push(&text[prev..]);
    segments
}

/// A heading boundary is one to three `#` characters followed by a space.
/// Deeper levels (`####` and beyond) stay inside their parent segment.
fn is_heading(line: &str) -> bool {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    (1..=3).contains(&hashes) && line.as_bytes().get(hashes) == Some(&b' ')
}
