//! Insert-position resolution: where a captured snippet belongs.
//!
//! For each snippet the resolver retrieves the closest existing passages,
//! picks a target document (top-ranked, or reranked by a chat model), and
//! emits an [`InsertSuggestion`] carrying the matched passage text. The
//! apply step later turns that passage back into a byte offset inside the
//! live document with [`locate`]: an exact substring search first, then a
//! whitespace-insensitive fallback for documents that drifted since
//! indexing. Only when both fail does [`splice`] report `NoInsertPoint`.

use crate::embedding::{ProviderRegistry, TextGenerator};
use crate::error::{CoreError, CoreResult};
use crate::maintenance::Stores;
use crate::models::{InsertSuggestion, NoteSnippet, Passage};
use crate::retrieval;

/// Candidate passages retrieved per snippet.
pub const INSERT_CANDIDATES: usize = 5;

/// Longest excerpt of a candidate passage shown to the rerank model.
const RERANK_EXCERPT_CHARS: usize = 512;

/// How the target document is chosen among the retrieved candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertStrategy {
    /// Take the highest-scoring candidate.
    TopRanked,
    /// Ask the user's chat model to pick among the candidates; falls back
    /// to the top-ranked candidate when the reply names none of them or
    /// the model call fails.
    GenerativeRerank,
}

/// Resolve an insert position for each snippet.
///
/// Snippets with no retrievable candidates (e.g. an empty knowledge base)
/// are skipped with a warning; one snippet failing to resolve never aborts
/// the batch.
pub async fn suggest_insertions(
    stores: Stores<'_>,
    registry: &dyn ProviderRegistry,
    user_id: &str,
    snippets: &[NoteSnippet],
    strategy: InsertStrategy,
) -> CoreResult<Vec<InsertSuggestion>> {
    let generator = match strategy {
        InsertStrategy::TopRanked => None,
        InsertStrategy::GenerativeRerank => {
            let user = stores
                .users
                .get_user(user_id)
                .await
                .map_err(CoreError::Persistence)?
                .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))?;
            let model = user.chat_model.ok_or_else(|| {
                CoreError::ConfigInvalid("no chat model selected".to_string())
            })?;
            Some(registry.generator(&model)?)
        }
    };

    let mut suggestions = Vec::with_capacity(snippets.len());
    for snippet in snippets {
        let candidates =
            retrieval::search(stores, registry, user_id, &snippet.text, INSERT_CANDIDATES)
                .await?;
        if candidates.is_empty() {
            tracing::warn!(user_id, "no candidate passages for snippet, skipping");
            continue;
        }
        let chosen = match &generator {
            Some(generator) => {
                &candidates[rerank(generator.as_ref(), &snippet.text, &candidates).await]
            }
            None => &candidates[0],
        };
        suggestions.push(InsertSuggestion {
            document_id: chosen.document_id.clone(),
            document_title: chosen.title.clone(),
            content: snippet.text.clone(),
            similarity_search_result: chosen.content.clone(),
            zettel_ids: snippet.ids.clone(),
        });
    }
    Ok(suggestions)
}

/// Ask the chat model to pick a candidate; returns an index into
/// `candidates`, falling back to 0 whenever the answer is unusable.
async fn rerank(
    generator: &dyn TextGenerator,
    snippet: &str,
    candidates: &[Passage],
) -> usize {
    let mut prompt = String::from(
        "A new note needs to be filed into an existing document.\n\nNote:\n",
    );
    prompt.push_str(snippet);
    prompt.push_str("\n\nCandidate documents:\n");
    for candidate in candidates {
        let excerpt: String = candidate.content.chars().take(RERANK_EXCERPT_CHARS).collect();
        prompt.push_str(&format!("{}: {}\n", candidate.document_id, excerpt));
    }
    prompt.push_str("\nAnswer with only the documentId of the best candidate.");

    match generator.generate(&prompt).await {
        Ok(reply) => match candidates
            .iter()
            .position(|c| reply.contains(&c.document_id))
        {
            Some(pos) => pos,
            None => {
                tracing::warn!("rerank reply named no candidate, keeping top result");
                0
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "rerank call failed, keeping top result");
            0
        }
    }
}

/// Byte range of a located anchor inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    /// False when the span was recovered by whitespace-insensitive search.
    pub exact: bool,
}

/// Find `needle` in `haystack`, exactly or ignoring whitespace.
pub fn locate(haystack: &str, needle: &str) -> Option<MatchSpan> {
    if needle.trim().is_empty() {
        return None;
    }
    if let Some(start) = haystack.find(needle) {
        return Some(MatchSpan {
            start,
            end: start + needle.len(),
            exact: true,
        });
    }
    find_normalized_substring(haystack, needle)
}

/// Whitespace-insensitive fallback search.
///
/// Both strings are compared with all whitespace stripped; a hit is then
/// mapped back to the byte range in the original haystack covering the
/// first through last matched non-whitespace character.
fn find_normalized_substring(haystack: &str, needle: &str) -> Option<MatchSpan> {
    let squeezed_needle: String = needle.chars().filter(|c| !c.is_whitespace()).collect();
    if squeezed_needle.is_empty() {
        return None;
    }

    let mut squeezed = String::with_capacity(haystack.len());
    let mut starts = Vec::new();
    let mut ends = Vec::new();
    for (i, c) in haystack.char_indices() {
        if !c.is_whitespace() {
            squeezed.push(c);
            starts.push(i);
            ends.push(i + c.len_utf8());
        }
    }

    let pos = squeezed.find(&squeezed_needle)?;
    let first = squeezed[..pos].chars().count();
    let last = first + squeezed_needle.chars().count() - 1;
    Some(MatchSpan {
        start: starts[first],
        end: ends[last],
        exact: false,
    })
}

/// Splice a suggestion's content into the document it targets.
///
/// An exact anchor gets a blank line before the inserted content; a
/// fuzzily recovered anchor gets a single newline, since its end may sit
/// mid-paragraph.
pub fn splice(document: &str, suggestion: &InsertSuggestion) -> CoreResult<String> {
    let span = locate(document, &suggestion.similarity_search_result)
        .ok_or_else(|| CoreError::NoInsertPoint(suggestion.document_id.clone()))?;
    let insertion = if span.exact {
        format!("\n\n{}\n", suggestion.content)
    } else {
        format!("\n{}\n", suggestion.content)
    };

    let mut out = String::with_capacity(document.len() + insertion.len());
    out.push_str(&document[..span.end]);
    out.push_str(&insertion);
    out.push_str(&document[span.end..]);
    Ok(out)
}
