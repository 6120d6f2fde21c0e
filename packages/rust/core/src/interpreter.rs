//! Result → prose interpretation. Best effort: never fails the request.

use std::time::Duration;

use tracing::{instrument, warn};

use askdata_llm::TextGenerator;
use askdata_shared::ResultSet;

use crate::pipeline::{Stage, bounded};

/// Prose returned when the generator cannot produce an answer.
pub const FALLBACK_ANSWER: &str =
    "Error interpreting the data. Could not generate a human-readable response.";

/// Build the interpretation prompt from the question and a rendered result table.
pub fn build_prompt(question: &str, table: &str) -> String {
    format!(
        "You are a helpful data assistant. Answer the user's question using only the \
         data below, which is the result of a SQL query.\n\n\
         User question:\n\"{question}\"\n\n\
         Data from the database:\n{table}\n\n\
         Answer (clear, human-readable prose):"
    )
}

/// Describe `result` in prose for `question`, falling back to [`FALLBACK_ANSWER`].
#[instrument(skip_all, fields(rows = result.len()))]
pub async fn interpret(
    generator: &dyn TextGenerator,
    question: &str,
    result: &ResultSet,
    max_chars: usize,
    limit: Duration,
) -> String {
    let table = truncate_content(&result.to_text_table(), max_chars);
    let prompt = build_prompt(question, &table);

    match bounded(Stage::Interpretation, limit, generator.generate(&prompt)).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!("interpretation returned empty text, using fallback");
            FALLBACK_ANSWER.to_string()
        }
        Err(e) => {
            warn!(error = %e, "interpretation failed, using fallback");
            FALLBACK_ANSWER.to_string()
        }
    }
}

/// Truncate content to at most `max_chars` characters, marking the cut.
fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        None => content.to_string(),
        Some((cut, _)) => {
            format!("{}\n[... result truncated for the model context window ...]", &content[..cut])
        }
    }
}
