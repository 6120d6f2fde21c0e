//! Question → SQL synthesis.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};

use askdata_llm::TextGenerator;
use askdata_shared::{AskDataError, CandidateQuery, Result, SchemaDescription};

/// Build the synthesis prompt. Deterministic for a given schema and question.
pub fn build_prompt(schema: &SchemaDescription, question: &str) -> String {
    let schema_text = if schema.is_empty() {
        "(the database has no tables)\n".to_string()
    } else {
        schema.to_prompt_text()
    };

    format!(
        "You are an expert SQL analyst. Using the database schema below, write a single \
         executable SQLite query that answers the user's question.\n\
         Return only the SQL query and nothing else: no explanation, no markdown.\n\n\
         Database schema:\n{schema_text}\n\
         User question:\n\"{question}\"\n\n\
         SQL query:"
    )
}

/// Strip surrounding whitespace and Markdown code fences from a completion.
///
/// Text surgery only; the result is not parsed.
pub fn sanitize(raw: &str) -> String {
    // An opening fence may carry a language tag, but only when followed by a newline.
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"```(?:[A-Za-z0-9_+-]*[ \t]*\r?\n)?").expect("valid regex")
    });

    FENCE_RE.replace_all(raw.trim(), "").trim().to_string()
}

/// Ask the generator for one query answering `question` against `schema`.
///
/// One call, no retry. Generator failures and empty completions both come
/// back as [`AskDataError::Synthesis`].
#[instrument(skip_all, fields(model = generator.model()))]
pub async fn synthesize(
    generator: &dyn TextGenerator,
    schema: &SchemaDescription,
    question: &str,
) -> Result<CandidateQuery> {
    let prompt = build_prompt(schema, question);

    let raw = generator.generate(&prompt).await.map_err(|e| {
        warn!(error = %e, "query generation failed");
        AskDataError::synthesis(e.to_string())
    })?;

    let sql = sanitize(&raw);
    if sql.is_empty() {
        return Err(AskDataError::synthesis("model returned an empty query"));
    }

    debug!(%sql, "query synthesized");
    Ok(CandidateQuery::new(sql))
}
