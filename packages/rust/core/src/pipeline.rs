//! End-to-end `ask` pipeline: question → schema → query → rows → prose + chart.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use askdata_shared::{AskDataError, Answer, Result, SchemaDescription};

use crate::context::AppContext;
use crate::interpreter;
use crate::synthesizer;
use crate::visualization::{self, ChartArtifact};

/// Named step of the request pipeline, reported with every fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Input,
    Schema,
    Synthesis,
    Execution,
    Interpretation,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Schema => "schema",
            Self::Synthesis => "synthesis",
            Self::Execution => "execution",
            Self::Interpretation => "interpretation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run `fut` with a time budget, reporting expiry as a [`AskDataError::Timeout`].
pub(crate) async fn bounded<T>(
    stage: Stage,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AskDataError::Timeout {
            stage: stage.as_str(),
            secs: limit.as_secs(),
        }),
    }
}

/// A fatal pipeline failure and the stage it happened in.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: AskDataError,
    /// Schema snapshot the query was synthesized against. Set on execution failures.
    pub schema: Option<Arc<SchemaDescription>>,
}

impl PipelineError {
    fn new(stage: Stage, source: AskDataError) -> Self {
        Self {
            stage,
            source,
            schema: None,
        }
    }

    fn with_schema(mut self, schema: Arc<SchemaDescription>) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Answer one natural-language question.
///
/// Stages run sequentially and stop at the first fatal error. Interpretation
/// and visualization degrade instead of failing.
pub async fn answer_question(
    ctx: &AppContext,
    question: &str,
) -> std::result::Result<Answer, PipelineError> {
    let span = info_span!("ask", request_id = %Uuid::now_v7());
    run(ctx, question)
        .instrument(span)
        .await
        .inspect_err(|e| error!(stage = %e.stage, error = %e.source, "request failed"))
}

async fn run(ctx: &AppContext, question: &str) -> std::result::Result<Answer, PipelineError> {
    let start = Instant::now();
    let settings = ctx.settings();

    let question = question.trim();
    if question.is_empty() {
        return Err(PipelineError::new(
            Stage::Input,
            AskDataError::validation("question must not be blank"),
        ));
    }

    let schema = ctx
        .current_schema()
        .await
        .map_err(|e| PipelineError::new(Stage::Schema, e))?;

    let query = bounded(
        Stage::Synthesis,
        settings.synthesis_timeout,
        synthesizer::synthesize(ctx.generator(), &schema, question),
    )
    .await
    .map_err(|e| PipelineError::new(Stage::Synthesis, e))?;

    let result = bounded(
        Stage::Execution,
        settings.execution_timeout,
        ctx.store().execute(&query),
    )
    .await
    .map_err(|e| PipelineError::new(Stage::Execution, e).with_schema(Arc::clone(&schema)))?;

    let answer = interpreter::interpret(
        ctx.generator(),
        question,
        &result,
        settings.max_result_chars,
        settings.interpretation_timeout,
    )
    .await;

    let chart = if settings.charts_enabled {
        match visualization::select_chart(ctx.classifier(), question, &result) {
            Some(request) => {
                visualization::render_chart(
                    ctx.renderer(),
                    &request,
                    settings.charts_dir.as_deref(),
                )
                .await
            }
            None => None,
        }
    } else {
        None
    };

    let (chart_image, chart_reference) = match chart {
        Some(ChartArtifact { image, reference }) => (
            Some(STANDARD.encode(image)),
            reference.map(|p| p.display().to_string()),
        ),
        None => (None, None),
    };

    info!(
        rows = result.len(),
        charted = chart_image.is_some(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "question answered"
    );

    Ok(Answer {
        question: question.to_string(),
        generated_query: query.into_string(),
        database_result: result,
        answer,
        chart_image,
        chart_reference,
    })
}
