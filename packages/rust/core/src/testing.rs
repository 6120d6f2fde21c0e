//! Scripted collaborators for pipeline tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use askdata_charts::ChartRenderer;
use askdata_llm::TextGenerator;
use askdata_shared::{
    AskDataError, CandidateQuery, Result, ResultSet, SchemaDescription,
};
use askdata_storage::{DataStore, Store, StoreOptions};

/// Generator that replays a fixed queue of completions and records prompts.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new(replies: impl IntoIterator<Item = Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AskDataError::Generation("script exhausted".into())))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

enum Backing {
    Real(Store),
    Fixed {
        schema: SchemaDescription,
        result: ResultSet,
    },
}

/// Store that counts executions, backed by a real libSQL store or fixed data.
pub struct RecordingStore {
    backing: Backing,
    executions: AtomicUsize,
}

impl RecordingStore {
    pub fn wrapping(store: Store) -> Self {
        Self {
            backing: Backing::Real(store),
            executions: AtomicUsize::new(0),
        }
    }

    pub fn fixed(schema: SchemaDescription, result: ResultSet) -> Self {
        Self {
            backing: Backing::Fixed { schema, result },
            executions: AtomicUsize::new(0),
        }
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataStore for RecordingStore {
    async fn describe_schema(&self) -> Result<SchemaDescription> {
        match &self.backing {
            Backing::Real(store) => store.describe_schema().await,
            Backing::Fixed { schema, .. } => Ok(schema.clone()),
        }
    }

    async fn execute(&self, query: &CandidateQuery) -> Result<ResultSet> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        match &self.backing {
            Backing::Real(store) => store.execute(query).await,
            Backing::Fixed { result, .. } => Ok(result.clone()),
        }
    }
}

/// Open a store over a fresh temp database seeded with `setup`.
pub async fn seeded_store(setup: &str) -> Store {
    let path = std::env::temp_dir().join(format!("askdata_core_{}.db", uuid::Uuid::now_v7()));
    let db = libsql::Builder::new_local(&path).build().await.unwrap();
    let conn = db.connect().unwrap();
    if !setup.is_empty() {
        conn.execute_batch(setup).await.unwrap();
    }
    Store::open(&path, StoreOptions::default()).await.unwrap()
}

#[derive(Default, Clone, Copy)]
enum RenderMode {
    #[default]
    Ok,
    Fail,
    Panic,
}

/// Renderer that records its inputs and returns fixed bytes.
#[derive(Default)]
pub struct RecordingRenderer {
    mode: RenderMode,
    calls: Mutex<Vec<(String, f64, String)>>,
}

impl RecordingRenderer {
    pub fn failing() -> Self {
        Self {
            mode: RenderMode::Fail,
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            mode: RenderMode::Panic,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, f64, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ChartRenderer for RecordingRenderer {
    fn render(&self, label: &str, value: f64, title: &str) -> Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((label.to_string(), value, title.to_string()));
        match self.mode {
            RenderMode::Ok => Ok(b"png-bytes".to_vec()),
            RenderMode::Fail => Err(AskDataError::Render("backend offline".into())),
            RenderMode::Panic => panic!("renderer exploded"),
        }
    }
}
