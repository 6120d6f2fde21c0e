//! Process-wide application context, built once at startup and shared by every request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use askdata_charts::{BarChartRenderer, ChartRenderer, TopicClassifier};
use askdata_llm::{OpenRouterClient, TextGenerator};
use askdata_shared::{
    AppConfig, AskDataError, Result, SchemaDescription, SchemaRefresh, validate_api_key,
};
use askdata_storage::{DataStore, Store, StoreOptions};

/// Per-request knobs derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub schema_refresh: SchemaRefresh,
    pub synthesis_timeout: Duration,
    pub execution_timeout: Duration,
    pub interpretation_timeout: Duration,
    pub max_result_chars: usize,
    pub charts_enabled: bool,
    /// Where persisted chart copies go. `None` disables persistence.
    pub charts_dir: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            schema_refresh: config.store.schema_refresh,
            synthesis_timeout: Duration::from_secs(config.llm.synthesis_timeout_secs),
            execution_timeout: Duration::from_secs(config.store.execution_timeout_secs),
            interpretation_timeout: Duration::from_secs(config.llm.interpretation_timeout_secs),
            max_result_chars: config.llm.max_result_chars,
            charts_enabled: config.charts.enabled,
            charts_dir: config
                .charts
                .output_dir
                .as_deref()
                .map(str::trim)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        }
    }
}

/// Everything a request needs: store, generator, renderer, classifier,
/// the startup schema snapshot and settings. Immutable after construction.
pub struct AppContext {
    store: Arc<dyn DataStore>,
    generator: Arc<dyn TextGenerator>,
    renderer: Arc<dyn ChartRenderer>,
    classifier: TopicClassifier,
    schema: Arc<SchemaDescription>,
    settings: PipelineSettings,
}

impl AppContext {
    /// Validate config and credentials, then build the context.
    pub async fn start(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let api_key = validate_api_key(config)?;
        Self::start_with_key(config, api_key).await
    }

    /// Build the context with an explicit API key.
    ///
    /// An unreachable store is a configuration error here: the process must
    /// not start serving without one.
    #[instrument(skip_all, fields(store = %config.store.path, model = %config.llm.model))]
    pub async fn start_with_key(config: &AppConfig, api_key: String) -> Result<Self> {
        let options = StoreOptions {
            read_only: config.store.read_only,
            max_rows: config.store.max_rows,
        };
        let store = Store::open(Path::new(&config.store.path), options)
            .await
            .map_err(|e| AskDataError::config(format!("store unavailable at startup: {e}")))?;

        let settings = PipelineSettings::from(config);
        if let (true, Some(dir)) = (settings.charts_enabled, &settings.charts_dir) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| AskDataError::io(dir, e))?;
        }

        let generator = OpenRouterClient::new(&config.llm, api_key)?;
        let renderer = BarChartRenderer::new(config.charts.width, config.charts.height);
        let classifier = TopicClassifier::with_extra_rules(&config.charts.topics);

        Self::from_parts(
            Arc::new(store),
            Arc::new(generator),
            Arc::new(renderer),
            classifier,
            settings,
        )
        .await
        .map_err(|e| match e {
            AskDataError::StoreUnavailable(msg) => {
                AskDataError::config(format!("store unavailable at startup: {msg}"))
            }
            other => other,
        })
    }

    /// Assemble a context from ready-made collaborators and take the schema snapshot.
    pub async fn from_parts(
        store: Arc<dyn DataStore>,
        generator: Arc<dyn TextGenerator>,
        renderer: Arc<dyn ChartRenderer>,
        classifier: TopicClassifier,
        settings: PipelineSettings,
    ) -> Result<Self> {
        let schema = Arc::new(store.describe_schema().await?);
        info!(
            tables = schema.tables.len(),
            model = generator.model(),
            refresh = ?settings.schema_refresh,
            "context ready"
        );

        Ok(Self {
            store,
            generator,
            renderer,
            classifier,
            schema,
            settings,
        })
    }

    pub fn store(&self) -> &dyn DataStore {
        self.store.as_ref()
    }

    pub fn generator(&self) -> &dyn TextGenerator {
        self.generator.as_ref()
    }

    pub fn renderer(&self) -> Arc<dyn ChartRenderer> {
        Arc::clone(&self.renderer)
    }

    pub fn classifier(&self) -> &TopicClassifier {
        &self.classifier
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// The startup snapshot.
    pub fn schema(&self) -> Arc<SchemaDescription> {
        Arc::clone(&self.schema)
    }

    /// The schema a request should use under the configured refresh policy.
    pub async fn current_schema(&self) -> Result<Arc<SchemaDescription>> {
        match self.settings.schema_refresh {
            SchemaRefresh::Startup => Ok(self.schema()),
            SchemaRefresh::PerRequest => {
                debug!("refreshing schema");
                Ok(Arc::new(self.store.describe_schema().await?))
            }
        }
    }

    /// Tear down the context. Dropping the last handle closes the store.
    pub fn shutdown(self) {
        info!(tables = self.schema.tables.len(), "context shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingRenderer, ScriptedGenerator};
    use askdata_shared::CandidateQuery;
    use uuid::Uuid;

    /// Seed a temp database; the returned handles stay open for later writes.
    async fn seeded_db(setup: &str) -> (PathBuf, libsql::Database, libsql::Connection) {
        let path = std::env::temp_dir().join(format!("askdata_ctx_{}.db", Uuid::now_v7()));
        let db = libsql::Builder::new_local(&path).build().await.unwrap();
        let conn = db.connect().unwrap();
        conn.execute_batch(setup).await.unwrap();
        (path, db, conn)
    }

    fn config_for(path: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.store.path = path.display().to_string();
        config.charts.output_dir = Some(
            std::env::temp_dir()
                .join(format!("askdata_ctx_charts_{}", Uuid::now_v7()))
                .display()
                .to_string(),
        );
        config
    }

    #[test]
    fn settings_follow_config() {
        let mut config = AppConfig::default();
        config.llm.synthesis_timeout_secs = 7;
        config.store.execution_timeout_secs = 3;
        config.charts.output_dir = Some("  ".into());

        let settings = PipelineSettings::from(&config);
        assert_eq!(settings.synthesis_timeout, Duration::from_secs(7));
        assert_eq!(settings.execution_timeout, Duration::from_secs(3));
        assert_eq!(settings.schema_refresh, SchemaRefresh::Startup);
        assert!(settings.charts_dir.is_none());

        assert_eq!(
            PipelineSettings::default().charts_dir,
            Some(PathBuf::from("charts"))
        );
    }

    #[tokio::test]
    async fn start_with_key_builds_context() {
        let (path, _db, _conn) = seeded_db("CREATE TABLE total_sales (amount REAL);").await;
        let config = config_for(&path);

        let ctx = AppContext::start_with_key(&config, "sk-test".into())
            .await
            .unwrap();
        assert_eq!(ctx.schema().tables[0].name, "total_sales");
        assert_eq!(ctx.generator().model(), config.llm.model);
        assert!(ctx.settings().charts_dir.as_ref().unwrap().is_dir());
        ctx.shutdown();
    }

    #[tokio::test]
    async fn missing_store_fails_startup() {
        let path = std::env::temp_dir().join(format!("askdata_none_{}.db", Uuid::now_v7()));
        let err = AppContext::start_with_key(&config_for(&path), "sk-test".into())
            .await
            .err()
            .expect("startup should fail");
        assert!(matches!(err, AskDataError::Config { .. }));
        assert!(err.to_string().contains("store unavailable"));
    }

    #[tokio::test]
    async fn invalid_config_fails_before_store() {
        let mut config = AppConfig::default();
        config.llm.base_url = "not a url".into();
        let err = AppContext::start(&config).await.err().expect("invalid config");
        assert!(matches!(err, AskDataError::Config { .. }));
    }

    async fn context_with(path: &Path, refresh: SchemaRefresh) -> AppContext {
        let store = Store::open(path, StoreOptions::default()).await.unwrap();
        AppContext::from_parts(
            Arc::new(store),
            Arc::new(ScriptedGenerator::default()),
            Arc::new(RecordingRenderer::default()),
            TopicClassifier::new(),
            PipelineSettings {
                schema_refresh: refresh,
                ..PipelineSettings::default()
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn startup_snapshot_is_stable() {
        let (path, _db, conn) = seeded_db("CREATE TABLE a (x INTEGER);").await;
        let ctx = context_with(&path, SchemaRefresh::Startup).await;

        conn.execute_batch("CREATE TABLE b (y TEXT);").await.unwrap();

        let schema = ctx.current_schema().await.unwrap();
        assert!(Arc::ptr_eq(&schema, &ctx.schema()));
        assert_eq!(schema.tables.len(), 1);
    }

    #[tokio::test]
    async fn per_request_refresh_sees_new_tables() {
        let (path, _db, conn) = seeded_db("CREATE TABLE a (x INTEGER);").await;
        let ctx = context_with(&path, SchemaRefresh::PerRequest).await;

        conn.execute_batch("CREATE TABLE b (y TEXT);").await.unwrap();

        let schema = ctx.current_schema().await.unwrap();
        assert_eq!(schema.tables.len(), 2);
        assert!(schema.table("b").is_some());

        let rows = ctx
            .store()
            .execute(&CandidateQuery::new("SELECT COUNT(*) FROM b"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
