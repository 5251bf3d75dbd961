use crate::config::AppConfig;
use crate::db::QueryStore;
use crate::llm::LlmManager;
use crate::query::QueryPipeline;
use crate::web::templates::init_templates;
use minijinja::Environment;
use std::sync::Arc;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: QueryPipeline,
    pub store: Arc<dyn QueryStore>,
    pub template_env: Environment<'static>,
    pub llm_backend: String,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        llm: Arc<LlmManager>,
        store: Arc<dyn QueryStore>,
    ) -> Result<Self, minijinja::Error> {
        let pipeline = QueryPipeline::new(
            Arc::clone(&llm),
            Arc::clone(&store),
            config.database.query_timeout(),
            &config.chart,
        );

        Ok(Self {
            pipeline,
            store,
            template_env: init_templates()?,
            llm_backend: llm.backend().to_string(),
            startup_time: chrono::Utc::now(),
            config,
        })
    }
}
