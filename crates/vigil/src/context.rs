//! Service composition root (spec §9's "explicit service context" redesign
//! note): builds every collaborator exactly once and hands out the `Arc`
//! handles both the HTTP server and the queue worker share. Grounded in the
//! teacher's `dashflow-prometheus-exporter::main` bootstrap shape — explicit
//! `Registry`, explicit client construction, no global statics.

use std::sync::Arc;

use vigil_core::agents::writer::NoopPdfRenderer;
use vigil_core::traits::{AnalyticsClient, CourtClient, LlmProvider, RegistryClient, Repository, SearchClient};
use vigil_core::workflow::{WorkflowConfig, WorkflowDeps};
use vigil_http::HttpCore;
use vigil_llm::{GigaChatProvider, HuggingFaceProvider, OpenRouterProvider, YandexGptProvider};
use vigil_providers::{AnalyticsApiClient, CourtApiClient, DuckDuckGoSearchProvider, RegistryApiClient, TavilySearchProvider};
use vigil_storage::{FailoverRepository, RedisRepository};

use crate::config::Config;

pub struct ServiceContext {
    pub deps: Arc<WorkflowDeps>,
    pub workflow_config: Arc<WorkflowConfig>,
    pub http: Arc<HttpCore>,
    pub metrics_registry: Arc<prometheus::Registry>,
}

impl ServiceContext {
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let http = Arc::new(HttpCore::new());

        let repository: Arc<dyn Repository> = match &config.redis_url {
            Some(url) => {
                let redis = RedisRepository::connect(url).await?;
                Arc::new(FailoverRepository::with_primary(redis))
            }
            None => {
                tracing::warn!("REDIS_URL not set; running storage on the in-memory fallback only");
                Arc::new(FailoverRepository::fallback_only())
            }
        };
        vigil_storage::spawn_eviction_task(repository.clone());

        let registry: Arc<dyn RegistryClient> = Arc::new(RegistryApiClient::new(
            http.clone(),
            repository.clone(),
            config.registry_base_url.clone(),
            config.registry_api_key.clone(),
        ));
        let court: Arc<dyn CourtClient> = Arc::new(CourtApiClient::new(
            http.clone(),
            repository.clone(),
            config.court_base_url.clone(),
            config.court_api_key.clone(),
        ));
        let analytics: Arc<dyn AnalyticsClient> = Arc::new(AnalyticsApiClient::new(
            http.clone(),
            repository.clone(),
            config.analytics_base_url.clone(),
            config.analytics_api_key.clone(),
        ));

        let mut search_clients: Vec<Arc<dyn SearchClient>> =
            vec![Arc::new(DuckDuckGoSearchProvider::new(http.clone(), repository.clone()))];
        if let Some(tavily) = TavilySearchProvider::from_env(http.clone(), repository.clone()) {
            search_clients.push(Arc::new(tavily));
        } else {
            tracing::info!("TAVILY_API_KEY not set; web search runs on DuckDuckGo only");
        }

        let llm_providers: Vec<Box<dyn LlmProvider>> = vec![
            Box::new(OpenRouterProvider::from_env(http.clone())),
            Box::new(HuggingFaceProvider::from_env(http.clone())),
            Box::new(GigaChatProvider::from_env(http.clone())),
            Box::new(YandexGptProvider::from_env(http.clone())),
        ];

        let deps = Arc::new(WorkflowDeps {
            registry,
            court,
            analytics,
            search_clients,
            llm_providers,
            repository,
            pdf_renderer: Arc::new(NoopPdfRenderer),
        });

        let workflow_config = Arc::new(WorkflowConfig {
            workflow_timeout: config.workflow_timeout(),
            ..WorkflowConfig::default()
        });

        let metrics_registry = Arc::new(prometheus::Registry::new());
        vigil_http::metrics::register(&metrics_registry)?;

        Ok(Self { deps, workflow_config, http, metrics_registry })
    }
}
