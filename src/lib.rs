use std::sync::Arc;

use crate::{
    config::Settings,
    database::DatabasePool,
    error::ApiError,
    middleware::RateGovernor,
    repositories::{run_repo::SqlxRunRepository, RunRepository},
    services::{
        external::{CrtShClient, DnsConfig, DnsResolver, HostProber, PassiveSource, ProbeConfig},
        resolution::{ResolutionEngine, Resolver},
        SearchPipeline,
    },
};

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db_pool: DatabasePool,
    pub run_repository: Arc<dyn RunRepository>,
    pub pipeline: Arc<SearchPipeline>,
    pub dns_resolver: Arc<DnsResolver>,
    pub prober: Arc<HostProber>,
    pub governor: Option<Arc<RateGovernor>>,
}

impl AppState {
    /// Create new application state with dependency injection
    pub async fn new(config: Settings) -> Result<Self, ApiError> {
        let db_pool = crate::database::create_connection_pool(&config.database_url).await?;
        Self::new_with_pool(config, db_pool).await
    }

    /// Create new application state with an existing database pool
    pub async fn new_with_pool(config: Settings, db_pool: DatabasePool) -> Result<Self, ApiError> {
        let config = Arc::new(config);

        let run_repository: Arc<dyn RunRepository> =
            Arc::new(SqlxRunRepository::new(db_pool.clone()));

        let dns_resolver = Arc::new(DnsResolver::with_config(DnsConfig {
            query_timeout: std::time::Duration::from_secs_f64(config.dns_query_timeout_seconds),
            max_concurrent: config.resolver_concurrency,
        }));

        let prober = Arc::new(HostProber::new(ProbeConfig::from_settings(&config))?);

        let passive: Arc<dyn PassiveSource> = Arc::new(CrtShClient::new(&config)?);
        let resolver: Arc<dyn Resolver> =
            Arc::new(ResolutionEngine::new(&config, dns_resolver.clone()));

        let pipeline = Arc::new(SearchPipeline::new(
            config.clone(),
            run_repository.clone(),
            passive,
            resolver,
            prober.clone(),
        ));

        let governor = config
            .rate_limit_enabled
            .then(|| Arc::new(RateGovernor::new(&config)));

        Ok(Self {
            config,
            db_pool,
            run_repository,
            pipeline,
            dns_resolver,
            prober,
            governor,
        })
    }
}
