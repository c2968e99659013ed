//! The explicit, once-built dependency struct passed to every handler as
//! axum `State`, replacing the process-global mutable singletons a
//! straight port of the original service would have reached for.

use std::sync::Arc;

use symserv_core::{ExistenceCache, MissingLogSink, OriginRegistry, SymbolFetcher, SymbolMapStore};
use symserv_engine::{FetchResolver, SymbolicationEngine};

use crate::config::Config;

#[derive(Clone)]
pub struct AppState(pub Arc<AppStateInner>);

pub struct AppStateInner {
    pub config: Config,
    pub existence: Arc<ExistenceCache>,
    pub store: Arc<SymbolMapStore>,
    pub missing_log: Arc<MissingLogSink>,
    pub fetcher: Arc<SymbolFetcher>,
    pub engine: Arc<SymbolicationEngine<FetchResolver>>,
}

impl AppState {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let origins = Arc::new(OriginRegistry::from_env_value(&config.symbol_urls));
        let existence = Arc::new(ExistenceCache::new(
            config.symboldownload_exists_timeout_maxsize,
            config.existence_ttl(),
        ));
        let store = Arc::new(SymbolMapStore::new(
            config.symserv_symbol_map_capacity,
            config.negative_ttl(),
        ));
        let missing_log = Arc::new(MissingLogSink::new());

        let fetcher = SymbolFetcher::new(
            Arc::clone(&origins),
            Arc::clone(&existence),
            config.probe_timeout(),
        )
        .await;

        let resolver = Arc::new(FetchResolver::new(fetcher.clone()));
        let fetcher = Arc::new(fetcher);
        let engine = Arc::new(SymbolicationEngine::new(
            Arc::clone(&store),
            resolver,
            config.symserv_concurrency_limit,
        ));

        Ok(AppState(Arc::new(AppStateInner {
            config,
            existence,
            store,
            missing_log,
            fetcher,
            engine,
        })))
    }
}
