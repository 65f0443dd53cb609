// src/runtime.rs

//! Explicit wiring of stores, sources and services from a [`Config`].
//!
//! One `Runtime` owns one record store. The sync engine writes through it
//! and every [`QueryApi`] handed out reads from the same instance.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::api::QueryApi;
use crate::error::Result;
use crate::models::Config;
use crate::pipeline::SyncEngine;
use crate::services::{
    ArtifactPipeline, AttachmentSource, DetailFetcher, DetailSource, HttpSource, ListingSource,
    RelevanceSelector,
};
use crate::storage::{ArtifactCache, KeyValueBackend, RecordStore, open_backend};

pub struct Runtime {
    config: Arc<Config>,
    store: Arc<RecordStore>,
    pipeline: Arc<ArtifactPipeline>,
    selector: Arc<RelevanceSelector>,
    engine: SyncEngine,
}

impl Runtime {
    /// Open the configured backend and build the HTTP source.
    pub async fn from_config(config: Arc<Config>) -> Result<Self> {
        let backend = open_backend(&config.storage).await?;
        log::info!("Using storage backend {}", backend.describe());
        Self::with_backend(config, backend)
    }

    /// Build over an already opened backend with the HTTP source.
    pub fn with_backend(config: Arc<Config>, backend: Arc<dyn KeyValueBackend>) -> Result<Self> {
        let source = Arc::new(HttpSource::new(config.source.clone())?);
        Ok(Self::assemble(
            config,
            backend,
            source.clone(),
            source.clone(),
            source,
        ))
    }

    /// Build from explicit parts.
    pub fn assemble(
        config: Arc<Config>,
        backend: Arc<dyn KeyValueBackend>,
        listing: Arc<dyn ListingSource>,
        details: Arc<dyn DetailSource>,
        attachments: Arc<dyn AttachmentSource>,
    ) -> Self {
        let store = Arc::new(RecordStore::new(
            Arc::clone(&backend),
            config.storage.index_ttl(),
        ));
        let pipeline = Arc::new(ArtifactPipeline::new(
            attachments,
            ArtifactCache::new(backend),
            &config.chunking,
        ));
        let selector = Arc::new(RelevanceSelector::new(
            Arc::clone(&pipeline),
            config.source.max_concurrent,
        ));
        let fetcher = DetailFetcher::new(details, Arc::clone(&store), &config.source);
        let engine = SyncEngine::new(listing, fetcher, Arc::clone(&store), &config.sync);

        Self {
            config,
            store,
            pipeline,
            selector,
            engine,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// A query facade sharing this runtime's store and cache.
    pub fn query(&self) -> QueryApi {
        QueryApi::new(
            Arc::clone(&self.store),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.selector),
            self.config.relevance.default_limit,
        )
    }

    /// Run sync cycles every `sync.poll_interval_secs`.
    ///
    /// A failed cycle is logged and retried on the next tick; the poll
    /// interval is the only retry schedule. Storage outages stop the loop.
    /// Runs forever unless `max_cycles` is given.
    pub async fn watch(&self, max_cycles: Option<usize>) -> Result<()> {
        let period = Duration::from_secs(self.config.sync.poll_interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut cycles = 0;
        loop {
            ticker.tick().await;
            match self.engine.run_cycle().await {
                Ok(_) => {}
                Err(e @ crate::error::AppError::StoreUnavailable(_)) => return Err(e),
                Err(e) => log::error!("Sync cycle failed: {}; retrying in {:?}", e, period),
            }

            cycles += 1;
            if max_cycles.is_some_and(|max| cycles >= max) {
                return Ok(());
            }
        }
    }
}
