pub mod algorithms;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::*;

use anyhow::Result;
use std::sync::Arc;

use auth::JwtManager;
use services::accounts::AccountService;
use services::aggregator::InteractionAggregator;
use services::catalog::CatalogService;
use services::comments::CommentService;
use services::feed::FeedService;
use services::home::HomeService;
use services::ledger::ActivityLedger;
use services::matrix_cache::{open_cache, MatrixCacheStore};
use services::outbound::{create_mailer, Mailer, OutboundQueue};
use services::reader::RecommendationReader;
use services::recommendation::RecommendationService;
use services::similarity::{create_engine, SimilarityEngine};
use store::Datastore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Datastore,
    pub jwt: Arc<JwtManager>,
    pub accounts: AccountService,
    pub ledger: ActivityLedger,
    pub catalog: CatalogService,
    pub comments: CommentService,
    pub home: HomeService,
    pub recommendations: RecommendationService,
    pub reader: RecommendationReader,
    pub outbound: OutboundQueue,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let store = Datastore::connect(&config.database).await?;
        let cache = open_cache(&config.cache).await?;
        let engine = create_engine(&config.similarity)?;
        let mailer = create_mailer(&config.mail)?;

        Ok(Self::from_parts(config, store, cache, engine, mailer))
    }

    /// Wires services over explicit backends. Must run inside a tokio runtime, since it
    /// spawns the outbound mail worker.
    pub fn from_parts(
        config: Config,
        store: Datastore,
        cache: Arc<dyn MatrixCacheStore>,
        engine: Arc<dyn SimilarityEngine>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let config = Arc::new(config);
        let jwt = Arc::new(JwtManager::new(&config.auth));
        let (outbound, _worker) = OutboundQueue::start(mailer, &config.mail);

        let feed = FeedService::new(store.clone());
        let catalog = CatalogService::new(
            store.clone(),
            engine.clone(),
            outbound.clone(),
            feed.clone(),
            config.server.client_url.clone(),
        );

        let ledger = ActivityLedger::new(store.clone());
        let recommendations = RecommendationService::new(
            store.clone(),
            InteractionAggregator::new(ledger.clone()),
            engine,
            cache,
        );

        Self {
            accounts: AccountService::new(store.clone(), jwt.clone(), &config.auth.admin_emails),
            comments: CommentService::new(store.clone(), catalog.clone(), feed.clone()),
            home: HomeService::new(store.clone(), feed),
            catalog,
            reader: RecommendationReader::new(store.clone()),
            recommendations,
            ledger,
            outbound,
            jwt,
            store,
            config,
        }
    }
}

pub async fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
