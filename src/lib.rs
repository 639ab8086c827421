//! Pegasus - offline core of an ILIAS learning client
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Object store (cached tree access, favorites)             │
//! │  - Needs-download propagation                               │
//! │  - Learning module pipeline                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌──────────────────────────────┬──────────────────────────────┐
//! │          Data Layer          │        Remote / Storage       │
//! │  - SQLite (sqlx)             │  - ILIAS REST (reqwest)       │
//! │  - Session object cache      │  - Archive download + unzip   │
//! │    (moka)                    │  - Per-user offline files     │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `service`: Offline-sync logic
//! - `data`: Database, repositories and object cache
//! - `remote`: ILIAS REST client, link builder, downloader
//! - `storage`: Offline file layout, filesystem and archive handling
//! - `config`: Configuration management
//! - `metrics`: Prometheus metrics
//! - `error`: Error types

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod remote;
pub mod service;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

/// Everything one session needs, wired together
///
/// Owns the object cache: dropping the context or calling
/// [`AppContext::end_session`] discards every cached object.
#[derive(Clone)]
pub struct AppContext {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Cached object access (session scoped)
    pub objects: Arc<service::ObjectStore>,

    /// Needs-download propagation
    pub availability: Arc<service::AvailabilityService>,

    /// Offline copies below `storage.root`
    pub user_storage: Arc<storage::UserStorage>,

    /// Learning module download pipeline
    pub learning_modules: Arc<service::LearningModuleLoader>,

    /// HTTP client for the ILIAS installation
    pub http_client: Arc<reqwest::Client>,
}

impl AppContext {
    /// Initialize the session context
    ///
    /// # Steps
    /// 1. Validate configuration
    /// 2. Connect to SQLite database
    /// 3. Initialize object cache
    /// 4. Build HTTP client and ILIAS collaborators
    /// 5. Wire services
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing session context...");

        // 1. Validate configuration
        config.validate()?;

        // 2. Connect to SQLite database
        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!("Database connected");

        // 3. Initialize object cache
        let cache = data::ObjectCache::new(
            config.cache.max_objects,
            Duration::from_secs(config.cache.ttl_seconds),
        );
        let objects = Arc::new(service::ObjectStore::new(db.clone(), cache));
        tracing::info!(max_objects = config.cache.max_objects, "Object cache initialized");

        // 4. Initialize HTTP client
        let http_client = Arc::new(
            reqwest::Client::builder()
                .user_agent(config.ilias.user_agent.clone())
                .timeout(Duration::from_secs(config.ilias.timeout_seconds))
                .build()
                .map_err(|e| error::AppError::Internal(e.into()))?,
        );
        let api = remote::IliasRestClient::new(http_client.clone(), &config.ilias);
        let links = remote::BaseUrlLinkBuilder::new(&config.ilias.base_url)?;
        let downloader =
            remote::HttpDownloader::new(http_client.clone(), config.ilias.access_token.clone());

        // 5. Wire services
        let paths = storage::StoragePaths::new(config.storage.root.clone());
        let files: Arc<dyn storage::FileStorage> = Arc::new(storage::LocalFileStorage::new());
        let user_storage = Arc::new(storage::UserStorage::new(
            paths.clone(),
            files.clone(),
            db.clone(),
            db.clone(),
        ));
        let availability = Arc::new(service::AvailabilityService::new(
            objects.clone(),
            db.clone(),
        ));
        let learning_modules = Arc::new(service::LearningModuleLoader::new(
            objects.clone(),
            db.clone(),
            paths,
            service::PipelineCollaborators {
                api: Arc::new(api),
                links: Arc::new(links),
                downloader: Arc::new(downloader),
                extractor: Arc::new(storage::ZipExtractor::new()),
                files,
                offline: user_storage.clone(),
            },
        ));

        tracing::info!("Session context initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            objects,
            availability,
            user_storage,
            learning_modules,
            http_client,
        })
    }

    /// Forget all session state held in memory
    pub async fn end_session(&self) {
        self.objects.clear_cache().await;
        tracing::info!("Session ended");
    }
}
