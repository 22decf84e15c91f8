//! Staybook application composition root
//!
//! Wires storage, collaborators, the realtime gateway and the conversation
//! pipeline into one router.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use staybook_auth::{AuthBackend, AuthConfig};
use staybook_common::Config;
use staybook_conversations::{
    ConversationService, ConversationStore, ConversationsState, InMemoryConversationStore,
    InMemoryGateway, Messenger, NotificationBridge, PgConversationStore, RealtimeGateway,
};
use staybook_directory::{InMemoryDirectory, ListingLookup, PgDirectory, UserDirectory};
use staybook_notifications::{NotificationConfig, NotificationStore, NotificationStoreFactory};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Storage and collaborator implementations behind the conversation core
#[derive(Clone)]
pub struct Backends {
    pub conversations: Arc<dyn ConversationStore>,
    pub users: Arc<dyn UserDirectory>,
    pub listings: Arc<dyn ListingLookup>,
    pub notifications: Arc<dyn NotificationStore>,
}

impl Backends {
    /// Postgres-backed stores sharing one pool
    pub fn postgres(pool: PgPool, notifications: Arc<dyn NotificationStore>) -> Self {
        let directory = Arc::new(PgDirectory::new(pool.clone()));
        Self {
            conversations: Arc::new(PgConversationStore::new(pool)),
            users: directory.clone(),
            listings: directory,
            notifications,
        }
    }

    /// Process-local stores, for development and tests
    pub fn in_memory(
        directory: Arc<InMemoryDirectory>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            conversations: Arc::new(InMemoryConversationStore::new()),
            users: directory.clone(),
            listings: directory,
            notifications,
        }
    }

    /// Choose backends from configuration. Without `DATABASE_URL` every
    /// store lives in memory.
    pub async fn from_config(config: &Config) -> Result<Self, anyhow::Error> {
        let pool = match &config.database_url {
            Some(url) => Some(connect(url, config.database_max_connections).await?),
            None => None,
        };

        let notification_config = NotificationConfig::from_env(pool.is_some());
        let notifications = NotificationStoreFactory::create(&notification_config, pool.clone())?;

        Ok(match pool {
            Some(pool) => Self::postgres(pool, notifications),
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory stores");
                Self::in_memory(Arc::new(InMemoryDirectory::new()), notifications)
            }
        })
    }
}

/// Connect and bring the schema up to date
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, anyhow::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Database connection failed: {}", e))?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Database migration failed: {}", e))?;

    tracing::info!("Database connection established");
    Ok(pool)
}

/// Assemble the conversations state over the given backends and gateway
pub fn build_state(
    config: &Config,
    backends: Backends,
    gateway: Arc<dyn RealtimeGateway>,
) -> ConversationsState {
    let service = Arc::new(ConversationService::new(
        backends.conversations,
        backends.users,
        backends.listings,
        config.conversation_lock_timeout(),
        config.store_timeout(),
    ));

    let bridge = NotificationBridge::new(
        backends.notifications,
        gateway.clone(),
        config.store_timeout(),
    );

    let auth = AuthBackend::new(AuthConfig {
        issuer: config.identity_issuer.clone(),
        audience: config.identity_audience.clone(),
    });

    ConversationsState {
        messenger: Messenger::new(service, gateway.clone(), bridge),
        gateway,
        auth,
    }
}

/// Create the main application router with all routes and middleware
pub fn create_app(config: &Config, state: ConversationsState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_check))
        .route(
            "/",
            axum::routing::get(|| async { "Staybook API v0.0.1-SNAPSHOT" }),
        )
        .merge(staybook_conversations::routes().with_state(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.request_timeout(),
                ))
                .into_inner(),
        )
}

/// Build the whole application from configuration
pub async fn from_config(config: &Config) -> Result<Router, anyhow::Error> {
    let backends = Backends::from_config(config).await?;
    let gateway: Arc<dyn RealtimeGateway> = Arc::new(InMemoryGateway::new());
    let state = build_state(config, backends, gateway);
    Ok(create_app(config, state))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
