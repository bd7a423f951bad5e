//! Application assembly

use crate::routes::{health, logs, users, widgets};
use crate::settings::ServerConfig;
use crate::tables::{snapshot, Tables};
use serde_json::json;
use std::sync::Arc;
use trailmark_audit::{
    AuditConfig, AuditError, AuditLayer, AuditQueryService, AuditRecorder, AuditStore,
    EntityRegistry, FileAuditStore, InMemoryAuditStore,
};
use trailmark_core::{get, App, TracingLayer};
use trailmark_extras::{JwtLayer, TokenVerifier};

/// Failure while assembling the application.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The audit store could not be opened.
    #[error("failed to open audit store: {0}")]
    AuditStore(#[from] AuditError),
}

/// Long-lived collaborators shared by the routes and the audit layer.
#[derive(Clone)]
pub struct AppContext {
    pub tables: Tables,
    pub verifier: TokenVerifier,
    pub recorder: AuditRecorder,
    pub queries: AuditQueryService,
    pub audit_config: AuditConfig,
}

impl AppContext {
    /// Assemble a context around an audit store.
    pub fn new(
        verifier: TokenVerifier,
        store: Arc<dyn AuditStore>,
        audit_config: AuditConfig,
    ) -> Self {
        Self {
            tables: Tables::new(),
            verifier,
            recorder: AuditRecorder::new(store.clone()),
            queries: AuditQueryService::new(store),
            audit_config,
        }
    }

    /// Assemble a context from process settings.
    ///
    /// Records go to `AUDIT_LOG_PATH` when set and stay in memory otherwise.
    pub fn from_config(config: &ServerConfig) -> Result<Self, BootstrapError> {
        let store: Arc<dyn AuditStore> = match &config.audit_log_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Writing audit records to file");
                Arc::new(FileAuditStore::open(path)?)
            }
            None => {
                tracing::warn!("AUDIT_LOG_PATH not set, audit records are kept in memory only");
                match config.audit_memory_max {
                    Some(max) => {
                        tracing::info!(max_records = max, "In-memory audit store is bounded");
                        Arc::new(InMemoryAuditStore::bounded(max))
                    }
                    None => Arc::new(InMemoryAuditStore::new()),
                }
            }
        };

        let verifier = TokenVerifier::new(config.jwt_secret.clone()).with_ttl(config.jwt_ttl_secs);
        Ok(Self::new(verifier, store, config.audit_config()))
    }

    /// Entities the audit layer can resolve.
    pub fn registry(&self) -> EntityRegistry {
        EntityRegistry::new()
            .register(&["widgets", "widget"], Arc::new(self.tables.widgets.clone()))
            .register(&["users", "user"], Arc::new(self.tables.users.clone()))
    }

    /// Insert a few demo rows.
    pub async fn seed(&self) {
        let widgets = [
            json!({"name": "sprocket", "color": "blue", "size": 3}),
            json!({"name": "flange", "color": "green", "size": 5}),
        ];
        for widget in widgets.into_iter().filter_map(snapshot) {
            self.tables.widgets.insert(widget).await;
        }
        if let Some(admin) = snapshot(json!({"name": "admin", "email": "admin@example.com"})) {
            self.tables.users.insert(admin).await;
        }
    }
}

/// Build the application.
///
/// Layers, outermost first: request tracing, authentication (everything but
/// `/health`), audit interception.
pub fn build_app(ctx: &AppContext) -> App {
    let api = ctx.audit_config.api_prefix.trim_end_matches('/');
    let path = |suffix: &str| format!("{}{}", api, suffix);

    App::new()
        .state(ctx.tables.clone())
        .state(ctx.queries.clone())
        .layer(TracingLayer::new())
        .layer(
            JwtLayer::new(ctx.verifier.clone())
                .skip_paths(vec!["/health"])
                .require_known_actor(Arc::new(ctx.tables.users.clone())),
        )
        .layer(AuditLayer::new(
            ctx.registry(),
            ctx.verifier.clone(),
            ctx.recorder.clone(),
            ctx.audit_config.clone(),
        ))
        .route("/health", get(health::health))
        .route(
            &path("/widgets"),
            get(widgets::list_widgets).post(widgets::create_widget),
        )
        .route(
            &path("/widgets/{id}"),
            get(widgets::get_widget)
                .put(widgets::update_widget)
                .patch(widgets::update_widget)
                .delete(widgets::delete_widget),
        )
        .route(&path("/users"), get(users::list_users))
        .route(
            &path("/users/{id}"),
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(&path("/logs"), get(logs::list_logs))
        .route(&path("/logs/{id}"), get(logs::get_log))
        .route(&path("/logs/user/{user_id}"), get(logs::logs_by_user))
        .route(
            &path("/logs/entity/{entity}/{entity_id}"),
            get(logs::logs_by_entity),
        )
        .route(&path("/logs/action/{action}"), get(logs::logs_by_action))
}
