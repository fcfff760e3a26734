//! Reusable identity service runtime.
//!
//! [`ServerHandle`] owns the full server lifecycle: metrics recorder, database
//! and migrations, role seeding, default admin, REST API and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use crate::application::AuthService;
use crate::config::AppConfig;
use crate::infrastructure::crypto::{PasswordHasher, TokenIssuer};
use crate::infrastructure::database::migrator::Migrator;
use crate::infrastructure::database::{init_database, RoleRepository, UserRepository};
use crate::interfaces::http::create_api_router;
use crate::interfaces::http::modules::metrics::install_recorder;
use crate::support::{ShutdownCoordinator, ShutdownSignal};

// ── Options ────────────────────────────────────────────────────────

pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
    /// Create the configured admin when no users exist (default: true).
    pub create_default_admin: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
            create_default_admin: true,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running identity service.
///
/// ```rust,no_run
/// use identity_service::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.install_signal_handler();
///     handle.shutdown_signal().wait().await;
///     handle.wait().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    pub auth_service: Arc<AuthService>,
    pub config: AppConfig,
    /// Address the REST API is bound to (resolved when port 0 was requested).
    pub local_addr: SocketAddr,

    db: DatabaseConnection,
    shutdown: ShutdownCoordinator,
    api_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let app_cfg = opts.config;
        app_cfg.validate()?;

        info!("Starting identity service...");

        // Process-wide; reused when the server restarts in the same process
        let prometheus_handle = install_recorder()?;

        // ── Database ───────────────────────────────────────────
        let db = init_database(&app_cfg.database_config()).await?;

        if opts.auto_migrate {
            info!("Running database migrations...");
            Migrator::up(&db, None).await?;
            info!("Migrations completed");
        }

        // ── Services ───────────────────────────────────────────
        let tokens = TokenIssuer::new(app_cfg.jwt_config());
        info!(
            "JWT configured with {}h token expiration",
            app_cfg.security.jwt_expiration_hours
        );
        let hasher = PasswordHasher::new(app_cfg.security.bcrypt_cost)?;

        let mut auth_service = AuthService::new(
            Arc::new(UserRepository::new(db.clone())),
            Arc::new(RoleRepository::new(db.clone())),
            tokens.clone(),
            hasher,
        );
        if let Some(roles) = &app_cfg.roles.self_assignable {
            info!(roles = ?roles, "Registration limited to self-assignable roles");
            auth_service = auth_service.with_self_assignable_roles(roles.iter().cloned());
        }
        let auth_service = Arc::new(auth_service);

        auth_service.seed_roles(&app_cfg.roles.seed).await?;
        info!(roles = ?app_cfg.roles.seed, "Roles seeded");

        if opts.create_default_admin && app_cfg.admin.enabled {
            create_default_admin(&auth_service, &app_cfg).await;
        }

        // ── REST API server ────────────────────────────────────
        let api_router = create_api_router(
            auth_service.clone(),
            tokens,
            db.clone(),
            Some(prometheus_handle),
        );

        let listener = tokio::net::TcpListener::bind(app_cfg.api_address()).await?;
        let local_addr = listener.local_addr()?;
        info!("REST API server listening on http://{}", local_addr);
        info!("Swagger UI available at http://{}/docs/", local_addr);

        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let api_shutdown = shutdown.signal();
        let api_server = axum::serve(
            listener,
            api_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("REST API server received shutdown signal");
        });

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        Ok(Self {
            auth_service,
            config: app_cfg,
            local_addr,
            db,
            shutdown,
            api_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown without waiting for it.
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait until shutdown is triggered, drain the API server (bounded by
    /// `server.shutdown_timeout`) and close the database.
    pub async fn wait(self) {
        let Self {
            db,
            shutdown,
            api_task,
            ..
        } = self;

        let completed = shutdown
            .shutdown_with_cleanup(|| async move {
                match api_task.await {
                    Ok(()) => info!("REST API server stopped"),
                    Err(e) => error!("REST API server task panicked: {}", e),
                }
            })
            .await;
        if !completed {
            warn!("In-flight requests were abandoned");
        }

        if let Err(e) = db.close().await {
            warn!("Error closing database connection: {}", e);
        } else {
            info!("Database connection closed");
        }

        info!("Identity service shutdown complete");
    }

    pub async fn shutdown(self) {
        info!("Shutting down identity service...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

async fn create_default_admin(service: &AuthService, app_cfg: &AppConfig) {
    let admin = &app_cfg.admin;
    match service
        .bootstrap_admin(&admin.username, &admin.email, &admin.full_name, &admin.password)
        .await
    {
        Ok(Some(_)) => warn!("Default admin created; change its password immediately"),
        Ok(None) => {}
        Err(e) => error!(error = %e, "Failed to create default admin"),
    }
}

/// Initialize tracing from the application config. `RUST_LOG` wins over
/// `logging.level` when set.
///
/// Call once at process startup, before [`ServerHandle::start`].
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.server.api_host = "127.0.0.1".to_string();
        cfg.server.api_port = 0;
        cfg.server.shutdown_timeout = 5;
        cfg.database.url = "sqlite::memory:".to_string();
        cfg.database.max_connections = 1;
        cfg.security.bcrypt_cost = 4;
        cfg
    }

    #[tokio::test]
    async fn start_seeds_roles_and_admin_then_shuts_down() {
        let handle = ServerHandle::start(ServerOptions {
            config: test_config(),
            ..ServerOptions::default()
        })
        .await
        .unwrap();

        assert_ne!(handle.local_addr.port(), 0);
        assert!(handle.is_running());

        let users = handle.auth_service.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].has_role("Admin"));

        let login = handle
            .auth_service
            .login("admin@example.com", "ChangeMe123!")
            .await
            .unwrap();
        assert_eq!(login.user.username, "admin");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn admin_bootstrap_can_be_skipped() {
        let handle = ServerHandle::start(ServerOptions {
            config: test_config(),
            auto_migrate: true,
            create_default_admin: false,
        })
        .await
        .unwrap();

        assert!(handle.auth_service.list_users().await.unwrap().is_empty());
        handle.shutdown().await;
    }
}
