//! Biblioteca application library
//!
//! Wires the project modules into the kernel registry, owns the database
//! pool and token service, and exposes the entry points used by the
//! server binary and the CLI.

pub mod modules;
pub mod reports;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use biblioteca_authz::AuthService;
use biblioteca_db::Database;
use biblioteca_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// A bootstrapped application: migrated database, token service and
/// initialized modules.
pub struct App {
    settings: Settings,
    registry: ModuleRegistry,
    db: Database,
    auth: Arc<AuthService>,
}

impl App {
    /// Connect, migrate and initialize every module
    pub async fn bootstrap(settings: Settings) -> anyhow::Result<Self> {
        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry);

        let db = Database::connect(&settings.database.url, settings.database.max_connections)
            .await
            .with_context(|| format!("failed to open database '{}'", settings.database.url))?;

        let applied = db
            .apply_migrations(&registry.collect_migrations())
            .await
            .context("failed to apply migrations")?;
        tracing::info!(applied, modules = registry.module_count(), "database ready");

        let auth = Arc::new(AuthService::new(settings.auth.to_auth_config(), db.clone()));

        let app = Self {
            settings,
            registry,
            db,
            auth,
        };
        app.registry.init_modules(&app.ctx()).await?;
        Ok(app)
    }

    pub fn ctx(&self) -> InitCtx<'_> {
        InitCtx {
            settings: &self.settings,
            db: &self.db,
            auth: &self.auth,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    /// The complete HTTP application
    pub fn router(&self) -> Router {
        biblioteca_http::build_router(&self.registry, &self.ctx())
    }

    /// Serve HTTP until shutdown, then stop modules and close the pool
    pub async fn serve(&self) -> anyhow::Result<()> {
        let ctx = self.ctx();
        self.registry.start_modules(&ctx).await?;

        let served = biblioteca_http::start_server(&self.registry, &ctx).await;

        self.registry.stop_modules().await?;
        self.db.close().await;
        served
    }

    /// Render the chart reports into the configured directory
    pub async fn generate_reports(&self) -> anyhow::Result<reports::ReportSummary> {
        reports::generate_all(&self.db, &self.settings.reports)
            .await
            .context("report generation failed")
    }

    /// Remove blacklist entries for tokens that have expired anyway
    pub async fn flush_expired_tokens(&self) -> anyhow::Result<u64> {
        let removed = self
            .auth
            .flush_expired_blacklist()
            .await
            .context("failed to flush expired tokens")?;
        tracing::info!(removed, "expired blacklist entries removed");
        Ok(removed)
    }
}
