pub mod cuentas;
pub mod libros;

use std::sync::Arc;

use axum::extract::FromRef;
use biblioteca_authz::AuthService;
use biblioteca_db::Database;
use biblioteca_kernel::{InitCtx, ModuleRegistry};

/// Shared handler state for the application modules
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn from_ctx(ctx: &InitCtx<'_>) -> Self {
        Self {
            db: ctx.db.clone(),
            auth: Arc::clone(ctx.auth),
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.auth)
    }
}

/// Register all project modules with the registry
pub fn register_all(registry: &mut ModuleRegistry) {
    registry.register(cuentas::create_module());
    registry.register(libros::create_module());
}
