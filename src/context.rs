//! Shared state handed to every handler.

use crate::models::{installation::Installation, widget::Widget};
use crate::services::{
    auth_service::AuthService, memory_store::ModelStore, storage_service::StorageService,
};
use axum::extract::FromRef;
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

/// Everything the REST and remoting routers need, built once at startup.
#[derive(Clone)]
pub struct AppContext {
    pub db: Arc<SqlitePool>,
    pub widgets: ModelStore<Widget>,
    pub installations: ModelStore<Installation>,
    pub auth: AuthService,
    pub storage: StorageService,
}

impl AppContext {
    pub fn new(db: Arc<SqlitePool>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            widgets: ModelStore::new(db.clone()),
            installations: ModelStore::new(db.clone()),
            auth: AuthService::new(db.clone()),
            storage: StorageService::new(storage_dir),
            db,
        }
    }
}

impl FromRef<AppContext> for ModelStore<Widget> {
    fn from_ref(ctx: &AppContext) -> Self {
        ctx.widgets.clone()
    }
}

impl FromRef<AppContext> for ModelStore<Installation> {
    fn from_ref(ctx: &AppContext) -> Self {
        ctx.installations.clone()
    }
}

impl FromRef<AppContext> for AuthService {
    fn from_ref(ctx: &AppContext) -> Self {
        ctx.auth.clone()
    }
}

impl FromRef<AppContext> for StorageService {
    fn from_ref(ctx: &AppContext) -> Self {
        ctx.storage.clone()
    }
}
