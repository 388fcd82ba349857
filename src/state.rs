use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    storage::ObjectStorage,
};

pub type DbConn = PooledConnection<ConnectionManager<PgConnection>>;

/// Handles shared by every request and by the job worker. Cloning is cheap;
/// the pool is internally reference counted and the rest sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn ObjectStorage>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        storage: Arc<dyn ObjectStorage>,
        jwt: JwtService,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            storage,
            jwt,
        }
    }

    /// Check a connection out of the pool, surfacing exhaustion as a 500
    /// instead of a panic.
    pub fn db(&self) -> AppResult<DbConn> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("could not check out a connection: {err}")))
    }
}
