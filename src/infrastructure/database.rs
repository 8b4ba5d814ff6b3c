//! Pooled SQLite connection

use crate::config::Settings;
use di::inject;
use di::injectable;
use log::{debug, info};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::ops::{Deref, DerefMut};
use std::sync::RwLock;

/// Pool installed at startup (or by tests) and handed to every DI-created connection.
static INSTALLED_POOL: RwLock<Option<SqlitePool>> = RwLock::new(None);

pub struct DatabaseConnection {
    connection: SqlitePool,
}

#[injectable]
impl DatabaseConnection {
    #[inject]
    pub fn create() -> DatabaseConnection {
        if let Some(pool) = Self::installed() {
            return DatabaseConnection { connection: pool };
        }

        let connection_string = Settings::database_url_from_env();
        debug!("no pool installed, connecting lazily to {connection_string}");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_lazy(&connection_string)
            .expect("Cannot connect to database");

        DatabaseConnection { connection: pool }
    }
}

impl DatabaseConnection {
    /// Opens the pool and brings the schema up to date.
    pub async fn connect(connection_string: &str) -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(connection_string)
            .await?;
        sqlx::migrate!().run(&pool).await?;
        info!("database ready at {connection_string}");
        Ok(pool)
    }

    /// Makes `pool` the one DI-created connections use.
    pub fn install(pool: SqlitePool) {
        if let Ok(mut installed) = INSTALLED_POOL.write() {
            *installed = Some(pool);
        }
    }

    pub fn uninstall() {
        if let Ok(mut installed) = INSTALLED_POOL.write() {
            *installed = None;
        }
    }

    fn installed() -> Option<SqlitePool> {
        INSTALLED_POOL.read().ok().and_then(|pool| pool.clone())
    }

    pub fn from_pool(pool: SqlitePool) -> DatabaseConnection {
        DatabaseConnection { connection: pool }
    }
}

impl Deref for DatabaseConnection {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl DerefMut for DatabaseConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.connection
    }
}
