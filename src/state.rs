use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    auth::repo::{PgUserStore, UserStore},
    books::repo::{BookStore, PgBookStore},
    config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub books: Arc<dyn BookStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Connects the pool and brings the schema up to the latest version.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.store_timeout)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        Ok(Self::from_pool(db, config))
    }

    pub fn from_pool(db: PgPool, config: Arc<AppConfig>) -> Self {
        Self {
            users: Arc::new(PgUserStore::new(db.clone())),
            books: Arc::new(PgBookStore::new(db)),
            config,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::testing::{MemoryBookStore, MemoryUserStore};

        Self {
            users: Arc::new(MemoryUserStore::default()),
            books: Arc::new(MemoryBookStore::default()),
            config: Arc::new(crate::testing::test_config()),
        }
    }

    /// Book store that answers only after `delay`, with a deadline shorter than that.
    #[cfg(test)]
    pub fn slow(delay: std::time::Duration) -> Self {
        use crate::testing::{MemoryBookStore, MemoryUserStore};

        let mut config = crate::testing::test_config();
        config.store_timeout = delay / 4;
        Self {
            users: Arc::new(MemoryUserStore::default()),
            books: Arc::new(MemoryBookStore::with_delay(delay)),
            config: Arc::new(config),
        }
    }
}
