use std::sync::Arc;

use config::Config;
use database::{CacheStore, CustomerStore, LinkStore, UserStore};
use ewity::CustomerPageSource;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod ewity;
pub mod middleware;
pub mod operations;
pub mod router;
pub mod routes;
pub mod utils;

#[cfg(test)]
mod test_support;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserStore>,
    pub links: Arc<dyn LinkStore>,
    pub customers: Arc<dyn CustomerStore>,
    pub cache: Arc<dyn CacheStore>,
    pub pos: Arc<dyn CustomerPageSource>,
}

impl AppState {
    /// Postgres 存储加真实的 Ewity 客户端
    pub fn new(config: Config, pool: sqlx::PgPool, pos: ewity::EwityClient) -> Self {
        Self {
            config,
            users: Arc::new(database::PgUserRepository::new(pool.clone())),
            links: Arc::new(database::PgCustomerLinkRepository::new(pool.clone())),
            customers: Arc::new(database::PgCustomerRepository::new(pool.clone())),
            cache: Arc::new(database::PgCacheRepository::new(pool)),
            pos: Arc::new(pos),
        }
    }

    pub fn pages(&self) -> cache::CachedPages<'_> {
        cache::CachedPages::new(
            self.pos.as_ref(),
            self.cache.as_ref(),
            self.config.page_cache_ttl(),
        )
    }
}
