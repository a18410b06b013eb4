// 缓存模块
// 以 cache_entries 表为后端，对 Ewity 客户列表按页缓存

use std::time::Duration;

use async_trait::async_trait;

use crate::database::CacheStore;
use crate::ewity::{self, CustomerPage, CustomerPageSource};

pub const PAGE_CACHE_PREFIX: &str = "customers:page:";

pub fn page_key(page: u32) -> String {
    format!("{}{}", PAGE_CACHE_PREFIX, page)
}

/// 按页号缓存上游列表，命中时不访问 Ewity
///
/// 缓存读写失败只记录日志，不影响本次请求。
pub struct CachedPages<'a> {
    source: &'a dyn CustomerPageSource,
    cache: &'a dyn CacheStore,
    ttl: Duration,
}

impl<'a> CachedPages<'a> {
    pub fn new(source: &'a dyn CustomerPageSource, cache: &'a dyn CacheStore, ttl: Duration) -> Self {
        Self { source, cache, ttl }
    }

    async fn cached(&self, key: &str) -> Option<CustomerPage> {
        let raw = match self.cache.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Page cache read failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(page) => Some(page),
            Err(e) => {
                tracing::warn!("Discarding unreadable page cache entry {}: {}", key, e);
                if let Err(e) = self.cache.delete(key).await {
                    tracing::warn!("Failed to delete page cache entry {}: {}", key, e);
                }
                None
            }
        }
    }
}

#[async_trait]
impl CustomerPageSource for CachedPages<'_> {
    async fn fetch_page(&self, page: u32) -> Result<CustomerPage, ewity::Error> {
        let key = page_key(page);

        if let Some(hit) = self.cached(&key).await {
            tracing::debug!("Page cache hit for {}", key);
            return Ok(hit);
        }

        let fresh = self.source.fetch_page(page).await?;

        match serde_json::to_string(&fresh) {
            Ok(serialized) => {
                if let Err(e) = self.cache.set(&key, &serialized, self.ttl).await {
                    tracing::warn!("Page cache write failed for {}: {}", key, e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize page {}: {}", page, e),
        }

        Ok(fresh)
    }
}
