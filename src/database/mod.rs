// 数据库模块
// 存储接口定义、表结构以及 Postgres 实现

pub mod models;
pub mod repositories;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::ewity::PosCustomer;
use models::{CustomerEntity, CustomerLinkEntity, NewCustomerLink, UserEntity};

pub use repositories::{
    PgCacheRepository, PgCustomerLinkRepository, PgCustomerRepository, PgUserRepository,
};

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    username VARCHAR(255) UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    role VARCHAR(50) NOT NULL DEFAULT 'admin',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS customers (
    id VARCHAR(255) PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    mobile VARCHAR(50) NOT NULL DEFAULT '',
    email VARCHAR(255),
    address TEXT,
    credit_limit DOUBLE PRECISION NOT NULL DEFAULT 0,
    total_spent DOUBLE PRECISION NOT NULL DEFAULT 0,
    outstanding_balance DOUBLE PRECISION NOT NULL DEFAULT 0,
    data JSONB,
    synced_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_customers_name ON customers(name);
CREATE INDEX IF NOT EXISTS idx_customers_mobile ON customers(mobile);

CREATE TABLE IF NOT EXISTS customer_links (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    uuid UUID UNIQUE NOT NULL,
    ewity_customer_id VARCHAR(255) NOT NULL,
    customer_name TEXT NOT NULL DEFAULT '',
    customer_phone VARCHAR(50) NOT NULL DEFAULT '',
    created_by UUID NOT NULL REFERENCES users(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_accessed TIMESTAMPTZ,
    last_api_page INTEGER
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_customer_links_ewity_id
    ON customer_links(ewity_customer_id);

CREATE TABLE IF NOT EXISTS cache_entries (
    key VARCHAR(255) PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries(expires_at);
"#;

pub async fn connect(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'blvq_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
}

pub async fn initialize_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    tracing::info!("Database schema initialized");
    Ok(())
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>, sqlx::Error>;

    async fn create(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<UserEntity, sqlx::Error>;
}

#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<CustomerLinkEntity>, sqlx::Error>;

    async fn find_by_customer_id(
        &self,
        ewity_customer_id: &str,
    ) -> Result<Option<CustomerLinkEntity>, sqlx::Error>;

    /// 按创建时间倒序
    async fn list(&self) -> Result<Vec<CustomerLinkEntity>, sqlx::Error>;

    /// 该客户已被绑定时返回 `None`
    async fn create(
        &self,
        link: NewCustomerLink,
    ) -> Result<Option<CustomerLinkEntity>, sqlx::Error>;

    async fn delete(&self, uuid: Uuid) -> Result<bool, sqlx::Error>;

    async fn touch(&self, uuid: Uuid) -> Result<(), sqlx::Error>;

    async fn set_last_api_page(&self, uuid: Uuid, page: u32) -> Result<(), sqlx::Error>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<CustomerEntity>, sqlx::Error>;

    async fn exists(&self, id: &str) -> Result<bool, sqlx::Error>;

    async fn upsert(&self, customer: &PosCustomer) -> Result<(), sqlx::Error>;

    /// 名称或手机号模糊匹配，返回当前页与总数
    async fn search(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CustomerEntity>, i64), sqlx::Error>;
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 只返回未过期的值
    async fn get(&self, key: &str) -> Result<Option<String>, sqlx::Error>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), sqlx::Error>;

    async fn delete(&self, key: &str) -> Result<(), sqlx::Error>;

    async fn purge_expired(&self) -> Result<u64, sqlx::Error>;
}
