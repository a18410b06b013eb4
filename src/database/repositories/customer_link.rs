use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::LinkStore;
use crate::database::models::{CustomerLinkEntity, NewCustomerLink};

const LINK_COLUMNS: &str = "id, uuid, ewity_customer_id, customer_name, customer_phone, \
                            created_by, created_at, last_accessed, last_api_page";

/// 客户绑定存储库
#[derive(Clone)]
pub struct PgCustomerLinkRepository {
    pool: PgPool,
}

impl PgCustomerLinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkStore for PgCustomerLinkRepository {
    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<CustomerLinkEntity>, sqlx::Error> {
        sqlx::query_as::<_, CustomerLinkEntity>(&format!(
            "SELECT {} FROM customer_links WHERE uuid = $1",
            LINK_COLUMNS
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_customer_id(
        &self,
        ewity_customer_id: &str,
    ) -> Result<Option<CustomerLinkEntity>, sqlx::Error> {
        sqlx::query_as::<_, CustomerLinkEntity>(&format!(
            "SELECT {} FROM customer_links WHERE ewity_customer_id = $1",
            LINK_COLUMNS
        ))
        .bind(ewity_customer_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list(&self) -> Result<Vec<CustomerLinkEntity>, sqlx::Error> {
        sqlx::query_as::<_, CustomerLinkEntity>(&format!(
            "SELECT {} FROM customer_links ORDER BY created_at DESC",
            LINK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn create(
        &self,
        link: NewCustomerLink,
    ) -> Result<Option<CustomerLinkEntity>, sqlx::Error> {
        // 唯一索引兜底：并发创建时后到者得到 None
        sqlx::query_as::<_, CustomerLinkEntity>(&format!(
            r#"
            INSERT INTO customer_links (uuid, ewity_customer_id, customer_name, customer_phone, created_by)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (ewity_customer_id) DO NOTHING
            RETURNING {}
            "#,
            LINK_COLUMNS
        ))
        .bind(link.uuid)
        .bind(&link.ewity_customer_id)
        .bind(&link.customer_name)
        .bind(&link.customer_phone)
        .bind(link.created_by)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete(&self, uuid: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customer_links WHERE uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch(&self, uuid: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE customer_links SET last_accessed = NOW() WHERE uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_last_api_page(&self, uuid: Uuid, page: u32) -> Result<(), sqlx::Error> {
        let page = i32::try_from(page)
            .map_err(|_| sqlx::Error::Protocol(format!("page {} out of range", page)))?;
        sqlx::query("UPDATE customer_links SET last_api_page = $2 WHERE uuid = $1")
            .bind(uuid)
            .bind(page)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
