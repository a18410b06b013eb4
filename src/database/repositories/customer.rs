use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::CustomerStore;
use crate::database::models::CustomerEntity;
use crate::ewity::PosCustomer;

/// 本地客户缓存存储库
#[derive(Clone)]
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// 转义 LIKE 通配符，按字面子串匹配
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl CustomerStore for PgCustomerRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<CustomerEntity>, sqlx::Error> {
        sqlx::query_as::<_, CustomerEntity>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn exists(&self, id: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM customers WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    async fn upsert(&self, customer: &PosCustomer) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, mobile, email, address, credit_limit, total_spent, outstanding_balance, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                mobile = EXCLUDED.mobile,
                email = EXCLUDED.email,
                address = EXCLUDED.address,
                credit_limit = EXCLUDED.credit_limit,
                total_spent = EXCLUDED.total_spent,
                outstanding_balance = EXCLUDED.outstanding_balance,
                data = EXCLUDED.data,
                synced_at = NOW()
            "#,
        )
        .bind(&customer.id)
        .bind(customer.name.as_deref().unwrap_or_default())
        .bind(customer.mobile.as_deref().unwrap_or_default())
        .bind(customer.email.as_deref())
        .bind(customer.address.as_deref())
        .bind(customer.credit_limit)
        .bind(customer.total_spent)
        .bind(customer.total_outstanding)
        .bind(&customer.raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CustomerEntity>, i64), sqlx::Error> {
        let pattern = like_pattern(query);

        let rows = sqlx::query_as::<_, CustomerEntity>(
            r#"
            SELECT * FROM customers
            WHERE name ILIKE $1 OR mobile ILIKE $1
            ORDER BY name
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM customers WHERE name ILIKE $1 OR mobile ILIKE $1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows, total))
    }
}
