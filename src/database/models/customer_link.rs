use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// 公开标识与 Ewity 客户之间的绑定
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomerLinkEntity {
    pub id: Uuid,
    pub uuid: Uuid,
    pub ewity_customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
    /// 上次找到该客户的 API 页码，仅作查找提示
    pub last_api_page: Option<i32>,
}

impl CustomerLinkEntity {
    pub fn remembered_page(&self) -> Option<u32> {
        self.last_api_page
            .and_then(|page| u32::try_from(page).ok())
            .filter(|page| *page > 0)
    }
}

#[derive(Debug, Clone)]
pub struct NewCustomerLink {
    pub uuid: Uuid,
    pub ewity_customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub created_by: Uuid,
}
