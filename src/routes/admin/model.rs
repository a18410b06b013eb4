use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::{CustomerEntity, CustomerLinkEntity};
use crate::ewity::{CustomerPage, PosCustomer};
use crate::operations::{LinkRequest, SyncReport};

pub const SEARCH_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

/// 客户列表中的单条记录，本地缓存表和 Ewity 列表共用
#[derive(Debug, Serialize)]
pub struct CustomerSummary {
    pub id: String,
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit: f64,
    pub total_spent: f64,
    pub total_outstanding: f64,
}

impl From<&PosCustomer> for CustomerSummary {
    fn from(c: &PosCustomer) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            mobile: c.mobile.clone(),
            email: c.email.clone(),
            address: c.address.clone(),
            credit_limit: c.credit_limit,
            total_spent: c.total_spent,
            total_outstanding: c.total_outstanding,
        }
    }
}

impl From<&CustomerEntity> for CustomerSummary {
    fn from(row: &CustomerEntity) -> Self {
        Self::from(&PosCustomer::from(row))
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PageInfo {
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct CustomerListResponse {
    pub data: Vec<CustomerSummary>,
    pub pagination: PageInfo,
}

impl CustomerListResponse {
    /// 本地搜索结果，按固定页大小分页
    pub fn from_search(rows: &[CustomerEntity], page: u32, total: i64) -> Self {
        let total = total.max(0) as u64;
        let last_page = total.div_ceil(SEARCH_PAGE_SIZE as u64).max(1) as u32;
        Self {
            data: rows.iter().map(CustomerSummary::from).collect(),
            pagination: PageInfo {
                current_page: page,
                last_page,
                per_page: SEARCH_PAGE_SIZE,
                total,
            },
        }
    }

    /// 上游列表页，分页信息缺失时按当前页推断
    pub fn from_upstream(listing: &CustomerPage, page: u32) -> Self {
        let meta = &listing.pagination;
        let count = listing.customers.len();
        Self {
            data: listing.customers.iter().map(CustomerSummary::from).collect(),
            pagination: PageInfo {
                current_page: meta.current_page.unwrap_or(page),
                last_page: meta.last_page.unwrap_or(page),
                per_page: meta.per_page.unwrap_or(count as u32),
                total: meta.total.unwrap_or(count as u64),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LinkCustomerRequest {
    #[serde(default, deserialize_with = "customer_id")]
    pub ewity_customer_id: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
}

impl From<LinkCustomerRequest> for LinkRequest {
    fn from(req: LinkCustomerRequest) -> Self {
        LinkRequest {
            ewity_customer_id: req.ewity_customer_id,
            customer_name: req.customer_name,
            customer_phone: req.customer_phone,
        }
    }
}

// Ewity 的客户 ID 是数字，前端可能以数字或字符串提交
fn customer_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "invalid customer id: {}",
            other
        ))),
    }
}

#[derive(Debug, Serialize)]
pub struct LinkView {
    pub uuid: Uuid,
    pub ewity_customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
}

impl From<CustomerLinkEntity> for LinkView {
    fn from(link: CustomerLinkEntity) -> Self {
        Self {
            uuid: link.uuid,
            ewity_customer_id: link.ewity_customer_id,
            customer_name: link.customer_name,
            customer_phone: link.customer_phone,
            created_at: link.created_at,
            last_accessed: link.last_accessed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: Option<SyncReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
