use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::ewity::PosCustomer;

/// 本地缓存的 Ewity 客户记录
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomerEntity {
    pub id: String,
    pub name: String,
    pub mobile: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit: f64,
    pub total_spent: f64,
    pub outstanding_balance: f64,
    pub data: Option<Value>,
    pub synced_at: DateTime<Utc>,
}

impl From<&CustomerEntity> for PosCustomer {
    fn from(row: &CustomerEntity) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        let loyalty_text = row
            .data
            .as_ref()
            .and_then(PosCustomer::from_value)
            .and_then(|snapshot| snapshot.loyalty_text);

        PosCustomer {
            id: row.id.clone(),
            name: non_empty(&row.name),
            mobile: non_empty(&row.mobile),
            email: row.email.clone(),
            address: row.address.clone(),
            credit_limit: row.credit_limit,
            total_spent: row.total_spent,
            total_outstanding: row.outstanding_balance,
            loyalty_text,
            raw: row.data.clone().unwrap_or(Value::Null),
        }
    }
}
