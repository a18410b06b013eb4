use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Error;

// 上游字段不稳定：金额可能是 snake_case 或 camelCase，数字或数字字符串，也可能缺失
const CREDIT_LIMIT_KEYS: &[&str] = &["credit_limit", "creditLimit"];
const TOTAL_SPENT_KEYS: &[&str] = &["total_spent", "totalSpent"];
const OUTSTANDING_KEYS: &[&str] = &[
    "total_outstanding",
    "totalOutstanding",
    "outstanding_balance",
    "outstandingBalance",
];
const LOYALTY_KEYS: &[&str] = &["loyalty_text", "loyaltyText"];

/// 统一后的客户记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosCustomer {
    pub id: String,
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit: f64,
    pub total_spent: f64,
    pub total_outstanding: f64,
    pub loyalty_text: Option<String>,
    // 上游原始记录
    #[serde(default)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: Option<u32>,
    pub last_page: Option<u32>,
    pub per_page: Option<u32>,
    pub total: Option<u64>,
}

/// `GET /customers` 的一页
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerPage {
    pub customers: Vec<PosCustomer>,
    pub pagination: Pagination,
}

impl PosCustomer {
    /// 没有可用 id 的记录返回 None
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = text(obj, "id")?;

        Some(Self {
            id,
            name: text(obj, "name"),
            mobile: text(obj, "mobile"),
            email: text(obj, "email"),
            address: text(obj, "address"),
            credit_limit: amount(obj, CREDIT_LIMIT_KEYS),
            total_spent: amount(obj, TOTAL_SPENT_KEYS),
            total_outstanding: amount(obj, OUTSTANDING_KEYS),
            loyalty_text: LOYALTY_KEYS.iter().find_map(|key| text(obj, key)),
            raw: value.clone(),
        })
    }
}

impl CustomerPage {
    pub fn from_response(body: &Value) -> Result<Self, Error> {
        let obj = body
            .as_object()
            .ok_or_else(|| Error::Decode("customers response is not an object".into()))?;

        let customers = match obj.get("data") {
            Some(Value::Array(items)) => items.iter().filter_map(PosCustomer::from_value).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return Err(Error::Decode("customers `data` is not an array".into())),
        };

        let pagination = match obj.get("pagination").and_then(Value::as_object) {
            Some(meta) => Pagination {
                current_page: page_number(meta, &["currentPage", "current_page"]),
                last_page: page_number(meta, &["lastPage", "last_page"]),
                per_page: page_number(meta, &["perPage", "per_page", "pageSize"]),
                total: integer(meta, &["total"]),
            },
            None => Pagination::default(),
        };

        Ok(Self {
            customers,
            pagination,
        })
    }

    pub fn find(&self, customer_id: &str) -> Option<&PosCustomer> {
        self.customers.iter().find(|c| c.id == customer_id)
    }
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn amount(obj: &Map<String, Value>, keys: &[&str]) -> f64 {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(number))
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

fn integer(obj: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(number))
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as u64)
}

// 超出 u32 的页码视为缺失，不截断
fn page_number(obj: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    integer(obj, keys).and_then(|n| u32::try_from(n).ok())
}
