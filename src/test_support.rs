// 测试用的内存存储和 Ewity 替身

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::database::models::{CustomerEntity, CustomerLinkEntity, NewCustomerLink, UserEntity};
use crate::database::{CacheStore, CustomerStore, LinkStore, UserStore};
use crate::ewity::{self, CustomerPage, CustomerPageSource, Pagination, PosCustomer};

pub fn test_config() -> Config {
    Config::from_lookup(|key| {
        let value = match key {
            "DATABASE_URL" => "postgres://localhost/blvq_test",
            "EWITY_API_BASE_URL" => "http://127.0.0.1:9/api/v1",
            "EWITY_API_TOKEN" => "test-token",
            "JWT_SECRET" => "test-secret",
            "FRONTEND_URL" => "https://blvq.example",
            _ => return None,
        };
        Some(value.to_string())
    })
    .unwrap()
}

fn unavailable() -> sqlx::Error {
    sqlx::Error::PoolTimedOut
}

pub fn pos_customer(id: &str, name: &str, outstanding: f64) -> PosCustomer {
    PosCustomer::from_value(&json!({
        "id": id,
        "name": name,
        "mobile": format!("77{}", id),
        "credit_limit": 1000,
        "total_spent": 250.0,
        "total_outstanding": outstanding,
    }))
    .unwrap()
}

pub fn link_entity(uuid: Uuid, customer_id: &str, last_api_page: Option<i32>) -> CustomerLinkEntity {
    CustomerLinkEntity {
        id: Uuid::new_v4(),
        uuid,
        ewity_customer_id: customer_id.to_string(),
        customer_name: format!("Snapshot {}", customer_id),
        customer_phone: "7000000".into(),
        created_by: Uuid::new_v4(),
        created_at: Utc::now(),
        last_accessed: None,
        last_api_page,
    }
}

#[derive(Default)]
pub struct InMemoryUsers {
    pub users: Mutex<Vec<UserEntity>>,
}

impl InMemoryUsers {
    pub fn with_user(self, username: &str, password: &str, role: &str) -> Self {
        let hash = bcrypt::hash(password, 4).unwrap();
        self.users.lock().unwrap().push(UserEntity {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: hash,
            role: role.into(),
            created_at: Utc::now(),
        });
        self
    }
}

#[async_trait]
impl UserStore for InMemoryUsers {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<UserEntity, sqlx::Error> {
        let user = UserEntity {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
            role: role.into(),
            created_at: Utc::now(),
        };
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }
}

#[derive(Default)]
pub struct InMemoryLinks {
    pub links: Mutex<Vec<CustomerLinkEntity>>,
    pub fail_page_updates: AtomicBool,
}

impl InMemoryLinks {
    pub fn with_link(self, link: CustomerLinkEntity) -> Self {
        self.links.lock().unwrap().push(link);
        self
    }

    pub fn get(&self, uuid: Uuid) -> Option<CustomerLinkEntity> {
        self.links.lock().unwrap().iter().find(|l| l.uuid == uuid).cloned()
    }

    pub fn len(&self) -> usize {
        self.links.lock().unwrap().len()
    }
}

#[async_trait]
impl LinkStore for InMemoryLinks {
    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<CustomerLinkEntity>, sqlx::Error> {
        Ok(self.get(uuid))
    }

    async fn find_by_customer_id(
        &self,
        ewity_customer_id: &str,
    ) -> Result<Option<CustomerLinkEntity>, sqlx::Error> {
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.ewity_customer_id == ewity_customer_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<CustomerLinkEntity>, sqlx::Error> {
        let mut links = self.links.lock().unwrap().clone();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    async fn create(
        &self,
        link: NewCustomerLink,
    ) -> Result<Option<CustomerLinkEntity>, sqlx::Error> {
        let mut links = self.links.lock().unwrap();
        if links.iter().any(|l| l.ewity_customer_id == link.ewity_customer_id) {
            return Ok(None);
        }
        let entity = CustomerLinkEntity {
            id: Uuid::new_v4(),
            uuid: link.uuid,
            ewity_customer_id: link.ewity_customer_id,
            customer_name: link.customer_name,
            customer_phone: link.customer_phone,
            created_by: link.created_by,
            created_at: Utc::now(),
            last_accessed: None,
            last_api_page: None,
        };
        links.push(entity.clone());
        Ok(Some(entity))
    }

    async fn delete(&self, uuid: Uuid) -> Result<bool, sqlx::Error> {
        let mut links = self.links.lock().unwrap();
        let before = links.len();
        links.retain(|l| l.uuid != uuid);
        Ok(links.len() < before)
    }

    async fn touch(&self, uuid: Uuid) -> Result<(), sqlx::Error> {
        if let Some(link) = self.links.lock().unwrap().iter_mut().find(|l| l.uuid == uuid) {
            link.last_accessed = Some(Utc::now());
        }
        Ok(())
    }

    async fn set_last_api_page(&self, uuid: Uuid, page: u32) -> Result<(), sqlx::Error> {
        if self.fail_page_updates.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        if let Some(link) = self.links.lock().unwrap().iter_mut().find(|l| l.uuid == uuid) {
            link.last_api_page = Some(page as i32);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCustomers {
    pub rows: Mutex<HashMap<String, CustomerEntity>>,
}

impl InMemoryCustomers {
    pub fn with_customer(self, customer: &PosCustomer) -> Self {
        self.rows
            .lock()
            .unwrap()
            .insert(customer.id.clone(), row_from(customer));
        self
    }

    pub fn get(&self, id: &str) -> Option<CustomerEntity> {
        self.rows.lock().unwrap().get(id).cloned()
    }
}

fn row_from(customer: &PosCustomer) -> CustomerEntity {
    CustomerEntity {
        id: customer.id.clone(),
        name: customer.name.clone().unwrap_or_default(),
        mobile: customer.mobile.clone().unwrap_or_default(),
        email: customer.email.clone(),
        address: customer.address.clone(),
        credit_limit: customer.credit_limit,
        total_spent: customer.total_spent,
        outstanding_balance: customer.total_outstanding,
        data: Some(customer.raw.clone()),
        synced_at: Utc::now(),
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomers {
    async fn find_by_id(&self, id: &str) -> Result<Option<CustomerEntity>, sqlx::Error> {
        Ok(self.get(id))
    }

    async fn exists(&self, id: &str) -> Result<bool, sqlx::Error> {
        Ok(self.rows.lock().unwrap().contains_key(id))
    }

    async fn upsert(&self, customer: &PosCustomer) -> Result<(), sqlx::Error> {
        self.rows
            .lock()
            .unwrap()
            .insert(customer.id.clone(), row_from(customer));
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CustomerEntity>, i64), sqlx::Error> {
        let needle = query.to_lowercase();
        let mut matches: Vec<CustomerEntity> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.name.to_lowercase().contains(&needle) || c.mobile.contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        let total = matches.len() as i64;
        let page = matches
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }
}

#[derive(Default)]
pub struct InMemoryCache {
    pub entries: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl InMemoryCache {
    pub fn expire_all(&self) {
        let past = Utc::now() - chrono::Duration::seconds(1);
        for entry in self.entries.lock().unwrap().values_mut() {
            entry.1 = past;
        }
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        let expires = Utc::now() + chrono::Duration::minutes(5);
        self.entries
            .lock()
            .unwrap()
            .insert(key.into(), (value.into(), expires));
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .filter(|(_, expires)| *expires > Utc::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), sqlx::Error> {
        let expires = Utc::now() + chrono::Duration::from_std(ttl).unwrap();
        self.entries
            .lock()
            .unwrap()
            .insert(key.into(), (value.into(), expires));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), sqlx::Error> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, sqlx::Error> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        let now = Utc::now();
        entries.retain(|_, (_, expires)| *expires > now);
        Ok((before - entries.len()) as u64)
    }
}

/// 记录请求过哪些页的 Ewity 替身
#[derive(Default)]
pub struct FakeUpstream {
    pages: Mutex<HashMap<u32, Vec<PosCustomer>>>,
    last_page: Option<u32>,
    pub fetches: Mutex<Vec<u32>>,
    pub unreachable: AtomicBool,
    failing_page: Option<u32>,
}

impl FakeUpstream {
    /// 带分页元数据，最后一页为 `last_page`
    pub fn with_last_page(last_page: u32) -> Self {
        Self {
            last_page: Some(last_page),
            ..Self::default()
        }
    }

    pub fn with_customer(self, page: u32, customer: PosCustomer) -> Self {
        self.pages
            .lock()
            .unwrap()
            .entry(page)
            .or_default()
            .push(customer);
        self
    }

    pub fn failing_on(mut self, page: u32) -> Self {
        self.failing_page = Some(page);
        self
    }

    pub fn move_customer(&self, id: &str, to_page: u32) {
        let mut pages = self.pages.lock().unwrap();
        let mut moved = None;
        for customers in pages.values_mut() {
            if let Some(pos) = customers.iter().position(|c| c.id == id) {
                moved = Some(customers.remove(pos));
            }
        }
        if let Some(customer) = moved {
            pages.entry(to_page).or_default().push(customer);
        }
    }

    pub fn fetched(&self) -> Vec<u32> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn set_unreachable(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CustomerPageSource for FakeUpstream {
    async fn fetch_page(&self, page: u32) -> Result<CustomerPage, ewity::Error> {
        self.fetches.lock().unwrap().push(page);
        if self.unreachable.load(Ordering::SeqCst) || self.failing_page == Some(page) {
            return Err(ewity::Error::Status {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: "unavailable".into(),
            });
        }
        let customers = self
            .pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or_default();
        Ok(CustomerPage {
            customers,
            pagination: Pagination {
                current_page: Some(page),
                last_page: self.last_page,
                per_page: Some(20),
                total: None,
            },
        })
    }
}
