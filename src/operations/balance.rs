use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::CustomerLinkEntity;
use crate::database::{CustomerStore, LinkStore};
use crate::error::AppError;
use crate::ewity::{self, CustomerPageSource, PosCustomer};

/// 公开余额页返回的数据
#[derive(Debug, Clone, Serialize)]
pub struct BalanceView {
    pub uuid: Uuid,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub credit_limit: f64,
    pub total_outstanding: f64,
    pub total_spent: f64,
    pub loyalty_text: Option<String>,
    /// 本次查询的时间，不是数据本身的时间
    pub last_updated: DateTime<Utc>,
    /// 数据来自本地缓存表而不是 Ewity
    pub cached: bool,
}

impl BalanceView {
    fn project(link: &CustomerLinkEntity, customer: PosCustomer, cached: bool) -> Self {
        let snapshot = |s: &str| (!s.trim().is_empty()).then(|| s.to_string());

        Self {
            uuid: link.uuid,
            customer_name: customer
                .name
                .or_else(|| snapshot(&link.customer_name))
                .unwrap_or_else(|| "Unknown".to_string()),
            customer_phone: customer.mobile.or_else(|| snapshot(&link.customer_phone)),
            credit_limit: customer.credit_limit,
            total_outstanding: customer.total_outstanding,
            total_spent: customer.total_spent,
            loyalty_text: customer.loyalty_text,
            last_updated: Utc::now(),
            cached,
        }
    }
}

/// 分页信息给出的页数再大，单次查询最多扫描这么多页
pub const SCAN_PAGE_LIMIT: u32 = 200;

/// 根据公开标识查找客户最新余额
///
/// Ewity 没有按 ID 查询客户的接口，只能翻页查找。先查绑定记录上次命中的页，
/// 未命中再从第 1 页顺序扫描（跳过已查过的页），页数上限取上游分页信息中的
/// 最后一页（不超过 [`SCAN_PAGE_LIMIT`]），没有分页信息时使用 `max_pages`。
/// 上游不可用或找不到时退回本地缓存表。
pub struct BalanceResolver<'a> {
    links: &'a dyn LinkStore,
    customers: &'a dyn CustomerStore,
    pages: &'a dyn CustomerPageSource,
    max_pages: u32,
}

impl<'a> BalanceResolver<'a> {
    pub fn new(
        links: &'a dyn LinkStore,
        customers: &'a dyn CustomerStore,
        pages: &'a dyn CustomerPageSource,
        max_pages: u32,
    ) -> Self {
        Self {
            links,
            customers,
            pages,
            max_pages,
        }
    }

    pub async fn resolve(&self, identifier: &str) -> Result<BalanceView, AppError> {
        let not_found = || AppError::NotFound("Customer not found".into());

        let uuid = Uuid::parse_str(identifier.trim()).map_err(|_| not_found())?;
        let link = self.links.find_by_uuid(uuid).await?.ok_or_else(not_found)?;

        self.links.touch(uuid).await?;

        let live = match self.locate(&link).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    "Ewity lookup for customer {} failed, falling back to local cache: {}",
                    link.ewity_customer_id,
                    e
                );
                None
            }
        };

        match live {
            Some((customer, page)) => {
                if link.remembered_page() != Some(page) {
                    self.remember_page(&link, page).await;
                }
                // 写回本地缓存表，上游不可用时使用
                if let Err(e) = self.customers.upsert(&customer).await {
                    tracing::warn!("Failed to cache customer {}: {}", customer.id, e);
                }
                Ok(BalanceView::project(&link, customer, false))
            }
            None => {
                tracing::info!(
                    "Customer {} not found in Ewity listing, using local cache",
                    link.ewity_customer_id
                );
                let row = self
                    .customers
                    .find_by_id(&link.ewity_customer_id)
                    .await?
                    .ok_or(AppError::DataUnavailable)?;
                Ok(BalanceView::project(&link, PosCustomer::from(&row), true))
            }
        }
    }

    /// 返回客户记录及其所在页
    ///
    /// 单页失败只跳过该页；还没有任何一页成功时再失败，视为上游不可用并返回错误。
    async fn locate(
        &self,
        link: &CustomerLinkEntity,
    ) -> Result<Option<(PosCustomer, u32)>, ewity::Error> {
        let customer_id = link.ewity_customer_id.as_str();
        let remembered = link.remembered_page();
        let mut last_page = self.max_pages;
        let mut reachable = false;

        if let Some(page) = remembered {
            match self.pages.fetch_page(page).await {
                Ok(listing) => {
                    reachable = true;
                    if let Some(customer) = listing.find(customer_id) {
                        tracing::debug!("Found customer {} on remembered page {}", customer_id, page);
                        return Ok(Some((customer.clone(), page)));
                    }
                    if let Some(n) = listing.pagination.last_page {
                        last_page = n.min(SCAN_PAGE_LIMIT);
                    }
                }
                Err(e) => tracing::warn!("Failed to fetch remembered page {}: {}", page, e),
            }
        }

        let mut page = 1;
        while page <= last_page {
            if Some(page) != remembered {
                let listing = match self.pages.fetch_page(page).await {
                    Ok(listing) => listing,
                    Err(e) if !reachable => return Err(e),
                    Err(e) => {
                        tracing::warn!("Skipping customer page {}: {}", page, e);
                        page += 1;
                        continue;
                    }
                };
                reachable = true;
                if let Some(customer) = listing.find(customer_id) {
                    tracing::debug!("Found customer {} on page {}", customer_id, page);
                    return Ok(Some((customer.clone(), page)));
                }
                if let Some(n) = listing.pagination.last_page {
                    last_page = n.min(SCAN_PAGE_LIMIT);
                }
            }
            page += 1;
        }

        Ok(None)
    }

    async fn remember_page(&self, link: &CustomerLinkEntity, page: u32) {
        match self.links.set_last_api_page(link.uuid, page).await {
            Ok(()) => tracing::info!("Updated cached page for link {} to {}", link.uuid, page),
            Err(e) => tracing::warn!(
                "Failed to update cached page for link {}: {}",
                link.uuid,
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        FakeUpstream, InMemoryCustomers, InMemoryLinks, link_entity, pos_customer,
    };
    use std::sync::atomic::Ordering;

    const MAX_PAGES: u32 = 14;

    fn resolver<'a>(
        links: &'a InMemoryLinks,
        customers: &'a InMemoryCustomers,
        upstream: &'a FakeUpstream,
    ) -> BalanceResolver<'a> {
        BalanceResolver::new(links, customers, upstream, MAX_PAGES)
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_found_and_mutates_nothing() {
        let existing = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(existing, "42", Some(2)));
        let customers = InMemoryCustomers::default();
        let upstream = FakeUpstream::default();

        let result = resolver(&links, &customers, &upstream)
            .resolve(&Uuid::new_v4().to_string())
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        let untouched = links.get(existing).unwrap();
        assert!(untouched.last_accessed.is_none());
        assert_eq!(untouched.last_api_page, Some(2));
        assert!(upstream.fetched().is_empty());
    }

    #[tokio::test]
    async fn malformed_identifier_is_not_found() {
        let links = InMemoryLinks::default();
        let customers = InMemoryCustomers::default();
        let upstream = FakeUpstream::default();

        let result = resolver(&links, &customers, &upstream).resolve("abc-123").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn remembered_page_hit_costs_one_fetch() {
        let uuid = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(uuid, "42", Some(5)));
        let customers = InMemoryCustomers::default();
        let upstream = FakeUpstream::default().with_customer(5, pos_customer("42", "Mariyam", 80.0));

        let view = resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await
            .unwrap();

        assert_eq!(upstream.fetched(), vec![5]);
        assert_eq!(view.customer_name, "Mariyam");
        assert_eq!(view.total_outstanding, 80.0);
        assert!(!view.cached);
        assert!(links.get(uuid).unwrap().last_accessed.is_some());
    }

    #[tokio::test]
    async fn live_hit_refreshes_local_cache_row() {
        let uuid = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(uuid, "42", None));
        let customers =
            InMemoryCustomers::default().with_customer(&pos_customer("42", "Mariyam", 10.0));
        let upstream = FakeUpstream::default().with_customer(1, pos_customer("42", "Mariyam", 35.5));

        resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await
            .unwrap();

        assert_eq!(customers.get("42").unwrap().outstanding_balance, 35.5);
    }

    #[tokio::test]
    async fn moved_customer_updates_remembered_page() {
        let uuid = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(uuid, "42", Some(2)));
        let customers = InMemoryCustomers::default();
        let upstream = FakeUpstream::default().with_customer(6, pos_customer("42", "Mariyam", 10.0));

        resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await
            .unwrap();

        // 先查记住的第 2 页，再从 1 开始扫描并跳过 2
        assert_eq!(upstream.fetched(), vec![2, 1, 3, 4, 5, 6]);
        assert_eq!(links.get(uuid).unwrap().last_api_page, Some(6));

        upstream.fetches.lock().unwrap().clear();
        resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await
            .unwrap();
        assert_eq!(upstream.fetched(), vec![6]);
    }

    #[tokio::test]
    async fn scan_stops_at_the_configured_ceiling_without_metadata() {
        let uuid = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(uuid, "42", None));
        let customers = InMemoryCustomers::default();
        let upstream = FakeUpstream::default().with_customer(20, pos_customer("42", "Far", 0.0));

        let result = resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await;

        assert!(matches!(result, Err(AppError::DataUnavailable)));
        assert_eq!(upstream.fetched(), (1..=MAX_PAGES).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn pagination_metadata_overrides_the_ceiling() {
        let uuid = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(uuid, "42", None));
        let customers = InMemoryCustomers::default();
        let upstream =
            FakeUpstream::with_last_page(20).with_customer(17, pos_customer("42", "Far", 3.5));

        let view = resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await
            .unwrap();

        assert_eq!(view.total_outstanding, 3.5);
        assert_eq!(upstream.fetched().last(), Some(&17));
        assert_eq!(links.get(uuid).unwrap().last_api_page, Some(17));
    }

    #[tokio::test]
    async fn short_catalogue_is_not_overscanned() {
        let uuid = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(uuid, "42", None));
        let customers = InMemoryCustomers::default();
        let upstream = FakeUpstream::with_last_page(3);

        let result = resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await;

        assert!(matches!(result, Err(AppError::DataUnavailable)));
        assert_eq!(upstream.fetched(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn unreachable_upstream_falls_back_to_local_cache() {
        let uuid = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(uuid, "42", Some(3)));
        let customers =
            InMemoryCustomers::default().with_customer(&pos_customer("42", "Cached Name", 55.0));
        let upstream = FakeUpstream::default();
        upstream.set_unreachable();

        let view = resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await
            .unwrap();

        assert!(view.cached);
        assert_eq!(view.customer_name, "Cached Name");
        assert_eq!(view.total_outstanding, 55.0);
        // 没有任何一页成功，扫描第 1 页失败后即停止
        assert_eq!(upstream.fetched(), vec![3, 1]);
        assert_eq!(links.get(uuid).unwrap().last_api_page, Some(3));
    }

    #[tokio::test]
    async fn failing_page_is_skipped_during_scan() {
        let uuid = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(uuid, "42", None));
        let customers = InMemoryCustomers::default();
        let upstream = FakeUpstream::with_last_page(6)
            .with_customer(5, pos_customer("42", "Past The Gap", 7.0))
            .failing_on(2);

        let view = resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await
            .unwrap();

        assert!(!view.cached);
        assert_eq!(view.total_outstanding, 7.0);
        assert_eq!(upstream.fetched(), vec![1, 2, 3, 4, 5]);
        assert_eq!(links.get(uuid).unwrap().last_api_page, Some(5));
    }

    #[tokio::test]
    async fn failing_remembered_page_still_scans() {
        let uuid = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(uuid, "42", Some(2)));
        let customers = InMemoryCustomers::default();
        let upstream = FakeUpstream::with_last_page(4)
            .with_customer(3, pos_customer("42", "Moved", 1.5))
            .failing_on(2);

        let view = resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await
            .unwrap();

        assert_eq!(view.customer_name, "Moved");
        assert_eq!(upstream.fetched(), vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn huge_last_page_is_capped() {
        let uuid = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(uuid, "42", None));
        let customers = InMemoryCustomers::default();
        let upstream = FakeUpstream::with_last_page(u32::MAX);

        let result = resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await;

        assert!(matches!(result, Err(AppError::DataUnavailable)));
        assert_eq!(upstream.fetched().len(), SCAN_PAGE_LIMIT as usize);
    }

    #[tokio::test]
    async fn missing_everywhere_is_unavailable_but_still_touched() {
        let uuid = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(uuid, "42", None));
        let customers = InMemoryCustomers::default();
        let upstream = FakeUpstream::with_last_page(2);

        let result = resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await;

        assert!(matches!(result, Err(AppError::DataUnavailable)));
        assert!(links.get(uuid).unwrap().last_accessed.is_some());
    }

    #[tokio::test]
    async fn failing_page_update_does_not_fail_lookup() {
        let uuid = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(uuid, "42", None));
        links.fail_page_updates.store(true, Ordering::SeqCst);
        let customers = InMemoryCustomers::default();
        let upstream = FakeUpstream::default().with_customer(2, pos_customer("42", "Ahmed", 1.0));

        let view = resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await
            .unwrap();

        assert_eq!(view.customer_name, "Ahmed");
        assert_eq!(links.get(uuid).unwrap().last_api_page, None);
    }

    #[tokio::test]
    async fn link_snapshot_fills_missing_name_and_phone() {
        let uuid = Uuid::new_v4();
        let links = InMemoryLinks::default().with_link(link_entity(uuid, "42", Some(1)));
        let customers = InMemoryCustomers::default();
        let bare = PosCustomer::from_value(&serde_json::json!({"id": "42", "totalSpent": 9})).unwrap();
        let upstream = FakeUpstream::default().with_customer(1, bare);

        let view = resolver(&links, &customers, &upstream)
            .resolve(&uuid.to_string())
            .await
            .unwrap();

        assert_eq!(view.customer_name, "Snapshot 42");
        assert_eq!(view.customer_phone.as_deref(), Some("7000000"));
        assert_eq!(view.total_spent, 9.0);
        assert_eq!(view.loyalty_text, None);
    }
}
