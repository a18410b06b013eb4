use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::database::{CustomerStore, LinkStore};
use crate::error::AppError;
use crate::ewity::CustomerPageSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub total: u64,
    pub new: u64,
    pub updated: u64,
    pub pages: u32,
    pub links_updated: u64,
}

/// 全量同步 Ewity 客户到本地缓存表
///
/// 直接请求上游，不经过页缓存。第 1 页的分页信息决定总页数（缺省为 1），
/// 任意一页获取失败即中止，已写入的记录保留。同步时顺带修正绑定记录的页码提示。
pub struct CustomerSync<'a> {
    source: &'a dyn CustomerPageSource,
    customers: &'a dyn CustomerStore,
    links: &'a dyn LinkStore,
}

impl<'a> CustomerSync<'a> {
    pub fn new(
        source: &'a dyn CustomerPageSource,
        customers: &'a dyn CustomerStore,
        links: &'a dyn LinkStore,
    ) -> Self {
        Self {
            source,
            customers,
            links,
        }
    }

    pub async fn run(&self) -> Result<SyncReport, AppError> {
        tracing::info!("Syncing customers from Ewity API");

        let mut hints: HashMap<String, (Uuid, Option<u32>)> = self
            .links
            .list()
            .await?
            .into_iter()
            .map(|link| {
                let page = link.remembered_page();
                (link.ewity_customer_id, (link.uuid, page))
            })
            .collect();

        let mut report = SyncReport::default();
        let mut page = 1;
        let mut total_pages = 1;

        while page <= total_pages {
            tracing::debug!("Fetching page {}", page);
            let listing = self.source.fetch_page(page).await?;

            if page == 1 {
                total_pages = listing.pagination.last_page.unwrap_or(1);
                tracing::info!(
                    "Found {} pages ({} total customers)",
                    total_pages,
                    listing.pagination.total.unwrap_or(0)
                );
            }

            for customer in &listing.customers {
                // 先查是否存在再写入，并发同步时计数可能不准
                let existed = self.customers.exists(&customer.id).await?;
                self.customers.upsert(customer).await?;
                if existed {
                    report.updated += 1;
                } else {
                    report.new += 1;
                }

                if let Some((uuid, remembered)) = hints.get_mut(&customer.id) {
                    if *remembered != Some(page) {
                        // 页码提示只是优化，写入失败不影响同步
                        match self.links.set_last_api_page(*uuid, page).await {
                            Ok(()) => {
                                *remembered = Some(page);
                                report.links_updated += 1;
                            }
                            Err(e) => tracing::warn!(
                                "Failed to update cached page for link {}: {}",
                                uuid,
                                e
                            ),
                        }
                    }
                }
            }

            tracing::debug!("Processed page {}/{}", page, total_pages);
            report.pages = page;
            page += 1;
        }

        report.total = report.new + report.updated;
        tracing::info!(
            "Synced {} customers ({} new, {} updated), {} link pages updated",
            report.total,
            report.new,
            report.updated,
            report.links_updated
        );

        Ok(report)
    }
}
