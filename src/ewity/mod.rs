mod client;
mod error;
mod types;

use async_trait::async_trait;

pub use client::EwityClient;
pub use error::Error;
pub use types::{CustomerPage, Pagination, PosCustomer};

/// 分页客户列表的来源
#[async_trait]
pub trait CustomerPageSource: Send + Sync {
    // 页码从 1 开始
    async fn fetch_page(&self, page: u32) -> Result<CustomerPage, Error>;
}
