// 业务操作
// 处理器只做参数解析，具体逻辑放在这里以便脱离 HTTP 测试

pub mod balance;
pub mod links;
pub mod sync;

pub use balance::{BalanceResolver, BalanceView};
pub use links::{LinkRequest, create_link, delete_link};
pub use sync::{CustomerSync, SyncReport};
