mod cache;
mod customer;
mod customer_link;
mod user;

pub use cache::PgCacheRepository;
pub use customer::PgCustomerRepository;
pub use customer_link::PgCustomerLinkRepository;
pub use user::PgUserRepository;
