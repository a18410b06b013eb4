pub mod customer;
pub mod customer_link;
pub mod user;

pub use customer::CustomerEntity;
pub use customer_link::{CustomerLinkEntity, NewCustomerLink};
pub use user::UserEntity;
