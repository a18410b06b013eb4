mod handler;
mod model;

pub use handler::{
    delete_link,
    link_customer,
    list_customers,
    list_links,
    login,
    refresh_customers,
    search_customers,
};
