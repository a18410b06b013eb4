mod handler;

pub use handler::{get_balance, get_qr_code};
