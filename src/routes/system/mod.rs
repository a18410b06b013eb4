mod handler;

pub use handler::{health, root};
