pub mod api;
pub mod cache;
pub mod key;
pub mod state;
