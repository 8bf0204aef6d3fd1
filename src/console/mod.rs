pub mod context;
pub mod export;
pub mod log;
pub mod metrics;
pub mod tools;
pub mod tracker;
