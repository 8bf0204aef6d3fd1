pub mod client;
pub mod console;
pub mod error;
pub mod observer;
pub mod panel;

// Re-export specific items for convenient access
pub use console::context::{DebugContext, Environment};
pub use panel::controller::{DebugPanel, PanelMode};
