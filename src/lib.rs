pub mod config;
pub mod fetch;
pub mod harvest;
pub mod model;

// Re-export common types for convenience
pub use config::*;
pub use fetch::*;
pub use model::*;
