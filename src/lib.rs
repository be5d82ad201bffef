pub mod core;
pub mod nlp;
pub mod resilience;
pub mod schema;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::{load_config, AppState, GenerationError, ScoutConfig};

// --- Short module paths ---
pub use scraping::page_parser;
pub use tools::{batch_generate, generate};
