pub mod batch_generate;
pub mod generate;

pub use batch_generate::{generate_batch, BatchReport};
pub use generate::{generate, generate_from_html};
