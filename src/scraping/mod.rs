pub mod fetch;
pub mod page_parser;

pub use fetch::{HtmlFetcher, HttpFetcher, StaticFetcher};
pub use page_parser::PageParser;
