//! Schema type detection, field extraction, building and validation.

pub mod builder;
pub mod detect;
pub mod extract;
pub mod validate;

pub use builder::{compact, SchemaBuilder, SCHEMA_CONTEXT};
pub use detect::{Indicator, Signal, TypeDetector, TypeRule};
pub use extract::FieldExtractor;
pub use validate::{apply_fixes, Fix, SchemaValidator, ValidationOptions, ValidationResult};
