//! Property-based tests that span several modules.

mod classification_properties;
mod concurrency_properties;
mod logging_properties;
mod verdict_properties;
