//! Library crate for portwatch exposing reusable modules.
pub mod pipeline;
pub mod probe;
pub mod reconcile;
pub mod scanner;
pub mod store;
pub mod target;
pub mod types;
