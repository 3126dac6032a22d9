//! Mixxx set statistics - shared modules for all binaries.

pub mod aggregate;
pub mod crates;
pub mod library;
pub mod models;
pub mod normalize;
pub mod profile;
pub mod progress;
pub mod repetition;
pub mod safety;
pub mod snapshot;
pub mod source;
