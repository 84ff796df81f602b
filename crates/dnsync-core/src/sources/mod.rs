// # Source Implementations
//
// Built-in sources and source wrappers. Cluster-backed sources live in their
// own crates and are registered through the plugin registry.

pub mod filtered;
pub mod static_source;

pub use filtered::FilteredSource;
pub use static_source::{StaticSource, StaticSourceFactory};
