// # dnsync-core
//
// Core library for keeping DNS zones in sync with the records a set of
// sources ask for.
//
// ## Architecture Overview
//
// - **Source**: Trait for producers of desired records
// - **DnsProvider**: Trait for reading and writing records via provider APIs
// - **Registry**: Ownership tracking; decides which records may be written
// - **build_diff**: Pure comparison of existing and desired records
// - **Reconciler**: Engine that runs one gather → diff → apply pass per tick
// - **Ticker**: Debounced tick stream driven by timers and source signals
// - **PluginRegistry**: Plugin-based registry for providers and sources
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Level-Triggered**: Every pass reads the full state; nothing is cached
// 3. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Shared Zones**: Ownership records let independent instances coexist

pub mod traits;
pub mod record;
pub mod diff;
pub mod registry;
pub mod engine;
pub mod ticker;
pub mod pending;
pub mod plugins;
pub mod config;
pub mod error;
pub mod filter;
pub mod sources;

// Re-export core types for convenience
pub use traits::{DnsProvider, Source};
pub use record::{PlainRecord, RecordType, SourceRecord, Zone, ZoneState};
pub use diff::build_diff;
pub use registry::Registry;
pub use engine::{AnyProvider, ConfirmPolicy, EngineEvent, PassSummary, Reconciler};
pub use ticker::{Tick, TickReason, Ticker, TickerConfig};
pub use plugins::PluginRegistry;
pub use config::{DnsyncConfig, ProviderConfig, RegistryConfig, SourceConfig};
pub use error::{Error, Result};
