//! Core traits for the reconciler
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsProvider`]: Read zones and apply change sets via provider APIs
//! - [`Source`]: Discover desired records and signal changes

pub mod dns_provider;
pub mod source;

pub use dns_provider::{DnsProvider, DnsProviderFactory, ProviderAdapter, RecordAdapter, RecordKeys};
pub use source::{EventStream, Source, SourceFactory};
