//! Plugin-based provider and source registry
//!
//! The registry allows DNS providers and sources to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dnsync_core::plugins::PluginRegistry;
//! use dnsync_core::config::ProviderConfig;
//!
//! // Create a registry with the built-in sources
//! let mut plugins = PluginRegistry::with_builtin_sources();
//!
//! // Register providers
//! plugins.register_provider("cloudflare", Box::new(cloudflare_factory));
//!
//! // Create provider from config
//! let config = ProviderConfig::Cloudflare { ... };
//! let provider = plugins.create_provider(&config)?;
//! ```
//!
//! ## Registration
//!
//! Provider crates expose a `register` function:
//!
//! ```rust,ignore
//! // In dnsync-provider-cloudflare
//! pub fn register(plugins: &mut PluginRegistry) {
//!     plugins.register_provider("cloudflare", Box::new(CloudflareFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ProviderConfig, SourceConfig};
use crate::engine::AnyProvider;
use crate::error::{Error, Result};
use crate::sources::{FilteredSource, StaticSourceFactory};
use crate::traits::{DnsProviderFactory, Source, SourceFactory};

/// Registry of provider and source factories
///
/// Registration takes `&mut self`; the registry is filled once at startup
/// and only read afterwards.
#[derive(Default)]
pub struct PluginRegistry {
    /// Registered DNS provider factories
    providers: HashMap<String, Box<dyn DnsProviderFactory>>,

    /// Registered source factories
    sources: HashMap<String, Box<dyn SourceFactory>>,
}

impl PluginRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the sources shipped in this crate
    pub fn with_builtin_sources() -> Self {
        let mut plugins = Self::new();
        plugins.register_source("static", Box::new(StaticSourceFactory));
        plugins
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "cloudflare")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn DnsProviderFactory>,
    ) {
        self.providers.insert(name.into(), factory);
    }

    /// Register a source factory
    pub fn register_source(&mut self, name: impl Into<String>, factory: Box<dyn SourceFactory>) {
        self.sources.insert(name.into(), factory);
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn AnyProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn AnyProvider>> {
        let provider_type = config.type_name();
        let factory = self
            .providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create a source from configuration
    ///
    /// The source is wrapped in the configured annotation filter.
    pub fn create_source(&self, config: &SourceConfig) -> Result<Arc<dyn Source>> {
        let source_type = config.type_name();
        let factory = self
            .sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown source type: {}", source_type)))?;

        let filter = config.filter()?;
        Ok(FilteredSource::wrap(factory.create(config)?, filter))
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered source types
    pub fn list_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Check if a source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }
}
