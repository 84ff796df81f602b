//! Configuration types for the reconciler
//!
//! This module defines all configuration structures used throughout the crate.
//! Loading is done by the daemon; [`DnsyncConfig::from_file`] is provided for
//! embedders that keep their configuration as JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::filter::AnnotationFilter;
use crate::record::SourceRecord;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsyncConfig {
    /// Scheduling settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Ownership registry
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Record sources
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// DNS providers
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl DnsyncConfig {
    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.sources.is_empty() {
            return Err(crate::Error::config("No sources configured"));
        }
        if self.providers.is_empty() {
            return Err(crate::Error::config("No providers configured"));
        }

        self.reconciler.validate()?;
        self.registry.validate()?;
        for source in &self.sources {
            source.validate()?;
        }
        for provider in &self.providers {
            provider.validate()?;
        }

        Ok(())
    }
}

/// Scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Pass interval when watching is disabled (in seconds)
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Quiet period before a burst of signals becomes one pass (in seconds)
    #[serde(default = "default_debounce_seconds")]
    pub debounce_seconds: u64,

    /// Safety-net pass interval while watching (in seconds)
    #[serde(default = "default_fallback_interval_seconds")]
    pub fallback_interval_seconds: u64,

    /// Subscribe to source change signals
    #[serde(default)]
    pub enable_watching: Option<bool>,

    /// Opt out of source change signals; wins over `enable_watching`
    #[serde(default)]
    pub disable_watching: Option<bool>,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ReconcilerConfig {
    /// Whether sources should be watched
    pub fn watching_enabled(&self) -> bool {
        if self.disable_watching == Some(true) {
            return false;
        }
        self.enable_watching.unwrap_or(true)
    }

    /// Pass interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Debounce quiet period as a duration
    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_seconds)
    }

    /// Watch fallback interval as a duration
    pub fn fallback_interval(&self) -> Duration {
        Duration::from_secs(self.fallback_interval_seconds)
    }

    /// Validate scheduling settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_seconds == 0 {
            return Err(crate::Error::config("interval_seconds must be > 0"));
        }
        if self.fallback_interval_seconds == 0 {
            return Err(crate::Error::config("fallback_interval_seconds must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            debounce_seconds: default_debounce_seconds(),
            fallback_interval_seconds: default_fallback_interval_seconds(),
            enable_watching: None,
            disable_watching: None,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Ownership registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryConfig {
    /// Heritage TXT records
    Txt {
        /// Prefix prepended to managed fqdns to name heritage records
        #[serde(default)]
        txt_prefix: String,
        /// Owner id of this instance
        #[serde(default = "default_owner_id")]
        txt_owner_id: String,
        /// Owners whose fqdns may be taken over
        #[serde(default)]
        auto_adopt_from_owner_ids: Vec<String>,
    },

    /// No ownership tracking
    Noop,
}

impl RegistryConfig {
    /// Validate the registry configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let RegistryConfig::Txt {
            txt_owner_id,
            auto_adopt_from_owner_ids,
            ..
        } = self
        {
            if txt_owner_id.is_empty() {
                return Err(crate::Error::config("txt_owner_id cannot be empty"));
            }
            // Heritage content is a comma separated list of key=value pairs
            let unencodable = |id: &String| id.contains([',', '=']);
            if unencodable(txt_owner_id) {
                return Err(crate::Error::config(
                    "txt_owner_id cannot contain ',' or '='",
                ));
            }
            if auto_adopt_from_owner_ids.iter().any(unencodable) {
                return Err(crate::Error::config(
                    "auto_adopt_from_owner_ids cannot contain ',' or '='",
                ));
            }
            if auto_adopt_from_owner_ids.iter().any(|o| o.is_empty()) {
                return Err(crate::Error::config(
                    "auto_adopt_from_owner_ids cannot contain empty ids",
                ));
            }
            if auto_adopt_from_owner_ids.contains(txt_owner_id) {
                return Err(crate::Error::config(
                    "auto_adopt_from_owner_ids cannot contain txt_owner_id",
                ));
            }
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig::Txt {
            txt_prefix: String::new(),
            txt_owner_id: default_owner_id(),
            auto_adopt_from_owner_ids: Vec::new(),
        }
    }
}

/// Source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source kind and its settings
    #[serde(flatten)]
    pub kind: SourceKind,

    /// Keep only records whose resource annotations match
    #[serde(default)]
    pub annotation_filter: Option<String>,
}

impl SourceConfig {
    /// Create a source configuration without a filter
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            annotation_filter: None,
        }
    }

    /// Set the annotation filter
    pub fn with_annotation_filter(mut self, filter: impl Into<String>) -> Self {
        self.annotation_filter = Some(filter.into());
        self
    }

    /// Parse the annotation filter
    pub fn filter(&self) -> Result<AnnotationFilter, crate::Error> {
        match &self.annotation_filter {
            Some(raw) => raw.parse(),
            None => Ok(AnnotationFilter::default()),
        }
    }

    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.filter()?;
        if let SourceKind::Custom { factory, .. } = &self.kind {
            if factory.is_empty() {
                return Err(crate::Error::config("Custom source factory cannot be empty"));
            }
        }
        Ok(())
    }

    /// Get the source type name
    pub fn type_name(&self) -> &str {
        match &self.kind {
            SourceKind::Static { .. } => "static",
            SourceKind::Custom { factory, .. } => factory,
        }
    }
}

/// Source kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    /// Fixed records from configuration
    Static {
        /// Records to publish
        #[serde(default)]
        records: Vec<SourceRecord>,
    },

    /// Externally registered source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        #[serde(default)]
        config: serde_json::Value,
    },
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Limit management to these zone apexes (empty = all zones)
        #[serde(default)]
        zones: Vec<String>,
        /// Proxy records through Cloudflare unless annotated otherwise
        #[serde(default)]
        proxied_by_default: bool,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        #[serde(default)]
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_debounce_seconds() -> u64 {
    2
}

fn default_fallback_interval_seconds() -> u64 {
    3600
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_owner_id() -> String {
    "default".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watching_flags() {
        let mut config = ReconcilerConfig::default();
        assert!(config.watching_enabled());

        config.enable_watching = Some(false);
        assert!(!config.watching_enabled());

        config.enable_watching = Some(true);
        config.disable_watching = Some(true);
        assert!(!config.watching_enabled());
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: DnsyncConfig = serde_json::from_str(
            r#"{
                "registry": {"type": "txt", "txt_owner_id": "cluster-a", "auto_adopt_from_owner_ids": ["legacy"]},
                "sources": [{"type": "static", "annotation_filter": "team=web", "records": []}],
                "providers": [{"type": "cloudflare", "api_token": "secret"}]
            }"#,
        )
        .unwrap();

        assert_eq!(config.reconciler.debounce_seconds, 2);
        assert_eq!(config.sources[0].type_name(), "static");
        assert_eq!(config.sources[0].annotation_filter.as_deref(), Some("team=web"));
        assert_eq!(config.providers[0].type_name(), "cloudflare");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_owner() {
        let registry = RegistryConfig::Txt {
            txt_prefix: String::new(),
            txt_owner_id: String::new(),
            auto_adopt_from_owner_ids: Vec::new(),
        };
        assert!(registry.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_separators_in_owner_ids() {
        for owner in ["a,b", "a=b"] {
            let registry = RegistryConfig::Txt {
                txt_prefix: String::new(),
                txt_owner_id: owner.to_string(),
                auto_adopt_from_owner_ids: vec![],
            };
            assert!(matches!(registry.validate(), Err(crate::Error::Config(_))));

            let registry = RegistryConfig::Txt {
                txt_prefix: String::new(),
                txt_owner_id: "me".to_string(),
                auto_adopt_from_owner_ids: vec!["old".to_string(), owner.to_string()],
            };
            assert!(matches!(registry.validate(), Err(crate::Error::Config(_))));
        }

        let registry = RegistryConfig::Txt {
            txt_prefix: String::new(),
            txt_owner_id: "cluster-a.prod".to_string(),
            auto_adopt_from_owner_ids: vec!["cluster-b".to_string()],
        };
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_providers() {
        let config = DnsyncConfig {
            reconciler: ReconcilerConfig::default(),
            registry: RegistryConfig::Noop,
            sources: vec![SourceConfig::new(SourceKind::Static { records: Vec::new() })],
            providers: Vec::new(),
        };
        assert!(config.validate().is_err());
    }
}
