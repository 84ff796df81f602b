// # DNS Provider Trait
//
// Defines the boundary between the reconciler and a DNS provider's
// management API.
//
// ## Implementations
//
// - Cloudflare: `dnsync-provider-cloudflare` crate
//
// ## Contract
//
// - `list_zones()` and `list_records()` hit the API on every call; the
//   engine never caches their results across passes.
// - `enrich_source_record()` turns a provider-independent record into the
//   provider's own record type, or returns `None` when the type is not
//   supported (the record is dropped with a warning).
// - `grouping_key()` / `comparison_key()` define record identity for the
//   diff engine. The engine never assumes a key shape.
// - `apply_changes()` receives a zone state whose `diff` is set.

use async_trait::async_trait;

use crate::error::Result;
use crate::record::{ProviderRecord, SourceRecord, Zone, ZoneState};

/// Record identity functions used by the diff engine
pub trait RecordKeys<T> {
    /// Identity of the slot a record occupies (typically fqdn + type)
    fn grouping_key(&self, record: &T) -> String;

    /// Identity of the record's mutable content (target, ttl, flags...)
    fn comparison_key(&self, record: &T) -> String;
}

/// Record identity plus conversion from source records, used by the
/// ownership registry
pub trait RecordAdapter<T>: RecordKeys<T> {
    /// Convert a source record into a provider record
    ///
    /// Returns `None` if the provider does not support the record type.
    fn enrich_source_record(&self, record: &SourceRecord) -> Option<T>;
}

/// Trait for DNS provider implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Retries
///
/// Providers do not retry failed calls. A failed `apply_changes` aborts the
/// pass; the next tick re-reads the zone and computes a fresh diff.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Provider-specific record type
    type Record: ProviderRecord;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &str;

    /// List the zones this provider manages
    async fn list_zones(&self) -> Result<Vec<Zone>>;

    /// Read every record currently in `zone`
    async fn list_records(&self, zone: &Zone) -> Result<Vec<Self::Record>>;

    /// Convert a source record into this provider's record type
    fn enrich_source_record(&self, record: &SourceRecord) -> Option<Self::Record>;

    /// Identity of the slot a record occupies
    fn grouping_key(&self, record: &Self::Record) -> String;

    /// Identity of the record's content
    fn comparison_key(&self, record: &Self::Record) -> String;

    /// Apply `state.diff` to the zone
    ///
    /// Deletions should be issued before creations to avoid transient
    /// uniqueness collisions.
    async fn apply_changes(&self, state: &ZoneState<Self::Record>) -> Result<()>;
}

/// Borrowed view of a provider as a [`RecordAdapter`]
pub struct ProviderAdapter<'a, P>(pub &'a P);

impl<P: DnsProvider> RecordKeys<P::Record> for ProviderAdapter<'_, P> {
    fn grouping_key(&self, record: &P::Record) -> String {
        self.0.grouping_key(record)
    }

    fn comparison_key(&self, record: &P::Record) -> String {
        self.0.comparison_key(record)
    }
}

impl<P: DnsProvider> RecordAdapter<P::Record> for ProviderAdapter<'_, P> {
    fn enrich_source_record(&self, record: &SourceRecord) -> Option<P::Record> {
        self.0.enrich_source_record(record)
    }
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a provider instance from configuration
    ///
    /// # Returns
    ///
    /// A type-erased provider ready to be handed to the reconciler
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn crate::engine::AnyProvider>>;
}
