// # Source Trait
//
// Defines the interface for components that discover desired DNS records
// (ingresses, custom resources, nodes, ACME challenges...).
//
// ## Usage
//
// ```rust,ignore
// use dnsync_core::Source;
// use tokio_stream::StreamExt;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* Source implementation */;
//
//     // Full desired state, re-fetched on every pass
//     let records = source.list_records().await?;
//
//     // Invalidation signals
//     if let Some(mut events) = source.watch() {
//         while events.next().await.is_some() {
//             println!("something changed");
//         }
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::error::Result;
use crate::record::SourceRecord;

/// Stream of payload-free "something changed" signals
pub type EventStream = Pin<Box<dyn Stream<Item = ()> + Send + 'static>>;

/// Trait for source implementations
///
/// # Completeness
///
/// `list_records()` must return the complete desired state or fail. A
/// partial list would make the reconciler delete records that are still
/// wanted.
///
/// # Watching
///
/// `watch()` is called at most once per source. Signals carry no data; the
/// reconciler always re-fetches with `list_records()` at tick time.
#[async_trait]
pub trait Source: Send + Sync {
    /// Source name (for logging/debugging)
    fn name(&self) -> &str;

    /// Fetch every desired record this source currently knows about
    async fn list_records(&self) -> Result<Vec<SourceRecord>>;

    /// Called once per resource key after the records of that resource
    /// were successfully reconciled
    ///
    /// Sources use this to clear per-resource pending markers.
    async fn observe_resource(&self, _resource_key: &str) -> Result<()> {
        Ok(())
    }

    /// Start watching for changes
    ///
    /// Returns `None` if the source cannot watch. The stream is not
    /// restartable.
    fn watch(&self) -> Option<EventStream> {
        None
    }
}

/// Helper trait for constructing sources from configuration
pub trait SourceFactory: Send + Sync {
    /// Create a source instance from configuration
    fn create(
        &self,
        config: &crate::config::SourceConfig,
    ) -> Result<std::sync::Arc<dyn Source>>;
}
