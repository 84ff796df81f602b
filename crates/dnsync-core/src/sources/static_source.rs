// # Static Source
//
// In-memory implementation of Source.
//
// ## Purpose
//
// Publishes a fixed list of records taken from configuration. Embedders can
// replace the list at runtime with `set_records()`, which also emits a change
// signal to the watch stream.
//
// ## Finalizers
//
// Every key passed to `observe_resource()` is remembered and can be read back
// with `observed()`.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::{SourceConfig, SourceKind};
use crate::record::SourceRecord;
use crate::traits::{EventStream, Source, SourceFactory};
use crate::Error;

/// In-memory source implementation
///
/// # Example
///
/// ```rust,no_run
/// use dnsync_core::sources::StaticSource;
/// use dnsync_core::record::{PlainRecord, SourceRecord};
/// use dnsync_core::Source;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let source = StaticSource::new("static", vec![SourceRecord::new(
///         PlainRecord::a("app.example.com", "1.1.1.1"),
///         "static/app",
///     )]);
///
///     let records = source.list_records().await?;
///     assert_eq!(records.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    records: Arc<RwLock<Vec<SourceRecord>>>,
    observed: Arc<RwLock<BTreeSet<String>>>,
    changes_tx: mpsc::UnboundedSender<()>,
    changes_rx: Arc<std::sync::Mutex<Option<mpsc::UnboundedReceiver<()>>>>,
}

impl StaticSource {
    /// Create a source publishing `records`
    pub fn new(name: impl Into<String>, records: Vec<SourceRecord>) -> Self {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            records: Arc::new(RwLock::new(records)),
            observed: Arc::new(RwLock::new(BTreeSet::new())),
            changes_tx,
            changes_rx: Arc::new(std::sync::Mutex::new(Some(changes_rx))),
        }
    }

    /// Replace the published records and signal watchers
    pub async fn set_records(&self, records: Vec<SourceRecord>) {
        *self.records.write().await = records;
        // Nobody watching is fine
        let _ = self.changes_tx.send(());
    }

    /// Resource keys reported through `observe_resource()`
    pub async fn observed(&self) -> BTreeSet<String> {
        self.observed.read().await.clone()
    }
}

#[async_trait]
impl Source for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_records(&self) -> Result<Vec<SourceRecord>, Error> {
        Ok(self.records.read().await.clone())
    }

    async fn observe_resource(&self, resource_key: &str) -> Result<(), Error> {
        self.observed.write().await.insert(resource_key.to_string());
        Ok(())
    }

    fn watch(&self) -> Option<EventStream> {
        let rx = match self.changes_rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        }?;
        Some(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

/// Factory for the `static` source type
pub struct StaticSourceFactory;

impl SourceFactory for StaticSourceFactory {
    fn create(&self, config: &SourceConfig) -> Result<Arc<dyn Source>, Error> {
        match &config.kind {
            SourceKind::Static { records } => Ok(Arc::new(StaticSource::new(
                "static",
                records.clone(),
            ))),
            _ => Err(Error::config("Invalid config for static source")),
        }
    }
}
