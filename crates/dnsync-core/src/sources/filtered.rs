//! Annotation-filtered source wrapper

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::filter::AnnotationFilter;
use crate::record::SourceRecord;
use crate::traits::{EventStream, Source};

/// Source that hides records whose annotations fail a filter
pub struct FilteredSource {
    inner: Arc<dyn Source>,
    filter: AnnotationFilter,
}

impl FilteredSource {
    /// Wrap `inner`, returning it unchanged if `filter` is empty
    pub fn wrap(inner: Arc<dyn Source>, filter: AnnotationFilter) -> Arc<dyn Source> {
        if filter.is_empty() {
            return inner;
        }
        Arc::new(Self { inner, filter })
    }
}

#[async_trait]
impl Source for FilteredSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_records(&self) -> Result<Vec<SourceRecord>> {
        let records = self.inner.list_records().await?;
        let total = records.len();
        let kept: Vec<SourceRecord> = records
            .into_iter()
            .filter(|r| self.filter.matches(&r.annotations))
            .collect();
        debug!(
            "Source {}: {} of {} records match '{}'",
            self.inner.name(),
            kept.len(),
            total,
            self.filter
        );
        Ok(kept)
    }

    async fn observe_resource(&self, resource_key: &str) -> Result<()> {
        self.inner.observe_resource(resource_key).await
    }

    fn watch(&self) -> Option<EventStream> {
        self.inner.watch()
    }
}
