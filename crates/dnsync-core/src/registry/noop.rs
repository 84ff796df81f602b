//! Pass-through registry
//!
//! Writes every source record and claims the whole zone. Only the apex SOA
//! and NS records are carried over from the existing records.

use tracing::warn;

use super::DesiredSet;
use crate::error::Result;
use crate::record::{ProviderRecord, RecordType, SourceRecord, ZoneState};
use crate::traits::RecordAdapter;

/// Registry that performs no ownership tracking
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRegistry;

impl NoopRegistry {
    pub(crate) fn apply_desired_records<T, A>(
        &self,
        state: &mut ZoneState<T>,
        sources: &[SourceRecord],
        adapter: &A,
    ) -> Result<()>
    where
        T: ProviderRecord,
        A: RecordAdapter<T> + ?Sized,
    {
        let mut desired = DesiredSet::new();

        for record in &state.existing {
            let dns = record.dns();
            let zone_critical = matches!(dns.record_type(), RecordType::Soa | RecordType::Ns);
            if zone_critical && state.zone.is_apex(dns.fqdn()) {
                desired.push(record.clone(), adapter);
            }
        }

        for source in sources {
            match adapter.enrich_source_record(source) {
                Some(record) => {
                    desired.push(record, adapter);
                }
                None => {
                    warn!(
                        "Provider does not support {} (from {}), skipping",
                        source.dns, source.resource_key
                    );
                    state.unwritten.insert(source.resource_key.clone());
                }
            }
        }

        state.desired = Some(desired.into_vec());
        Ok(())
    }
}
