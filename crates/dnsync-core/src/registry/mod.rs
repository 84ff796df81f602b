//! Ownership registries
//!
//! A registry decides which source records may be written to a zone and
//! fills in `ZoneState::desired`. Two variants exist:
//!
//! - [`TxtRegistry`]: ownership is recorded in heritage TXT records inside
//!   the zone, so independent controller instances can share it safely.
//! - [`NoopRegistry`]: every source record is written; nothing else in the
//!   zone survives except the apex SOA/NS records.
//!
//! Both are pure functions of their inputs; neither talks to the provider.

pub mod heritage;
pub mod noop;
pub mod txt;

pub use heritage::Heritage;
pub use noop::NoopRegistry;
pub use txt::TxtRegistry;

use std::collections::HashSet;

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::record::{ProviderRecord, RecordType, SourceRecord, ZoneState};
use crate::traits::RecordAdapter;

/// Configured ownership registry
#[derive(Debug, Clone)]
pub enum Registry {
    Txt(TxtRegistry),
    Noop(NoopRegistry),
}

impl Registry {
    /// Build the registry described by `config`
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(match config {
            RegistryConfig::Txt {
                txt_prefix,
                txt_owner_id,
                auto_adopt_from_owner_ids,
            } => Registry::Txt(
                TxtRegistry::new(txt_owner_id.clone())
                    .with_prefix(txt_prefix.clone())
                    .with_adopt_from(auto_adopt_from_owner_ids.iter().cloned()),
            ),
            RegistryConfig::Noop => Registry::Noop(NoopRegistry),
        })
    }

    /// Registry name (for logging/debugging)
    pub fn name(&self) -> &'static str {
        match self {
            Registry::Txt(_) => "txt",
            Registry::Noop(_) => "noop",
        }
    }

    /// Populate `state.desired` from the zone's existing records and the
    /// source records that fall inside the zone
    pub fn apply_desired_records<T, A>(
        &self,
        state: &mut ZoneState<T>,
        sources: &[SourceRecord],
        adapter: &A,
    ) -> Result<()>
    where
        T: ProviderRecord,
        A: RecordAdapter<T> + ?Sized,
    {
        match self {
            Registry::Txt(registry) => registry.apply_desired_records(state, sources, adapter),
            Registry::Noop(registry) => registry.apply_desired_records(state, sources, adapter),
        }
    }
}

/// Ordered record list that ignores repeated records
///
/// Two records are the same entry when fqdn, type and comparison key match.
pub(crate) struct DesiredSet<T> {
    records: Vec<T>,
    seen: HashSet<(String, RecordType, String)>,
}

impl<T: ProviderRecord> DesiredSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            records: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Append `record` unless an equal entry is already present
    pub(crate) fn push<A>(&mut self, record: T, adapter: &A) -> bool
    where
        A: RecordAdapter<T> + ?Sized,
    {
        let key = (
            record.dns().fqdn().to_ascii_lowercase(),
            record.dns().record_type(),
            adapter.comparison_key(&record),
        );
        if self.seen.insert(key) {
            self.records.push(record);
            true
        } else {
            false
        }
    }

    pub(crate) fn into_vec(self) -> Vec<T> {
        self.records
    }
}
