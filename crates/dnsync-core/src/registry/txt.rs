//! TXT-backed ownership registry
//!
//! Ownership of an fqdn is stored next to it as a heritage TXT record (see
//! [`Heritage`]) at `<txt_prefix><fqdn>`. The record names the owner and the
//! record types it manages. Controllers with different owner ids can share
//! a zone: each one only writes the (fqdn, type) slots it owns, and leaves
//! every other record exactly as it found it.
//!
//! ## Per-fqdn decision
//!
//! For every fqdn that sources want, or that we already hold a heritage
//! record for:
//!
//! 1. Classify the heritage records found there as ours, adoptable (owner
//!    listed in `auto_adopt_from_owner_ids`) or foreign.
//! 2. Types claimed by our own heritage stay ours. An unscoped heritage of
//!    ours (older format) claims A, AAAA and CNAME.
//! 3. Every other desired type is admitted only if no foreign heritage
//!    claims it and no plain record of that type already exists. Adopting a
//!    heritage deletes it and lifts the plain-record check for the types it
//!    claimed. An unscoped foreign heritage blocks every type.
//! 4. Desired records of admitted types are emitted; the rest are dropped
//!    with a warning.
//! 5. A fresh heritage lists the admitted types that were emitted. If there
//!    are none, no heritage is written and the old one is deleted.
//!
//! Existing records outside the admitted (fqdn, type) slots pass through
//! untouched.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::heritage::{Heritage, is_heritage};
use super::DesiredSet;
use crate::error::{Error, Result};
use crate::record::{
    PlainRecord, ProviderRecord, RecordType, SourceRecord, ZoneState, normalize_fqdn,
};
use crate::traits::RecordAdapter;

/// Types an unscoped heritage of ours is taken to manage
const LEGACY_MANAGED_TYPES: [RecordType; 3] = [RecordType::A, RecordType::Aaaa, RecordType::Cname];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standing {
    Ours,
    Adoptable,
    Foreign,
}

/// A heritage record found in the zone
struct HeritageEntry {
    /// Index into `ZoneState::existing`
    index: usize,
    /// `None` when the record starts with `heritage=` but does not parse
    heritage: Option<Heritage>,
    standing: Standing,
}

impl HeritageEntry {
    /// Claimed types; `None` means every type
    fn types(&self) -> Option<&BTreeSet<RecordType>> {
        self.heritage.as_ref().and_then(|h| h.types.as_ref())
    }

    fn owner(&self) -> &str {
        self.heritage.as_ref().map_or("<malformed>", |h| h.owner.as_str())
    }
}

/// Ownership decision for one fqdn
struct FqdnPlan {
    /// Slots whose existing records are replaced by desired ones
    allowed: BTreeSet<RecordType>,
    /// Existing heritage records to delete
    dropped_heritage: BTreeSet<usize>,
    /// Resource keys with a requested record that was not emitted
    unwritten: BTreeSet<String>,
}

/// Registry that records ownership in heritage TXT records
#[derive(Debug, Clone)]
pub struct TxtRegistry {
    owner_id: String,
    adopt_from: BTreeSet<String>,
    prefix: String,
}

impl TxtRegistry {
    /// Create a registry for `owner_id` with no prefix and no adoption
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            adopt_from: BTreeSet::new(),
            prefix: String::new(),
        }
    }

    /// Set the prefix prepended to managed fqdns to name heritage records
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().to_ascii_lowercase();
        self
    }

    /// Allow taking over fqdns owned by these owner ids
    pub fn with_adopt_from<I, S>(mut self, owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.adopt_from = owners.into_iter().map(Into::into).collect();
        self
    }

    /// Owner id written into heritage records
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Name of the heritage record for `fqdn`
    pub fn heritage_name(&self, fqdn: &str) -> String {
        format!("{}{}", self.prefix, normalize_fqdn(fqdn))
    }

    /// Managed fqdn a heritage record named `name` refers to
    fn managed_fqdn(&self, name: &str) -> Option<String> {
        normalize_fqdn(name)
            .strip_prefix(&self.prefix)
            .filter(|rest| !rest.is_empty())
            .map(str::to_string)
    }

    fn standing(&self, heritage: Option<&Heritage>) -> Standing {
        match heritage {
            Some(h) if h.owner == self.owner_id => Standing::Ours,
            Some(h) if self.adopt_from.contains(&h.owner) => Standing::Adoptable,
            _ => Standing::Foreign,
        }
    }

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
        // Split existing records into heritage claims and plain records
        let mut heritages: BTreeMap<String, Vec<HeritageEntry>> = BTreeMap::new();
        let mut heritage_fqdn: BTreeMap<usize, String> = BTreeMap::new();
        let mut plain_types: BTreeMap<String, BTreeSet<RecordType>> = BTreeMap::new();
        for (index, record) in state.existing.iter().enumerate() {
            let dns = record.dns();
            let managed = match dns {
                PlainRecord::Txt { fqdn, content, .. } if is_heritage(content) => {
                    self.managed_fqdn(fqdn).map(|managed| (managed, Heritage::parse(content)))
                }
                _ => None,
            };

            match managed {
                Some((fqdn, heritage)) => {
                    if heritage.is_none() {
                        warn!(
                            "Malformed heritage record at {}, treating it as a foreign claim on every type",
                            dns.fqdn()
                        );
                    }
                    let standing = self.standing(heritage.as_ref());
                    heritage_fqdn.insert(index, fqdn.clone());
                    heritages.entry(fqdn).or_default().push(HeritageEntry {
                        index,
                        heritage,
                        standing,
                    });
                }
                None => {
                    plain_types
                        .entry(normalize_fqdn(dns.fqdn()))
                        .or_default()
                        .insert(dns.record_type());
                }
            }
        }

        let mut wanted: BTreeMap<String, Vec<&SourceRecord>> = BTreeMap::new();
        for source in sources {
            wanted
                .entry(normalize_fqdn(source.dns.fqdn()))
                .or_default()
                .push(source);
        }

        let owned: BTreeSet<String> = heritages
            .iter()
            .filter(|(_, entries)| entries.iter().any(|e| e.standing == Standing::Ours))
            .map(|(fqdn, _)| fqdn.clone())
            .collect();

        let managed_fqdns: BTreeSet<&String> = wanted.keys().chain(owned.iter()).collect();

        let mut generated = Vec::new();
        let mut plans: BTreeMap<String, FqdnPlan> = BTreeMap::new();
        for fqdn in managed_fqdns {
            let entries = heritages.get(fqdn).map(Vec::as_slice).unwrap_or_default();
            let requested = wanted.get(fqdn).map(Vec::as_slice).unwrap_or_default();

            if owned.contains(fqdn) && !entries.iter().any(|e| e.standing == Standing::Ours) {
                return Err(Error::invariant(format!(
                    "expected an owned heritage record for {}",
                    fqdn
                )));
            }

            let plan = self.plan_fqdn(
                fqdn,
                entries,
                requested,
                plain_types.get(fqdn),
                &mut generated,
                adapter,
            )?;
            plans.insert(fqdn.clone(), plan);
        }

        state.unwritten = plans
            .values()
            .flat_map(|plan| plan.unwritten.iter().cloned())
            .collect();

        let mut desired = DesiredSet::new();
        for (index, record) in state.existing.iter().enumerate() {
            let keep = match heritage_fqdn.get(&index) {
                Some(fqdn) => plans
                    .get(fqdn)
                    .is_none_or(|plan| !plan.dropped_heritage.contains(&index)),
                None => {
                    let dns = record.dns();
                    plans
                        .get(&normalize_fqdn(dns.fqdn()))
                        .is_none_or(|plan| !plan.allowed.contains(&dns.record_type()))
                }
            };
            if keep {
                desired.push(record.clone(), adapter);
            }
        }
        for record in generated {
            desired.push(record, adapter);
        }

        state.desired = Some(desired.into_vec());
        Ok(())
    }

    /// Decide ownership of one fqdn and emit its desired records
    fn plan_fqdn<T, A>(
        &self,
        fqdn: &str,
        entries: &[HeritageEntry],
        requested: &[&SourceRecord],
        plain_types: Option<&BTreeSet<RecordType>>,
        out: &mut Vec<T>,
        adapter: &A,
    ) -> Result<FqdnPlan>
    where
        T: ProviderRecord,
        A: RecordAdapter<T> + ?Sized,
    {
        let desired_types: BTreeSet<RecordType> =
            requested.iter().map(|s| s.dns.record_type()).collect();

        let mut claimed = BTreeSet::new();
        let mut ours = BTreeSet::new();
        let mut adoptable = BTreeSet::new();
        let mut exempt = BTreeSet::new();
        let mut exempt_all = false;
        let mut blocked = BTreeSet::new();
        let mut blocked_all = false;
        for entry in entries {
            match (entry.standing, entry.types()) {
                (Standing::Ours, Some(types)) => claimed.extend(types.iter().copied()),
                (Standing::Ours, None) => claimed.extend(LEGACY_MANAGED_TYPES),
                (Standing::Adoptable, Some(types)) => exempt.extend(types.iter().copied()),
                (Standing::Adoptable, None) => exempt_all = true,
                (Standing::Foreign, Some(types)) => blocked.extend(types.iter().copied()),
                (Standing::Foreign, None) => blocked_all = true,
            }
            match entry.standing {
                Standing::Ours => ours.insert(entry.index),
                Standing::Adoptable => adoptable.insert(entry.index),
                Standing::Foreign => false,
            };
        }

        let mut allowed = claimed.clone();
        for &record_type in desired_types.difference(&claimed) {
            let holder = entries
                .iter()
                .find(|e| e.standing == Standing::Foreign && e.types().is_none_or(|t| t.contains(&record_type)));
            if blocked_all || blocked.contains(&record_type) {
                let owner = holder.map_or("another owner", HeritageEntry::owner);
                warn!(
                    "{}",
                    Error::ownership_conflict(format!(
                        "{} {} is owned by {}, not managing it",
                        record_type, fqdn, owner
                    ))
                );
                continue;
            }
            let occupied = plain_types.is_some_and(|types| types.contains(&record_type));
            if occupied && !(exempt_all || exempt.contains(&record_type)) {
                warn!(
                    "{}",
                    Error::ownership_conflict(format!(
                        "{} {} already exists without an ownership record, not managing it",
                        record_type, fqdn
                    ))
                );
                continue;
            }
            allowed.insert(record_type);
        }

        let mut managed = BTreeSet::new();
        let mut unwritten = BTreeSet::new();
        for source in requested {
            let record_type = source.dns.record_type();
            if !allowed.contains(&record_type) {
                debug!("Dropping {} from {}", source.dns, source.resource_key);
                unwritten.insert(source.resource_key.clone());
                continue;
            }
            match adapter.enrich_source_record(source) {
                Some(record) => {
                    managed.insert(record_type);
                    out.push(record);
                }
                None => {
                    warn!(
                        "{}",
                        Error::unsupported(format!(
                            "{} (from {}) cannot be stored by this provider",
                            source.dns, source.resource_key
                        ))
                    );
                    unwritten.insert(source.resource_key.clone());
                }
            }
        }

        let mut dropped_heritage = ours;
        if !managed.is_empty() {
            // Adopted heritage is only removed together with its replacement
            dropped_heritage.extend(adoptable);
            out.push(self.heritage_record(fqdn, managed, requested, adapter)?);
        }

        debug!(
            "Ownership for {}: allowed={:?} desired={:?}",
            fqdn, allowed, desired_types
        );
        Ok(FqdnPlan {
            allowed,
            dropped_heritage,
            unwritten,
        })
    }

    /// Build the heritage record for `fqdn`
    ///
    /// The resource label is set only when a single resource maps to the
    /// fqdn.
    fn heritage_record<T, A>(
        &self,
        fqdn: &str,
        managed: BTreeSet<RecordType>,
        requested: &[&SourceRecord],
        adapter: &A,
    ) -> Result<T>
    where
        A: RecordAdapter<T> + ?Sized,
    {
        let resources: BTreeSet<&str> = requested.iter().map(|s| s.resource_key.as_str()).collect();
        let mut heritage = Heritage::new(self.owner_id.clone(), managed);
        let mut resource_key = String::new();
        if let [single] = resources.iter().copied().collect::<Vec<_>>().as_slice() {
            heritage = heritage.with_resource(*single);
            resource_key = single.to_string();
        }

        let source = SourceRecord::new(
            PlainRecord::txt(self.heritage_name(fqdn), heritage.to_string()),
            resource_key,
        );
        adapter.enrich_source_record(&source).ok_or_else(|| {
            Error::invariant(format!(
                "provider rejected the heritage TXT record for {}",
                fqdn
            ))
        })
    }
}
