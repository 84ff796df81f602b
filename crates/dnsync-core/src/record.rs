//! Record model shared by every part of the reconciler
//!
//! - [`Zone`]: a DNS administrative domain at a provider
//! - [`PlainRecord`]: provider-independent DNS record, tagged by type
//! - [`SourceRecord`]: a desired record plus the resource it came from
//! - [`ZoneState`]: per-zone, per-pass working set
//! - [`RecordGroupDiff`]: one create/update/delete decision

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A DNS zone as reported by a provider
///
/// Zones are listed fresh on every pass and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Apex of the zone (e.g. "example.com")
    pub fqdn: String,
    /// Provider display name, if it differs from the apex
    #[serde(default)]
    pub zone_name: Option<String>,
    /// Opaque provider zone identifier
    pub zone_id: String,
}

impl Zone {
    /// Create a new zone
    pub fn new(fqdn: impl Into<String>, zone_id: impl Into<String>) -> Self {
        Self {
            fqdn: normalize_fqdn(&fqdn.into()),
            zone_name: None,
            zone_id: zone_id.into(),
        }
    }

    /// Whether `fqdn` is the apex of this zone or lies below it
    pub fn contains(&self, fqdn: &str) -> bool {
        let fqdn = normalize_fqdn(fqdn);
        fqdn == self.fqdn
            || (fqdn.len() > self.fqdn.len()
                && fqdn.ends_with(&self.fqdn)
                && fqdn.as_bytes()[fqdn.len() - self.fqdn.len() - 1] == b'.')
    }

    /// Whether `fqdn` is the apex of this zone
    pub fn is_apex(&self, fqdn: &str) -> bool {
        normalize_fqdn(fqdn) == self.fqdn
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.zone_name {
            Some(name) if *name != self.fqdn => write!(f, "{} ({})", self.fqdn, name),
            _ => write!(f, "{}", self.fqdn),
        }
    }
}

/// Lowercase a name and strip a trailing root dot
pub fn normalize_fqdn(fqdn: &str) -> String {
    fqdn.trim_end_matches('.').to_ascii_lowercase()
}

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Ns,
    Txt,
    Mx,
    Srv,
    Soa,
}

impl RecordType {
    /// All supported record types
    pub const ALL: [RecordType; 8] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Ns,
        RecordType::Txt,
        RecordType::Mx,
        RecordType::Srv,
        RecordType::Soa,
    ];

    /// Wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Ns => "NS",
            RecordType::Txt => "TXT",
            RecordType::Mx => "MX",
            RecordType::Srv => "SRV",
            RecordType::Soa => "SOA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::unsupported(format!("record type {}", s)))
    }
}

/// Provider-independent DNS record
///
/// Equality covers every field, TTL included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum PlainRecord {
    A {
        fqdn: String,
        #[serde(default)]
        ttl: Option<u32>,
        target: String,
    },
    Aaaa {
        fqdn: String,
        #[serde(default)]
        ttl: Option<u32>,
        target: String,
    },
    Cname {
        fqdn: String,
        #[serde(default)]
        ttl: Option<u32>,
        target: String,
    },
    Ns {
        fqdn: String,
        #[serde(default)]
        ttl: Option<u32>,
        target: String,
    },
    Txt {
        fqdn: String,
        #[serde(default)]
        ttl: Option<u32>,
        content: String,
    },
    Mx {
        fqdn: String,
        #[serde(default)]
        ttl: Option<u32>,
        priority: u16,
        target: String,
    },
    Srv {
        fqdn: String,
        #[serde(default)]
        ttl: Option<u32>,
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    Soa {
        fqdn: String,
        #[serde(default)]
        ttl: Option<u32>,
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
}

impl PlainRecord {
    /// Create an A record
    pub fn a(fqdn: impl Into<String>, target: impl Into<String>) -> Self {
        PlainRecord::A {
            fqdn: fqdn.into(),
            ttl: None,
            target: target.into(),
        }
    }

    /// Create an AAAA record
    pub fn aaaa(fqdn: impl Into<String>, target: impl Into<String>) -> Self {
        PlainRecord::Aaaa {
            fqdn: fqdn.into(),
            ttl: None,
            target: target.into(),
        }
    }

    /// Create a CNAME record
    pub fn cname(fqdn: impl Into<String>, target: impl Into<String>) -> Self {
        PlainRecord::Cname {
            fqdn: fqdn.into(),
            ttl: None,
            target: target.into(),
        }
    }

    /// Create a TXT record
    pub fn txt(fqdn: impl Into<String>, content: impl Into<String>) -> Self {
        PlainRecord::Txt {
            fqdn: fqdn.into(),
            ttl: None,
            content: content.into(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, value: u32) -> Self {
        match &mut self {
            PlainRecord::A { ttl, .. }
            | PlainRecord::Aaaa { ttl, .. }
            | PlainRecord::Cname { ttl, .. }
            | PlainRecord::Ns { ttl, .. }
            | PlainRecord::Txt { ttl, .. }
            | PlainRecord::Mx { ttl, .. }
            | PlainRecord::Srv { ttl, .. }
            | PlainRecord::Soa { ttl, .. } => *ttl = Some(value),
        }
        self
    }

    /// Record name
    pub fn fqdn(&self) -> &str {
        match self {
            PlainRecord::A { fqdn, .. }
            | PlainRecord::Aaaa { fqdn, .. }
            | PlainRecord::Cname { fqdn, .. }
            | PlainRecord::Ns { fqdn, .. }
            | PlainRecord::Txt { fqdn, .. }
            | PlainRecord::Mx { fqdn, .. }
            | PlainRecord::Srv { fqdn, .. }
            | PlainRecord::Soa { fqdn, .. } => fqdn,
        }
    }

    /// Record TTL, if set
    pub fn ttl(&self) -> Option<u32> {
        match self {
            PlainRecord::A { ttl, .. }
            | PlainRecord::Aaaa { ttl, .. }
            | PlainRecord::Cname { ttl, .. }
            | PlainRecord::Ns { ttl, .. }
            | PlainRecord::Txt { ttl, .. }
            | PlainRecord::Mx { ttl, .. }
            | PlainRecord::Srv { ttl, .. }
            | PlainRecord::Soa { ttl, .. } => *ttl,
        }
    }

    /// Record type
    pub fn record_type(&self) -> RecordType {
        match self {
            PlainRecord::A { .. } => RecordType::A,
            PlainRecord::Aaaa { .. } => RecordType::Aaaa,
            PlainRecord::Cname { .. } => RecordType::Cname,
            PlainRecord::Ns { .. } => RecordType::Ns,
            PlainRecord::Txt { .. } => RecordType::Txt,
            PlainRecord::Mx { .. } => RecordType::Mx,
            PlainRecord::Srv { .. } => RecordType::Srv,
            PlainRecord::Soa { .. } => RecordType::Soa,
        }
    }

    /// Type-specific payload rendered in zone-file order
    pub fn value(&self) -> String {
        match self {
            PlainRecord::A { target, .. }
            | PlainRecord::Aaaa { target, .. }
            | PlainRecord::Cname { target, .. }
            | PlainRecord::Ns { target, .. } => target.clone(),
            PlainRecord::Txt { content, .. } => content.clone(),
            PlainRecord::Mx {
                priority, target, ..
            } => format!("{} {}", priority, target),
            PlainRecord::Srv {
                priority,
                weight,
                port,
                target,
                ..
            } => format!("{} {} {} {}", priority, weight, port, target),
            PlainRecord::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
                ..
            } => format!(
                "{} {} {} {} {} {} {}",
                mname, rname, serial, refresh, retry, expire, minimum
            ),
        }
    }
}

impl fmt::Display for PlainRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.record_type(), self.fqdn())?;
        if let Some(ttl) = self.ttl() {
            write!(f, " {}", ttl)?;
        }
        write!(f, " {}", self.value())
    }
}

/// A desired record discovered by a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// The desired record
    pub dns: PlainRecord,
    /// Identity of the originating resource (e.g. "ingress/default/web")
    pub resource_key: String,
    /// Raw annotations of the originating resource
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl SourceRecord {
    /// Create a new source record without annotations
    pub fn new(dns: PlainRecord, resource_key: impl Into<String>) -> Self {
        Self {
            dns,
            resource_key: resource_key.into(),
            annotations: BTreeMap::new(),
        }
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// A provider-owned record
///
/// Providers extend [`PlainRecord`] with private identity data (record ids,
/// proxy flags). The engine only ever reads the plain part.
pub trait ProviderRecord: Clone + fmt::Debug + Send + Sync + 'static {
    /// The provider-independent view of this record
    fn dns(&self) -> &PlainRecord;
}

impl ProviderRecord for PlainRecord {
    fn dns(&self) -> &PlainRecord {
        self
    }
}

/// Kind of change a [`RecordGroupDiff`] describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Creation,
    Update,
    Deletion,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffKind::Creation => f.write_str("creation"),
            DiffKind::Update => f.write_str("update"),
            DiffKind::Deletion => f.write_str("deletion"),
        }
    }
}

/// One decision unit for a single grouping key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordGroupDiff<T> {
    pub kind: DiffKind,
    /// Every existing record in the group
    pub existing: Vec<T>,
    /// Every desired record in the group
    pub desired: Vec<T>,
    pub to_delete: Vec<T>,
    pub to_create: Vec<T>,
    /// In-place patches. Always empty: replacement is delete + create.
    pub to_update: Vec<T>,
}

/// Per-zone working set for one pass
#[derive(Debug, Clone)]
pub struct ZoneState<T> {
    pub zone: Zone,
    /// Records currently at the provider, read fresh this pass
    pub existing: Vec<T>,
    /// Records that should exist, filled in by the ownership registry
    pub desired: Option<Vec<T>>,
    /// Changes computed by the diff engine
    pub diff: Option<Vec<RecordGroupDiff<T>>>,
    /// Resource keys with at least one source record the registry left out
    pub unwritten: BTreeSet<String>,
}

impl<T> ZoneState<T> {
    /// Create a working set from a fresh provider read
    pub fn new(zone: Zone, existing: Vec<T>) -> Self {
        Self {
            zone,
            existing,
            desired: None,
            diff: None,
            unwritten: BTreeSet::new(),
        }
    }
}
