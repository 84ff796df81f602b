//! Test doubles and common utilities for contract tests
//!
//! - [`MockProvider`]: in-memory zones with call counters and failure injection
//! - [`FailingSource`]: a source whose fetch always fails
//! - [`ScriptedPrompt`]: a confirmation prompt with canned answers
//!
//! Doubles are cheap to clone; clones share state, so a test can hand one
//! clone to the reconciler and inspect another.

#![allow(dead_code)]

use async_trait::async_trait;
use dnsync_core::engine::{ConfirmPolicy, Prompt, Reconciler, erase};
use dnsync_core::error::{Error, Result};
use dnsync_core::record::{
    PlainRecord, RecordType, SourceRecord, Zone, ZoneState, normalize_fqdn,
};
use dnsync_core::registry::{Registry, TxtRegistry};
use dnsync_core::sources::StaticSource;
use dnsync_core::traits::{DnsProvider, Source};
use dnsync_core::config::ReconcilerConfig;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// An in-memory DnsProvider that tracks calls
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    zones: Vec<Zone>,
    /// Records per zone id
    records: Arc<Mutex<HashMap<String, Vec<PlainRecord>>>>,
    /// Types enrich refuses
    unsupported: Arc<Mutex<BTreeSet<RecordType>>>,
    list_zones_calls: Arc<AtomicUsize>,
    list_records_calls: Arc<AtomicUsize>,
    apply_calls: Arc<AtomicUsize>,
    fail_apply: Arc<AtomicBool>,
}

impl MockProvider {
    /// Create a provider serving `zones`, all empty
    pub fn new(name: &str, zones: &[&str]) -> Self {
        let zones: Vec<Zone> = zones
            .iter()
            .enumerate()
            .map(|(i, apex)| Zone::new(*apex, format!("{}-z{}", name, i)))
            .collect();
        let records = zones
            .iter()
            .map(|z| (z.zone_id.clone(), Vec::new()))
            .collect();

        Self {
            name: name.to_string(),
            zones,
            records: Arc::new(Mutex::new(records)),
            unsupported: Arc::new(Mutex::new(BTreeSet::new())),
            list_zones_calls: Arc::new(AtomicUsize::new(0)),
            list_records_calls: Arc::new(AtomicUsize::new(0)),
            apply_calls: Arc::new(AtomicUsize::new(0)),
            fail_apply: Arc::new(AtomicBool::new(false)),
        }
    }

    fn zone_id(&self, apex: &str) -> String {
        self.zones
            .iter()
            .find(|z| z.fqdn == normalize_fqdn(apex))
            .map(|z| z.zone_id.clone())
            .expect("zone exists")
    }

    /// Zone served under `apex`
    pub fn zone(&self, apex: &str) -> Zone {
        self.zones
            .iter()
            .find(|z| z.fqdn == normalize_fqdn(apex))
            .cloned()
            .expect("zone exists")
    }

    /// Seed a zone with records
    pub fn seed(&self, apex: &str, records: Vec<PlainRecord>) {
        let id = self.zone_id(apex);
        self.records.lock().unwrap().insert(id, records);
    }

    /// Current records of a zone
    pub fn records(&self, apex: &str) -> Vec<PlainRecord> {
        let id = self.zone_id(apex);
        self.records.lock().unwrap().get(&id).cloned().unwrap_or_default()
    }

    /// Make enrich refuse `record_type`
    pub fn refuse(&self, record_type: RecordType) {
        self.unsupported.lock().unwrap().insert(record_type);
    }

    /// Make every apply fail
    pub fn fail_apply(&self) {
        self.fail_apply.store(true, Ordering::SeqCst);
    }

    pub fn list_zones_calls(&self) -> usize {
        self.list_zones_calls.load(Ordering::SeqCst)
    }

    pub fn list_records_calls(&self) -> usize {
        self.list_records_calls.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsProvider for MockProvider {
    type Record = PlainRecord;

    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn list_zones(&self) -> Result<Vec<Zone>> {
        self.list_zones_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.zones.clone())
    }

    async fn list_records(&self, zone: &Zone) -> Result<Vec<PlainRecord>> {
        self.list_records_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&zone.zone_id)
            .cloned()
            .unwrap_or_default())
    }

    fn enrich_source_record(&self, record: &SourceRecord) -> Option<PlainRecord> {
        let record_type = record.dns.record_type();
        if record_type == RecordType::Soa || self.unsupported.lock().unwrap().contains(&record_type) {
            return None;
        }
        Some(record.dns.clone())
    }

    fn grouping_key(&self, record: &PlainRecord) -> String {
        format!("{}|{}", normalize_fqdn(record.fqdn()), record.record_type())
    }

    fn comparison_key(&self, record: &PlainRecord) -> String {
        format!("{}|{:?}|{}", self.grouping_key(record), record.ttl(), record.value())
    }

    async fn apply_changes(&self, state: &ZoneState<PlainRecord>) -> Result<()> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(Error::provider(&self.name, "injected apply failure"));
        }

        let diffs = state
            .diff
            .as_ref()
            .ok_or_else(|| Error::invariant("apply without diff"))?;
        let mut zones = self.records.lock().unwrap();
        let records = zones.entry(state.zone.zone_id.clone()).or_default();
        for diff in diffs {
            for record in &diff.to_delete {
                if let Some(pos) = records.iter().position(|r| r == record) {
                    records.remove(pos);
                }
            }
        }
        for diff in diffs {
            records.extend(diff.to_create.iter().cloned());
        }
        Ok(())
    }
}

/// A source whose fetch always fails
pub struct FailingSource;

#[async_trait]
impl Source for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    async fn list_records(&self) -> Result<Vec<SourceRecord>> {
        Err(Error::http("connection refused"))
    }
}

/// Prompt that declines any change set mentioning one of `decline`
pub struct ScriptedPrompt {
    decline: Vec<String>,
    asked: Arc<AtomicUsize>,
}

impl ScriptedPrompt {
    pub fn declining(decline: &[&str]) -> (Self, Arc<AtomicUsize>) {
        let asked = Arc::new(AtomicUsize::new(0));
        (
            Self {
                decline: decline.iter().map(|s| s.to_string()).collect(),
                asked: asked.clone(),
            },
            asked,
        )
    }
}

#[async_trait]
impl Prompt for ScriptedPrompt {
    async fn confirm(&self, summary: &str) -> Result<bool> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        Ok(!self.decline.iter().any(|d| summary.contains(d.as_str())))
    }
}

/// Source record for an A record
pub fn a(fqdn: &str, ip: &str, key: &str) -> SourceRecord {
    SourceRecord::new(PlainRecord::a(fqdn, ip), key)
}

/// Heritage TXT content
pub fn heritage(owner: &str, resource: Option<&str>, types: &[&str]) -> String {
    let mut content = format!("heritage=external-dns,external-dns/owner={}", owner);
    if let Some(resource) = resource {
        content.push_str(&format!(",external-dns/resource={}", resource));
    }
    for t in types {
        content.push_str(&format!(",record-type/{}=managed", t));
    }
    content
}

/// TXT registry owned by `owner`
pub fn txt_registry(owner: &str) -> Registry {
    Registry::Txt(TxtRegistry::new(owner))
}

/// Reconciler over one static source and the given providers
pub fn reconciler(
    registry: Registry,
    confirm: ConfirmPolicy,
    source: &StaticSource,
    providers: &[&MockProvider],
) -> (Reconciler, mpsc::Receiver<dnsync_core::EngineEvent>) {
    let (mut reconciler, events) =
        Reconciler::new(registry, confirm, &ReconcilerConfig::default()).expect("valid config");
    reconciler.add_source(Arc::new(source.clone()));
    for provider in providers {
        reconciler.add_provider(erase((*provider).clone()));
    }
    (reconciler, events)
}

/// Drain every event currently queued
pub fn drain(events: &mut mpsc::Receiver<dnsync_core::EngineEvent>) -> Vec<dnsync_core::EngineEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
