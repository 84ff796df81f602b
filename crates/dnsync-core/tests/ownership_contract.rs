//! Contract Test: Ownership Registry
//!
//! Constraints verified:
//! - Managed records are always written together with a heritage record
//! - Heritage records of other owners block management of the types they claim
//! - Adoption happens only for configured owners, in a single diff batch
//! - Records nobody asked for are collected only where we hold ownership
//! - The resource label appears only when one resource maps to an fqdn
//! - Repeated records nobody owns are never deleted
//! - Resources with a record left out are not reported back
//!
//! If this test fails, controllers sharing a zone can overwrite each other.

mod common;

use common::*;
use dnsync_core::build_diff;
use dnsync_core::engine::ConfirmPolicy;
use dnsync_core::error::Error;
use dnsync_core::record::{DiffKind, PlainRecord, RecordType, SourceRecord, ZoneState};
use dnsync_core::registry::{NoopRegistry, Registry, TxtRegistry};
use dnsync_core::sources::StaticSource;
use dnsync_core::traits::ProviderAdapter;

const APP: &str = "app.example.com";

/// Run the registry over `existing` and return the desired records
fn desired(
    registry: &Registry,
    provider: &MockProvider,
    existing: Vec<PlainRecord>,
    sources: &[SourceRecord],
) -> ZoneState<PlainRecord> {
    let mut state = ZoneState::new(provider.zone("example.com"), existing);
    registry
        .apply_desired_records(&mut state, sources, &ProviderAdapter(provider))
        .unwrap();
    state
}

fn txt_at(fqdn: &str, content: String) -> PlainRecord {
    PlainRecord::txt(fqdn, content)
}

#[test]
fn fresh_fqdn_gets_record_and_heritage() {
    let provider = MockProvider::new("mock", &["example.com"]);
    let state = desired(
        &txt_registry("cluster-a"),
        &provider,
        vec![],
        &[a(APP, "1.1.1.1", "svc/app")],
    );

    assert_eq!(
        state.desired.unwrap(),
        vec![
            PlainRecord::a(APP, "1.1.1.1"),
            txt_at(APP, heritage("cluster-a", Some("svc/app"), &["A"])),
        ]
    );
}

#[test]
fn resource_label_dropped_for_shared_fqdn() {
    let provider = MockProvider::new("mock", &["example.com"]);
    let state = desired(
        &txt_registry("cluster-a"),
        &provider,
        vec![],
        &[a(APP, "1.1.1.1", "svc/one"), a(APP, "2.2.2.2", "svc/two")],
    );

    let records = state.desired.unwrap();
    assert!(records.contains(&txt_at(APP, heritage("cluster-a", None, &["A"]))));
    assert_eq!(records.len(), 3);
}

#[test]
fn unscoped_legacy_heritage_blocks_everything() {
    let provider = MockProvider::new("mock", &["example.com"]);
    let existing = vec![
        PlainRecord::a(APP, "9.9.9.9"),
        txt_at(APP, heritage("legacy", None, &[])),
    ];
    let sources = [
        a(APP, "1.1.1.1", "svc/app"),
        SourceRecord::new(PlainRecord::aaaa(APP, "::1"), "svc/app"),
    ];

    let mut state = desired(&txt_registry("cluster-a"), &provider, existing.clone(), &sources);
    assert_eq!(state.desired.as_ref().unwrap(), &existing);
    assert!(build_diff(&state, &ProviderAdapter(&provider)).unwrap().is_empty());

    state.desired = None;
    assert!(matches!(
        build_diff(&state, &ProviderAdapter(&provider)),
        Err(Error::Invariant(_))
    ));
}

#[test]
fn configured_adoption_replaces_heritage_in_one_batch() {
    let provider = MockProvider::new("mock", &["example.com"]);
    let legacy = txt_at(APP, heritage("legacy", None, &[]));
    let existing = vec![PlainRecord::a(APP, "9.9.9.9"), legacy.clone()];
    let registry = Registry::Txt(TxtRegistry::new("cluster-a").with_adopt_from(["legacy"]));

    let state = desired(&registry, &provider, existing, &[a(APP, "1.1.1.1", "svc/app")]);
    let diffs = build_diff(&state, &ProviderAdapter(&provider)).unwrap();

    let heritage_deletions: Vec<&PlainRecord> = diffs
        .iter()
        .flat_map(|d| d.to_delete.iter())
        .filter(|r| r.record_type() == RecordType::Txt)
        .collect();
    let heritage_creations: Vec<&PlainRecord> = diffs
        .iter()
        .flat_map(|d| d.to_create.iter())
        .filter(|r| r.record_type() == RecordType::Txt)
        .collect();

    assert_eq!(heritage_deletions, vec![&legacy]);
    assert_eq!(
        heritage_creations,
        vec![&txt_at(APP, heritage("cluster-a", Some("svc/app"), &["A"]))]
    );
    assert!(diffs.iter().any(|d| d.to_create.contains(&PlainRecord::a(APP, "1.1.1.1"))));
    assert!(diffs.iter().any(|d| d.to_delete.contains(&PlainRecord::a(APP, "9.9.9.9"))));
}

#[test]
fn adoptable_heritage_kept_when_nothing_is_adopted() {
    let provider = MockProvider::new("mock", &["example.com"]);
    let existing = vec![
        PlainRecord::a(APP, "9.9.9.9"),
        txt_at(APP, heritage("legacy", None, &["A"])),
    ];
    let registry = Registry::Txt(TxtRegistry::new("cluster-a").with_adopt_from(["legacy"]));

    // Nothing is desired at APP, so the legacy claim must stay
    let state = desired(&registry, &provider, existing.clone(), &[]);
    assert_eq!(state.desired.unwrap(), existing);
}

#[test]
fn unowned_plain_record_is_not_taken_over() {
    let provider = MockProvider::new("mock", &["example.com"]);
    let existing = vec![PlainRecord::a(APP, "9.9.9.9")];

    let state = desired(
        &txt_registry("cluster-a"),
        &provider,
        existing.clone(),
        &[a(APP, "1.1.1.1", "svc/app")],
    );

    assert_eq!(state.desired.unwrap(), existing);
}

#[test]
fn scoped_foreign_heritage_leaves_other_types_free() {
    let provider = MockProvider::new("mock", &["example.com"]);
    let foreign = txt_at(APP, heritage("cluster-b", None, &["A"]));
    let existing = vec![PlainRecord::a(APP, "9.9.9.9"), foreign.clone()];
    let sources = [
        a(APP, "1.1.1.1", "svc/app"),
        SourceRecord::new(PlainRecord::aaaa(APP, "::1"), "svc/app"),
    ];

    let state = desired(&txt_registry("cluster-a"), &provider, existing, &sources);
    let records = state.desired.unwrap();

    assert!(records.contains(&PlainRecord::a(APP, "9.9.9.9")));
    assert!(!records.contains(&PlainRecord::a(APP, "1.1.1.1")));
    assert!(records.contains(&PlainRecord::aaaa(APP, "::1")));
    assert!(records.contains(&foreign));
    assert!(records.contains(&txt_at(APP, heritage("cluster-a", Some("svc/app"), &["AAAA"]))));
}

#[test]
fn malformed_heritage_counts_as_foreign_claim() {
    let provider = MockProvider::new("mock", &["example.com"]);
    let existing = vec![txt_at(APP, "heritage=external-dns,garbage".to_string())];

    let state = desired(
        &txt_registry("cluster-a"),
        &provider,
        existing.clone(),
        &[a(APP, "1.1.1.1", "svc/app")],
    );

    assert_eq!(state.desired.unwrap(), existing);
}

#[test]
fn owned_fqdn_without_sources_is_collected() {
    let provider = MockProvider::new("mock", &["example.com"]);
    let ours = txt_at(APP, heritage("cluster-a", Some("svc/app"), &["A"]));
    let unrelated = PlainRecord::a("other.example.com", "7.7.7.7");
    let existing = vec![PlainRecord::a(APP, "1.1.1.1"), ours, unrelated.clone()];

    let state = desired(&txt_registry("cluster-a"), &provider, existing, &[]);
    let diffs = build_diff(&state, &ProviderAdapter(&provider)).unwrap();

    assert_eq!(state.desired.unwrap(), vec![unrelated]);
    assert_eq!(diffs.len(), 2);
    assert!(diffs.iter().all(|d| d.kind == DiffKind::Deletion));
}

#[test]
fn prefix_names_heritage_records() {
    let provider = MockProvider::new("mock", &["example.com"]);
    let registry = Registry::Txt(TxtRegistry::new("cluster-a").with_prefix("_owner."));

    let state = desired(&registry, &provider, vec![], &[a(APP, "1.1.1.1", "svc/app")]);

    assert!(state.desired.unwrap().contains(&txt_at(
        "_owner.app.example.com",
        heritage("cluster-a", Some("svc/app"), &["A"])
    )));
}

#[test]
fn refused_heritage_is_an_invariant_violation() {
    let provider = MockProvider::new("mock", &["example.com"]);
    provider.refuse(RecordType::Txt);

    let mut state = ZoneState::new(provider.zone("example.com"), vec![]);
    let result = txt_registry("cluster-a").apply_desired_records(
        &mut state,
        &[a(APP, "1.1.1.1", "svc/app")],
        &ProviderAdapter(&provider),
    );

    assert!(matches!(result, Err(Error::Invariant(_))));
}

#[test]
fn unsupported_source_record_is_dropped() {
    let provider = MockProvider::new("mock", &["example.com"]);
    provider.refuse(RecordType::Aaaa);

    let state = desired(
        &txt_registry("cluster-a"),
        &provider,
        vec![],
        &[SourceRecord::new(PlainRecord::aaaa(APP, "::1"), "svc/app")],
    );

    // Nothing was written, so nothing is claimed either
    assert!(state.desired.unwrap().is_empty());
}

#[test]
fn noop_registry_keeps_only_apex_soa_and_ns() {
    let provider = MockProvider::new("mock", &["example.com"]);
    let ns = PlainRecord::Ns {
        fqdn: "example.com".into(),
        ttl: None,
        target: "ns1.example.net".into(),
    };
    let existing = vec![ns.clone(), PlainRecord::a("old.example.com", "9.9.9.9")];

    let state = desired(
        &Registry::Noop(NoopRegistry),
        &provider,
        existing,
        &[a(APP, "1.1.1.1", "svc/app")],
    );

    assert_eq!(state.desired.unwrap(), vec![ns, PlainRecord::a(APP, "1.1.1.1")]);
}

#[tokio::test]
async fn foreign_claim_survives_later_passes() {
    let provider = MockProvider::new("mock", &["example.com"]);

    // First owner takes the fqdn
    let first = StaticSource::new("first", vec![a(APP, "1.1.1.1", "svc/first")]);
    let (owner_a, _events) = reconciler(
        txt_registry("cluster-a"),
        ConfirmPolicy::AutoApprove,
        &first,
        &[&provider],
    );
    owner_a.run_once().await.unwrap();

    // Second owner wants a competing A record, twice
    let second = StaticSource::new("second", vec![a(APP, "2.2.2.2", "svc/second")]);
    let (owner_b, _events) = reconciler(
        txt_registry("cluster-b"),
        ConfirmPolicy::AutoApprove,
        &second,
        &[&provider],
    );
    for _ in 0..2 {
        let summary = owner_b.run_once().await.unwrap();
        assert_eq!(summary.zones_applied, 0);
    }

    let records = provider.records("example.com");
    assert!(records.contains(&PlainRecord::a(APP, "1.1.1.1")));
    assert!(!records.contains(&PlainRecord::a(APP, "2.2.2.2")));
    assert_eq!(provider.apply_calls(), 1);
}

#[tokio::test]
async fn duplicate_unowned_records_survive_a_pass() {
    let provider = MockProvider::new("mock", &["example.com"]);
    let other = PlainRecord::a("other.example.com", "9.9.9.9");
    provider.seed("example.com", vec![other.clone(), other.clone()]);

    let source = StaticSource::new("static", vec![a(APP, "1.1.1.1", "svc/app")]);
    let (reconciler, _events) = reconciler(
        txt_registry("cluster-a"),
        ConfirmPolicy::AutoApprove,
        &source,
        &[&provider],
    );
    let summary = reconciler.run_once().await.unwrap();

    assert_eq!(summary.changes.deletes, 0);
    let records = provider.records("example.com");
    assert_eq!(records.iter().filter(|r| **r == other).count(), 2);
    assert!(records.contains(&PlainRecord::a(APP, "1.1.1.1")));
}

#[tokio::test]
async fn blocked_resource_is_not_reported_back() {
    let provider = MockProvider::new("mock", &["example.com"]);
    let existing = vec![
        txt_at(APP, heritage("legacy", None, &[])),
        PlainRecord::a(APP, "9.9.9.9"),
    ];
    provider.seed("example.com", existing.clone());

    let source = StaticSource::new(
        "static",
        vec![
            a(APP, "1.1.1.1", "svc/blocked"),
            a("free.example.com", "2.2.2.2", "svc/free"),
        ],
    );
    let (reconciler, _events) = reconciler(
        txt_registry("cluster-a"),
        ConfirmPolicy::AutoApprove,
        &source,
        &[&provider],
    );

    // Twice: once with changes in the zone, once with none
    for _ in 0..2 {
        let summary = reconciler.run_once().await.unwrap();
        assert_eq!(summary.observed, 1);
    }

    let observed = source.observed().await;
    assert!(observed.contains("svc/free"));
    assert!(!observed.contains("svc/blocked"));
    let records = provider.records("example.com");
    assert!(existing.iter().all(|r| records.contains(r)));
    assert!(!records.contains(&PlainRecord::a(APP, "1.1.1.1")));
}

#[tokio::test]
async fn unsupported_record_is_not_reported_back() {
    let provider = MockProvider::new("mock", &["example.com"]);
    provider.refuse(RecordType::Aaaa);
    let source = StaticSource::new(
        "static",
        vec![
            a(APP, "1.1.1.1", "svc/app"),
            SourceRecord::new(PlainRecord::aaaa(APP, "::1"), "svc/app"),
        ],
    );
    let (reconciler, _events) = reconciler(
        Registry::Noop(NoopRegistry),
        ConfirmPolicy::AutoApprove,
        &source,
        &[&provider],
    );

    let summary = reconciler.run_once().await.unwrap();

    assert_eq!(summary.zones_applied, 1);
    assert_eq!(summary.observed, 0);
    assert!(source.observed().await.is_empty());
}
