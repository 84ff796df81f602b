//! Reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Gathering desired records from every source
//! - Reading each provider zone and letting the registry decide what to write
//! - Diffing, confirming and applying the changes
//! - Telling sources which resources are now reflected in DNS
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Sources    │─── SourceRecord ────┐
//! └─────────────┘                     │
//!                                     ▼
//!                            ┌──────────────┐
//!                            │  Reconciler  │
//!                            └──────────────┘
//!                                     │
//!         ┌───────────────────────────┼───────────────────────────┐
//!         │                           │                           │
//!         ▼                           ▼                           ▼
//! ┌─────────────┐           ┌──────────────┐           ┌─────────────┐
//! │  Registry   │           │ DnsProvider  │           │   Events    │
//! │ (ownership) │           │ (read/apply) │           │  (notify)   │
//! └─────────────┘           └──────────────┘           └─────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. Fetch all sources concurrently; any failure aborts the pass
//! 2. For each provider, then each zone, in order:
//!    read existing records, fill in desired records, diff
//! 3. Empty diff: nothing to do. Otherwise confirm and apply
//! 4. Notify sources of resources whose records are all written and in place
//!
//! Passes never overlap: the caller awaits [`Reconciler::run_once`] before
//! taking the next tick.

pub mod confirm;

pub use confirm::{ConfirmPolicy, Decision, LinePrompt, Prompt, SkipReason, StdinPrompt};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::config::ReconcilerConfig;
use crate::diff::{build_diff, render_diff, ChangeCounts};
use crate::error::{Error, Result};
use crate::record::{SourceRecord, Zone, ZoneState};
use crate::registry::Registry;
use crate::traits::{DnsProvider, ProviderAdapter, Source};

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A pass started
    PassStarted { sources: usize, providers: usize },

    /// A zone has pending changes
    ZoneDiffed {
        provider: String,
        zone: String,
        creates: usize,
        deletes: usize,
    },

    /// A zone's changes were applied
    ChangesApplied {
        provider: String,
        zone: String,
        creates: usize,
        deletes: usize,
    },

    /// A zone's changes were not applied
    ChangesSkipped {
        provider: String,
        zone: String,
        reason: SkipReason,
    },

    /// A source was told its resource is reflected in DNS
    ResourceObserved { resource_key: String },

    /// A pass finished
    PassCompleted { summary: PassSummary },

    /// A pass aborted
    PassFailed { error: String },
}

/// Outcome of one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records gathered from all sources
    pub source_records: usize,
    /// Zones read across all providers
    pub zones: usize,
    /// Zones whose changes were applied
    pub zones_applied: usize,
    /// Zones with changes that were not applied
    pub zones_skipped: usize,
    /// Records created and deleted
    pub changes: ChangeCounts,
    /// Resource keys reported back to their sources
    pub observed: usize,
}

/// Bounded event channel that drops rather than blocks
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl EventSink {
    /// Create a sink and its receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Emit an engine event
    pub fn emit(&self, event: EngineEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening.
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Inputs shared by every provider during one pass
pub struct PassContext<'a> {
    /// Records gathered from all sources this pass
    pub records: &'a [SourceRecord],
    pub registry: &'a Registry,
    pub confirm: &'a ConfirmPolicy,
    pub events: &'a EventSink,
}

/// What one provider did during a pass
#[derive(Debug, Clone, Default)]
pub struct ProviderOutcome {
    pub zones: usize,
    pub zones_applied: usize,
    pub zones_skipped: usize,
    pub changes: ChangeCounts,
    /// Resource keys whose zones are unchanged or applied
    pub reconciled: BTreeSet<String>,
    /// Resource keys with at least one zone left unapplied, or a record
    /// the registry did not write
    pub held: BTreeSet<String>,
}

/// Type-erased provider the engine drives
///
/// Every [`DnsProvider`] is an `AnyProvider`; providers with different
/// record types can therefore share one engine.
#[async_trait]
pub trait AnyProvider: Send + Sync {
    /// Provider name (for logging/debugging)
    fn name(&self) -> &str;

    /// Reconcile every zone of this provider
    async fn reconcile(&self, ctx: &PassContext<'_>) -> Result<ProviderOutcome>;
}

/// Box a provider for the engine
pub fn erase<P: DnsProvider + 'static>(provider: P) -> Box<dyn AnyProvider> {
    Box::new(provider)
}

#[async_trait]
impl<P> AnyProvider for P
where
    P: DnsProvider + 'static,
{
    fn name(&self) -> &str {
        self.provider_name()
    }

    async fn reconcile(&self, ctx: &PassContext<'_>) -> Result<ProviderOutcome> {
        let provider = self.provider_name().to_string();
        let adapter = ProviderAdapter(self);
        let zones = self.list_zones().await?;
        let mut outcome = ProviderOutcome::default();

        for zone in &zones {
            outcome.zones += 1;
            let relevant = records_for_zone(&zones, zone, ctx.records);
            let existing = self.list_records(zone).await?;
            let mut state = ZoneState::new(zone.clone(), existing);
            ctx.registry
                .apply_desired_records(&mut state, &relevant, &adapter)?;
            let diff = build_diff(&state, &adapter)?;

            // Resources with a record the registry left out stay pending
            let mut keys = BTreeSet::new();
            for record in &relevant {
                if state.unwritten.contains(&record.resource_key) {
                    outcome.held.insert(record.resource_key.clone());
                } else {
                    keys.insert(record.resource_key.clone());
                }
            }

            if diff.is_empty() {
                debug!("Zone {} at {} is up to date", zone.fqdn, provider);
                outcome.reconciled.extend(keys);
                continue;
            }

            let counts = ChangeCounts::of(&diff);
            let listing = render_diff(&diff);
            info!(
                "Zone {} at {}: {} to create, {} to delete\n{}",
                zone.fqdn, provider, counts.creates, counts.deletes, listing
            );
            ctx.events.emit(EngineEvent::ZoneDiffed {
                provider: provider.clone(),
                zone: zone.fqdn.clone(),
                creates: counts.creates,
                deletes: counts.deletes,
            });

            let summary = format!("Changes for zone {} at {}:\n{}", zone.fqdn, provider, listing);
            match ctx.confirm.decide(&summary).await? {
                Decision::Proceed => {
                    state.diff = Some(diff);
                    self.apply_changes(&state).await.map_err(|e| match e {
                        Error::ProviderApply { .. } => e,
                        other => Error::provider_apply(&provider, other.to_string()),
                    })?;

                    info!("Applied changes to zone {} at {}", zone.fqdn, provider);
                    ctx.events.emit(EngineEvent::ChangesApplied {
                        provider: provider.clone(),
                        zone: zone.fqdn.clone(),
                        creates: counts.creates,
                        deletes: counts.deletes,
                    });
                    outcome.zones_applied += 1;
                    outcome.changes += counts;
                    outcome.reconciled.extend(keys);
                }
                Decision::Skip(reason) => {
                    info!("Not applying changes to zone {} at {} ({})", zone.fqdn, provider, reason);
                    ctx.events.emit(EngineEvent::ChangesSkipped {
                        provider: provider.clone(),
                        zone: zone.fqdn.clone(),
                        reason,
                    });
                    outcome.zones_skipped += 1;
                    outcome.held.extend(keys);
                }
            }
        }

        Ok(outcome)
    }
}

/// Source records whose most specific zone among `zones` is `zone`
fn records_for_zone(zones: &[Zone], zone: &Zone, records: &[SourceRecord]) -> Vec<SourceRecord> {
    records
        .iter()
        .filter(|record| {
            let fqdn = record.dns.fqdn();
            zone.contains(fqdn)
                && !zones.iter().any(|other| {
                    other.fqdn.len() > zone.fqdn.len() && other.contains(fqdn)
                })
        })
        .cloned()
        .collect()
}

/// Core reconciliation engine
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Add sources and providers
/// 3. Call [`Reconciler::run_once()`] for every tick
///
/// ## Failure Handling
///
/// A pass stops at the first error. The error is returned so the caller can
/// decide, via [`Error::is_fatal`], whether to keep ticking.
pub struct Reconciler {
    sources: Vec<Arc<dyn Source>>,
    providers: Vec<Box<dyn AnyProvider>>,
    registry: Registry,
    confirm: ConfirmPolicy,
    events: EventSink,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields engine events
    pub fn new(
        registry: Registry,
        confirm: ConfirmPolicy,
        config: &ReconcilerConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (events, rx) = EventSink::channel(config.event_channel_capacity);
        let reconciler = Self {
            sources: Vec::new(),
            providers: Vec::new(),
            registry,
            confirm,
            events,
        };

        Ok((reconciler, rx))
    }

    /// Add a source
    pub fn add_source(&mut self, source: Arc<dyn Source>) {
        self.sources.push(source);
    }

    /// Add a provider
    pub fn add_provider(&mut self, provider: Box<dyn AnyProvider>) {
        self.providers.push(provider);
    }

    /// Builder-style [`Reconciler::add_source`]
    pub fn with_source(mut self, source: Arc<dyn Source>) -> Self {
        self.add_source(source);
        self
    }

    /// Builder-style [`Reconciler::add_provider`]
    pub fn with_provider(mut self, provider: Box<dyn AnyProvider>) -> Self {
        self.add_provider(provider);
        self
    }

    /// Configured sources
    pub fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    /// Configured registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run one reconciliation pass
    pub async fn run_once(&self) -> Result<PassSummary> {
        match self.run_pass().await {
            Ok(summary) => {
                self.events.emit(EngineEvent::PassCompleted {
                    summary: summary.clone(),
                });
                Ok(summary)
            }
            Err(e) => {
                self.events.emit(EngineEvent::PassFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_pass(&self) -> Result<PassSummary> {
        let started_at = Utc::now();
        self.events.emit(EngineEvent::PassStarted {
            sources: self.sources.len(),
            providers: self.providers.len(),
        });

        let (records, origins) = self.gather().await?;
        debug!("Gathered {} records from {} sources", records.len(), self.sources.len());

        let ctx = PassContext {
            records: &records,
            registry: &self.registry,
            confirm: &self.confirm,
            events: &self.events,
        };

        let mut total = ProviderOutcome::default();
        for provider in &self.providers {
            let outcome = provider.reconcile(&ctx).await?;
            total.zones += outcome.zones;
            total.zones_applied += outcome.zones_applied;
            total.zones_skipped += outcome.zones_skipped;
            total.changes += outcome.changes;
            total.reconciled.extend(outcome.reconciled);
            total.held.extend(outcome.held);
        }

        let observed = self.observe(&total, &origins).await;

        let summary = PassSummary {
            started_at,
            finished_at: Utc::now(),
            source_records: records.len(),
            zones: total.zones,
            zones_applied: total.zones_applied,
            zones_skipped: total.zones_skipped,
            changes: total.changes,
            observed,
        };
        info!(
            "Pass complete: {} zones, {} created, {} deleted, {} skipped",
            summary.zones, summary.changes.creates, summary.changes.deletes, summary.zones_skipped
        );
        Ok(summary)
    }

    /// Fetch every source concurrently
    ///
    /// Returns the records in source order, plus the sources each resource
    /// key came from.
    async fn gather(&self) -> Result<(Vec<SourceRecord>, BTreeMap<String, BTreeSet<usize>>)> {
        let fetched = try_join_all(self.sources.iter().map(|source| async move {
            source.list_records().await.map_err(|e| match e {
                Error::SourceFetch { .. } => e,
                other => Error::source_fetch(source.name(), other.to_string()),
            })
        }))
        .await?;

        let mut records = Vec::new();
        let mut origins: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
        for (index, batch) in fetched.into_iter().enumerate() {
            for record in batch {
                origins
                    .entry(record.resource_key.clone())
                    .or_default()
                    .insert(index);
                records.push(record);
            }
        }
        Ok((records, origins))
    }

    /// Report reconciled resources to the sources they came from
    async fn observe(
        &self,
        outcome: &ProviderOutcome,
        origins: &BTreeMap<String, BTreeSet<usize>>,
    ) -> usize {
        let mut observed = 0;
        for key in outcome.reconciled.difference(&outcome.held) {
            let Some(indices) = origins.get(key) else {
                continue;
            };
            for &index in indices {
                let source = &self.sources[index];
                if let Err(e) = source.observe_resource(key).await {
                    warn!("Source {} failed to observe {}: {}", source.name(), key, e);
                }
            }
            self.events.emit(EngineEvent::ResourceObserved {
                resource_key: key.clone(),
            });
            observed += 1;
        }
        observed
    }
}
