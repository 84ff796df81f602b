// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the
// dnsync zone reconciler.
//
// ## Behavior
//
// - Zones and records are listed page by page on every call; nothing is cached
// - Unknown record types are skipped with a warning
// - Changes are applied deletions first, then creations
// - No retry logic: a failed call fails the pass, the next tick starts over
//
// ## Proxying
//
// Records carry Cloudflare's `proxied` flag. It comes from the
// `external-dns.alpha.kubernetes.io/cloudflare-proxied` annotation, falling
// back to the configured default, and is forced off for types Cloudflare
// cannot proxy.
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Provider MUST fail fast if token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?page=N&per_page=50`
// - List DNS Records: GET `/zones/:zone_id/dns_records?page=N&per_page=100`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

pub mod api;

use async_trait::async_trait;
use dnsync_core::config::ProviderConfig;
use dnsync_core::engine::AnyProvider;
use dnsync_core::plugins::PluginRegistry;
use dnsync_core::record::{
    normalize_fqdn, PlainRecord, ProviderRecord, RecordType, SourceRecord, Zone, ZoneState,
};
use dnsync_core::traits::{DnsProvider, DnsProviderFactory};
use dnsync_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use api::{ApiRecord, ApiResponse, ApiZone};

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const ZONES_PER_PAGE: u32 = 50;
const RECORDS_PER_PAGE: u32 = 100;

/// Annotation overriding the proxied default
pub const PROXIED_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/cloudflare-proxied";

/// A record as stored at Cloudflare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudflareRecord {
    pub dns: PlainRecord,
    /// Cloudflare record id; `None` for records not created yet
    pub id: Option<String>,
    pub proxied: bool,
}

impl ProviderRecord for CloudflareRecord {
    fn dns(&self) -> &PlainRecord {
        &self.dns
    }
}

/// Whether Cloudflare can proxy records of this type
fn proxiable(record_type: RecordType) -> bool {
    matches!(record_type, RecordType::A | RecordType::Aaaa | RecordType::Cname)
}

/// Cloudflare DNS provider
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone apexes to manage; empty means every zone the token can see
    zones: Vec<String>,

    /// Proxy records unless annotated otherwise
    proxied_by_default: bool,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zones", &self.zones)
            .field("proxied_by_default", &self.proxied_by_default)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit permissions
    /// - `zones`: Zone apexes to manage (empty = all)
    /// - `proxied_by_default`: Proxy records unless annotated otherwise
    pub fn new(
        api_token: impl Into<String>,
        zones: Vec<String>,
        proxied_by_default: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zones: zones.iter().map(|z| normalize_fqdn(z)).collect(),
            proxied_by_default,
            client,
        })
    }

    /// Proxy flag for a source record
    fn proxied_for(&self, record: &SourceRecord) -> bool {
        if !proxiable(record.dns.record_type()) {
            return false;
        }
        match record.annotations.get(PROXIED_ANNOTATION).map(String::as_str) {
            Some("true") => true,
            Some("false") => false,
            Some(other) => {
                warn!(
                    "Invalid {} value '{}' on {}, using default",
                    PROXIED_ANNOTATION, other, record.resource_key
                );
                self.proxied_by_default
            }
            None => self.proxied_by_default,
        }
    }

    fn zone_allowed(&self, apex: &str) -> bool {
        self.zones.is_empty() || self.zones.iter().any(|z| z == apex)
    }

    /// GET every page of a listing
    async fn get_all<T: DeserializeOwned>(&self, path: &str, per_page: u32) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let url = format!(
                "{}{}?page={}&per_page={}",
                CLOUDFLARE_API_BASE, path, page, per_page
            );
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.api_token)
                .header("Content-Type", "application/json")
                .send()
                .await
                .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

            let envelope: ApiResponse<Vec<T>> = read_response(response, path).await?;
            let total_pages = envelope.result_info.map(|info| info.total_pages).unwrap_or(1);
            items.extend(envelope.into_result()?);

            if page >= total_pages {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    async fn delete_record(&self, zone: &Zone, record: &CloudflareRecord) -> Result<()> {
        let id = record.id.as_deref().ok_or_else(|| {
            Error::invalid_input(format!("Cannot delete {} without a record id", record.dns))
        })?;
        let path = format!("/zones/{}/dns_records/{}", zone.zone_id, id);

        info!("Deleting {}", record.dns);
        let response = self
            .client
            .delete(format!("{}{}", CLOUDFLARE_API_BASE, path))
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

        let _: ApiResponse<serde_json::Value> = read_response(response, &path).await?;
        Ok(())
    }

    async fn create_record(&self, zone: &Zone, record: &CloudflareRecord) -> Result<()> {
        let path = format!("/zones/{}/dns_records", zone.zone_id);
        let payload = ApiRecord::from_plain(&record.dns, record.proxied)?;

        info!("Creating {} (proxied: {})", record.dns, record.proxied);
        let response = self
            .client
            .post(format!("{}{}", CLOUDFLARE_API_BASE, path))
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

        let created: ApiResponse<ApiRecord> = read_response(response, &path).await?;
        let created = created.into_result()?;
        debug!("Created record id {:?}", created.id);
        Ok(())
    }
}

/// Map an HTTP response to its envelope, or to an error by status code
async fn read_response<T: DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> Result<ApiResponse<T>> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(status_error(status.as_u16(), path, &error_text));
    }

    response
        .json()
        .await
        .map_err(|e| Error::provider("cloudflare", format!("Failed to parse response: {}", e)))
}

fn status_error(status: u16, path: &str, body: &str) -> Error {
    match status {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(format!("Not found: {}", path)),
        409 => Error::provider(
            "cloudflare",
            format!("Conflict: Record is being updated by another process. Status: {}", status),
        ),
        429 => Error::rate_limited(format!("Rate limit exceeded. Status: {}", status)),
        500..=599 => Error::provider(
            "cloudflare",
            format!("Cloudflare server error (transient): {} - {}", status, body),
        ),
        _ => Error::provider("cloudflare", format!("Request failed: {} - {}", status, body)),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    type Record = CloudflareRecord;

    fn provider_name(&self) -> &str {
        "cloudflare"
    }

    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let zones: Vec<ApiZone> = self.get_all("/zones", ZONES_PER_PAGE).await?;
        Ok(zones
            .into_iter()
            .map(|z| {
                let mut zone = Zone::new(&z.name, z.id);
                zone.zone_name = Some(z.name);
                zone
            })
            .filter(|zone| self.zone_allowed(&zone.fqdn))
            .collect())
    }

    async fn list_records(&self, zone: &Zone) -> Result<Vec<CloudflareRecord>> {
        let path = format!("/zones/{}/dns_records", zone.zone_id);
        let records: Vec<ApiRecord> = self.get_all(&path, RECORDS_PER_PAGE).await?;

        let mut converted = Vec::with_capacity(records.len());
        for record in records {
            match record.to_plain() {
                Ok(dns) => converted.push(CloudflareRecord {
                    dns,
                    id: record.id,
                    proxied: record.proxied,
                }),
                Err(e) => warn!("Skipping record in zone {}: {}", zone.fqdn, e),
            }
        }
        Ok(converted)
    }

    fn enrich_source_record(&self, record: &SourceRecord) -> Option<CloudflareRecord> {
        if record.dns.record_type() == RecordType::Soa {
            return None;
        }
        Some(CloudflareRecord {
            dns: record.dns.clone(),
            id: None,
            proxied: self.proxied_for(record),
        })
    }

    fn grouping_key(&self, record: &CloudflareRecord) -> String {
        format!("{}|{}", normalize_fqdn(record.dns.fqdn()), record.dns.record_type())
    }

    fn comparison_key(&self, record: &CloudflareRecord) -> String {
        let ttl = match record.dns.ttl() {
            Some(ttl) if ttl != api::AUTOMATIC_TTL => ttl.to_string(),
            _ => "auto".to_string(),
        };
        format!(
            "{}|{}|{}|{}|{}",
            normalize_fqdn(record.dns.fqdn()),
            record.dns.record_type(),
            record.dns.value(),
            ttl,
            record.proxied
        )
    }

    async fn apply_changes(&self, state: &ZoneState<CloudflareRecord>) -> Result<()> {
        let diffs = state.diff.as_ref().ok_or_else(|| {
            Error::invariant(format!("apply_changes called without a diff for zone {}", state.zone.fqdn))
        })?;

        let apply = async {
            for diff in diffs {
                for record in &diff.to_delete {
                    self.delete_record(&state.zone, record).await?;
                }
            }
            for diff in diffs {
                for record in &diff.to_create {
                    self.create_record(&state.zone, record).await?;
                }
            }
            Ok::<(), Error>(())
        };

        apply
            .await
            .map_err(|e| Error::provider_apply("cloudflare", e.to_string()))
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn AnyProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                zones,
                proxied_by_default,
            } => {
                if api_token.is_empty() {
                    return Err(Error::config("Cloudflare API token is required"));
                }

                Ok(Box::new(CloudflareProvider::new(
                    api_token.clone(),
                    zones.clone(),
                    *proxied_by_default,
                )?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a plugin registry
///
/// # Example
///
/// ```rust
/// use dnsync_core::PluginRegistry;
///
/// let mut plugins = PluginRegistry::new();
/// dnsync_provider_cloudflare::register(&mut plugins);
/// assert!(plugins.has_provider("cloudflare"));
/// ```
pub fn register(plugins: &mut PluginRegistry) {
    plugins.register_provider("cloudflare", Box::new(CloudflareFactory));
}
