// # Cloudflare API v4 wire types
//
// Envelope, zone and DNS record shapes, plus the conversion between
// Cloudflare records and `PlainRecord`.
//
// Cloudflare reports an "automatic" TTL as 1; it maps to an unset TTL.

use dnsync_core::record::{PlainRecord, RecordType};
use dnsync_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// TTL value Cloudflare uses for "automatic"
pub const AUTOMATIC_TTL: u32 = 1;

/// Response envelope
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    pub result: Option<T>,
    #[serde(default)]
    pub result_info: Option<ResultInfo>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the result, turning API-level failures into errors
    pub fn into_result(self) -> Result<T> {
        if !self.success {
            let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
            return Err(Error::provider("cloudflare", messages.join("; ")));
        }
        self.result
            .ok_or_else(|| Error::provider("cloudflare", "Invalid response format: missing result"))
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Paging information
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiZone {
    pub id: String,
    pub name: String,
}

/// SRV payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvData {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

/// A DNS record as read from and written to the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    pub ttl: u32,
    #[serde(default)]
    pub proxied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SrvData>,
}

impl ApiRecord {
    /// Convert to a plain record
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedRecord`] for types outside the record model.
    pub fn to_plain(&self) -> Result<PlainRecord> {
        let record_type: RecordType = self.record_type.parse()?;
        let fqdn = self.name.clone();
        let ttl = (self.ttl != AUTOMATIC_TTL).then_some(self.ttl);
        let target = self.content.clone();

        let plain = match record_type {
            RecordType::A => PlainRecord::A { fqdn, ttl, target },
            RecordType::Aaaa => PlainRecord::Aaaa { fqdn, ttl, target },
            RecordType::Cname => PlainRecord::Cname { fqdn, ttl, target },
            RecordType::Ns => PlainRecord::Ns { fqdn, ttl, target },
            RecordType::Txt => PlainRecord::Txt {
                fqdn,
                ttl,
                content: target,
            },
            RecordType::Mx => PlainRecord::Mx {
                fqdn,
                ttl,
                priority: self.priority.unwrap_or_default(),
                target,
            },
            RecordType::Srv => {
                let data = self.data.clone().ok_or_else(|| {
                    Error::unsupported(format!("SRV record {} without data", self.name))
                })?;
                PlainRecord::Srv {
                    fqdn,
                    ttl,
                    priority: data.priority,
                    weight: data.weight,
                    port: data.port,
                    target: data.target,
                }
            }
            RecordType::Soa => {
                return Err(Error::unsupported(format!("SOA record {}", self.name)));
            }
        };
        Ok(plain)
    }

    /// Build the payload for creating `plain`
    pub fn from_plain(plain: &PlainRecord, proxied: bool) -> Result<Self> {
        let mut record = ApiRecord {
            id: None,
            record_type: plain.record_type().to_string(),
            name: plain.fqdn().to_string(),
            content: String::new(),
            ttl: plain.ttl().unwrap_or(AUTOMATIC_TTL),
            proxied,
            priority: None,
            data: None,
        };

        match plain {
            PlainRecord::A { target, .. }
            | PlainRecord::Aaaa { target, .. }
            | PlainRecord::Cname { target, .. }
            | PlainRecord::Ns { target, .. } => record.content = target.clone(),
            PlainRecord::Txt { content, .. } => record.content = content.clone(),
            PlainRecord::Mx {
                priority, target, ..
            } => {
                record.content = target.clone();
                record.priority = Some(*priority);
            }
            PlainRecord::Srv {
                priority,
                weight,
                port,
                target,
                ..
            } => {
                record.data = Some(SrvData {
                    priority: *priority,
                    weight: *weight,
                    port: *port,
                    target: target.clone(),
                });
            }
            PlainRecord::Soa { fqdn, .. } => {
                return Err(Error::unsupported(format!("SOA record {}", fqdn)));
            }
        }
        Ok(record)
    }
}
