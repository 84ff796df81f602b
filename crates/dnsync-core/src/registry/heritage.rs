//! Heritage TXT wire format
//!
//! ```text
//! heritage=external-dns,external-dns/owner=<owner>[,external-dns/resource=<key>][,record-type/<TYPE>=managed]*
//! ```
//!
//! A heritage without any `record-type/` label is *unscoped*: it predates
//! per-type ownership and is taken to cover every record at its fqdn.

use std::collections::BTreeSet;
use std::fmt;

use crate::record::RecordType;

const HERITAGE_PREFIX: &str = "heritage=";
const HERITAGE_LABEL: &str = "heritage=external-dns";
const OWNER_LABEL: &str = "external-dns/owner=";
const RESOURCE_LABEL: &str = "external-dns/resource=";
const TYPE_LABEL: &str = "record-type/";
const MANAGED_VALUE: &str = "=managed";

/// Strip one level of surrounding double quotes from TXT content
pub fn decode_txt(content: &str) -> &str {
    content
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(content)
}

/// Whether TXT content looks like a heritage record
pub fn is_heritage(content: &str) -> bool {
    decode_txt(content).starts_with(HERITAGE_PREFIX)
}

/// Ownership claim carried by a heritage TXT record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heritage {
    pub owner: String,
    pub resource: Option<String>,
    /// Claimed record types; `None` for an unscoped heritage
    pub types: Option<BTreeSet<RecordType>>,
}

impl Heritage {
    /// Create a scoped heritage
    pub fn new(owner: impl Into<String>, types: BTreeSet<RecordType>) -> Self {
        Self {
            owner: owner.into(),
            resource: None,
            types: Some(types),
        }
    }

    /// Set the resource label
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Parse TXT content
    ///
    /// Returns `None` if the content is not a well-formed heritage record.
    pub fn parse(content: &str) -> Option<Self> {
        let mut labels = decode_txt(content).split(',').map(str::trim);
        if labels.next()? != HERITAGE_LABEL {
            return None;
        }

        let mut owner = None;
        let mut resource = None;
        let mut types: Option<BTreeSet<RecordType>> = None;
        for label in labels {
            if let Some(value) = label.strip_prefix(OWNER_LABEL) {
                owner = Some(value.to_string());
            } else if let Some(value) = label.strip_prefix(RESOURCE_LABEL) {
                resource = Some(value.to_string());
            } else if let Some(rest) = label.strip_prefix(TYPE_LABEL) {
                let name = rest.strip_suffix(MANAGED_VALUE)?;
                let record_type = name.parse().ok()?;
                types.get_or_insert_with(BTreeSet::new).insert(record_type);
            }
        }

        let owner = owner.filter(|o| !o.is_empty())?;
        Some(Self {
            owner,
            resource,
            types,
        })
    }

    /// Whether this heritage claims `record_type`
    pub fn claims(&self, record_type: RecordType) -> bool {
        self.types
            .as_ref()
            .is_none_or(|types| types.contains(&record_type))
    }
}

impl fmt::Display for Heritage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}{}", HERITAGE_LABEL, OWNER_LABEL, self.owner)?;
        if let Some(resource) = &self.resource {
            write!(f, ",{}{}", RESOURCE_LABEL, resource)?;
        }
        for record_type in self.types.iter().flatten() {
            write!(f, ",{}{}{}", TYPE_LABEL, record_type, MANAGED_VALUE)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_bit_exact() {
        let heritage = Heritage::new("cluster-a", BTreeSet::from([RecordType::Aaaa, RecordType::A]))
            .with_resource("ingress/default/web");

        assert_eq!(
            heritage.to_string(),
            "heritage=external-dns,external-dns/owner=cluster-a,external-dns/resource=ingress/default/web,record-type/A=managed,record-type/AAAA=managed"
        );
    }

    #[test]
    fn test_parse_quoted_scoped() {
        let heritage = Heritage::parse(
            "\"heritage=external-dns,external-dns/owner=cluster-a,record-type/CNAME=managed\"",
        )
        .unwrap();

        assert_eq!(heritage.owner, "cluster-a");
        assert_eq!(heritage.resource, None);
        assert!(heritage.claims(RecordType::Cname));
        assert!(!heritage.claims(RecordType::A));
    }

    #[test]
    fn test_parse_unscoped_claims_everything() {
        let heritage = Heritage::parse("heritage=external-dns,external-dns/owner=legacy").unwrap();

        assert_eq!(heritage.types, None);
        assert!(heritage.claims(RecordType::Txt));
        assert!(heritage.claims(RecordType::A));
    }

    #[test]
    fn test_parse_round_trip() {
        let heritage = Heritage::new("x", BTreeSet::from([RecordType::Mx])).with_resource("crd/ns/name");
        assert_eq!(Heritage::parse(&heritage.to_string()), Some(heritage));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(Heritage::parse("heritage=other"), None);
        assert_eq!(Heritage::parse("heritage=external-dns"), None);
        assert_eq!(
            Heritage::parse("heritage=external-dns,external-dns/owner=x,record-type/PTR=managed"),
            None
        );
        assert!(is_heritage("heritage=other"));
        assert!(!is_heritage("v=spf1 -all"));
    }
}
