//! Error types for the dnsync reconciler
//!
//! One enum covers every failure the engine can observe. Variants are split
//! into two families:
//!
//! - **Fatal**: configuration errors, failed provider writes, provider changes
//!   stuck pending, and invariant violations. These end the current pass and
//!   propagate to the process boundary.
//! - **Recoverable**: source fetch failures (retried at the next tick),
//!   unsupported record types and ownership conflicts (logged, the record is
//!   left out of the desired set).

use thiserror::Error;

/// Result type alias for dnsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dnsync reconciler
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A source could not produce a complete record list
    #[error("Source error ({source_name}): {message}")]
    SourceFetch {
        /// Source name
        source_name: String,
        /// Error message
        message: String,
    },

    /// The provider cannot represent a record of this type
    #[error("Unsupported record: {0}")]
    UnsupportedRecord(String),

    /// Another owner holds the (fqdn, type) slot
    #[error("Ownership conflict: {0}")]
    OwnershipConflict(String),

    /// Writing a change set to a provider failed
    #[error("Failed to apply changes ({provider}): {message}")]
    ProviderApply {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// An asynchronous provider change never left the pending state
    #[error("Change {change} at {provider} still pending after {attempts} polls")]
    PendingTimeout {
        /// Provider name
        provider: String,
        /// Provider change identifier
        change: String,
        /// Number of polls performed
        attempts: usize,
    },

    /// Internal invariant violated; always a bug
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Provider-specific read error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Zone or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a source fetch error
    pub fn source_fetch(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceFetch {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported record error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedRecord(msg.into())
    }

    /// Create an ownership conflict error
    pub fn ownership_conflict(msg: impl Into<String>) -> Self {
        Self::OwnershipConflict(msg.into())
    }

    /// Create a provider apply error
    pub fn provider_apply(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderApply {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an invariant violation
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error must end the process rather than wait for the
    /// next tick
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ProviderApply { .. }
                | Self::PendingTimeout { .. }
                | Self::Invariant(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::config("bad").is_fatal());
        assert!(Error::provider_apply("cloudflare", "boom").is_fatal());
        assert!(Error::invariant("desired not set").is_fatal());
        assert!(
            Error::PendingTimeout {
                provider: "google".into(),
                change: "42".into(),
                attempts: 10,
            }
            .is_fatal()
        );

        assert!(!Error::source_fetch("ingress", "watch closed").is_fatal());
        assert!(!Error::unsupported("SOA").is_fatal());
        assert!(!Error::ownership_conflict("A app.example.com").is_fatal());
        assert!(!Error::provider("cloudflare", "list failed").is_fatal());
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::source_fetch("static", "unreachable");
        assert_eq!(err.to_string(), "Source error (static): unreachable");
    }
}
