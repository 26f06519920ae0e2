//! Typed errors for the failure modes callers need to tell apart.
//!
//! Everything else flows through [`anyhow::Error`]. The two enums here exist
//! because the pipeline branches on them: configuration problems must fail
//! fast with a named cause, and quota exhaustion must abort an ingest instead
//! of being retried.

use thiserror::Error;

/// Problems detected while resolving configuration or selecting a provider.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A cloud provider was selected but its credential is not set.
    #[error("{variable} not set; add it to your .env or set EMBEDDING_PROVIDER=LOCAL ({provider} provider)")]
    MissingCredential {
        provider: &'static str,
        variable: &'static str,
    },

    #[error("Unknown embedding provider: '{0}'. Must be LOCAL, GOOGLE, or OPENAI.")]
    UnsupportedProvider(String),

    /// The provider exists but this binary was built without it.
    #[error("{0}")]
    FeatureDisabled(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors returned by the embedding and chat backends.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the call for quota or rate-limit reasons.
    #[error("{provider} quota or rate limit exceeded: {message}")]
    QuotaExceeded {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} API error {status}: {message}")]
    Http {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// The request never produced an HTTP response (connect, timeout, TLS).
    #[error("{provider} request failed: {message}")]
    Request {
        provider: &'static str,
        message: String,
    },

    #[error("invalid {provider} response: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    /// Classify a non-success HTTP response.
    ///
    /// Status 429 and bodies naming an exhausted quota map to
    /// [`ProviderError::QuotaExceeded`]; anything else is a plain
    /// [`ProviderError::Http`].
    pub fn from_status(provider: &'static str, status: u16, body: &str) -> Self {
        if status == 429 || body.contains("insufficient_quota") || body.contains("RESOURCE_EXHAUSTED")
        {
            ProviderError::QuotaExceeded {
                provider,
                message: body.to_string(),
            }
        } else {
            ProviderError::Http {
                provider,
                status,
                message: body.to_string(),
            }
        }
    }
}

/// Message fragments that mark a quota or rate-limit failure coming from
/// code that does not produce a typed [`ProviderError`].
const QUOTA_MARKERS: [&str; 5] = [
    "insufficient_quota",
    "RateLimit",
    "rate limit",
    "429",
    "RESOURCE_EXHAUSTED",
];

/// Returns true when `err` is a quota or rate-limit failure.
///
/// A [`ProviderError`] in the chain decides on its own: it was classified
/// from the HTTP status in [`ProviderError::from_status`]. Only untyped
/// errors fall back to inspecting the rendered message.
pub fn is_quota_error(err: &anyhow::Error) -> bool {
    if let Some(provider_err) = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<ProviderError>())
    {
        return matches!(provider_err, ProviderError::QuotaExceeded { .. });
    }
    let msg = format!("{:#}", err);
    QUOTA_MARKERS.iter().any(|marker| msg.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_quota() {
        let err = ProviderError::from_status("OpenAI", 429, "slow down");
        assert!(matches!(err, ProviderError::QuotaExceeded { .. }));
    }

    #[test]
    fn insufficient_quota_body_is_quota() {
        let err = ProviderError::from_status(
            "OpenAI",
            403,
            r#"{"error":{"code":"insufficient_quota"}}"#,
        );
        assert!(matches!(err, ProviderError::QuotaExceeded { .. }));
    }

    #[test]
    fn server_error_is_http() {
        let err = ProviderError::from_status("Google", 503, "unavailable");
        assert!(matches!(err, ProviderError::Http { status: 503, .. }));
    }

    #[test]
    fn typed_quota_detected_through_context() {
        let err = anyhow::Error::new(ProviderError::QuotaExceeded {
            provider: "Google",
            message: "exhausted".into(),
        })
        .context("embedding batch 2");
        assert!(is_quota_error(&err));
    }

    #[test]
    fn quota_detected_from_message() {
        let err = anyhow::anyhow!("RateLimitError: too many requests");
        assert!(is_quota_error(&err));
    }

    #[test]
    fn transient_error_is_not_quota() {
        let err = anyhow::Error::new(ProviderError::Request {
            provider: "OpenAI",
            message: "connection reset".into(),
        });
        assert!(!is_quota_error(&err));
    }

    #[test]
    fn server_error_mentioning_429_is_not_quota() {
        let err = anyhow::Error::new(ProviderError::from_status(
            "Google",
            503,
            r#"{"error":"backend unavailable","request_id":"req-4290-0429"}"#,
        ))
        .context("embedding batch 1");
        assert!(!is_quota_error(&err));
    }

    #[test]
    fn missing_credential_names_variable() {
        let err = ConfigError::MissingCredential {
            provider: "GOOGLE",
            variable: "GOOGLE_API_KEY",
        };
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }
}
