//! Typed errors for the carrier intelligence library.
//!
//! Extraction misses are not errors; field routines return `Option`. Only
//! transport, page access and configuration problems surface here.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Ingestion endpoint answered with a non-success status
    #[error("ingestion endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Endpoint answered 2xx but the acknowledgement says `ok: false`
    #[error("ingestion rejected the payload: {0}")]
    Rejected(String),

    #[error("ingestion request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("malformed acknowledgement: {0}")]
    MalformedAck(String),

    /// No MC number on the page, so there is nothing to key the upload on
    #[error("no MC number found on this page")]
    MissingIdentifier,

    #[error("cannot read page source {path}: {source}")]
    PageSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::Network(e) => e.is_timeout(),
            _ => false,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Status { .. }
                | Error::Rejected(_)
                | Error::Timeout { .. }
                | Error::Network(_)
                | Error::MalformedAck(_)
        )
    }

    /// Next step for the operator, shown under the error message.
    pub fn hint(&self) -> &'static str {
        match self {
            Error::Status { status, .. } if *status == 401 || *status == 403 => {
                "Sign in to the admin dashboard again, then retry the upload."
            }
            Error::Status { status, .. } if *status >= 500 => {
                "The ingestion service failed. Check the server logs, then retry."
            }
            Error::Status { .. } => "The ingestion service refused the request. Check the API URL and endpoint.",
            Error::Rejected(_) => "The server did not accept this carrier. Re-open the carrier page and capture again.",
            Error::Timeout { .. } => "The upload took too long. Refresh the carrier page and retry.",
            Error::Network(_) => "Could not reach the server. Check the API base URL and that the server is running.",
            Error::MalformedAck(_) => "The server answered with something unexpected. Check the endpoint path.",
            Error::MissingIdentifier => "Navigate to a carrier detail page (the MC number must be visible) and retry.",
            Error::PageSource { .. } => "Check that the page file exists and is readable.",
            Error::Config(_) => "Fix carrier-intel.toml or the CARRIER_* environment variables.",
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_flagged() {
        let e = Error::Timeout { secs: 120 };
        assert!(e.is_timeout());
        assert!(e.is_transport());
        assert!(e.to_string().contains("120s"));
    }

    #[test]
    fn hints_depend_on_status() {
        let auth = Error::Status { status: 401, body: String::new() };
        let server = Error::Status { status: 502, body: String::new() };
        assert!(auth.hint().contains("Sign in"));
        assert!(server.hint().contains("server logs"));
        assert!(!Error::MissingIdentifier.is_transport());
    }
}
