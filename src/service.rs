//! Management API connection handle.
//!
//! A [`Service`] describes how to reach the host's management API using the
//! `server_uri` and `session_key` metadata of the current run. It performs
//! no I/O; an HTTP client of the plugin's choosing does the talking.

use url::Url;

use crate::error::{ModularInputError, Result};
use crate::protocol::{Metadata, SERVER_URI, SESSION_KEY};

/// Connection details for the management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    prefix: String,
    scheme: String,
    host: String,
    port: u16,
    session_key: String,
}

impl Service {
    /// Build from run metadata.
    ///
    /// # Errors
    ///
    /// [`ModularInputError::MissingMetadata`] when `server_uri` or
    /// `session_key` is absent, [`ModularInputError::InvalidServerUri`] when
    /// the URI has no host or cannot be parsed.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self> {
        let prefix = metadata
            .get(SERVER_URI)
            .ok_or(ModularInputError::MissingMetadata(SERVER_URI))?;
        let session_key = metadata
            .get(SESSION_KEY)
            .ok_or(ModularInputError::MissingMetadata(SESSION_KEY))?;
        Self::new(prefix, session_key)
    }

    /// Build from an explicit URI and session key.
    pub fn new(server_uri: &str, session_key: &str) -> Result<Self> {
        let url = Url::parse(server_uri.trim())
            .map_err(|e| ModularInputError::InvalidServerUri(format!("{}: {}", server_uri, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| ModularInputError::InvalidServerUri(server_uri.to_string()))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ModularInputError::InvalidServerUri(server_uri.to_string()))?;

        Ok(Self {
            prefix: server_uri.trim().to_string(),
            scheme: url.scheme().to_string(),
            host,
            port,
            session_key: session_key.to_string(),
        })
    }

    /// The URI as supplied by the host.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `http` or `https`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Server host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Session key for authenticating requests.
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// Value of the `Authorization` header for management API requests.
    pub fn authorization(&self) -> String {
        format!("Splunk {}", self.session_key)
    }
}
