//! Network preconditions checked before every attempt.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

/// A condition that must hold before a sync attempt starts.
pub trait NetworkCondition: Send + Sync + 'static {
    fn is_satisfied(&self) -> impl Future<Output = bool> + Send;
}

/// Always satisfied. For tests and offline-capable providers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConnected;

impl NetworkCondition for AlwaysConnected {
    async fn is_satisfied(&self) -> bool {
        true
    }
}

/// Satisfied when the sync server's host name resolves.
#[derive(Debug, Clone)]
pub struct ServerReachability {
    authority: String,
    timeout: Duration,
}

impl ServerReachability {
    /// # Errors
    ///
    /// Returns `Config` if `server_url` is not an absolute URL with a host.
    pub fn from_url(server_url: &str, timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(server_url)
            .map_err(|e| Error::Config(format!("Invalid server URL '{server_url}': {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::Config(format!("Server URL has no host: {server_url}")))?;
        let port = url.port_or_known_default().unwrap_or(443);

        Ok(Self {
            authority: format!("{host}:{port}"),
            timeout,
        })
    }

    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }
}

impl NetworkCondition for ServerReachability {
    async fn is_satisfied(&self) -> bool {
        let lookup = tokio::net::lookup_host(self.authority.as_str());
        let resolved = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(_)) | Err(_) => false,
        };
        debug!(authority = %self.authority, resolved, "Checked network precondition");
        resolved
    }
}
