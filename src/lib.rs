//! Checks whether an IP address, or the caller's own public IP, is a Tor
//! exit node.
//!
//! The public IP comes from an IP-echo service over HTTP. Exit-node status
//! comes from the Tor Project's exit-list DNS zone.

use std::net::SocketAddr;
use std::time::Duration;

pub use self::dns::{
    CHECK_PORT, DEFAULT_DNS_TIMEOUT, DEFAULT_NAMESERVER, DnsResolver, EXIT_LIST_ZONE,
    LookupError, Resolve, exit_list_name, is_exit_node,
};
pub use self::error::{CommunicationError, Error};
pub use self::http::{DEFAULT_TIMEOUT, DEFAULT_TOR_PROXY, IPIFY_URL, get_text, tor_session};

mod dns;
mod error;
mod http;
#[cfg(test)]
mod test_util;

/// Endpoints and limits used by [`TorCheckClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// IP-echo endpoint.
    pub echo_url: String,
    /// Timeout of each HTTP request.
    pub timeout: Duration,
    /// Exit-list DNS zone appended to the reversed address.
    pub exit_list_zone: String,
    /// Port attached to exit-list lookups.
    pub check_port: u16,
    /// Nameserver receiving exit-list queries.
    pub nameserver: SocketAddr,
    /// Timeout of each exit-list query.
    pub dns_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            echo_url: IPIFY_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            exit_list_zone: EXIT_LIST_ZONE.to_owned(),
            check_port: CHECK_PORT,
            nameserver: DEFAULT_NAMESERVER,
            dns_timeout: DEFAULT_DNS_TIMEOUT,
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_echo_url(mut self, url: impl Into<String>) -> Self {
        self.echo_url = url.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_exit_list_zone(mut self, zone: impl Into<String>) -> Self {
        self.exit_list_zone = zone.into();
        self
    }

    #[must_use]
    pub fn with_check_port(mut self, port: u16) -> Self {
        self.check_port = port;
        self
    }

    #[must_use]
    pub fn with_nameserver(mut self, nameserver: SocketAddr, timeout: Duration) -> Self {
        self.nameserver = nameserver;
        self.dns_timeout = timeout;
        self
    }

    fn resolver(&self) -> DnsResolver {
        DnsResolver::new(self.nameserver, self.dns_timeout)
    }
}

/// Snapshot returned by [`TorCheckClient::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorStatus {
    /// Public IP as seen through the Tor session.
    pub ip: String,
    /// Whether that IP is a listed exit node.
    pub is_tor: bool,
}

/// Public IP and exit-list lookups over caller-owned HTTP sessions.
///
/// Both sessions currently reach the same echo endpoint. `tor_session` is
/// the one an embedder would route through Tor, see [`tor_session`].
#[derive(Debug, Clone)]
pub struct TorCheckClient {
    tor_session: reqwest::Client,
    session: reqwest::Client,
    config: Config,
}

impl TorCheckClient {
    #[must_use]
    pub fn new(tor_session: reqwest::Client, session: reqwest::Client) -> Self {
        Self::with_config(tor_session, session, Config::default())
    }

    #[must_use]
    pub fn with_config(
        tor_session: reqwest::Client,
        session: reqwest::Client,
        config: Config,
    ) -> Self {
        Self {
            tor_session,
            session,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the public IP reported through the plain session.
    pub async fn my_ip(&self) -> Result<String, Error> {
        get_text(&self.session, &self.config.echo_url, self.config.timeout).await
    }

    /// Returns the public IP reported through the Tor session.
    pub async fn my_tor_ip(&self) -> Result<String, Error> {
        get_text(&self.tor_session, &self.config.echo_url, self.config.timeout).await
    }

    /// Checks `ip` against the Tor exit list with default settings.
    pub async fn is_tor_ip(ip: Option<&str>) -> Result<bool, Error> {
        Self::is_tor_ip_with(&DnsResolver::default(), ip).await
    }

    /// Same as [`is_tor_ip`](Self::is_tor_ip), resolving through `resolver`.
    pub async fn is_tor_ip_with<R>(resolver: &R, ip: Option<&str>) -> Result<bool, Error>
    where
        R: Resolve + ?Sized,
    {
        is_exit_node(resolver, ip, EXIT_LIST_ZONE, CHECK_PORT).await
    }

    /// Checks `ip` against the exit list using this client's config.
    pub async fn check_tor_ip(&self, ip: Option<&str>) -> Result<bool, Error> {
        let resolver = self.config.resolver();
        is_exit_node(
            &resolver,
            ip,
            &self.config.exit_list_zone,
            self.config.check_port,
        )
        .await
    }

    /// Fetches the Tor-side public IP and checks it against the exit list.
    pub async fn status(&self) -> Result<TorStatus, Error> {
        let ip = self.my_tor_ip().await?;
        let is_tor = self.check_tor_ip(Some(ip.trim())).await?;
        tracing::debug!(%ip, is_tor, "tor status");
        Ok(TorStatus { ip, is_tor })
    }
}
