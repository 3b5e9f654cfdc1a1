use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use hickory_client::client::Client;
use hickory_client::proto::op::{Query, ResponseCode};
use hickory_client::proto::rr::{Name, RData, RecordType};
use hickory_client::proto::runtime::TokioRuntimeProvider;
use hickory_client::proto::udp::UdpClientStream;
use hickory_client::proto::xfer::{DnsHandle, DnsRequestOptions, DnsResponse};
use hickory_client::proto::{ProtoError, ProtoErrorKind};

use crate::error::{CommunicationError, Error};

/// Tor Project's exit-list DNS zone.
pub const EXIT_LIST_ZONE: &str = "dnsel.torproject.org";

/// Port attached to exit-list lookups.
pub const CHECK_PORT: u16 = 80;

/// Nameserver queried when none is configured.
pub const DEFAULT_NAMESERVER: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 53);

/// Upper bound on a single exit-list query.
pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Failure reported by a [`Resolve`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The name does not exist or has no address records.
    #[error("name not found")]
    NotFound,
    /// No answer within the allotted time.
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
    /// Any other DNS protocol failure.
    #[error("dns: {0}")]
    Proto(#[from] ProtoError),
}

/// Resolves a host name into socket addresses on the given port.
pub trait Resolve: Send + Sync {
    fn resolve<'a>(
        &'a self,
        name: &'a str,
        port: u16,
    ) -> BoxFuture<'a, Result<Vec<SocketAddr>, LookupError>>;
}

/// Resolver querying a single nameserver over UDP.
#[derive(Debug, Clone)]
pub struct DnsResolver {
    nameserver: SocketAddr,
    timeout: Duration,
}

impl DnsResolver {
    #[must_use]
    pub const fn new(nameserver: SocketAddr, timeout: Duration) -> Self {
        Self {
            nameserver,
            timeout,
        }
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESERVER, DEFAULT_DNS_TIMEOUT)
    }
}

impl Resolve for DnsResolver {
    fn resolve<'a>(
        &'a self,
        name: &'a str,
        port: u16,
    ) -> BoxFuture<'a, Result<Vec<SocketAddr>, LookupError>> {
        Box::pin(async move {
            let name = match Name::from_ascii(name) {
                Ok(name) => name,
                // Not a resolvable name, same as a missing one.
                Err(_) => return Err(LookupError::NotFound),
            };

            let query = Query::query(name, RecordType::A);
            let mut query_opts = DnsRequestOptions::default();
            query_opts.use_edns = true;

            let lookup = dns_query(self.nameserver, query, query_opts);
            let response = match tokio::time::timeout(self.timeout, lookup).await {
                Ok(Ok(response)) => response,
                Ok(Err(err)) => return Err(classify(err, self.timeout)),
                Err(_) => return Err(LookupError::Timeout(self.timeout)),
            };

            parse_dns_response(response, port)
        })
    }
}

async fn dns_query(
    server: SocketAddr,
    query: Query,
    query_opts: DnsRequestOptions,
) -> Result<DnsResponse, ProtoError> {
    let stream = UdpClientStream::builder(server, TokioRuntimeProvider::default()).build();
    let (client, bg) = Client::connect(stream).await?;
    tokio::spawn(bg);

    client
        .lookup(query, query_opts)
        .next()
        .await
        .transpose()?
        .ok_or_else(|| ProtoErrorKind::Message("expected a response").into())
}

fn classify(err: ProtoError, timeout: Duration) -> LookupError {
    match err.kind() {
        ProtoErrorKind::NoRecordsFound {
            response_code: ResponseCode::NXDomain | ResponseCode::NoError,
            ..
        } => LookupError::NotFound,
        ProtoErrorKind::Timeout => LookupError::Timeout(timeout),
        _ => LookupError::Proto(err),
    }
}

fn parse_dns_response(response: DnsResponse, port: u16) -> Result<Vec<SocketAddr>, LookupError> {
    let message = response.into_message();
    match message.response_code() {
        ResponseCode::NoError => {}
        ResponseCode::NXDomain => return Err(LookupError::NotFound),
        code => {
            let err = ProtoErrorKind::Msg(format!("nameserver answered {code}"));
            return Err(LookupError::Proto(err.into()));
        }
    }

    let addrs: Vec<_> = message
        .answers()
        .iter()
        .filter_map(|answer| match answer.data() {
            RData::A(addr) => Some(SocketAddr::new(IpAddr::V4(addr.0), port)),
            RData::AAAA(addr) => Some(SocketAddr::new(IpAddr::V6(addr.0), port)),
            _ => None,
        })
        .collect();

    if addrs.is_empty() {
        return Err(LookupError::NotFound);
    }
    Ok(addrs)
}

/// Builds the exit-list query name for `ip` under `zone`.
///
/// IPv4 octets and IPv6 nibbles are reversed as in reverse DNS. Text that
/// does not parse as an address has its dot-separated labels reversed.
#[must_use]
pub fn exit_list_name(ip: &str, zone: &str) -> String {
    let reversed = match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => addr
            .octets()
            .iter()
            .rev()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join("."),
        Ok(IpAddr::V6(addr)) => addr
            .octets()
            .iter()
            .rev()
            .flat_map(|byte| [byte & 0x0f, byte >> 4])
            .map(|nibble| format!("{nibble:x}"))
            .collect::<Vec<_>>()
            .join("."),
        Err(_) => ip.split('.').rev().collect::<Vec<_>>().join("."),
    };

    format!("{reversed}.{zone}")
}

/// Checks `ip` against the exit list using `resolver`.
///
/// An absent or empty address is never an exit node.
pub async fn is_exit_node<R>(
    resolver: &R,
    ip: Option<&str>,
    zone: &str,
    port: u16,
) -> Result<bool, Error>
where
    R: Resolve + ?Sized,
{
    let Some(ip) = ip.filter(|ip| !ip.is_empty()) else {
        return Ok(false);
    };

    let name = exit_list_name(ip, zone);
    tracing::debug!(%name, port, "querying exit list");

    match resolver.resolve(&name, port).await {
        Ok(addrs) => {
            tracing::trace!(%name, ?addrs, "listed");
            Ok(!addrs.is_empty())
        }
        Err(LookupError::NotFound) => {
            tracing::trace!(%name, "not listed");
            Ok(false)
        }
        Err(LookupError::Timeout(after)) => Err(CommunicationError::Timeout(after).into()),
        Err(LookupError::Proto(err)) => Err(CommunicationError::Dns(err).into()),
    }
}
