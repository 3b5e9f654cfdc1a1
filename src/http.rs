use std::time::Duration;

use reqwest::{Client, Proxy, StatusCode};

use crate::error::{CommunicationError, Error};

/// Public IP-echo endpoint answering with the caller's address as plain text.
pub const IPIFY_URL: &str = "https://api.ipify.org";

/// Local Tor SOCKS port, resolving hostnames through Tor.
pub const DEFAULT_TOR_PROXY: &str = "socks5h://127.0.0.1:9050";

/// Upper bound on a single HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches `url` through `session` and returns the response body as text.
///
/// The body is returned byte for byte; a body that is not valid UTF-8 is a
/// communication failure.
///
/// Status 401 and 403 map to [`Error::Authentication`]. Every other non-2xx
/// status, transport failure or timeout maps to [`Error::Communication`].
pub async fn get_text(session: &Client, url: &str, timeout: Duration) -> Result<String, Error> {
    tracing::debug!(url, "fetching");

    let response = session.get(url).timeout(timeout).send().await?;
    let status = response.status();
    tracing::trace!(url, %status, "received response");

    let response = response.error_for_status().map_err(|err| match err.status() {
        Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => Error::Authentication(err),
        _ => Error::Communication(CommunicationError::Http(err)),
    })?;

    let body = response.bytes().await?;
    Ok(String::from_utf8(body.to_vec()).map_err(CommunicationError::Body)?)
}

/// Builds a session whose requests are routed through a SOCKS proxy,
/// typically a local Tor daemon at [`DEFAULT_TOR_PROXY`].
pub fn tor_session(proxy_url: &str, timeout: Duration) -> Result<Client, Error> {
    let proxy = Proxy::all(proxy_url)?;
    Ok(Client::builder().proxy(proxy).timeout(timeout).build()?)
}
