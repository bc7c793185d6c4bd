//! SSRF-guarded HTTP fetching for nodes that reach the open web.
//!
//! The guard rejects the internal address space twice: once on the literal
//! host, and again on every address DNS resolves to. The body is capped
//! while streaming so an over-limit response never materializes in memory.

use std::net::IpAddr;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Url;
use tracing::warn;

use atelier_core::RuntimeError;

/// Per-fetch time budget.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Response body cap, enforced while streaming.
pub const MAX_FETCH_BYTES: usize = 5 * 1024 * 1024;

/// A fetched response body plus the metadata nodes care about.
pub struct FetchedBody {
    pub body: String,
    pub content_type: String,
    pub status: u16,
    pub final_url: String,
}

fn ipv4_blocked(ip: std::net::Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
}

fn ipv6_blocked(ip: std::net::Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return ipv4_blocked(mapped);
    }
    let segments = ip.segments();
    ip.is_loopback()
        || ip.is_unspecified()
        // unique-local fc00::/7
        || (segments[0] & 0xfe00) == 0xfc00
        // link-local fe80::/10
        || (segments[0] & 0xffc0) == 0xfe80
}

fn ip_blocked(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => ipv4_blocked(v4),
        IpAddr::V6(v6) => ipv6_blocked(v6),
    }
}

/// Checks a URL against the guard: scheme, literal host, and resolved
/// addresses.
pub async fn check_url(raw_url: &str) -> Result<Url, RuntimeError> {
    let url = Url::parse(raw_url)
        .map_err(|e| RuntimeError::HttpFetchBlocked(format!("invalid URL: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(RuntimeError::HttpFetchBlocked(format!(
            "scheme '{}' is not allowed",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| RuntimeError::HttpFetchBlocked("URL has no host".into()))?;

    if host.eq_ignore_ascii_case("localhost") || host.ends_with(".localhost") {
        return Err(RuntimeError::HttpFetchBlocked(format!("host '{host}' is internal")));
    }
    if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
        if ip_blocked(ip) {
            return Err(RuntimeError::HttpFetchBlocked(format!("address {ip} is internal")));
        }
        return Ok(url);
    }

    let port = url.port_or_known_default().unwrap_or(443);
    let resolved = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| RuntimeError::HttpFetchBlocked(format!("DNS lookup failed: {e}")))?;

    for addr in resolved {
        if ip_blocked(addr.ip()) {
            warn!("FETCH: '{}' resolves to internal address {}", host, addr.ip());
            return Err(RuntimeError::HttpFetchBlocked(format!(
                "host '{}' resolves to internal address {}",
                host,
                addr.ip()
            )));
        }
    }

    Ok(url)
}

/// Fetches a URL through the guard and returns the raw bytes plus the
/// content type. Same timeout and streaming cap as [`guarded_fetch`].
pub async fn guarded_fetch_bytes(url: &str) -> Result<(Vec<u8>, String), RuntimeError> {
    let fetched = fetch_raw(url).await?;
    Ok((fetched.0, fetched.1))
}

/// Fetches a URL through the guard with the timeout and streaming body cap.
///
/// Redirects are not followed: a redirect target would bypass the resolved
/// address check.
pub async fn guarded_fetch(url: &str) -> Result<FetchedBody, RuntimeError> {
    let (bytes, content_type, status, final_url) = fetch_raw(url).await?;
    Ok(FetchedBody {
        body: String::from_utf8_lossy(&bytes).into_owned(),
        content_type,
        status,
        final_url,
    })
}

async fn fetch_raw(url: &str) -> Result<(Vec<u8>, String, u16, String), RuntimeError> {
    let url = check_url(url).await?;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(FETCH_TIMEOUT)
        .user_agent("Mozilla/5.0 (compatible; AtelierBot/1.0)")
        .build()
        .map_err(|e| RuntimeError::HttpFetchBlocked(e.to_string()))?;

    let response = client.get(url.clone()).send().await.map_err(|e| {
        if e.is_timeout() {
            RuntimeError::HttpFetchTimeout
        } else {
            RuntimeError::HttpFetchBlocked(e.to_string())
        }
    })?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/plain")
        .to_string();
    let final_url = response.url().to_string();

    let mut stream = response.bytes_stream();
    let mut collected: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            if e.is_timeout() {
                RuntimeError::HttpFetchTimeout
            } else {
                RuntimeError::HttpFetchBlocked(e.to_string())
            }
        })?;
        if collected.len() + chunk.len() > MAX_FETCH_BYTES {
            return Err(RuntimeError::HttpFetchTooLarge(MAX_FETCH_BYTES));
        }
        collected.extend_from_slice(&chunk);
    }

    Ok((collected, content_type, status, final_url))
}
