//! Client identity resolution.
//!
//! The gate never trusts a single header: proxies and CDNs chain
//! `X-Forwarded-For`, so the resolver walks a fixed priority list and takes
//! the first candidate that parses as a public IP address. Spoofed private
//! addresses upstream are rejected; only the raw connection address is
//! accepted unvalidated, as the final fallback.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

/// Proxy-aware headers consulted for the client IP, in priority order.
const IP_HEADER_PRIORITY: [&str; 5] = [
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-forwarded",
    "x-cluster-client-ip",
    "x-client-ip",
];

/// One inbound lookup request, as handed to the gate by the host.
///
/// Header names are lowercased on insertion so lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct LookupRequest {
    /// Request headers, keyed by lowercased name.
    pub headers: HashMap<String, String>,
    /// Address of the direct connection, when the host knows it.
    pub remote_addr: Option<IpAddr>,
    /// HTTP method.
    pub method: String,
    /// The honeypot form field (`website`). Real users never fill it.
    pub honeypot: Option<String>,
    /// Client-supplied form-render timestamp, Unix seconds.
    pub form_timestamp: Option<i64>,
    /// Client-supplied CAPTCHA token (`g-recaptcha-response`).
    pub captcha_token: Option<String>,
}

impl LookupRequest {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> LookupRequestBuilder {
        LookupRequestBuilder::default()
    }

    /// Returns a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Builder for [`LookupRequest`].
#[derive(Debug, Clone, Default)]
pub struct LookupRequestBuilder {
    request: LookupRequest,
}

impl LookupRequestBuilder {
    /// Adds a header. Names are stored lowercased.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request
            .headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the direct connection address.
    #[must_use]
    pub const fn remote_addr(mut self, addr: IpAddr) -> Self {
        self.request.remote_addr = Some(addr);
        self
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.request.method = method.into();
        self
    }

    /// Sets the honeypot field value.
    #[must_use]
    pub fn honeypot(mut self, value: impl Into<String>) -> Self {
        self.request.honeypot = Some(value.into());
        self
    }

    /// Sets the form-render timestamp (Unix seconds).
    #[must_use]
    pub const fn form_timestamp(mut self, ts: i64) -> Self {
        self.request.form_timestamp = Some(ts);
        self
    }

    /// Sets the CAPTCHA token.
    #[must_use]
    pub fn captcha_token(mut self, token: impl Into<String>) -> Self {
        self.request.captcha_token = Some(token.into());
        self
    }

    /// Builds the request.
    #[must_use]
    pub fn build(self) -> LookupRequest {
        self.request
    }
}

/// Identity fields derived once per request and shared by every check.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    /// Best-effort resolved client IP.
    pub ip: IpAddr,
    /// User agent as submitted (empty when absent).
    pub user_agent: String,
    /// Referer as submitted (empty when absent).
    pub referer: String,
    /// HTTP method.
    pub method: String,
    /// The full lowercased header map, for fingerprinting and heuristics.
    pub headers: HashMap<String, String>,
}

impl ClientIdentity {
    /// Derives the identity for one request.
    #[must_use]
    pub fn from_request(request: &LookupRequest) -> Self {
        Self {
            ip: resolve_client_ip(&request.headers, request.remote_addr),
            user_agent: request.header("user-agent").unwrap_or_default().to_string(),
            referer: request.header("referer").unwrap_or_default().to_string(),
            method: request.method.clone(),
            headers: request.headers.clone(),
        }
    }
}

/// Resolves the best-effort client IP from proxy headers.
///
/// Walks [`IP_HEADER_PRIORITY`]; for each present header takes the first
/// comma-separated entry, trims it, and accepts it if it parses as an IP
/// address outside the private/reserved ranges. Falls back to the raw
/// connection address (accepted unvalidated), and to loopback only when no
/// connection address exists. Pure function of its inputs.
#[must_use]
pub fn resolve_client_ip(
    headers: &HashMap<String, String>,
    remote_addr: Option<IpAddr>,
) -> IpAddr {
    for name in IP_HEADER_PRIORITY {
        let Some(value) = headers.get(name) else {
            continue;
        };
        let Some(candidate) = value.split(',').next().map(str::trim) else {
            continue;
        };
        if let Ok(ip) = candidate.parse::<IpAddr>() {
            if is_public(ip) {
                return ip;
            }
        }
    }

    remote_addr.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Returns true if the address is outside the private/reserved ranges.
fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => {
            let seg0 = v6.segments()[0];
            let unique_local = (seg0 & 0xfe00) == 0xfc00; // fc00::/7
            let link_local = (seg0 & 0xffc0) == 0xfe80; // fe80::/10
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}
