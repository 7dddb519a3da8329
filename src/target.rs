use std::net::IpAddr;

use anyhow::{bail, Context, Result};
use tokio::net::lookup_host;

/// Validate a standalone-scan target. Only IP literals are accepted; a
/// malformed value is a usage error and no probe is attempted.
pub fn parse_target(s: &str) -> Result<IpAddr> {
    let trimmed = s.trim();
    trimmed
        .parse::<IpAddr>()
        .with_context(|| format!("invalid target address: {trimmed}"))
}

/// Resolve a server's `ip` field to an address. IP literals pass through
/// untouched; anything else goes through DNS and the first answer wins.
pub async fn resolve_host(host: &str) -> Result<IpAddr> {
    let host = host.trim();
    if host.is_empty() {
        bail!("empty host");
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let mut addrs = lookup_host((host, 0))
        .await
        .with_context(|| format!("failed to resolve host: {host}"))?;
    addrs
        .next()
        .map(|sa| sa.ip())
        .with_context(|| format!("host resolved to no addresses: {host}"))
}
