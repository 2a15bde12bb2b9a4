use sha2::{Digest, Sha256};

/// Best-effort client IP: `X-Real-IP`, then the first `X-Forwarded-For` hop, then the peer address.
pub fn client_ip<'a>(
    real_ip: Option<&'a str>,
    forwarded_for: Option<&'a str>,
    peer: Option<&'a str>,
) -> &'a str {
    real_ip
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            forwarded_for
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .or(peer)
        .unwrap_or("unknown")
}

/// First 16 hex chars of `sha256("{ip}:{user_agent}")`.
pub fn client_fingerprint(ip: &str, user_agent: Option<&str>) -> String {
    let ua = user_agent.unwrap_or("unknown");
    let digest = Sha256::digest(format!("{ip}:{ua}").as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}
