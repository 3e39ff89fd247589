use std::net::IpAddr;

use tokio::net::lookup_host;

use crate::error::{ProbeError, Result};

/// A resolved scan target: what the user typed and the address probes go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub input: String,
    pub addr: IpAddr,
}

/// Resolve `host` once, before any probe is scheduled.
///
/// Literal IPs skip DNS. Unless `allow_remote` is set, the address must be a
/// loopback address.
pub async fn resolve_target(host: &str, allow_remote: bool) -> Result<Target> {
    let host = host.trim();
    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => ip,
        Err(_) => {
            let mut addrs = lookup_host((host, 0))
                .await
                .map_err(|e| ProbeError::TargetResolution {
                    target: host.to_string(),
                    reason: e.to_string(),
                })?
                .map(|sock| sock.ip())
                .collect::<Vec<_>>();
            // Prefer IPv4 so `localhost` lands on 127.0.0.1 like the default target.
            addrs.sort_by_key(|ip| !ip.is_ipv4());
            addrs
                .first()
                .copied()
                .ok_or_else(|| ProbeError::TargetResolution {
                    target: host.to_string(),
                    reason: "no addresses returned".to_string(),
                })?
        }
    };

    if !allow_remote && !addr.is_loopback() {
        return Err(ProbeError::TargetNotLocal {
            target: host.to_string(),
            addr,
        });
    }

    Ok(Target {
        input: host.to_string(),
        addr,
    })
}
