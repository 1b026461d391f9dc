//! Host identity helpers.
//!
//! Notifications are only acted upon when the file they announce lives on
//! this machine, so the runner needs the set of addresses it answers to.
//! Detection runs blocking commands and lookups; call it off the runtime.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs, UdpSocket};
use std::process::Command;
use tracing::debug;

/// Returns the name of this host, or `"localhost"` when it cannot be found.
pub fn hostname() -> String {
    for path in ["/proc/sys/kernel/hostname", "/etc/hostname"] {
        if let Ok(name) = std::fs::read_to_string(path) {
            let name = name.trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }

    Command::new("hostname")
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// IP addresses that belong to this machine.
#[derive(Debug, Clone, Default)]
pub struct LocalHosts {
    addrs: HashSet<IpAddr>,
}

impl LocalHosts {
    /// Collects loopback addresses, the addresses of every interface, the
    /// address of the default route and whatever the host name resolves to.
    pub fn detect() -> Self {
        let mut addrs: HashSet<IpAddr> = [
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
        ]
        .into_iter()
        .collect();

        addrs.extend(interface_addrs());

        // No packet is sent; connect only selects the outgoing interface.
        if let Ok(socket) = UdpSocket::bind("0.0.0.0:0") {
            if socket.connect("8.8.8.8:80").is_ok() {
                if let Ok(addr) = socket.local_addr() {
                    addrs.insert(addr.ip());
                }
            }
        }

        addrs.extend(resolve(&hostname()));
        debug!("Local addresses: {:?}", addrs);
        Self { addrs }
    }

    /// Builds a set from explicit addresses.
    pub fn from_addrs(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            addrs: addrs.into_iter().collect(),
        }
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        ip.is_loopback() || self.addrs.contains(&ip)
    }

    /// Whether `host` names this machine. An empty host means a local path.
    pub async fn is_local(&self, host: &str) -> bool {
        if host.is_empty() {
            return true;
        }
        if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
            return self.contains(ip);
        }
        match tokio::net::lookup_host((host, 0)).await {
            Ok(mut resolved) => resolved.any(|addr| self.contains(addr.ip())),
            Err(e) => {
                debug!("Cannot resolve {}: {}", host, e);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}

/// Addresses of every configured interface, from `ip addr` or, where that
/// is not installed, `ifconfig`.
fn interface_addrs() -> Vec<IpAddr> {
    let listings: [(&str, &[&str]); 2] = [("ip", &["-o", "addr", "show"]), ("ifconfig", &["-a"])];
    for (program, args) in listings {
        match Command::new(program).args(args).output() {
            Ok(output) if output.status.success() => {
                return parse_interface_addrs(&String::from_utf8_lossy(&output.stdout));
            }
            Ok(output) => debug!("{} exited with {}", program, output.status),
            Err(e) => debug!("Cannot run {}: {}", program, e),
        }
    }
    Vec::new()
}

/// Extracts the `inet`/`inet6` addresses of an `ip addr` or `ifconfig`
/// listing. Prefix lengths, zone ids and the old `addr:` labels are dropped.
pub fn parse_interface_addrs(listing: &str) -> Vec<IpAddr> {
    let words: Vec<&str> = listing.split_whitespace().collect();
    let mut addrs = Vec::new();

    for (i, word) in words.iter().enumerate() {
        if *word != "inet" && *word != "inet6" {
            continue;
        }
        let mut value = words.get(i + 1).copied().unwrap_or_default();
        if value == "addr:" {
            value = words.get(i + 2).copied().unwrap_or_default();
        }
        let value = value.trim_start_matches("addr:");
        let value = value.split(['/', '%']).next().unwrap_or_default();
        if let Ok(ip) = value.parse::<IpAddr>() {
            addrs.push(ip);
        }
    }
    addrs
}

fn resolve(host: &str) -> Vec<IpAddr> {
    (host, 0)
        .to_socket_addrs()
        .map(|it| it.map(|sa| sa.ip()).collect())
        .unwrap_or_default()
}
