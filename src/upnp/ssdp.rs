//! SSDP-based media renderer discovery.
//!
//! Sends M-SEARCH queries for `MediaRenderer:1` devices to the standard
//! SSDP multicast group and collects unicast responses on the sending
//! socket. One call to [`search`] is one discovery round; the discovery
//! engine runs rounds periodically.

use local_ip_address::list_afinet_netifas;
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::protocol_constants::{
    MEDIA_RENDERER_SEARCH_TARGET, SSDP_MULTICAST_ADDR, SSDP_MULTICAST_TTL,
};

// ─────────────────────────────────────────────────────────────────────────────
// ASCII Case-Insensitive Helpers
// ─────────────────────────────────────────────────────────────────────────────
//
// These avoid allocations from to_lowercase() during SSDP response parsing.
// HTTP headers are ASCII, so byte-level comparison is safe and efficient.

/// Checks if `s` starts with `prefix` (ASCII case-insensitive, no allocation).
#[inline]
fn starts_with_ignore_ascii_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Finds the byte index of `needle` in `haystack` (ASCII case-insensitive, no allocation).
#[inline]
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during an SSDP discovery round.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Failed to bind UDP socket for discovery.
    #[error("failed to bind UDP socket: {0}")]
    SocketBind(#[source] std::io::Error),

    /// No usable network interfaces found.
    #[error("no usable network interfaces found")]
    NoInterfaces,
}

/// Convenient Result alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

// ─────────────────────────────────────────────────────────────────────────────
// M-SEARCH
// ─────────────────────────────────────────────────────────────────────────────

/// Build the M-SEARCH message.
fn build_msearch_message(mx: u64) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: 239.255.255.250:1900\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\r\n",
        mx, MEDIA_RENDERER_SEARCH_TARGET
    )
}

/// A single SSDP response from a candidate renderer.
#[derive(Debug, Clone)]
pub struct SsdpResponse {
    /// Raw USN uuid portion (normalization happens at ingest).
    pub udn: String,
    /// Description document URL from the LOCATION header.
    pub location: String,
}

/// Parses an SSDP response into a candidate renderer.
///
/// Returns None if the response lacks the USN or LOCATION headers; both are
/// required to identify and describe the device. Header names are matched
/// ASCII case-insensitively - some devices send lowercase headers.
fn parse_ssdp_response(response: &str) -> Option<SsdpResponse> {
    // Extract LOCATION header (find colon index to preserve URL colons)
    let location = response
        .lines()
        .find(|l| starts_with_ignore_ascii_case(l, "location:"))
        .and_then(|l| l.find(':').map(|idx| l[idx + 1..].trim().to_string()))?;

    let udn = response
        .lines()
        .find(|l| starts_with_ignore_ascii_case(l, "usn:"))
        .and_then(|l| find_ignore_ascii_case(l, "uuid:").map(|idx| l[idx + 5..].to_string()))
        .map(|s| s.split("::").next().unwrap_or("").trim().to_string())
        .filter(|s| !s.is_empty())?;

    if location.is_empty() {
        return None;
    }

    Some(SsdpResponse { udn, location })
}

// ─────────────────────────────────────────────────────────────────────────────
// Interfaces & Sockets
// ─────────────────────────────────────────────────────────────────────────────

/// Virtual interface prefixes to filter out during discovery.
const VIRTUAL_INTERFACE_PREFIXES: &[&str] = &[
    "lo", "docker", "veth", "br-", "virbr", "vmnet", "vbox", "tun", "tap",
];

/// Checks if an interface name belongs to a virtual/container interface.
fn is_virtual_interface(name: &str) -> bool {
    let name_lower = name.to_lowercase();
    VIRTUAL_INTERFACE_PREFIXES
        .iter()
        .any(|prefix| name_lower.starts_with(prefix))
}

/// Network interface information for discovery.
#[derive(Debug, Clone)]
struct InterfaceInfo {
    name: String,
    ip: Ipv4Addr,
}

/// Gets all usable IPv4 interfaces, filtering virtual/container interfaces
/// and loopback.
fn get_interfaces() -> Vec<InterfaceInfo> {
    list_afinet_netifas()
        .unwrap_or_else(|e| {
            log::warn!("[SSDP] Failed to list network interfaces: {}", e);
            Vec::new()
        })
        .into_iter()
        .filter_map(|(name, addr)| {
            if is_virtual_interface(&name) {
                log::trace!("[SSDP] Skipping virtual interface: {}", name);
                return None;
            }
            match addr {
                IpAddr::V4(ipv4) if !ipv4.is_loopback() => Some(InterfaceInfo { name, ip: ipv4 }),
                _ => None,
            }
        })
        .collect()
}

/// Creates a UDP socket bound to a specific interface.
///
/// SO_REUSEADDR (and SO_REUSEPORT on Unix) allow rapid restarts; the
/// multicast TTL follows the UPnP 1.0 recommendation.
fn create_socket(iface_ip: Ipv4Addr) -> DiscoveryResult<UdpSocket> {
    let bind_addr = SocketAddr::new(IpAddr::V4(iface_ip), 0);

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::SocketBind)?;

    if let Err(e) = socket.set_reuse_address(true) {
        log::warn!("[SSDP] Failed to set SO_REUSEADDR on {}: {}", iface_ip, e);
    }

    #[cfg(unix)]
    if let Err(e) = socket.set_reuse_port(true) {
        log::warn!("[SSDP] Failed to set SO_REUSEPORT on {}: {}", iface_ip, e);
    }

    if let Err(e) = socket.set_multicast_ttl_v4(SSDP_MULTICAST_TTL) {
        log::warn!("[SSDP] Failed to set multicast TTL on {}: {}", iface_ip, e);
    }

    socket
        .set_nonblocking(true)
        .map_err(DiscoveryError::SocketBind)?;

    socket
        .bind(&bind_addr.into())
        .map_err(DiscoveryError::SocketBind)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(DiscoveryError::SocketBind)
}

// ─────────────────────────────────────────────────────────────────────────────
// Search
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for one SSDP discovery round.
#[derive(Debug, Clone)]
pub struct SsdpConfig {
    /// Number of M-SEARCH packets to send per interface.
    pub send_count: u64,
    /// Delay between M-SEARCH repeats.
    pub retry_delay: Duration,
    /// Window during which responses are collected.
    pub response_window: Duration,
    /// MX value (max device response delay in seconds).
    pub mx: u64,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            send_count: 3,
            retry_delay: Duration::from_millis(800),
            response_window: Duration::from_secs(3),
            mx: 2,
        }
    }
}

/// Runs one SSDP discovery round for media renderers.
///
/// Sends M-SEARCH queries on all non-virtual interfaces and collects the
/// unicast responses, deduplicated by UDN. The same socket is used for send
/// AND receive since devices reply unicast back to the sending socket/port.
pub async fn search(config: &SsdpConfig) -> DiscoveryResult<Vec<SsdpResponse>> {
    let interfaces = get_interfaces();
    if interfaces.is_empty() {
        return Err(DiscoveryError::NoInterfaces);
    }

    let msg = build_msearch_message(config.mx);

    let mut sockets: Vec<(InterfaceInfo, Arc<UdpSocket>)> = Vec::new();
    for iface in &interfaces {
        match create_socket(iface.ip) {
            Ok(socket) => sockets.push((iface.clone(), Arc::new(socket))),
            Err(e) => {
                log::warn!(
                    "[SSDP] Failed to create socket for {} ({}): {}",
                    iface.name,
                    iface.ip,
                    e
                );
            }
        }
    }

    if sockets.is_empty() {
        return Err(DiscoveryError::NoInterfaces);
    }

    log::debug!(
        "[SSDP] Search round on {} interface(s) ({} sends, {}ms spacing, {}s window)",
        sockets.len(),
        config.send_count,
        config.retry_delay.as_millis(),
        config.response_window.as_secs()
    );

    let discovered: Arc<Mutex<Vec<SsdpResponse>>> = Arc::new(Mutex::new(Vec::new()));

    // Send M-SEARCH repeats on each socket
    let send_futures: Vec<_> = sockets
        .iter()
        .map(|(iface, socket)| {
            let socket = Arc::clone(socket);
            let iface_name = iface.name.clone();
            let msg = msg.as_bytes().to_vec();
            let send_count = config.send_count;
            let retry_delay = config.retry_delay;

            async move {
                for i in 0..send_count {
                    if i > 0 {
                        tokio::time::sleep(retry_delay).await;
                    }
                    if let Err(e) = socket.send_to(&msg, SSDP_MULTICAST_ADDR).await {
                        log::warn!(
                            "[SSDP] Failed to send M-SEARCH on {} (attempt {}): {}",
                            iface_name,
                            i + 1,
                            e
                        );
                    }
                }
            }
        })
        .collect();

    // Collect responses during the whole window
    let recv_futures: Vec<_> = sockets
        .iter()
        .map(|(iface, socket)| {
            let socket = Arc::clone(socket);
            let iface_name = iface.name.clone();
            let discovered = Arc::clone(&discovered);
            let window = config.response_window;

            async move {
                let mut buf = [0u8; 2048];
                let start = std::time::Instant::now();

                while start.elapsed() < window {
                    let remaining = window.saturating_sub(start.elapsed());
                    match timeout(remaining, socket.recv_from(&mut buf)).await {
                        Ok(Ok((amt, src))) => {
                            let response = String::from_utf8_lossy(&buf[..amt]);
                            if let Some(candidate) = parse_ssdp_response(&response) {
                                log::debug!(
                                    "[SSDP] Response from {}: udn={}, location={}",
                                    src.ip(),
                                    candidate.udn,
                                    candidate.location
                                );
                                discovered.lock().await.push(candidate);
                            }
                        }
                        Ok(Err(e)) => {
                            log::warn!("[SSDP] Socket recv error on {}: {}", iface_name, e);
                        }
                        Err(_) => break, // Window elapsed
                    }
                }
            }
        })
        .collect();

    let (_, _) = tokio::join!(
        futures::future::join_all(send_futures),
        futures::future::join_all(recv_futures)
    );

    let mut discovered = std::mem::take(&mut *discovered.lock().await);

    // Deduplicate by UDN, keep deterministic order
    let mut seen = HashSet::new();
    discovered.retain(|r| seen.insert(r.udn.clone()));
    discovered.sort_by(|a, b| a.udn.cmp(&b.udn));

    log::debug!(
        "[SSDP] Round complete: {} unique device(s) responded",
        discovered.len()
    );

    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msearch_message_targets_media_renderers() {
        let msg = build_msearch_message(2);
        assert!(msg.contains("M-SEARCH * HTTP/1.1"));
        assert!(msg.contains("HOST: 239.255.255.250:1900"));
        assert!(msg.contains("MX: 2"));
        assert!(msg.contains("ST: urn:schemas-upnp-org:device:MediaRenderer:1"));
    }

    #[test]
    fn parses_valid_response() {
        let response = "HTTP/1.1 200 OK\r\n\
            CACHE-CONTROL: max-age=1800\r\n\
            LOCATION: http://192.168.1.40:8080/description.xml\r\n\
            ST: urn:schemas-upnp-org:device:MediaRenderer:1\r\n\
            USN: uuid:5f9ec1b3-ff59-19bb-8530-0005cd1a2b3c::urn:schemas-upnp-org:device:MediaRenderer:1\r\n\r\n";
        let parsed = parse_ssdp_response(response).expect("should parse");
        assert_eq!(parsed.udn, "5f9ec1b3-ff59-19bb-8530-0005cd1a2b3c");
        assert_eq!(parsed.location, "http://192.168.1.40:8080/description.xml");
    }

    #[test]
    fn parses_lowercase_headers() {
        let response = "HTTP/1.1 200 OK\r\n\
            location: http://192.168.1.40:8080/description.xml\r\n\
            usn: UUID:abc-123::urn:schemas-upnp-org:device:MediaRenderer:1\r\n\r\n";
        let parsed = parse_ssdp_response(response).expect("should parse");
        assert_eq!(parsed.udn, "abc-123");
    }

    #[test]
    fn rejects_response_without_location() {
        let response = "HTTP/1.1 200 OK\r\nUSN: uuid:abc-123\r\n\r\n";
        assert!(parse_ssdp_response(response).is_none());
    }

    #[test]
    fn rejects_response_without_usn_uuid() {
        let response = "HTTP/1.1 200 OK\r\nLOCATION: http://192.168.1.40/d.xml\r\n\r\n";
        assert!(parse_ssdp_response(response).is_none());
    }

    #[test]
    fn virtual_interfaces_are_filtered() {
        assert!(is_virtual_interface("lo"));
        assert!(is_virtual_interface("docker0"));
        assert!(is_virtual_interface("veth1234"));
        assert!(!is_virtual_interface("eth0"));
        assert!(!is_virtual_interface("en0"));
    }

    #[test]
    fn find_ignore_ascii_case_matches_mixed_case() {
        assert_eq!(find_ignore_ascii_case("USN: uuid:abc", "uuid:"), Some(5));
        assert_eq!(find_ignore_ascii_case("USN: UUID:abc", "uuid:"), Some(5));
        assert_eq!(find_ignore_ascii_case("no match", "uuid:"), None);
    }
}
