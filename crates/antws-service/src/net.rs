//! Addresses advertised at startup.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// The address other machines on the LAN would reach us at.
///
/// Connecting a UDP socket sends nothing; it only asks the OS which local
/// interface routes outward.
pub fn lan_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

/// Base URL for one host.
pub fn base_url(scheme: &str, host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("{}://[{}]:{}/", scheme, host, port)
    } else {
        format!("{}://{}:{}/", scheme, host, port)
    }
}

/// Base URLs to print: the LAN address (when known) and localhost.
pub fn base_urls(scheme: &str, lan: Option<IpAddr>, port: u16) -> Vec<String> {
    let mut urls = Vec::with_capacity(2);
    if let Some(ip) = lan {
        urls.push(base_url(scheme, &ip.to_string(), port));
    }
    urls.push(base_url(scheme, "localhost", port));
    urls
}
