use std::net::{IpAddr, ToSocketAddrs, UdpSocket};

/// Whether `host` names this machine: a loopback or unspecified address, or an
/// address one of the local interfaces can bind.
pub fn is_local_host(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    match (host, 0u16).to_socket_addrs() {
        Ok(addrs) => addrs.map(|a| a.ip()).any(is_local_ip),
        Err(_) => false,
    }
}

fn is_local_ip(ip: IpAddr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    // Binding only succeeds for addresses assigned to an interface here.
    UdpSocket::bind((ip, 0)).is_ok()
}
