use std::net::{IpAddr, SocketAddr, TcpStream};
use std::time::Duration;

/// True if a TCP connection to `lan_ip:port` opens within `timeout`.
pub fn probe(lan_ip: &str, port: u16, timeout: Duration) -> bool {
    let Ok(ip) = lan_ip.trim().parse::<IpAddr>() else {
        return false;
    };
    TcpStream::connect_timeout(&SocketAddr::new(ip, port), timeout).is_ok()
}
