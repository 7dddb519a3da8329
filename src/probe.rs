use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time;

/// Attempt one TCP connect to `ip:port`, bounded by `timeout`.
///
/// Returns `true` iff the connect completes in time. Refused, timed out,
/// and otherwise failed attempts all collapse to `false`; nothing past
/// this layer distinguishes them. The socket is dropped immediately on
/// success without exchanging data.
pub async fn probe_port(ip: IpAddr, port: u16, timeout: Duration) -> bool {
    let addr = SocketAddr::new(ip, port);
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn listening_port_is_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let open = probe_port(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            Duration::from_millis(500),
        )
        .await;
        assert!(open);
    }

    #[tokio::test]
    async fn refused_port_is_not_open() {
        // Bind then drop so the port is known-closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let open = probe_port(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            Duration::from_millis(500),
        )
        .await;
        assert!(!open);
    }

    #[tokio::test]
    async fn unroutable_host_times_out_as_not_open() {
        // TEST-NET-3, reserved and never routed.
        let ip: IpAddr = "203.0.113.1".parse().unwrap();
        let open = probe_port(ip, 80, Duration::from_millis(50)).await;
        assert!(!open);
    }
}
