//! Socket reachability probing

use async_trait::async_trait;
use schema::{ProbeSubject, ProbeTarget};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::debug;

use super::{Probe, ProbeError};

/// Transport protocols a [`SocketProbe`] can dial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

impl FromStr for Transport {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "tcp" | "tcp4" => Ok(Transport::Tcp),
            "udp" | "udp4" => Ok(Transport::Udp),
            other => Err(ProbeError::Unsupported(format!("protocol '{other}'"))),
        }
    }
}

/// Socket probe that tests connection establishment to one address
///
/// For TCP the handshake must complete; for UDP a connected socket must be
/// created (UDP has no handshake, so this only catches local routing and
/// socket errors). The connection is closed immediately afterwards.
///
/// # Example
///
/// ```rust
/// use sonde_core::probe::{Probe, SocketProbe};
/// use schema::ProbeTarget;
/// use std::time::Duration;
///
/// # async fn example() {
/// let target = ProbeTarget::new("127.0.0.1", "8080", "tcp");
/// let probe = SocketProbe::new(target, Duration::from_secs(5));
///
/// // This will fail unless something is listening on port 8080
/// let result = probe.probe().await;
/// println!("{}", result.message());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SocketProbe {
    /// Address, port and protocol to dial
    target: ProbeTarget,
    /// Dial timeout
    timeout: Duration,
}

impl SocketProbe {
    /// Create a new socket probe
    pub fn new(target: ProbeTarget, timeout: Duration) -> Self {
        Self { target, timeout }
    }

    /// Get the target being dialed
    #[must_use]
    pub fn target(&self) -> &ProbeTarget {
        &self.target
    }

    fn port(&self) -> Result<u16, ProbeError> {
        match self.target.port.trim().parse::<u16>() {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(ProbeError::Dial(format!(
                "invalid port \"{}\"",
                self.target.port
            ))),
        }
    }

    async fn dial_tcp(&self, port: u16) -> Result<(), ProbeError> {
        let address = self.target.address.as_str();
        match timeout(self.timeout, TcpStream::connect((address, port))).await {
            Ok(Ok(_stream)) => {
                // Stream is dropped here, closing the connection
                Ok(())
            }
            Ok(Err(io_error)) => Err(ProbeError::Io(io_error)),
            Err(_elapsed) => Err(ProbeError::Timeout(self.timeout)),
        }
    }

    async fn dial_udp(&self, port: u16) -> Result<(), ProbeError> {
        let address = self.target.address.clone();
        let connect = async move {
            let local: SocketAddr = ([0, 0, 0, 0], 0).into();
            let socket = UdpSocket::bind(local).await?;
            socket.connect((address.as_str(), port)).await?;
            Ok::<_, std::io::Error>(())
        };
        match timeout(self.timeout, connect).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(io_error)) => Err(ProbeError::Io(io_error)),
            Err(_elapsed) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl Probe for SocketProbe {
    fn subject(&self) -> ProbeSubject {
        ProbeSubject::Socket(self.target.clone())
    }

    async fn check(&self) -> Result<String, ProbeError> {
        let transport: Transport = self.target.protocol.parse()?;
        let port = self.port()?;
        debug!("socket probe dialing {}", self.target);

        match transport {
            Transport::Tcp => self.dial_tcp(port).await?,
            Transport::Udp => self.dial_udp(port).await?,
        }

        Ok(format!(
            "Connection to {} on {}/{} is OK",
            self.target.address, self.target.port, self.target.protocol
        ))
    }

    fn failure_message(&self, err: &ProbeError) -> String {
        format!(
            "Connection to {} on {}/{} is KO : {}",
            self.target.address, self.target.port, self.target.protocol, err
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::ErrorKind;
    use tokio::net::TcpListener;
    use tokio::task;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);
        port
    }

    #[tokio::test]
    async fn test_tcp_probe_success() {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local address");

        let _handle = task::spawn(async move {
            while let Ok((_stream, _addr)) = listener.accept().await {
                // Just accept and drop connections
            }
        });

        let target = ProbeTarget::new("127.0.0.1", addr.port().to_string(), "tcp");
        let result = SocketProbe::new(target, Duration::from_secs(1)).probe().await;
        assert!(result.success(), "socket probe should succeed: {result:?}");
        assert_eq!(
            result.message(),
            format!("Connection to 127.0.0.1 on {}/tcp is OK", addr.port())
        );
    }

    #[tokio::test]
    async fn test_tcp_probe_connection_refused() {
        let port = closed_port().await;
        let target = ProbeTarget::new("127.0.0.1", port.to_string(), "tcp");
        let result = SocketProbe::new(target, Duration::from_secs(1)).probe().await;

        assert!(!result.success());
        assert_eq!(result.error_kind(), ErrorKind::Dial);
        let msg = result.message();
        assert!(msg.contains("127.0.0.1"), "{msg}");
        assert!(msg.contains(&port.to_string()), "{msg}");
        assert!(msg.contains("tcp"), "{msg}");
        assert!(msg.contains("is KO : "), "{msg}");
    }

    #[tokio::test]
    async fn test_tcp_probe_timeout() {
        // 10.255.255.1 is non-routable and should time out
        let target = ProbeTarget::new("10.255.255.1", "80", "tcp");
        let started = std::time::Instant::now();
        let result = SocketProbe::new(target, Duration::from_millis(100)).probe().await;

        assert!(!result.success());
        assert!(started.elapsed() < Duration::from_secs(2));
        // Some sandboxes reject the route outright instead of dropping packets
        assert!(
            matches!(result.error_kind(), ErrorKind::Timeout | ErrorKind::Dial),
            "unexpected kind {:?}",
            result.error_kind()
        );
    }

    #[tokio::test]
    async fn test_udp_probe_connects() {
        let target = ProbeTarget::new("127.0.0.1", "53", "udp");
        let result = SocketProbe::new(target, Duration::from_secs(1)).probe().await;
        assert!(result.success(), "udp connect should succeed: {result:?}");
        assert!(result.message().ends_with("53/udp is OK"));
    }

    #[tokio::test]
    async fn test_invalid_port_is_dial_failure() {
        for port in ["", "http", "0", "70000"] {
            let target = ProbeTarget::new("127.0.0.1", port, "tcp");
            let result = SocketProbe::new(target, Duration::from_secs(1)).probe().await;
            assert!(!result.success());
            assert_eq!(result.error_kind(), ErrorKind::Dial, "port {port:?}");
            assert!(result.message().contains("invalid port"));
        }
    }

    #[tokio::test]
    async fn test_unsupported_protocol() {
        let target = ProbeTarget::new("127.0.0.1", "80", "sctp");
        let result = SocketProbe::new(target, Duration::from_secs(1)).probe().await;
        assert!(!result.success());
        assert_eq!(result.error_kind(), ErrorKind::Unknown);
        assert!(result.message().contains("sctp"));
    }

    #[test]
    fn test_transport_parsing() {
        assert_eq!("tcp".parse::<Transport>().unwrap(), Transport::Tcp);
        assert_eq!("".parse::<Transport>().unwrap(), Transport::Tcp);
        assert_eq!("UDP".parse::<Transport>().unwrap(), Transport::Udp);
        assert!("icmp".parse::<Transport>().is_err());
    }
}
