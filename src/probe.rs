use async_trait::async_trait;
use tokio::io::AsyncWriteExt as _;
use tokio::net::TcpStream;

/// Errors produced by a single probe attempt.
///
/// The watchdog maps every variant to a failed probe; nothing here is
/// propagated further.
#[derive(Debug)]
pub enum ProbeError {
    /// The configured target could not be parsed as `host` or `host:port`.
    InvalidTarget { target: String },
    /// The connection attempt failed (includes DNS resolution failures).
    Connect {
        addr: String,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::InvalidTarget { target } => {
                write!(f, "invalid probe target {target:?}")
            }
            ProbeError::Connect { addr, source } => {
                write!(f, "probe connect to {addr} failed: {source}")
            }
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::InvalidTarget { .. } => None,
            ProbeError::Connect { source, .. } => Some(source),
        }
    }
}

/// Interface for reachability probes.
///
/// Implementers perform exactly one check per call and report failure through
/// the error value; retry policy lives in the watchdog's poll cadence.
/// Timeout behavior is applied by the caller.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Executes one probe against `target` (`host` or `host:port`).
    async fn probe(&self, target: &str) -> Result<(), ProbeError>;
}

/// A parsed probe destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
}

impl ProbeTarget {
    /// Parse `host` or `host:port`, falling back to `default_port`.
    ///
    /// A bare IPv6 literal (more than one colon) is taken whole and probed on
    /// the default port.
    pub fn parse(raw: &str, default_port: u16) -> Result<Self, ProbeError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ProbeError::InvalidTarget {
                target: raw.to_string(),
            });
        }
        match raw.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !host.contains(':') => {
                let port = port.parse().map_err(|_| ProbeError::InvalidTarget {
                    target: raw.to_string(),
                })?;
                Ok(Self {
                    host: host.to_string(),
                    port,
                })
            }
            _ => Ok(Self {
                host: raw.to_string(),
                port: default_port,
            }),
        }
    }

    /// The `host:port` form handed to the connector, bracketing IPv6 hosts.
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Reachability check via a single TCP connection attempt.
pub struct TcpProber {
    default_port: u16,
}

impl TcpProber {
    /// Creates a prober that uses `default_port` for targets without one.
    pub fn new(default_port: u16) -> Self {
        Self { default_port }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, target: &str) -> Result<(), ProbeError> {
        let target = ProbeTarget::parse(target, self.default_port)?;
        let addr = target.addr();
        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| ProbeError::Connect {
                addr: addr.clone(),
                source: e,
            })?;
        stream
            .shutdown()
            .await
            .map_err(|e| ProbeError::Connect { addr, source: e })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_host_only_uses_default_port() {
        let target = ProbeTarget::parse("10.7.1.30", 53).unwrap();
        assert_eq!(target.host, "10.7.1.30");
        assert_eq!(target.port, 53);
    }

    #[test]
    fn test_parse_host_and_port() {
        let target = ProbeTarget::parse("gateway.local:8080", 53).unwrap();
        assert_eq!(target.host, "gateway.local");
        assert_eq!(target.port, 8080);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let target = ProbeTarget::parse("  10.0.0.1  ", 53).unwrap();
        assert_eq!(target.host, "10.0.0.1");
    }

    #[test]
    fn test_parse_empty_target_errors() {
        let err = ProbeTarget::parse("   ", 53).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidTarget { .. }));
    }

    #[test]
    fn test_parse_bad_port_errors() {
        let err = ProbeTarget::parse("host:notaport", 53).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidTarget { .. }));
    }

    #[test]
    fn test_parse_ipv6_literal_uses_default_port() {
        let target = ProbeTarget::parse("::1", 53).unwrap();
        assert_eq!(target.host, "::1");
        assert_eq!(target.port, 53);
        assert_eq!(target.addr(), "[::1]:53");
    }

    #[tokio::test]
    async fn test_probe_succeeds_against_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let prober = TcpProber::new(53);
        prober
            .probe(&format!("127.0.0.1:{}", addr.port()))
            .await
            .unwrap();

        accept.await.unwrap();
    }

    #[tokio::test]
    async fn test_probe_fails_against_closed_port() {
        // Bind then drop to find a port with nothing listening on it.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = TcpProber::new(53);
        let err = prober
            .probe(&format!("127.0.0.1:{port}"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_probe_fails_on_unresolvable_host() {
        let prober = TcpProber::new(53);
        let err = prober
            .probe("definitely-not-a-real-host.invalid")
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_probe_rejects_invalid_target() {
        let prober = TcpProber::new(53);
        let err = prober.probe("").await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidTarget { .. }));
    }
}
