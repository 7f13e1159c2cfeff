//! Forwarding: pushes serialized jobs to the next stage's address
//!
//! A `Forwarder` keeps at most one open connection together with the
//! address it was opened for. Sending to the same address reuses it; a
//! different address closes it and opens a new one. The connection lives as
//! long as the worker, so consecutive jobs bound for the same stage share it.
//! Delivery is fire-and-forget: nothing is read back.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

/// Errors from the forwarding transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("send failed: {0}")]
    Send(#[from] std::io::Error),
}

/// An open outbound connection.
#[async_trait]
pub trait Connection: Send {
    async fn send(&mut self, payload: &str) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens connections to stage addresses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Box<dyn Connection>, TransportError>;
}

/// Newline-delimited payloads over TCP.
///
/// Addresses are `tcp://host:port` or plain `host:port`.
#[derive(Debug, Default, Clone)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

fn socket_address(address: &str) -> Result<&str, TransportError> {
    let target = address.strip_prefix("tcp://").unwrap_or(address);
    if target.is_empty() || target.contains("://") || !target.contains(':') {
        return Err(TransportError::InvalidAddress(address.to_string()));
    }
    Ok(target)
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, address: &str) -> Result<Box<dyn Connection>, TransportError> {
        let target = socket_address(address)?;
        let stream = TcpStream::connect(target)
            .await
            .map_err(|source| TransportError::Connect {
                address: address.to_string(),
                source,
            })?;
        Ok(Box::new(TcpConnection { stream }))
    }
}

struct TcpConnection {
    stream: TcpStream,
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        self.stream.write_all(payload.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// The worker's single cached outbound connection.
pub struct Forwarder {
    transport: Arc<dyn Transport>,
    connection: Option<Box<dyn Connection>>,
    address: Option<String>,
}

impl Forwarder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            connection: None,
            address: None,
        }
    }

    /// Address of the currently open connection, if any.
    pub fn connected_to(&self) -> Option<&str> {
        self.connection.as_ref().and(self.address.as_deref())
    }

    /// Send `payload` to `address`, reconnecting only when the address changes.
    pub async fn send(&mut self, address: &str, payload: &str) -> Result<(), TransportError> {
        if self.connection.is_some() && self.address.as_deref() != Some(address) {
            self.close().await;
        }

        if self.connection.is_none() {
            debug!(address, "opening forwarding connection");
            let connection = self.transport.connect(address).await?;
            self.connection = Some(connection);
            self.address = Some(address.to_string());
        }

        let result = match self.connection.as_mut() {
            Some(connection) => connection.send(payload).await,
            None => Ok(()),
        };
        if result.is_err() {
            // A broken connection must not be reused for the next job.
            self.connection = None;
            self.address = None;
        }
        result
    }

    /// Close the cached connection. Close errors are logged, not returned.
    pub async fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            debug!(address = ?self.address, "closing forwarding connection");
            if let Err(e) = connection.close().await {
                debug!(error = %e, "error while closing forwarding connection");
            }
        }
        self.address = None;
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("address", &self.connected_to())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Log {
        connects: Vec<String>,
        closes: usize,
        sent: Vec<(String, String)>,
    }

    struct FakeTransport {
        log: Arc<Mutex<Log>>,
        fail_sends: bool,
    }

    struct FakeConnection {
        address: String,
        log: Arc<Mutex<Log>>,
        fail_sends: bool,
    }

    #[async_trait]
    impl Connection for FakeConnection {
        async fn send(&mut self, payload: &str) -> Result<(), TransportError> {
            if self.fail_sends {
                return Err(TransportError::Send(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "peer went away",
                )));
            }
            self.log
                .lock()
                .unwrap()
                .sent
                .push((self.address.clone(), payload.to_string()));
            Ok(())
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.log.lock().unwrap().closes += 1;
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn connect(&self, address: &str) -> Result<Box<dyn Connection>, TransportError> {
            self.log.lock().unwrap().connects.push(address.to_string());
            Ok(Box::new(FakeConnection {
                address: address.to_string(),
                log: self.log.clone(),
                fail_sends: self.fail_sends,
            }))
        }
    }

    fn forwarder(fail_sends: bool) -> (Forwarder, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let transport = FakeTransport {
            log: log.clone(),
            fail_sends,
        };
        (Forwarder::new(Arc::new(transport)), log)
    }

    #[tokio::test]
    async fn same_address_reuses_connection() {
        let (mut fwd, log) = forwarder(false);
        fwd.send("tcp://a:1", "one").await.unwrap();
        fwd.send("tcp://a:1", "two").await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.connects, vec!["tcp://a:1"]);
        assert_eq!(log.closes, 0);
        assert_eq!(log.sent.len(), 2);
    }

    #[tokio::test]
    async fn address_change_reconnects() {
        let (mut fwd, log) = forwarder(false);
        fwd.send("tcp://a:1", "one").await.unwrap();
        fwd.send("tcp://b:2", "two").await.unwrap();
        assert_eq!(fwd.connected_to(), Some("tcp://b:2"));

        let log = log.lock().unwrap();
        assert_eq!(log.connects, vec!["tcp://a:1", "tcp://b:2"]);
        assert_eq!(log.closes, 1);
        assert_eq!(log.sent[1], ("tcp://b:2".to_string(), "two".to_string()));
    }

    #[tokio::test]
    async fn failed_send_drops_connection() {
        let (mut fwd, log) = forwarder(true);
        assert!(fwd.send("tcp://a:1", "one").await.is_err());
        assert!(fwd.connected_to().is_none());

        let _ = fwd.send("tcp://a:1", "two").await;
        assert_eq!(log.lock().unwrap().connects.len(), 2);
    }

    #[test]
    fn socket_address_parsing() {
        assert_eq!(socket_address("tcp://host:5000").unwrap(), "host:5000");
        assert_eq!(socket_address("127.0.0.1:9").unwrap(), "127.0.0.1:9");
        assert!(socket_address("").is_err());
        assert!(socket_address("amqp://queue:5672").is_err());
        assert!(socket_address("hostonly").is_err());
    }

    #[tokio::test]
    async fn tcp_transport_delivers_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("tcp://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            let mut received = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                received.push(line);
            }
            received
        });

        let mut fwd = Forwarder::new(Arc::new(TcpTransport::new()));
        fwd.send(&address, r#"{"id":"1"}"#).await.unwrap();
        fwd.send(&address, r#"{"id":"2"}"#).await.unwrap();
        fwd.close().await;

        let received = server.await.unwrap();
        assert_eq!(received, vec![r#"{"id":"1"}"#, r#"{"id":"2"}"#]);
    }
}
