//! Peering bootstrap.
//!
//! Direct mesh links are seeded over plain TCP. Each side writes its raw
//! 32-byte public key and reads the peer's, concurrently, under one
//! deadline:
//!
//! ```text
//!   A                                   B
//!   │── key_A (32 bytes) ──────────────▶│
//!   │◀────────────── key_B (32 bytes) ──│
//!   └─ handle_conn(key_B, stream, 0)    └─ handle_conn(key_A, stream, 0)
//! ```
//!
//! No framing, no version byte. The exchange does not prove that the peer
//! holds the key it sent; authenticity comes from the secure multiplexer on
//! application connections, not from this link.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::{MeshAddr, MeshNetwork, PeeringStream};
use crate::core::{
    PEERING_HANDSHAKE_TIMEOUT, PEERING_LINK_PRIORITY, PEERING_SCHEME_TCP, PUBLIC_KEY_SIZE,
    SubstrateError, TransportError, TransportResult,
};

/// A parsed `tcp://host:port` peering endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeeringEndpoint {
    host: String,
}

impl PeeringEndpoint {
    /// Parse a scheme-qualified endpoint. Only `tcp` is supported.
    pub fn parse(endpoint: &str) -> TransportResult<Self> {
        let Some((scheme, rest)) = endpoint.split_once("://") else {
            return Err(TransportError::InvalidPeeringAddress(endpoint.into()));
        };
        if scheme != PEERING_SCHEME_TCP {
            return Err(TransportError::UnsupportedPeeringScheme(scheme.into()));
        }
        let host = rest.split('/').next().unwrap_or_default();
        if host.is_empty() {
            return Err(TransportError::InvalidPeeringAddress(endpoint.into()));
        }
        Ok(Self { host: host.into() })
    }

    /// `host:port` part.
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Exchange keys with the peer on `stream`.
///
/// The read and the write run concurrently so two peers with full send
/// buffers cannot deadlock. A read error is reported before a write error;
/// a successful read does not mask a failed write.
pub async fn handshake<S>(
    stream: &mut S,
    local: &MeshAddr,
    deadline: Duration,
) -> Result<MeshAddr, SubstrateError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let exchange = async {
        let mut remote = [0u8; PUBLIC_KEY_SIZE];
        let (read, write) = tokio::join!(reader.read_exact(&mut remote), async {
            writer.write_all(local.as_bytes()).await?;
            writer.flush().await
        });
        read?;
        write?;
        Ok::<_, std::io::Error>(MeshAddr::new(remote))
    };

    match tokio::time::timeout(deadline, exchange).await {
        Ok(Ok(remote)) => Ok(remote),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(SubstrateError::Timeout),
    }
}

/// Run the handshake and hand the stream to the mesh.
///
/// On handshake failure the stream is dropped, closing it.
pub async fn handshake_and_add<S>(
    mut stream: S,
    network: &dyn MeshNetwork,
    deadline: Duration,
) -> Result<(), SubstrateError>
where
    S: PeeringStream + 'static,
{
    let remote = handshake(&mut stream, &network.public_key(), deadline).await?;
    debug!(peer = ?remote, "peering handshake complete");
    network
        .handle_conn(remote, Box::new(stream), PEERING_LINK_PRIORITY)
        .await
}

/// Dial one peering endpoint and run the link.
pub async fn dial_peering(endpoint: &str, network: &dyn MeshNetwork) -> TransportResult<()> {
    let endpoint = PeeringEndpoint::parse(endpoint)?;
    let stream = TcpStream::connect(endpoint.host()).await?;
    handshake_and_add(stream, network, PEERING_HANDSHAKE_TIMEOUT).await?;
    Ok(())
}

async fn accept_peerings(listener: TcpListener, network: Arc<dyn MeshNetwork>) {
    let mut handshakes = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        debug!(%err, "peering listener stopped");
                        return;
                    }
                };
                let network = Arc::clone(&network);
                handshakes.spawn(async move {
                    if let Err(err) =
                        handshake_and_add(stream, &*network, PEERING_HANDSHAKE_TIMEOUT).await
                    {
                        debug!(%remote, %err, "inbound peering failed");
                    }
                });
            }
            Some(_) = handshakes.join_next(), if !handshakes.is_empty() => {}
        }
    }
}

/// Peering listeners and outbound peering dials of one transport.
///
/// Dropping the set, or calling [`close`](Self::close), aborts every task
/// and with them every link they carry.
#[derive(Debug)]
pub struct Peerings {
    listen_addrs: Vec<SocketAddr>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Peerings {
    /// Bind every listen endpoint, then start one dial task per peer.
    ///
    /// If any listen endpoint fails, listeners already bound are closed and
    /// the error returned. Dial failures are only logged.
    pub async fn start(
        listens: &[String],
        peers: &[String],
        network: Arc<dyn MeshNetwork>,
    ) -> TransportResult<Self> {
        let mut peerings = Self {
            listen_addrs: Vec::with_capacity(listens.len()),
            tasks: Mutex::new(Vec::with_capacity(listens.len() + peers.len())),
        };

        for endpoint in listens {
            let parsed = PeeringEndpoint::parse(endpoint)?;
            let listener = TcpListener::bind(parsed.host()).await?;
            let local = listener.local_addr()?;
            info!(%local, "listening for peerings");
            peerings.listen_addrs.push(local);
            peerings
                .tasks
                .get_mut()
                .push(tokio::spawn(accept_peerings(listener, Arc::clone(&network))));
        }

        for endpoint in peers {
            let endpoint = endpoint.clone();
            let network = Arc::clone(&network);
            peerings.tasks.get_mut().push(tokio::spawn(async move {
                if let Err(err) = dial_peering(&endpoint, &*network).await {
                    warn!(peer = %endpoint, %err, "dialing peering failed");
                }
            }));
        }

        Ok(peerings)
    }

    /// Addresses the peering listeners are bound to.
    pub fn listen_addrs(&self) -> &[SocketAddr] {
        &self.listen_addrs
    }

    /// Abort every peering task.
    pub fn close(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Drop for Peerings {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Keypair;
    use crate::testing::MemoryMesh;
    use std::io;

    fn key() -> MeshAddr {
        MeshAddr::new(Keypair::generate().public_bytes())
    }

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(
            PeeringEndpoint::parse("tcp://127.0.0.1:9000").unwrap().host(),
            "127.0.0.1:9000"
        );
        assert_eq!(
            PeeringEndpoint::parse("tcp://[::1]:9000/").unwrap().host(),
            "[::1]:9000"
        );
        assert!(matches!(
            PeeringEndpoint::parse("tls://127.0.0.1:9000"),
            Err(TransportError::UnsupportedPeeringScheme(scheme)) if scheme == "tls"
        ));
        assert!(matches!(
            PeeringEndpoint::parse("127.0.0.1:9000"),
            Err(TransportError::InvalidPeeringAddress(_))
        ));
        assert!(matches!(
            PeeringEndpoint::parse("tcp://"),
            Err(TransportError::InvalidPeeringAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_handshake_symmetry() {
        let (a_key, b_key) = (key(), key());
        let (mut a, mut b) = tokio::io::duplex(PUBLIC_KEY_SIZE);
        let (a_seen, b_seen) = tokio::join!(
            handshake(&mut a, &a_key, PEERING_HANDSHAKE_TIMEOUT),
            handshake(&mut b, &b_key, PEERING_HANDSHAKE_TIMEOUT)
        );
        assert_eq!(a_seen.unwrap(), b_key);
        assert_eq!(b_seen.unwrap(), a_key);
    }

    #[tokio::test]
    async fn test_handshake_tiny_buffer_does_not_deadlock() {
        // Neither side can buffer the whole key; only concurrent read/write
        // lets both finish.
        let (a_key, b_key) = (key(), key());
        let (mut a, mut b) = tokio::io::duplex(4);
        let (a_seen, b_seen) = tokio::join!(
            handshake(&mut a, &a_key, PEERING_HANDSHAKE_TIMEOUT),
            handshake(&mut b, &b_key, PEERING_HANDSHAKE_TIMEOUT)
        );
        assert_eq!(a_seen.unwrap(), b_key);
        assert_eq!(b_seen.unwrap(), a_key);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_deadline() {
        let (a_key, b_key) = (key(), key());
        let (mut a, mut b) = tokio::io::duplex(PUBLIC_KEY_SIZE * 2);

        let slow = tokio::spawn(async move {
            tokio::time::sleep(PEERING_HANDSHAKE_TIMEOUT * 2).await;
            handshake(&mut b, &b_key, PEERING_HANDSHAKE_TIMEOUT).await
        });

        let fast = handshake(&mut a, &a_key, PEERING_HANDSHAKE_TIMEOUT).await;
        assert!(matches!(fast, Err(SubstrateError::Timeout)));
        drop(a);

        // The slow side reads the key already buffered, but its write hits
        // the closed connection.
        match slow.await.unwrap() {
            Err(SubstrateError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("expected broken pipe, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handshake_short_read() {
        let (mut a, mut b) = tokio::io::duplex(64);
        b.write_all(&[1u8; 10]).await.unwrap();
        drop(b);
        let result = handshake(&mut a, &key(), PEERING_HANDSHAKE_TIMEOUT).await;
        assert!(matches!(result, Err(SubstrateError::Io(err)) if err.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_peerings_over_tcp() {
        let mesh = MemoryMesh::new();
        let a = mesh.start_node(Keypair::generate()).await;
        let b = mesh.start_node(Keypair::generate()).await;

        let listening = Peerings::start(&["tcp://127.0.0.1:0".into()], &[], Arc::clone(&a.network))
            .await
            .unwrap();
        let port = listening.listen_addrs()[0].port();
        let dialing = Peerings::start(
            &[],
            &[format!("tcp://127.0.0.1:{port}")],
            Arc::clone(&b.network),
        )
        .await
        .unwrap();

        let a_links = mesh.wait_for_links(&a.network.public_key(), 1).await;
        let b_links = mesh.wait_for_links(&b.network.public_key(), 1).await;
        assert_eq!(a_links, vec![b.network.public_key()]);
        assert_eq!(b_links, vec![a.network.public_key()]);

        listening.close();
        dialing.close();
    }

    #[tokio::test]
    async fn test_peerings_bind_failure_closes_bound() {
        let mesh = MemoryMesh::new();
        let a = mesh.start_node(Keypair::generate()).await;
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = Peerings::start(
            &[format!("tcp://127.0.0.1:{port}"), "udp://127.0.0.1:0".into()],
            &[],
            Arc::clone(&a.network),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedPeeringScheme(_)));

        // The listener bound before the failure goes away with its task.
        let mut rebound = None;
        for _ in 0..50 {
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await {
                rebound = Some(listener);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(rebound.is_some(), "port {port} still held after failed start");
    }

    #[tokio::test]
    async fn test_failed_dial_is_only_logged() {
        let mesh = MemoryMesh::new();
        let a = mesh.start_node(Keypair::generate()).await;
        let peerings = Peerings::start(&[], &["quic://127.0.0.1:1".into()], Arc::clone(&a.network))
            .await
            .unwrap();
        assert!(peerings.listen_addrs().is_empty());
    }
}
