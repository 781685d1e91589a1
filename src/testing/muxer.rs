//! In-memory secure multiplexer.
//!
//! Nodes register on a shared [`MemoryMuxerHub`] under their native address.
//! The handshake exchanges certificate chains and runs both sides'
//! verifiers; streams are [`tokio::io::duplex`] pairs.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::DuplexStream;
use tokio::sync::{mpsc, oneshot};

use crate::core::{
    HandshakeConfig, MuxedSession, MuxedStream, SecureListener, SecureMuxer, ServerConfig,
    SubstrateError,
};
use crate::identity::CertificateChain;

const ACCEPT_BACKLOG: usize = 64;
const STREAM_BUFFER: usize = 64 * 1024;

/// Address usable as a hub key.
pub trait HubAddr: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static> HubAddr for T {}

struct ServerHello<A> {
    certificates: CertificateChain,
    session: MemorySession<A>,
    verdict: oneshot::Sender<bool>,
}

struct Incoming<A> {
    from: A,
    certificates: CertificateChain,
    reply: oneshot::Sender<Result<ServerHello<A>, String>>,
}

type Listeners<A> = Arc<Mutex<HashMap<A, mpsc::Sender<Incoming<A>>>>>;

/// Shared switchboard connecting [`MemoryMuxer`]s.
pub struct MemoryMuxerHub<A> {
    listeners: Listeners<A>,
}

impl<A: HubAddr> MemoryMuxerHub<A> {
    /// Empty hub.
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// A muxer bound to `addr`.
    pub fn muxer(&self, addr: A) -> MemoryMuxer<A> {
        MemoryMuxer {
            addr,
            listeners: Arc::clone(&self.listeners),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether something listens on `addr`.
    pub fn is_listening(&self, addr: &A) -> bool {
        self.listeners.lock().contains_key(addr)
    }
}

impl<A: HubAddr> Default for MemoryMuxerHub<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for MemoryMuxerHub<A> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

/// Secure multiplexer bound to one hub address.
pub struct MemoryMuxer<A> {
    addr: A,
    listeners: Listeners<A>,
    closed: AtomicBool,
}

impl<A: HubAddr> MemoryMuxer<A> {
    /// The address this muxer is bound to.
    pub fn addr(&self) -> &A {
        &self.addr
    }
}

#[async_trait]
impl<A: HubAddr> SecureMuxer<A> for MemoryMuxer<A> {
    async fn dial(
        &self,
        target: A,
        config: HandshakeConfig,
    ) -> Result<Box<dyn MuxedSession<A>>, SubstrateError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SubstrateError::Closed);
        }
        let queue = self
            .listeners
            .lock()
            .get(&target)
            .cloned()
            .ok_or_else(|| SubstrateError::Unreachable(format!("{target:?}")))?;

        let (reply, hello) = oneshot::channel();
        queue
            .send(Incoming {
                from: self.addr.clone(),
                certificates: config.certificates.clone(),
                reply,
            })
            .await
            .map_err(|_| SubstrateError::Unreachable(format!("{target:?}")))?;

        let hello = hello
            .await
            .map_err(|_| SubstrateError::Handshake("server went away".into()))?
            .map_err(SubstrateError::Handshake)?;

        match (config.verifier)(&hello.certificates) {
            Ok(_) => {
                let _ = hello.verdict.send(true);
                Ok(Box::new(hello.session))
            }
            Err(err) => {
                let _ = hello.verdict.send(false);
                Err(SubstrateError::Handshake(err.to_string()))
            }
        }
    }

    async fn listen(
        &self,
        config: ServerConfig,
    ) -> Result<Box<dyn SecureListener<A>>, SubstrateError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SubstrateError::Closed);
        }
        let (tx, rx) = mpsc::channel(ACCEPT_BACKLOG);
        {
            let mut listeners = self.listeners.lock();
            if listeners.contains_key(&self.addr) {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("{:?} already listening", self.addr),
                )
                .into());
            }
            listeners.insert(self.addr.clone(), tx);
        }
        Ok(Box::new(MemoryListener {
            addr: self.addr.clone(),
            incoming: tokio::sync::Mutex::new(rx),
            config,
            listeners: Arc::clone(&self.listeners),
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> Result<(), SubstrateError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(SubstrateError::Closed);
        }
        self.listeners.lock().remove(&self.addr);
        Ok(())
    }
}

struct MemoryListener<A: HubAddr> {
    addr: A,
    incoming: tokio::sync::Mutex<mpsc::Receiver<Incoming<A>>>,
    config: ServerConfig,
    listeners: Listeners<A>,
    closed: AtomicBool,
}

#[async_trait]
impl<A: HubAddr> SecureListener<A> for MemoryListener<A> {
    async fn accept(&self) -> Result<Box<dyn MuxedSession<A>>, SubstrateError> {
        let mut incoming = self.incoming.lock().await;
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(SubstrateError::Closed);
            }
            let Some(client) = incoming.recv().await else {
                return Err(SubstrateError::Closed);
            };

            let handshake = (self.config.config_for_client)();
            if let Err(err) = (handshake.verifier)(&client.certificates) {
                let _ = client.reply.send(Err(err.to_string()));
                continue;
            }

            let (server, client_session) = MemorySession::pair(
                self.addr.clone(),
                client.from.clone(),
                client.certificates,
                handshake.certificates.clone(),
                self.config.mux.max_incoming_streams,
            );
            let (verdict, verdict_rx) = oneshot::channel();
            let hello = ServerHello {
                certificates: handshake.certificates,
                session: client_session,
                verdict,
            };
            if client.reply.send(Ok(hello)).is_err() {
                continue;
            }
            if verdict_rx.await == Ok(true) {
                return Ok(Box::new(server));
            }
        }
    }

    fn local_addr(&self) -> A {
        self.addr.clone()
    }

    async fn close(&self) -> Result<(), SubstrateError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(SubstrateError::Closed);
        }
        self.listeners.lock().remove(&self.addr);
        Ok(())
    }
}

impl<A: HubAddr> Drop for MemoryListener<A> {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.listeners.lock().remove(&self.addr);
        }
    }
}

/// One side of an in-memory session.
pub struct MemorySession<A> {
    local: A,
    remote: A,
    peer_certificates: CertificateChain,
    opener: Mutex<Option<mpsc::Sender<DuplexStream>>>,
    acceptor: tokio::sync::Mutex<mpsc::Receiver<DuplexStream>>,
    closed: Arc<AtomicBool>,
}

impl<A: HubAddr> MemorySession<A> {
    /// Connected `(server, client)` pair.
    fn pair(
        server_addr: A,
        client_addr: A,
        client_certificates: CertificateChain,
        server_certificates: CertificateChain,
        max_incoming_streams: u32,
    ) -> (Self, Self) {
        let capacity = (max_incoming_streams as usize).max(1);
        let (to_server, server_rx) = mpsc::channel(capacity);
        let (to_client, client_rx) = mpsc::channel(capacity);
        let closed = Arc::new(AtomicBool::new(false));
        let server = Self {
            local: server_addr.clone(),
            remote: client_addr.clone(),
            peer_certificates: client_certificates,
            opener: Mutex::new(Some(to_client)),
            acceptor: tokio::sync::Mutex::new(server_rx),
            closed: Arc::clone(&closed),
        };
        let client = Self {
            local: client_addr,
            remote: server_addr,
            peer_certificates: server_certificates,
            opener: Mutex::new(Some(to_server)),
            acceptor: tokio::sync::Mutex::new(client_rx),
            closed,
        };
        (server, client)
    }
}

#[async_trait]
impl<A: HubAddr> MuxedSession<A> for MemorySession<A> {
    fn peer_certificates(&self) -> &CertificateChain {
        &self.peer_certificates
    }

    fn local_addr(&self) -> A {
        self.local.clone()
    }

    fn remote_addr(&self) -> A {
        self.remote.clone()
    }

    async fn open_stream(&self) -> io::Result<Box<dyn MuxedStream>> {
        let opener = self
            .opener
            .lock()
            .clone()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        let (local, remote) = tokio::io::duplex(STREAM_BUFFER);
        opener
            .send(remote)
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::ConnectionReset))?;
        Ok(Box::new(local))
    }

    async fn accept_stream(&self) -> io::Result<Box<dyn MuxedStream>> {
        let mut acceptor = self.acceptor.lock().await;
        match acceptor.recv().await {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(io::Error::from(io::ErrorKind::ConnectionAborted)),
        }
    }

    fn close(&self, _code: u64, _reason: &str) -> Result<(), SubstrateError> {
        self.closed.store(true, Ordering::Release);
        match self.opener.lock().take() {
            Some(_) => Ok(()),
            None => Err(SubstrateError::Closed),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
