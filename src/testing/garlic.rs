//! In-memory session bridge.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::RngCore;

use super::MemoryMuxerHub;
use crate::core::{MIN_DESTINATION_SIZE, SubstrateError};
use crate::garlic::{
    DestHash, Destination, GarlicAddr, GarlicSession, GarlicSubstrate, SessionBridge,
};
use crate::identity::Keypair;

type Directory = Arc<Mutex<HashMap<DestHash, Destination>>>;

/// A router stand-in: sessions get random destinations, published in a
/// shared directory that every session can look up.
#[derive(Clone, Default)]
pub struct MemoryBridge {
    hub: MemoryMuxerHub<GarlicAddr>,
    directory: Directory,
    last_open: Arc<Mutex<Option<(String, Vec<String>)>>>,
    fail_open: Arc<AtomicBool>,
}

impl MemoryBridge {
    /// Bridge with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make further session opens fail as if the bridge were down.
    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::Release);
    }

    /// Bridge address and options of the last session opened.
    pub fn last_open(&self) -> Option<(String, Vec<String>)> {
        self.last_open.lock().clone()
    }

    /// Publish a destination without opening a session for it.
    pub fn publish(&self, dest: Destination) {
        self.directory.lock().insert(dest.hash(), dest);
    }
}

#[async_trait]
impl SessionBridge for MemoryBridge {
    async fn open_session(
        &self,
        _keypair: &Keypair,
        bridge_addr: &str,
        options: &[String],
    ) -> Result<GarlicSubstrate, SubstrateError> {
        if self.fail_open.load(Ordering::Acquire) {
            return Err(SubstrateError::Unreachable(bridge_addr.into()));
        }
        *self.last_open.lock() = Some((bridge_addr.into(), options.to_vec()));

        let mut bytes = vec![0u8; MIN_DESTINATION_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        let destination = Destination::from_bytes(bytes)
            .map_err(|err| SubstrateError::Handshake(err.to_string()))?;
        self.publish(destination.clone());

        let muxer = self.hub.muxer(GarlicAddr::Destination(destination.clone()));
        Ok(GarlicSubstrate {
            session: Arc::new(MemoryGarlicSession {
                destination,
                directory: Arc::clone(&self.directory),
                closed: AtomicBool::new(false),
            }),
            muxer: Arc::new(muxer),
        })
    }
}

struct MemoryGarlicSession {
    destination: Destination,
    directory: Directory,
    closed: AtomicBool,
}

#[async_trait]
impl GarlicSession for MemoryGarlicSession {
    fn local_destination(&self) -> &Destination {
        &self.destination
    }

    async fn lookup(&self, hash: &DestHash) -> Result<Destination, SubstrateError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SubstrateError::Closed);
        }
        self.directory
            .lock()
            .get(hash)
            .cloned()
            .ok_or_else(|| SubstrateError::Unreachable(hash.to_string()))
    }

    async fn close(&self) -> Result<(), SubstrateError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(SubstrateError::Closed);
        }
        self.directory.lock().remove(&self.destination.hash());
        Ok(())
    }
}
