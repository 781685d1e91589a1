//! Resource manager that counts scopes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::address::Multiaddr;
use crate::core::ResourceError;
use crate::identity::PeerId;
use crate::resource::{ConnManagementScope, Direction, ResourceManager};

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicUsize,
    released: AtomicUsize,
    double_releases: AtomicUsize,
    reject_open: AtomicBool,
    reject_peer: AtomicBool,
}

/// Counts acquired and released scopes, with switchable rejections.
#[derive(Debug, Clone, Default)]
pub struct CountingResourceManager {
    counters: Arc<Counters>,
}

impl CountingResourceManager {
    /// Admit-everything manager with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse new scopes.
    pub fn reject_open(&self, reject: bool) {
        self.counters.reject_open.store(reject, Ordering::SeqCst);
    }

    /// Refuse peer bindings.
    pub fn reject_peer(&self, reject: bool) {
        self.counters.reject_peer.store(reject, Ordering::SeqCst);
    }

    /// Scopes handed out.
    pub fn acquired(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    /// Scopes released.
    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Scopes currently held.
    pub fn open(&self) -> usize {
        self.acquired() - self.released()
    }

    /// Release calls on already released scopes.
    pub fn double_releases(&self) -> usize {
        self.counters.double_releases.load(Ordering::SeqCst)
    }
}

struct CountingScope {
    counters: Arc<Counters>,
    done: AtomicBool,
}

impl ConnManagementScope for CountingScope {
    fn set_peer(&self, peer: &PeerId) -> Result<(), ResourceError> {
        if self.counters.reject_peer.load(Ordering::SeqCst) {
            return Err(ResourceError::Blocked(peer.to_string()));
        }
        Ok(())
    }

    fn done(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            self.counters.double_releases.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counters.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl ResourceManager for CountingResourceManager {
    fn open_connection(
        &self,
        direction: Direction,
        _use_fd: bool,
        _endpoint: Option<&Multiaddr>,
    ) -> Result<Box<dyn ConnManagementScope>, ResourceError> {
        if self.counters.reject_open.load(Ordering::SeqCst) {
            return Err(ResourceError::LimitExceeded {
                scope: "system".into(),
                resource: format!("{direction} conns"),
            });
        }
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingScope {
            counters: Arc::clone(&self.counters),
            done: AtomicBool::new(false),
        }))
    }
}
