//! Coordinator ↔ worker control protocol.
//!
//! Each worker gets one link: a pair of bounded crossbeam channels, one per
//! direction, so delivery is FIFO per worker. The exchange is always
//! `Ready` → `Init` → steady operation → `Terminate` → `Terminate` (ack).

#![allow(missing_docs)]

use std::fmt;

use crossbeam_channel::{Receiver, Sender, bounded};

/// Capacity of each direction of a worker link.
pub const LINK_CAPACITY: usize = 16;

/// Index of a worker in the coordinator's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Worker → coordinator: thread is up and waiting for `Init`.
    Ready,
    /// Coordinator → worker: start the probe loop.
    Init,
    /// Worker → coordinator: a probe cycle finished.
    Heartbeat,
    /// Either direction: request exit, or acknowledge it.
    Terminate,
    /// Coordinator → worker: final teardown, treated like `Terminate`.
    Fini,
}

/// Fixed-size control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadMsg {
    pub worker: WorkerId,
    pub verb: Verb,
}

impl ThreadMsg {
    #[must_use]
    pub const fn new(worker: WorkerId, verb: Verb) -> Self {
        Self { worker, verb }
    }
}

/// Coordinator's end of a worker link.
#[derive(Debug)]
pub struct WorkerLink {
    pub to_worker: Sender<ThreadMsg>,
    pub from_worker: Receiver<ThreadMsg>,
}

/// Worker's end of the link.
#[derive(Debug)]
pub struct CoordinatorLink {
    pub id: WorkerId,
    pub to_coordinator: Sender<ThreadMsg>,
    pub from_coordinator: Receiver<ThreadMsg>,
}

impl CoordinatorLink {
    /// Blocking send; fails only when the coordinator side is gone.
    pub fn send(&self, verb: Verb) -> bool {
        self.to_coordinator
            .send(ThreadMsg::new(self.id, verb))
            .is_ok()
    }

    /// Non-blocking send; a full channel drops the message.
    pub fn offer(&self, verb: Verb) -> bool {
        self.to_coordinator
            .try_send(ThreadMsg::new(self.id, verb))
            .is_ok()
    }
}

/// Create both ends of a worker link.
#[must_use]
pub fn link(id: WorkerId) -> (WorkerLink, CoordinatorLink) {
    let (to_worker, from_coordinator) = bounded(LINK_CAPACITY);
    let (to_coordinator, from_worker) = bounded(LINK_CAPACITY);
    (
        WorkerLink {
            to_worker,
            from_worker,
        },
        CoordinatorLink {
            id,
            to_coordinator,
            from_coordinator,
        },
    )
}
