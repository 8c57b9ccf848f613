// src/gate.rs
//! Run-wide admission gate for network operations.
//!
//! One counting semaphore shared by every probe, page fetch and enrichment call.
//! No ordering or fairness between hosts. Closing the gate stops new admissions;
//! permits already handed out stay valid until dropped.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Clone, Debug)]
pub struct Gate {
    sem: Arc<Semaphore>,
    limit: usize,
}

/// Held for the duration of one network operation.
pub type Admission = OwnedSemaphorePermit;

impl Gate {
    /// `limit` of 0 is treated as 1.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            sem: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait for a slot. `None` once the gate has been closed.
    pub async fn admit(&self) -> Option<Admission> {
        self.sem.clone().acquire_owned().await.ok()
    }

    /// Stop admitting new work (e.g. on Ctrl-C). Waiters are woken with `None`.
    pub fn close(&self) {
        if !self.sem.is_closed() {
            tracing::warn!(limit = self.limit, "gate closed; no new network work will start");
        }
        self.sem.close();
    }

    pub fn is_closed(&self) -> bool {
        self.sem.is_closed()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }
}
