//! FIFO buffer for ICE candidates that cannot be used yet.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;

use log::{debug, warn};
use peer_handshake_protocol::IceCandidate;

/// Candidate together with the position it arrived at.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct QueuedCandidate {
    pub index: u64,
    pub candidate: IceCandidate,
}

/// Outcome of one [`CandidateQueue::flush`].
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct FlushReport {
    pub applied: usize,
    pub failed: usize,
}

/// Holds candidates in arrival order until the structure they apply to exists.
///
/// Uses interior mutability so it can be shared by reference between a flush that is
/// suspended inside `apply` and new candidates arriving in the meantime.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    pending: RefCell<VecDeque<QueuedCandidate>>,
    next_index: Cell<u64>,
    draining: Cell<bool>,
}

impl CandidateQueue {
    /// Appends a candidate and returns its arrival index.
    pub fn enqueue(&self, candidate: IceCandidate) -> u64 {
        let index = self.next_index.get();
        self.next_index.set(index.wrapping_add(1));
        self.pending
            .borrow_mut()
            .push_back(QueuedCandidate { index, candidate });
        index
    }

    /// Hands every queued candidate to `apply`, oldest first, until the queue is empty.
    ///
    /// Candidates enqueued while `apply` is suspended are handled by the same call.
    /// A failing candidate is logged and skipped. Calling `flush` while another flush
    /// is in progress does nothing.
    pub async fn flush<F, Fut>(&self, mut apply: F) -> FlushReport
    where
        F: FnMut(QueuedCandidate) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let mut report = FlushReport::default();
        if self.draining.get() {
            debug!("candidate queue is already draining");
            return report;
        }
        let _draining = DrainingGuard::new(&self.draining);

        while let Some(next) = self.pop_front() {
            let index = next.index;
            match apply(next).await {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    warn!("skipping ICE candidate #{}: {:#}", index, err);
                    report.failed += 1;
                }
            }
        }
        report
    }

    pub fn is_draining(&self) -> bool {
        self.draining.get()
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Drops every queued candidate, arrival indices keep counting.
    pub fn clear(&self) {
        self.pending.borrow_mut().clear();
    }

    fn pop_front(&self) -> Option<QueuedCandidate> {
        self.pending.borrow_mut().pop_front()
    }
}

struct DrainingGuard<'a>(&'a Cell<bool>);

impl<'a> DrainingGuard<'a> {
    fn new(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for DrainingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
