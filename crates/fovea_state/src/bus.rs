//! Single-writer/many-reader progress bus.
//!
//! Maps job id -> subscriber set. Delivery is best-effort and advisory;
//! the persisted job row is authoritative. A subscriber whose channel is
//! full or closed is dropped on the spot, so a stalled WebSocket can never
//! back-pressure the worker.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use fovea_protocol::{JobEvent, JobId};

/// Events buffered per subscriber before it counts as stalled.
const SUBSCRIBER_BUFFER: usize = 16;

/// Identifies one subscription for `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    job_id: JobId,
    id: u64,
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<JobEvent>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    subscribers: HashMap<JobId, Vec<Subscriber>>,
}

/// The bus itself. All state sits behind one short critical section.
#[derive(Default)]
pub struct ProgressBus {
    inner: Mutex<BusInner>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for one job. The receiver lives as long as
    /// the owning connection; dropping it is enough to get cleaned up on
    /// the next publish.
    pub fn subscribe(&self, job_id: JobId) -> (SubscriptionHandle, mpsc::Receiver<JobEvent>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut inner = self.inner.lock().expect("progress bus poisoned");
        inner.next_id += 1;
        let handle = SubscriptionHandle {
            job_id,
            id: inner.next_id,
        };
        inner
            .subscribers
            .entry(job_id)
            .or_default()
            .push(Subscriber { id: handle.id, tx });
        (handle, rx)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut inner = self.inner.lock().expect("progress bus poisoned");
        if let Some(subscribers) = inner.subscribers.get_mut(&handle.job_id) {
            subscribers.retain(|s| s.id != handle.id);
            if subscribers.is_empty() {
                inner.subscribers.remove(&handle.job_id);
            }
        }
    }

    /// Push one event to every live subscriber of `job_id`. Terminal
    /// events end the job's subscriber set; later subscribers get their
    /// snapshot from the job row instead.
    pub fn publish(&self, job_id: JobId, event: JobEvent) {
        let mut inner = self.inner.lock().expect("progress bus poisoned");
        let Some(subscribers) = inner.subscribers.get_mut(&job_id) else {
            return;
        };

        subscribers.retain(|subscriber| match subscriber.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Dropping stalled subscriber {} for job {}", subscriber.id, job_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        if event.is_terminal() || subscribers.is_empty() {
            inner.subscribers.remove(&job_id);
        }
    }

    /// Live subscriber count for a job; test and introspection helper.
    pub fn subscriber_count(&self, job_id: JobId) -> usize {
        let inner = self.inner.lock().expect("progress bus poisoned");
        inner
            .subscribers
            .get(&job_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}
