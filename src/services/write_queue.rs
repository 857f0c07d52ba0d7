//! Ordered background writer in front of a timer store
//!
//! Saves and removes are queued and applied one at a time on a blocking
//! thread, in the order they were queued. Reads see the newest queued blob
//! for an id before it reaches the backing store.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use super::TimerStore;
use crate::{error::StoreError, state::PersistedTimer};

/// Latest queued blob per id; `None` is a queued remove
type Pending = HashMap<String, (u64, Option<PersistedTimer>)>;

#[derive(Debug)]
enum WriteOp {
    Apply {
        seq: u64,
        timer_id: String,
        blob: Option<PersistedTimer>,
    },
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
struct Queue {
    next_seq: u64,
    pending: Pending,
}

/// [`TimerStore`] that never blocks its caller on the backing store
#[derive(Debug)]
pub struct QueuedStore {
    inner: Arc<dyn TimerStore>,
    ops: mpsc::UnboundedSender<WriteOp>,
    queue: Arc<Mutex<Queue>>,
}

impl QueuedStore {
    /// Wrap `inner` and spawn its writer task. Must run inside a tokio runtime.
    pub fn spawn(inner: Arc<dyn TimerStore>) -> (Arc<Self>, JoinHandle<()>) {
        let (ops, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(Mutex::new(Queue {
            next_seq: 0,
            pending: HashMap::new(),
        }));
        let writer = tokio::spawn(write_queue_task(
            Arc::clone(&inner),
            Arc::clone(&queue),
            rx,
        ));
        (Arc::new(Self { inner, ops, queue }), writer)
    }

    /// Number of writes not yet applied to the backing store
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).pending.len()
    }

    /// Wait until every write queued before this call has been applied
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.ops.send(WriteOp::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    fn enqueue(&self, timer_id: &str, blob: Option<PersistedTimer>) -> Result<(), StoreError> {
        // Sequence numbers and channel order are assigned under one lock
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.next_seq += 1;
        let seq = queue.next_seq;

        self.ops
            .send(WriteOp::Apply {
                seq,
                timer_id: timer_id.to_string(),
                blob,
            })
            .map_err(|_| StoreError::WriterStopped {
                key: timer_id.to_string(),
            })?;
        queue.pending.insert(timer_id.to_string(), (seq, blob));
        Ok(())
    }
}

impl TimerStore for QueuedStore {
    fn save(&self, timer_id: &str, blob: &PersistedTimer) -> Result<(), StoreError> {
        self.enqueue(timer_id, Some(*blob))
    }

    fn load(&self, timer_id: &str) -> Result<Option<PersistedTimer>, StoreError> {
        let queued = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
            .get(timer_id)
            .map(|(_, blob)| *blob);
        match queued {
            Some(blob) => Ok(blob),
            None => self.inner.load(timer_id),
        }
    }

    fn remove(&self, timer_id: &str) -> Result<(), StoreError> {
        self.enqueue(timer_id, None)
    }
}

/// Apply queued writes in order until every sender is gone
async fn write_queue_task(
    inner: Arc<dyn TimerStore>,
    queue: Arc<Mutex<Queue>>,
    mut ops: mpsc::UnboundedReceiver<WriteOp>,
) {
    info!("Starting timer store writer");

    while let Some(op) = ops.recv().await {
        let (seq, timer_id, blob) = match op {
            WriteOp::Flush(done) => {
                let _ = done.send(());
                continue;
            }
            WriteOp::Apply { seq, timer_id, blob } => (seq, timer_id, blob),
        };

        let store = Arc::clone(&inner);
        let key = timer_id.clone();
        let result = tokio::task::spawn_blocking(move || match blob {
            Some(blob) => store.save(&key, &blob),
            None => store.remove(&key),
        })
        .await;

        match result {
            Ok(Ok(())) => debug!("Applied write #{} for timer {}", seq, timer_id),
            Ok(Err(e)) => warn!("Failed to write timer state for {}: {}", timer_id, e),
            Err(e) => error!("Timer store write for {} failed: {}", timer_id, e),
        }

        let mut queue = queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.pending.get(&timer_id).is_some_and(|(latest, _)| *latest == seq) {
            queue.pending.remove(&timer_id);
        }
    }

    info!("Timer store writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::services::MemoryStore;

    fn blob(paused_ms: i64) -> PersistedTimer {
        PersistedTimer {
            is_paused: false,
            accumulated_paused_duration: paused_ms,
            current_pause_started_at: None,
        }
    }

    /// Backing store that takes its time over every write
    #[derive(Debug, Default)]
    struct SlowStore {
        inner: MemoryStore,
    }

    impl TimerStore for SlowStore {
        fn save(&self, timer_id: &str, blob: &PersistedTimer) -> Result<(), StoreError> {
            std::thread::sleep(Duration::from_millis(20));
            self.inner.save(timer_id, blob)
        }
        fn load(&self, timer_id: &str) -> Result<Option<PersistedTimer>, StoreError> {
            self.inner.load(timer_id)
        }
        fn remove(&self, timer_id: &str) -> Result<(), StoreError> {
            std::thread::sleep(Duration::from_millis(20));
            self.inner.remove(timer_id)
        }
    }

    #[tokio::test]
    async fn writes_land_in_queue_order() {
        let backing = Arc::new(SlowStore::default());
        let (store, _writer) = QueuedStore::spawn(backing.clone());

        store.save("t", &blob(1_000)).unwrap();
        store.save("t", &blob(2_000)).unwrap();
        store.save("u", &blob(5_000)).unwrap();
        store.remove("u").unwrap();
        store.save("t", &blob(3_000)).unwrap();

        store.flush().await;
        assert_eq!(backing.load("t").unwrap(), Some(blob(3_000)));
        assert_eq!(backing.load("u").unwrap(), None);
        assert_eq!(store.pending(), 0);
    }

    #[tokio::test]
    async fn loads_see_queued_writes_first() {
        let backing = Arc::new(SlowStore::default());
        backing.inner.save("t", &blob(1_000)).unwrap();
        let (store, _writer) = QueuedStore::spawn(backing.clone());

        store.save("t", &blob(9_000)).unwrap();
        assert_eq!(store.load("t").unwrap(), Some(blob(9_000)));

        store.remove("t").unwrap();
        assert_eq!(store.load("t").unwrap(), None);

        store.flush().await;
        assert_eq!(backing.load("t").unwrap(), None);
        assert_eq!(store.load("t").unwrap(), None);
    }

    #[tokio::test]
    async fn stopped_writer_reports_dropped_writes() {
        let (store, writer) = QueuedStore::spawn(Arc::new(MemoryStore::new()));
        writer.abort();
        let _ = writer.await;

        assert!(matches!(
            store.save("t", &blob(0)),
            Err(StoreError::WriterStopped { .. })
        ));
        store.flush().await;
    }
}
