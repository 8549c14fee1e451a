// Progress events
//
// Workers publish what they are doing on a bounded broadcast channel. Delivery
// is best-effort: nobody listening, or a lagging listener, simply loses events.

use camino::Utf8PathBuf;
use tokio::sync::broadcast;

use crate::models::WorkerStatus;

/// Progress notifications emitted during a run.
#[derive(Clone, Debug, PartialEq)]
pub enum MergeEvent {
    /// Assignments computed, workers about to launch
    RunStarted { workers: usize, addons: usize },

    /// A worker thread began its assignment
    WorkerStarted { worker: usize, addons: usize },

    /// A worker began walking an addon root
    AddonStarted { worker: usize, addon: Utf8PathBuf },

    /// A worker finished walking an addon root
    AddonFinished { worker: usize, addon: Utf8PathBuf },

    /// A destination file already existed and was left in place
    Conflict { worker: usize, source: Utf8PathBuf },

    /// A file or directory could not be processed
    CopyFailed {
        worker: usize,
        path: Utf8PathBuf,
        message: String,
    },

    /// A worker exited
    WorkerFinished { worker: usize, status: WorkerStatus },

    /// Every worker has been joined
    RunFinished { failed_workers: usize },
}

/// Cloneable handle to the progress channel.
///
/// Each worker gets its own clone; sending only needs `&self`.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<MergeEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MergeEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Ignore send errors - it's OK if no one is listening
    pub fn emit(&self, event: MergeEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
