use std::fmt;
use std::sync::{mpsc, Arc};

/// Messages from background send tasks to the UI thread. Every variant
/// carries the send id and the thread id captured when the send started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Cumulative reply text so far.
    StreamFragment {
        send_id: u64,
        thread_id: String,
        text: String,
    },
    StreamFinished {
        send_id: u64,
        thread_id: String,
        text: String,
    },
    SendFailed {
        send_id: u64,
        thread_id: String,
        message: String,
    },
    SendCancelled {
        send_id: u64,
        thread_id: String,
    },
}

impl AppEvent {
    pub fn send_id(&self) -> u64 {
        match self {
            Self::StreamFragment { send_id, .. }
            | Self::StreamFinished { send_id, .. }
            | Self::SendFailed { send_id, .. }
            | Self::SendCancelled { send_id, .. } => *send_id,
        }
    }
}

/// Sending half of the UI event channel plus a hook that wakes the UI.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<AppEvent>,
    wake: Arc<dyn Fn() + Send + Sync>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<AppEvent>) -> Self {
        Self {
            tx,
            wake: Arc::new(|| {}),
        }
    }

    pub fn with_waker(mut self, wake: impl Fn() + Send + Sync + 'static) -> Self {
        self.wake = Arc::new(wake);
        self
    }

    /// Returns false once the UI side has gone away.
    pub fn emit(&self, event: AppEvent) -> bool {
        let delivered = self.tx.send(event).is_ok();
        (self.wake)();
        delivered
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}
