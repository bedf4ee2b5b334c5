//! Per-category tracking of asynchronous operations.
//!
//! Each [`AsyncProcessId`] owns one slot. A slot is idle, pending, or holds a
//! completed result. A completed result has to be observed through
//! [`AsyncTracker::poll`] before the category can be started again.

use session_shared::{AsyncProcessId, AsyncState, EngineResult};
use strum::EnumCount;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// One-shot handle resolving to the result of a tracked operation.
///
/// Handles are an alternative to polling; they never mark a result as
/// observed.
#[derive(Debug)]
pub struct Completion {
    receiver: oneshot::Receiver<EngineResult>,
}

impl Completion {
    /// Non-blocking check. Returns the result once the operation finished.
    pub fn try_take(&mut self) -> Option<EngineResult> {
        self.receiver.try_recv().ok()
    }

    /// Waits for the result. Resolves to `None` when the tracker was dropped
    /// before the operation finished.
    pub async fn wait(self) -> Option<EngineResult> {
        self.receiver.await.ok()
    }
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Idle,
    Pending {
        watchers: Vec<oneshot::Sender<EngineResult>>,
    },
    Completed {
        result: EngineResult,
        observed: bool,
    },
}

#[derive(Debug, Default)]
pub struct AsyncTracker {
    slots: [Slot; AsyncProcessId::COUNT],
    last_started: Option<AsyncProcessId>,
}

impl AsyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Success when `id` may be started now, `InvalidState` while it is
    /// pending or its last result was not polled yet.
    pub fn can_begin(&self, id: AsyncProcessId) -> EngineResult {
        match &self.slots[id.index()] {
            Slot::Idle => EngineResult::success(),
            Slot::Completed { observed: true, .. } => EngineResult::success(),
            Slot::Pending { .. } | Slot::Completed { observed: false, .. } => {
                EngineResult::invalid_state()
            }
        }
    }

    /// Marks `id` as pending. Callers check [`Self::can_begin`] first.
    pub fn start(&mut self, id: AsyncProcessId) {
        self.slots[id.index()] = Slot::Pending {
            watchers: Vec::new(),
        };
        self.last_started = Some(id);
        debug!(operation = %id, "operation started");
    }

    /// Resolves a pending slot with `superseded` and starts it again.
    pub fn restart(&mut self, id: AsyncProcessId, superseded: EngineResult) {
        self.complete(id, superseded);
        self.start(id);
    }

    /// Stores the result of a pending operation and wakes its handles.
    ///
    /// Returns `false` when `id` was not pending.
    pub fn complete(&mut self, id: AsyncProcessId, result: EngineResult) -> bool {
        let slot = &mut self.slots[id.index()];
        let Slot::Pending { watchers } = std::mem::take(slot) else {
            return false;
        };
        *slot = Slot::Completed {
            result,
            observed: false,
        };
        for watcher in watchers {
            // The handle may have been dropped.
            let _ = watcher.send(result);
        }
        debug!(operation = %id, %result, "operation completed");
        true
    }

    /// Reads the slot and marks a completed result as observed. Polling again
    /// returns the same value.
    pub fn poll(&mut self, id: AsyncProcessId) -> AsyncState {
        let slot = &mut self.slots[id.index()];
        match slot {
            Slot::Completed { result, observed } => {
                if !*observed {
                    trace!(operation = %id, "completion observed");
                }
                *observed = true;
                AsyncState::completed(*result)
            }
            Slot::Idle | Slot::Pending { .. } => AsyncState::pending(),
        }
    }

    /// Reads the slot without marking it observed.
    pub fn peek(&self, id: AsyncProcessId) -> AsyncState {
        match &self.slots[id.index()] {
            Slot::Completed { result, .. } => AsyncState::completed(*result),
            Slot::Idle | Slot::Pending { .. } => AsyncState::pending(),
        }
    }

    pub fn is_pending(&self, id: AsyncProcessId) -> bool {
        matches!(self.slots[id.index()], Slot::Pending { .. })
    }

    /// True when `id` is pending or completed but not yet polled.
    pub fn is_outstanding(&self, id: AsyncProcessId) -> bool {
        self.can_begin(id).is_failure()
    }

    pub fn pending(&self) -> impl Iterator<Item = AsyncProcessId> + '_ {
        use strum::IntoEnumIterator;
        AsyncProcessId::iter().filter(|id| self.is_pending(*id))
    }

    pub fn last_started_id(&self) -> Option<AsyncProcessId> {
        self.last_started
    }

    /// Handle for the running operation of `id`. `None` when nothing runs.
    pub fn watch(&mut self, id: AsyncProcessId) -> Option<Completion> {
        match &mut self.slots[id.index()] {
            Slot::Pending { watchers } => {
                let (sender, receiver) = oneshot::channel();
                watchers.push(sender);
                Some(Completion { receiver })
            }
            Slot::Idle | Slot::Completed { .. } => None,
        }
    }
}
