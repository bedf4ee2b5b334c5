use std::collections::{vec_deque, VecDeque};

use session_shared::SessionEvent;
use tracing::{trace, warn};

/// Events handed out by [`SessionEventQueue::drain`], in emission order.
pub type DrainedEvents = vec_deque::IntoIter<SessionEvent>;

/// Per-frame buffer of session events.
///
/// Every dispatch replaces the buffer with the events of that engine step.
/// Events that were not drained before the next dispatch are lost.
#[derive(Debug, Default)]
pub struct SessionEventQueue {
    pending: VecDeque<SessionEvent>,
    warn_on_dropped: bool,
}

impl SessionEventQueue {
    pub fn new(warn_on_dropped: bool) -> Self {
        Self {
            pending: VecDeque::new(),
            warn_on_dropped,
        }
    }

    pub(crate) fn refill(&mut self, events: impl IntoIterator<Item = SessionEvent>) {
        if !self.pending.is_empty() {
            if self.warn_on_dropped {
                warn!(dropped = self.pending.len(), "session events were not drained");
            }
            self.pending.clear();
        }
        self.pending.extend(events);
        if !self.pending.is_empty() {
            trace!(count = self.pending.len(), "session events buffered");
        }
    }

    /// Takes every buffered event. A second call without a dispatch in
    /// between yields nothing.
    pub fn drain(&mut self) -> DrainedEvents {
        std::mem::take(&mut self.pending).into_iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_shared::{ConstantId, SessionEventType, StationIndex};

    fn joined(id: u64) -> SessionEvent {
        SessionEvent::new(
            SessionEventType::StationJoined,
            ConstantId(id),
            StationIndex(id as u8),
        )
    }

    #[test]
    fn drain_empties_the_queue() {
        let mut queue = SessionEventQueue::new(true);
        queue.refill([joined(1), joined(2)]);
        let first: Vec<_> = queue.drain().collect();
        assert_eq!(first, vec![joined(1), joined(2)]);
        assert_eq!(queue.drain().count(), 0);
    }

    #[test]
    fn refill_drops_undrained_events() {
        let mut queue = SessionEventQueue::new(false);
        queue.refill([joined(1)]);
        queue.refill([joined(3)]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain().next(), Some(joined(3)));
        assert!(queue.is_empty());
    }
}
