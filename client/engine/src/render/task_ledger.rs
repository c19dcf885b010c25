use crate::render::backend::FrameTarget;
use crate::render::TaskKind;
use common::types::HashMap;
use std::collections::BTreeMap;

#[derive(Default, Clone, Copy, Debug)]
struct TaskCounter {
    called: u32,
    complete: u32,
}

/// Per-frame bookkeeping of issued and finished render tasks.
///
/// Kinds get an entry on their first call only, so kinds never issued this frame
/// do not take part in the completion check.
pub(crate) struct TaskLedger<CB> {
    frame: FrameTarget,
    discard: bool,
    failed: bool,
    counters: HashMap<TaskKind, TaskCounter>,
    next_order: u32,
    buffers: BTreeMap<u32, CB>,
}

impl<CB> TaskLedger<CB> {
    pub fn new() -> Self {
        Self {
            frame: FrameTarget { slot: 0, serial: 0 },
            discard: true,
            failed: false,
            counters: Default::default(),
            next_order: 0,
            buffers: BTreeMap::new(),
        }
    }

    pub fn reset(&mut self, frame: FrameTarget, discard: bool) {
        self.frame = frame;
        self.discard = discard;
        self.failed = false;
        self.counters.clear();
        self.next_order = 0;
        self.buffers.clear();
    }

    /// Stops accepting calls for the current frame. Its failure state is kept.
    pub fn close(&mut self) {
        self.discard = true;
    }

    pub fn frame(&self) -> FrameTarget {
        self.frame
    }

    pub fn is_discarded(&self) -> bool {
        self.discard
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Registers a call of `kind` and returns its submission order,
    /// or `None` if the frame is discarded.
    pub fn record_call(&mut self, kind: TaskKind) -> Option<u32> {
        if self.discard {
            return None;
        }
        self.counters.entry(kind).or_default().called += 1;
        let order = self.next_order;
        self.next_order += 1;
        Some(order)
    }

    /// Results of an older frame are dropped.
    pub fn record_complete(&mut self, serial: u64, kind: TaskKind, order: u32, buffer: Option<CB>) {
        if serial != self.frame.serial {
            return;
        }
        if let Some(counter) = self.counters.get_mut(&kind) {
            counter.complete += 1;
        }
        if let Some(buffer) = buffer {
            self.buffers.insert(order, buffer);
        }
    }

    pub fn record_failure(&mut self, serial: u64, kind: TaskKind) {
        if serial != self.frame.serial {
            return;
        }
        self.failed = true;
        if let Some(counter) = self.counters.get_mut(&kind) {
            counter.complete += 1;
        }
    }

    /// Whether every issued task has reported back, successfully or not.
    pub fn is_settled(&self) -> bool {
        self.counters.values().all(|c| c.called == c.complete)
    }

    pub fn is_complete(&self) -> bool {
        !self.discard && self.is_settled()
    }

    /// Command buffers in submission order.
    pub fn take_buffers(&mut self) -> Vec<CB> {
        std::mem::take(&mut self.buffers).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(serial: u64) -> FrameTarget {
        FrameTarget { slot: 0, serial }
    }

    #[test]
    fn empty_ledger_is_vacuously_complete() {
        let mut ledger = TaskLedger::<u32>::new();
        assert!(!ledger.is_complete());
        ledger.reset(frame(1), false);
        assert!(ledger.is_complete());
    }

    #[test]
    fn buffers_come_out_in_call_order() {
        let mut ledger = TaskLedger::new();
        ledger.reset(frame(1), false);
        let a = ledger.record_call(TaskKind::Models).unwrap();
        let b = ledger.record_call(TaskKind::Sprites).unwrap();
        let c = ledger.record_call(TaskKind::UpdateUniforms).unwrap();
        let d = ledger.record_call(TaskKind::Models).unwrap();
        assert!(!ledger.is_complete());

        ledger.record_complete(1, TaskKind::Models, d, Some("d"));
        ledger.record_complete(1, TaskKind::UpdateUniforms, c, None);
        ledger.record_complete(1, TaskKind::Sprites, b, Some("b"));
        assert!(!ledger.is_complete());
        ledger.record_complete(1, TaskKind::Models, a, Some("a"));

        assert!(ledger.is_complete());
        assert_eq!(ledger.take_buffers(), vec!["a", "b", "d"]);
    }

    #[test]
    fn discarded_frame_records_nothing() {
        let mut ledger = TaskLedger::<u32>::new();
        ledger.reset(frame(3), true);
        assert_eq!(ledger.record_call(TaskKind::Glyphs), None);
        assert!(ledger.is_settled());
        assert!(!ledger.is_complete());
    }

    #[test]
    fn closed_frame_keeps_failure() {
        let mut ledger = TaskLedger::<u32>::new();
        ledger.reset(frame(2), false);
        let order = ledger.record_call(TaskKind::Sprites).unwrap();
        ledger.record_failure(2, TaskKind::Sprites);

        ledger.close();
        assert_eq!(ledger.record_call(TaskKind::Sprites), None);
        assert!(ledger.is_failed());
        assert_eq!(order, 0);
    }

    #[test]
    fn stale_results_are_ignored() {
        let mut ledger = TaskLedger::new();
        ledger.reset(frame(5), false);
        let order = ledger.record_call(TaskKind::Spines).unwrap();

        ledger.record_complete(4, TaskKind::Spines, order, Some(1));
        ledger.record_failure(4, TaskKind::Spines);
        assert!(!ledger.is_settled());
        assert!(!ledger.is_failed());

        ledger.record_failure(5, TaskKind::Spines);
        assert!(ledger.is_complete());
        assert!(ledger.is_failed());
        assert!(ledger.take_buffers().is_empty());
    }
}
