// Update signals - typed change notifications from the model to its views
//
// Views register for the topics they care about and poll their own queue
// once per frame. The model never holds references to its views.

use crate::sheet::column::ColumnId;
use std::collections::{BTreeSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetSignal {
    /// Rows of one column changed
    ColumnChanged { pattern: usize, column: ColumnId },
    /// Columns were removed or reordered
    ColumnsShifted { pattern: usize },
    PatternLength { pattern: usize },
    /// A different pattern is being edited
    PatternSelected { pattern: usize },
    CursorMoved,
    EditMode { active: bool },
    /// Zoom or column width changed
    Layout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    Columns,
    Pattern,
    Cursor,
    Edit,
    Layout,
}

impl SheetSignal {
    pub fn topic(&self) -> Topic {
        match self {
            SheetSignal::ColumnChanged { .. } | SheetSignal::ColumnsShifted { .. } => Topic::Columns,
            SheetSignal::PatternLength { .. } | SheetSignal::PatternSelected { .. } => Topic::Pattern,
            SheetSignal::CursorMoved => Topic::Cursor,
            SheetSignal::EditMode { .. } => Topic::Edit,
            SheetSignal::Layout => Topic::Layout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

#[derive(Debug, Default)]
struct Listener {
    topics: BTreeSet<Topic>,
    queue: VecDeque<SheetSignal>,
}

/// Fan-out of signals to per-listener queues
#[derive(Debug, Default)]
pub struct Updater {
    listeners: Vec<Option<Listener>>,
}

impl Updater {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, topics: &[Topic]) -> ListenerId {
        let listener = Listener {
            topics: topics.iter().copied().collect(),
            queue: VecDeque::new(),
        };
        match self.listeners.iter().position(Option::is_none) {
            Some(index) => {
                self.listeners[index] = Some(listener);
                ListenerId(index)
            }
            None => {
                self.listeners.push(Some(listener));
                ListenerId(self.listeners.len() - 1)
            }
        }
    }

    pub fn unregister(&mut self, id: ListenerId) {
        if let Some(slot) = self.listeners.get_mut(id.0) {
            *slot = None;
        }
    }

    /// Queue a signal for every listener subscribed to its topic
    ///
    /// Identical consecutive signals are coalesced.
    pub fn signal(&mut self, signal: SheetSignal) {
        let topic = signal.topic();
        for listener in self.listeners.iter_mut().flatten() {
            if listener.topics.contains(&topic) && listener.queue.back() != Some(&signal) {
                listener.queue.push_back(signal);
            }
        }
    }

    /// Take all pending signals of one listener, oldest first
    pub fn drain(&mut self, id: ListenerId) -> Vec<SheetSignal> {
        self.listeners
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .map(|listener| listener.queue.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn has_pending(&self, id: ListenerId) -> bool {
        self.listeners
            .get(id.0)
            .and_then(Option::as_ref)
            .is_some_and(|listener| !listener.queue.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_filtering() {
        let mut updater = Updater::new();
        let view = updater.register(&[Topic::Columns, Topic::Cursor]);
        let status = updater.register(&[Topic::Edit]);

        updater.signal(SheetSignal::CursorMoved);
        updater.signal(SheetSignal::EditMode { active: true });

        assert_eq!(updater.drain(view), vec![SheetSignal::CursorMoved]);
        assert_eq!(updater.drain(status), vec![SheetSignal::EditMode { active: true }]);
        assert!(!updater.has_pending(view));
    }

    #[test]
    fn test_coalescing() {
        let mut updater = Updater::new();
        let view = updater.register(&[Topic::Cursor]);
        updater.signal(SheetSignal::CursorMoved);
        updater.signal(SheetSignal::CursorMoved);
        assert_eq!(updater.drain(view).len(), 1);
    }

    #[test]
    fn test_unregister_reuses_slot() {
        let mut updater = Updater::new();
        let a = updater.register(&[Topic::Layout]);
        updater.unregister(a);
        updater.signal(SheetSignal::Layout);
        assert!(updater.drain(a).is_empty());
        let b = updater.register(&[Topic::Layout]);
        assert_eq!(a, b);
    }
}
