// Trigger cache - measured trigger layouts keyed by their rendered content

use crate::sheet::trigger::Trigger;
use crate::view::painter::TextMetrics;
use crate::view::trigger_layout::TriggerLayout;
use std::collections::HashMap;
use std::rc::Rc;

/// Kind and field texts of a trigger
///
/// Colours are applied at paint time, so the head style is not part of
/// the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TriggerKey {
    slots: Vec<String>,
}

impl TriggerKey {
    fn of(trigger: &Trigger) -> Self {
        Self {
            slots: (0..trigger.slot_count())
                .filter_map(|slot| trigger.slot_text(slot))
                .collect(),
        }
    }
}

struct Entry {
    layout: Rc<TriggerLayout>,
    last_used: u64,
}

/// Bounded cache of trigger layouts
///
/// Measuring text is the costly part of painting a row; identical
/// triggers share one layout. Flush when metrics or padding change.
pub struct TriggerCache {
    entries: HashMap<TriggerKey, Entry>,
    max_entries: usize,
    bytes: usize,
    clock: u64,
    hits: u64,
    misses: u64,
}

impl TriggerCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            bytes: 0,
            clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn layout(&mut self, trigger: &Trigger, metrics: &dyn TextMetrics, padding: f32) -> Rc<TriggerLayout> {
        self.clock += 1;
        let key = TriggerKey::of(trigger);
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_used = self.clock;
            self.hits += 1;
            return Rc::clone(&entry.layout);
        }

        self.misses += 1;
        if self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        let layout = Rc::new(TriggerLayout::new(trigger, metrics, padding));
        self.bytes += layout.byte_size();
        self.entries.insert(
            key,
            Entry {
                layout: Rc::clone(&layout),
                last_used: self.clock,
            },
        );
        layout
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        if let Some(entry) = oldest.and_then(|key| self.entries.remove(&key)) {
            self.bytes -= entry.layout.byte_size();
        }
    }

    pub fn flush(&mut self) {
        self.entries.clear();
        self.bytes = 0;
    }

    /// Number of cached triggers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// `(hits, misses)` since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
