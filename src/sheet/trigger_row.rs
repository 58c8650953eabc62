// Trigger row - the ordered triggers sharing one timestamp in one column

use crate::sheet::trigger::Trigger;

/// Where a cursor slot lands inside a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTarget {
    /// Type head of the trigger at this index
    Head(usize),
    /// Field `field` of the trigger at `trigger`
    Field { trigger: usize, field: usize },
    /// Past the last trigger, where new triggers are appended
    End,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerRow {
    triggers: Vec<Trigger>,
}

impl TriggerRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(trigger: Trigger) -> Self {
        Self {
            triggers: vec![trigger],
        }
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Trigger> {
        self.triggers.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Trigger> {
        self.triggers.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trigger> {
        self.triggers.iter()
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn push(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
    }

    /// Insert before `index`; indices past the end append
    pub fn insert(&mut self, index: usize, trigger: Trigger) {
        let index = index.min(self.triggers.len());
        self.triggers.insert(index, trigger);
    }

    pub fn remove(&mut self, index: usize) -> Option<Trigger> {
        if index < self.triggers.len() {
            Some(self.triggers.remove(index))
        } else {
            None
        }
    }

    /// Append all triggers of `other` after ours
    pub fn absorb(&mut self, other: TriggerRow) {
        self.triggers.extend(other.triggers);
    }

    /// Sum of `1 + field count` over all triggers
    pub fn slot_count(&self) -> usize {
        self.triggers.iter().map(Trigger::slot_count).sum()
    }

    /// Resolve a slot index; anything at or past `slot_count` is the end slot
    pub fn slot_target(&self, slot: usize) -> SlotTarget {
        let mut start = 0;
        for (index, trigger) in self.triggers.iter().enumerate() {
            let count = trigger.slot_count();
            if slot < start + count {
                return match slot - start {
                    0 => SlotTarget::Head(index),
                    offset => SlotTarget::Field {
                        trigger: index,
                        field: offset - 1,
                    },
                };
            }
            start += count;
        }
        SlotTarget::End
    }

    /// Slot index of the type head of trigger `index`
    pub fn head_slot(&self, index: usize) -> usize {
        self.triggers
            .iter()
            .take(index)
            .map(Trigger::slot_count)
            .sum()
    }
}

impl<'a> IntoIterator for &'a TriggerRow {
    type Item = &'a Trigger;
    type IntoIter = std::slice::Iter<'a, Trigger>;

    fn into_iter(self) -> Self::IntoIter {
        self.triggers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row() -> TriggerRow {
        let mut row = TriggerRow::new();
        row.push(Trigger::new("n+", &[json!(0)]));
        row.push(Trigger::new("n-", &[]));
        row.push(Trigger::new("G.F", &[json!("x"), json!(1.0)]));
        row
    }

    #[test]
    fn test_slot_count() {
        assert_eq!(sample_row().slot_count(), 2 + 1 + 3);
        assert_eq!(TriggerRow::new().slot_count(), 0);
    }

    #[test]
    fn test_slot_target() {
        let row = sample_row();
        assert_eq!(row.slot_target(0), SlotTarget::Head(0));
        assert_eq!(row.slot_target(1), SlotTarget::Field { trigger: 0, field: 0 });
        assert_eq!(row.slot_target(2), SlotTarget::Head(1));
        assert_eq!(row.slot_target(3), SlotTarget::Head(2));
        assert_eq!(row.slot_target(5), SlotTarget::Field { trigger: 2, field: 1 });
        assert_eq!(row.slot_target(6), SlotTarget::End);
        assert_eq!(row.slot_target(usize::MAX), SlotTarget::End);
    }

    #[test]
    fn test_head_slot() {
        let row = sample_row();
        assert_eq!(row.head_slot(0), 0);
        assert_eq!(row.head_slot(2), 3);
        assert_eq!(row.head_slot(3), 6);
    }

    #[test]
    fn test_insert_and_absorb() {
        let mut row = TriggerRow::single(Trigger::new("n-", &[]));
        row.insert(0, Trigger::new("n+", &[]));
        row.insert(99, Trigger::new("h", &[]));
        assert_eq!(row.get(0).map(|t| t.kind()), Some("n+"));
        assert_eq!(row.get(2).map(|t| t.kind()), Some("h"));

        row.absorb(TriggerRow::single(Trigger::new("cp", &[])));
        assert_eq!(row.len(), 4);
        assert!(row.remove(10).is_none());
    }
}
