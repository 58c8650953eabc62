// Pattern - fixed-length grid of one global and COLUMNS_MAX channel columns

use crate::sheet::column::{Column, ColumnId};
use crate::sheet::trigger_row::TriggerRow;
use crate::sheet::tstamp::Tstamp;
use crate::sheet::{COLUMNS_MAX, SheetError};
use std::collections::BTreeSet;

/// Default length of a new pattern in beats
pub const DEFAULT_PATTERN_BEATS: i64 = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    length: Tstamp,
    global: Column,
    channels: Vec<Column>,
    instances: BTreeSet<usize>,
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new(Tstamp::from_beats(DEFAULT_PATTERN_BEATS))
    }
}

impl Pattern {
    pub fn new(length: Tstamp) -> Self {
        Self {
            length: length.max(Tstamp::ZERO),
            global: Column::new(ColumnId::Global),
            channels: (0..COLUMNS_MAX)
                .map(|i| Column::new(ColumnId::Channel(i)))
                .collect(),
            instances: BTreeSet::new(),
        }
    }

    pub fn length(&self) -> Tstamp {
        self.length
    }

    /// Change the length; stored triggers past the end are kept but hidden
    pub fn set_length(&mut self, length: Tstamp) -> Result<Tstamp, SheetError> {
        if length.is_negative() {
            return Err(SheetError::NegativeTimestamp(length));
        }
        Ok(std::mem::replace(&mut self.length, length))
    }

    /// Triggers at or after the length are not visible nor playable
    pub fn is_visible(&self, ts: Tstamp) -> bool {
        !ts.is_negative() && ts < self.length
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        match id {
            ColumnId::Global => Some(&self.global),
            ColumnId::Channel(i) => self.channels.get(i),
        }
    }

    pub fn column_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        match id {
            ColumnId::Global => Some(&mut self.global),
            ColumnId::Channel(i) => self.channels.get_mut(i),
        }
    }

    pub fn try_column_mut(&mut self, id: ColumnId) -> Result<&mut Column, SheetError> {
        self.column_mut(id).ok_or(SheetError::ColumnOutOfRange(id))
    }

    pub fn global(&self) -> &Column {
        &self.global
    }

    pub fn channels(&self) -> &[Column] {
        &self.channels
    }

    /// Global column first, then channels in ascending order
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        std::iter::once(&self.global).chain(self.channels.iter())
    }

    /// Visible rows of one column with `lo <= t <= hi`
    pub fn visible_rows(
        &self,
        id: ColumnId,
        lo: Tstamp,
        hi: Tstamp,
    ) -> impl DoubleEndedIterator<Item = (&Tstamp, &TriggerRow)> {
        let length = self.length;
        self.column(id)
            .into_iter()
            .flat_map(move |column| column.iter_range(lo, hi))
            .filter(move |(ts, _)| **ts < length)
    }

    /// Remove a channel column
    ///
    /// Following columns move one step left and an empty column is
    /// appended, so the channel count stays at `COLUMNS_MAX`.
    pub fn remove_column(&mut self, index: usize) -> Result<Column, SheetError> {
        if index >= self.channels.len() {
            return Err(SheetError::ColumnOutOfRange(ColumnId::Channel(index)));
        }
        let removed = self.channels.remove(index);
        self.channels
            .push(Column::new(ColumnId::Channel(COLUMNS_MAX - 1)));
        self.renumber();
        Ok(removed)
    }

    /// Inverse of `remove_column`: insert at `index` and drop the last column
    pub fn insert_column(&mut self, index: usize, column: Column) -> Result<Column, SheetError> {
        if index >= self.channels.len() {
            return Err(SheetError::ColumnOutOfRange(ColumnId::Channel(index)));
        }
        self.channels.insert(index, column);
        let dropped = self.channels.pop();
        self.renumber();
        dropped.ok_or(SheetError::ColumnOutOfRange(ColumnId::Channel(index)))
    }

    /// Swap in a whole column, returning the previous content
    pub fn replace_column(&mut self, id: ColumnId, mut column: Column) -> Result<Column, SheetError> {
        column.set_id(id);
        let slot = self.try_column_mut(id)?;
        Ok(std::mem::replace(slot, column))
    }

    fn renumber(&mut self) {
        for (i, column) in self.channels.iter_mut().enumerate() {
            column.set_id(ColumnId::Channel(i));
        }
    }

    pub fn instances(&self) -> impl Iterator<Item = usize> + '_ {
        self.instances.iter().copied()
    }

    pub fn has_instance(&self, instance: usize) -> bool {
        self.instances.contains(&instance)
    }

    pub fn add_instance(&mut self, instance: usize) -> bool {
        self.instances.insert(instance)
    }

    pub fn remove_instance(&mut self, instance: usize) -> bool {
        self.instances.remove(&instance)
    }

    /// Lowest unused instance id
    pub fn next_free_instance(&self) -> usize {
        (0..).find(|i| !self.instances.contains(i)).unwrap_or(0)
    }

    pub fn trigger_count(&self) -> usize {
        self.columns().map(Column::trigger_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_pattern_has_all_columns() {
        let pattern = Pattern::default();
        assert_eq!(pattern.length(), Tstamp::from_beats(16));
        assert_eq!(pattern.channels().len(), COLUMNS_MAX);
        assert_eq!(pattern.columns().count(), COLUMNS_MAX + 1);
        assert_eq!(pattern.columns().next().map(Column::id), Some(ColumnId::Global));
    }

    #[test]
    fn test_remove_column_shifts_left() {
        let mut pattern = Pattern::default();
        for i in 0..5 {
            pattern
                .column_mut(ColumnId::Channel(i))
                .unwrap()
                .insert(Tstamp::from_beats(i as i64), "n+", &[])
                .unwrap();
        }

        let removed = pattern.remove_column(3).unwrap();
        assert_eq!(removed.trigger_count(), 1);
        assert_eq!(pattern.channels().len(), COLUMNS_MAX);

        let new_third = pattern.column(ColumnId::Channel(3)).unwrap();
        assert_eq!(new_third.id(), ColumnId::Channel(3));
        assert!(new_third.row(Tstamp::from_beats(4)).is_some());
        assert!(pattern.column(ColumnId::Channel(COLUMNS_MAX - 1)).unwrap().is_empty());
    }

    #[test]
    fn test_insert_column_restores() {
        let mut pattern = Pattern::default();
        pattern
            .column_mut(ColumnId::Channel(2))
            .unwrap()
            .insert(Tstamp::ZERO, "h", &[json!(3)])
            .unwrap();
        let original = pattern.clone();

        let removed = pattern.remove_column(2).unwrap();
        pattern.insert_column(2, removed).unwrap();
        assert_eq!(pattern, original);
    }

    #[test]
    fn test_visibility_clips_at_length() {
        let mut pattern = Pattern::new(Tstamp::from_beats(4));
        let column = pattern.column_mut(ColumnId::Channel(0)).unwrap();
        column.insert(Tstamp::from_beats(3), "n+", &[]).unwrap();
        column.insert(Tstamp::from_beats(4), "n-", &[]).unwrap();

        let visible: Vec<_> = pattern
            .visible_rows(ColumnId::Channel(0), Tstamp::ZERO, Tstamp::from_beats(10))
            .map(|(ts, _)| *ts)
            .collect();
        assert_eq!(visible, vec![Tstamp::from_beats(3)]);

        pattern.set_length(Tstamp::from_beats(8)).unwrap();
        assert!(pattern.is_visible(Tstamp::from_beats(4)));
        assert!(pattern.set_length(Tstamp::from_f64(-1.0)).is_err());
    }

    #[test]
    fn test_instances() {
        let mut pattern = Pattern::default();
        assert_eq!(pattern.next_free_instance(), 0);
        pattern.add_instance(0);
        pattern.add_instance(2);
        assert_eq!(pattern.next_free_instance(), 1);
        assert_eq!(pattern.instances().collect::<Vec<_>>(), vec![0, 2]);
    }
}
