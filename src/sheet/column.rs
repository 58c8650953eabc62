// Column - timestamp-keyed trigger rows of one event lane

use crate::sheet::SheetError;
use crate::sheet::trigger::{Trigger, kind_fits_column};
use crate::sheet::trigger_row::TriggerRow;
use crate::sheet::tstamp::Tstamp;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;

/// Identity of a column inside a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnId {
    /// Global events (tempo, volume, jumps); shown as `-1`
    Global,
    Channel(usize),
}

impl ColumnId {
    /// Engine channel number, `-1` for the global column
    pub fn channel(&self) -> i32 {
        match self {
            ColumnId::Global => -1,
            ColumnId::Channel(n) => *n as i32,
        }
    }

    pub fn from_channel(channel: i32) -> Option<Self> {
        match channel {
            -1 => Some(ColumnId::Global),
            n if n >= 0 => Some(ColumnId::Channel(n as usize)),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.channel())
    }
}

/// Ordered map `timestamp -> trigger row`
///
/// No two rows share a timestamp, no row is empty and every timestamp is
/// non-negative. All operations leave the column unchanged on error.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    id: ColumnId,
    rows: BTreeMap<Tstamp, TriggerRow>,
}

impl Column {
    pub fn new(id: ColumnId) -> Self {
        Self {
            id,
            rows: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: ColumnId) {
        self.id = id;
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn trigger_count(&self) -> usize {
        self.rows.values().map(TriggerRow::len).sum()
    }

    pub fn row(&self, ts: Tstamp) -> Option<&TriggerRow> {
        self.rows.get(&ts)
    }

    pub fn trigger(&self, ts: Tstamp, index: usize) -> Option<&Trigger> {
        self.rows.get(&ts).and_then(|row| row.get(index))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&Tstamp, &TriggerRow)> {
        self.rows.iter()
    }

    /// Rows with `lo <= t <= hi`, ascending
    pub fn iter_range(
        &self,
        lo: Tstamp,
        hi: Tstamp,
    ) -> impl DoubleEndedIterator<Item = (&Tstamp, &TriggerRow)> {
        let range = if lo <= hi {
            Some(self.rows.range(lo..=hi))
        } else {
            None
        };
        range.into_iter().flatten()
    }

    /// Rows with `lo < t < hi`, ascending
    pub fn rows_between_exclusive(
        &self,
        lo: Tstamp,
        hi: Tstamp,
    ) -> impl DoubleEndedIterator<Item = (&Tstamp, &TriggerRow)> {
        let range = if lo < hi {
            Some(self.rows.range((Bound::Excluded(lo), Bound::Excluded(hi))))
        } else {
            None
        };
        range.into_iter().flatten()
    }

    /// First row strictly after `ts`
    pub fn next_row_after(&self, ts: Tstamp) -> Option<(Tstamp, &TriggerRow)> {
        self.rows
            .range((Bound::Excluded(ts), Bound::Unbounded))
            .next()
            .map(|(t, row)| (*t, row))
    }

    /// Last row strictly before `ts`
    pub fn prev_row_before(&self, ts: Tstamp) -> Option<(Tstamp, &TriggerRow)> {
        self.rows
            .range(..ts)
            .next_back()
            .map(|(t, row)| (*t, row))
    }

    fn check_insert(&self, ts: Tstamp, kind: &str) -> Result<(), SheetError> {
        if ts.is_negative() {
            return Err(SheetError::NegativeTimestamp(ts));
        }
        if !kind_fits_column(kind, self.id) {
            return Err(SheetError::KindNotAllowedInColumn {
                kind: kind.to_string(),
                column: self.id,
            });
        }
        Ok(())
    }

    /// Append a new trigger to the row at `ts`, creating the row if needed
    pub fn insert(&mut self, ts: Tstamp, kind: &str, raw_fields: &[Value]) -> Result<(), SheetError> {
        self.check_insert(ts, kind)?;
        self.rows
            .entry(ts)
            .or_default()
            .push(Trigger::new(kind, raw_fields));
        Ok(())
    }

    /// Insert a new trigger before position `index` of the row at `ts`
    pub fn insert_at(
        &mut self,
        ts: Tstamp,
        index: usize,
        kind: &str,
        raw_fields: &[Value],
    ) -> Result<(), SheetError> {
        self.insert_trigger(ts, index, Trigger::new(kind, raw_fields))
    }

    /// Insert an already built trigger
    pub fn insert_trigger(&mut self, ts: Tstamp, index: usize, trigger: Trigger) -> Result<(), SheetError> {
        self.check_insert(ts, trigger.kind())?;
        self.rows.entry(ts).or_default().insert(index, trigger);
        Ok(())
    }

    /// Remove one trigger, dropping the row when it empties
    pub fn remove_trigger(&mut self, ts: Tstamp, index: usize) -> Result<Trigger, SheetError> {
        let row = self.rows.get_mut(&ts).ok_or(SheetError::NoSuchRow(ts))?;
        let removed = row
            .remove(index)
            .ok_or(SheetError::NoSuchTrigger { ts, index })?;
        if row.is_empty() {
            self.rows.remove(&ts);
        }
        Ok(removed)
    }

    fn trigger_mut(&mut self, ts: Tstamp, index: usize) -> Result<&mut Trigger, SheetError> {
        self.rows
            .get_mut(&ts)
            .ok_or(SheetError::NoSuchRow(ts))?
            .get_mut(index)
            .ok_or(SheetError::NoSuchTrigger { ts, index })
    }

    /// Re-run construction for a single field
    pub fn replace_field(
        &mut self,
        ts: Tstamp,
        trigger_index: usize,
        field_index: usize,
        raw: &Value,
    ) -> Result<(), SheetError> {
        self.trigger_mut(ts, trigger_index)?
            .replace_field(field_index, raw)
    }

    /// Reset a single field to its default
    pub fn reset_field(&mut self, ts: Tstamp, trigger_index: usize, field_index: usize) -> Result<(), SheetError> {
        self.trigger_mut(ts, trigger_index)?.reset_field(field_index)
    }

    /// Change the kind of a trigger, carrying over fields the new kind accepts
    ///
    /// Returns the previous trigger.
    pub fn replace_kind(&mut self, ts: Tstamp, index: usize, kind: &str) -> Result<Trigger, SheetError> {
        self.check_insert(ts, kind)?;
        let trigger = self.trigger_mut(ts, index)?;
        let replaced = trigger.with_kind(kind);
        Ok(std::mem::replace(trigger, replaced))
    }

    /// Re-insert a removed trigger without scope checks
    pub(crate) fn restore_trigger(&mut self, ts: Tstamp, index: usize, trigger: Trigger) {
        self.rows.entry(ts).or_default().insert(index, trigger);
    }

    /// Put back a previously taken trigger, returning the current one
    pub(crate) fn replace_trigger(&mut self, ts: Tstamp, index: usize, trigger: Trigger) -> Result<Trigger, SheetError> {
        let slot = self.trigger_mut(ts, index)?;
        Ok(std::mem::replace(slot, trigger))
    }

    /// Move every row at `t >= ts` to `t + delta`
    ///
    /// With a negative delta a moved row may land on an existing row; the
    /// earlier row absorbs the later one by appending its triggers. Fails
    /// without changes if any row would move before zero.
    pub fn shift_from(&mut self, ts: Tstamp, delta: Tstamp) -> Result<(), SheetError> {
        let targets = self
            .rows
            .range(ts..)
            .map(|(&t, _)| t.checked_add(delta))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(&first) = targets.first() {
            if first.is_negative() {
                return Err(SheetError::NegativeTimestamp(first));
            }
        }

        let moved = self.rows.split_off(&ts);
        for (target, (_, row)) in targets.into_iter().zip(moved) {
            match self.rows.get_mut(&target) {
                Some(existing) => existing.absorb(row),
                None => {
                    self.rows.insert(target, row);
                }
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Append a stored trigger; kinds outside the schema stay in any column
    pub(crate) fn load_trigger(&mut self, ts: Tstamp, trigger: Trigger) -> Result<(), SheetError> {
        if trigger.spec().is_some() {
            self.check_insert(ts, trigger.kind())?;
        } else if ts.is_negative() {
            return Err(SheetError::NegativeTimestamp(ts));
        }
        self.rows.entry(ts).or_default().push(trigger);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn t(beats: i64) -> Tstamp {
        Tstamp::from_beats(beats)
    }

    fn column_with(rows: &[(i64, &str)]) -> Column {
        let mut column = Column::new(ColumnId::Channel(0));
        for (beats, kind) in rows {
            column.insert(t(*beats), kind, &[]).unwrap();
        }
        column
    }

    fn kinds_at(column: &Column, beats: i64) -> Vec<String> {
        column
            .row(t(beats))
            .map(|row| row.iter().map(|tr| tr.kind().to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_insert_then_range() {
        let mut column = Column::new(ColumnId::Channel(0));
        column.insert(t(4), "n+", &[json!(300)]).unwrap();
        let rows: Vec<_> = column.iter_range(t(4), t(4)).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.get(0).map(|tr| tr.kind()), Some("n+"));
    }

    #[test]
    fn test_scope_rejected() {
        let mut global = Column::new(ColumnId::Global);
        let err = global.insert(t(0), "C.i", &[]).unwrap_err();
        assert!(matches!(err, SheetError::KindNotAllowedInColumn { .. }));
        assert!(global.is_empty());
        global.insert(t(0), "W.t", &[json!(140)]).unwrap();

        let mut channel = Column::new(ColumnId::Channel(2));
        assert!(channel.insert(t(0), "W.t", &[]).is_err());
        assert!(channel.is_empty());
    }

    #[test]
    fn test_negative_timestamp_rejected() {
        let mut column = Column::new(ColumnId::Channel(0));
        assert!(column.insert(Tstamp::from_f64(-0.5), "n+", &[]).is_err());
    }

    #[test]
    fn test_remove_drops_empty_row() {
        let mut column = column_with(&[(1, "n+"), (1, "n-")]);
        column.remove_trigger(t(1), 0).unwrap();
        assert_eq!(kinds_at(&column, 1), vec!["n-"]);
        column.remove_trigger(t(1), 0).unwrap();
        assert!(column.row(t(1)).is_none());
        assert!(column.remove_trigger(t(1), 0).is_err());
    }

    #[test]
    fn test_insert_at_position() {
        let mut column = column_with(&[(1, "n+"), (1, "n-")]);
        column.insert_at(t(1), 1, "h", &[]).unwrap();
        assert_eq!(kinds_at(&column, 1), vec!["n+", "h", "n-"]);
    }

    #[test]
    fn test_replace_kind_keeps_fields() {
        let mut column = Column::new(ColumnId::Channel(0));
        column.insert(t(0), "n+", &[json!(300)]).unwrap();
        let old = column.replace_kind(t(0), 0, "C/p").unwrap();
        assert_eq!(old.kind(), "n+");
        assert_eq!(column.trigger(t(0), 0).unwrap().raw_fields(), vec![json!(300.0)]);
    }

    #[test]
    fn test_shift_close_gap() {
        let mut column = column_with(&[(2, "n+"), (4, "n+"), (6, "n+")]);
        column.shift_from(t(3), t(-1)).unwrap();
        let keys: Vec<Tstamp> = column.iter().map(|(ts, _)| *ts).collect();
        assert_eq!(keys, vec![t(2), t(3), t(5)]);
    }

    #[test]
    fn test_shift_collision_earlier_absorbs() {
        let mut column = column_with(&[(2, "n+"), (3, "n-")]);
        column.shift_from(t(3), t(-1)).unwrap();
        assert_eq!(column.len(), 1);
        assert_eq!(kinds_at(&column, 2), vec!["n+", "n-"]);
    }

    #[test]
    fn test_shift_preserves_triggers() {
        let mut column = column_with(&[(1, "n+"), (5, "n-"), (5, "h"), (9, "cp")]);
        let before = column.trigger_count();
        column.shift_from(t(4), Tstamp::new(2, 7)).unwrap();
        assert_eq!(column.trigger_count(), before);
        assert_eq!(kinds_at(&column, 1), vec!["n+"]);
        assert_eq!(
            column.row(Tstamp::new(7, 7)).map(TriggerRow::len),
            Some(2)
        );
        assert!(column.row(Tstamp::new(11, 7)).is_some());
    }

    #[test]
    fn test_shift_below_zero_rejected() {
        let mut column = column_with(&[(1, "n+")]);
        assert!(column.shift_from(t(0), t(-2)).is_err());
        assert_eq!(kinds_at(&column, 1), vec!["n+"]);
    }

    #[test]
    fn test_shift_overflow_rejected() {
        let mut column = column_with(&[(1, "n+"), (3, "n-")]);
        let result = column.shift_from(t(2), t(i64::MAX));
        assert!(matches!(result, Err(SheetError::InvalidArithmetic(_))));
        assert_eq!(kinds_at(&column, 1), vec!["n+"]);
        assert_eq!(kinds_at(&column, 3), vec!["n-"]);
    }

    #[test]
    fn test_neighbour_queries() {
        let column = column_with(&[(2, "n+"), (4, "n+"), (6, "n+")]);
        assert_eq!(column.next_row_after(t(2)).map(|(ts, _)| ts), Some(t(4)));
        assert_eq!(column.prev_row_before(t(4)).map(|(ts, _)| ts), Some(t(2)));
        assert!(column.next_row_after(t(6)).is_none());
        assert_eq!(column.rows_between_exclusive(t(2), t(6)).count(), 1);
        assert_eq!(column.iter_range(t(6), t(2)).count(), 0);
    }

    #[test]
    fn test_column_id_display() {
        assert_eq!(ColumnId::Global.to_string(), "-1");
        assert_eq!(ColumnId::Channel(12).to_string(), "12");
        assert_eq!(ColumnId::from_channel(-1), Some(ColumnId::Global));
        assert_eq!(ColumnId::from_channel(-2), None);
    }
}
