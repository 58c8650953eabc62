// Trigger-row layout and painting

use crate::sheet::trigger::Trigger;
use crate::sheet::trigger_row::TriggerRow;
use crate::view::painter::{Painter, TextMetrics};
use crate::view::style::{Colours, HeadStyle, SheetStyle};
use crate::view::trigger_cache::TriggerCache;
use egui::{Rect, pos2};
use std::rc::Rc;

/// Measured text of one slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotText {
    pub text: String,
    pub text_width: f32,
    /// Text width plus padding
    pub width: f32,
}

impl SlotText {
    fn new(text: String, metrics: &dyn TextMetrics, padding: f32) -> Self {
        let text_width = metrics.text_width(&text);
        Self {
            text,
            text_width,
            width: text_width + padding,
        }
    }
}

/// Measured trigger: type head followed by its fields
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerLayout {
    pub valid: bool,
    pub head: SlotText,
    pub fields: Vec<SlotText>,
}

impl TriggerLayout {
    pub fn new(trigger: &Trigger, metrics: &dyn TextMetrics, padding: f32) -> Self {
        let head = SlotText::new(trigger.kind().to_string(), metrics, padding);
        let fields = (1..trigger.slot_count())
            .filter_map(|slot| trigger.slot_text(slot))
            .map(|text| SlotText::new(text, metrics, padding))
            .collect();
        Self {
            valid: trigger.is_valid(),
            head,
            fields,
        }
    }

    pub fn width(&self) -> f32 {
        self.head.width + self.fields.iter().map(|f| f.width).sum::<f32>()
    }

    /// Approximate memory held by this layout
    pub fn byte_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.head.text.len()
            + self
                .fields
                .iter()
                .map(|f| std::mem::size_of::<SlotText>() + f.text.len())
                .sum::<usize>()
    }
}

/// Horizontal extent of a slot in row pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotExtent {
    pub left: f32,
    pub right: f32,
}

/// Layout of a whole trigger-row
///
/// Slots are laid out left to right after the margin; the end slot is an
/// empty slot of `padding` width after the last trigger.
#[derive(Debug, Clone)]
pub struct RowLayout {
    triggers: Vec<Rc<TriggerLayout>>,
    slots: Vec<SlotExtent>,
    end: SlotExtent,
    width: f32,
}

impl RowLayout {
    pub fn new(triggers: Vec<Rc<TriggerLayout>>, style: &SheetStyle) -> Self {
        let mut x = style.trigger_margin;
        let mut slots = Vec::new();
        for (i, trigger) in triggers.iter().enumerate() {
            if i > 0 {
                x += style.field_padding;
            }
            for width in std::iter::once(trigger.head.width).chain(trigger.fields.iter().map(|f| f.width)) {
                slots.push(SlotExtent {
                    left: x,
                    right: x + width,
                });
                x += width;
            }
        }
        let end_left = if triggers.is_empty() { x } else { x + style.field_padding };
        let end = SlotExtent {
            left: end_left,
            right: end_left + style.field_padding.max(1.0),
        };
        Self {
            triggers,
            slots,
            end,
            width: end.right + style.trigger_margin,
        }
    }

    /// Layout of `row`, measuring through `cache`
    pub fn of_row(row: &TriggerRow, cache: &mut TriggerCache, metrics: &dyn TextMetrics, style: &SheetStyle) -> Self {
        let triggers = row
            .iter()
            .map(|trigger| cache.layout(trigger, metrics, style.field_padding))
            .collect();
        Self::new(triggers, style)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn triggers(&self) -> &[Rc<TriggerLayout>] {
        &self.triggers
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Extent of `slot`; anything past the last field is the end slot
    pub fn slot_extent(&self, slot: usize) -> SlotExtent {
        self.slots.get(slot).copied().unwrap_or(self.end)
    }
}

/// Cursor state passed to the painter for the cursor's row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowCursor {
    pub slot: usize,
    pub insert: bool,
    /// Horizontal scroll inside the row
    pub view_start: f32,
}

const LEFT_ARROW: &str = "<";
const RIGHT_ARROW: &str = ">";

/// Paint one trigger-row into `rect`
///
/// Fields are right-aligned within their width unless the right edge of
/// `rect` clips them, in which case they are left-aligned so the
/// significant prefix stays visible.
pub fn paint_row(
    painter: &mut dyn Painter,
    metrics: &dyn TextMetrics,
    colours: &Colours,
    layout: &RowLayout,
    rect: Rect,
    cursor: Option<RowCursor>,
) {
    let offset = cursor.map(|c| c.view_start).unwrap_or(0.0);
    let x0 = rect.left() - offset;
    let text_y = rect.top() + ((rect.height() - metrics.line_height()) / 2.0).max(0.0);
    let half_pad = |slot: &SlotText| (slot.width - slot.text_width) / 2.0;

    painter.set_clip(Some(rect));

    let content_right = (x0 + layout.width()).min(rect.right());
    painter.fill_rect(
        Rect::from_min_max(rect.min, pos2(content_right.max(rect.left()), rect.bottom())),
        colours.trigger_bg,
    );

    if let Some(cursor) = cursor {
        let extent = layout.slot_extent(cursor.slot);
        if cursor.insert {
            let x = x0 + extent.left - 1.0;
            painter.line(
                pos2(x, rect.top() + 1.0),
                pos2(x, rect.bottom() - 1.0),
                colours.insert_caret,
            );
        } else {
            painter.fill_rect(
                Rect::from_min_max(
                    pos2(x0 + extent.left, rect.top()),
                    pos2(x0 + extent.right, rect.bottom()),
                ),
                colours.cursor_bg,
            );
        }
    }

    let head_style = |valid| HeadStyle::of(valid, cursor.is_some());
    let mut slot = 0;
    for trigger in layout.triggers() {
        let extent = layout.slot_extent(slot);
        painter.text(
            pos2(x0 + extent.left + half_pad(&trigger.head), text_y),
            &trigger.head.text,
            colours.head(head_style(trigger.valid)),
        );
        slot += 1;

        for field in &trigger.fields {
            let extent = layout.slot_extent(slot);
            let right = x0 + extent.right;
            let x = if right > rect.right() {
                x0 + extent.left + half_pad(field)
            } else {
                right - half_pad(field) - field.text_width
            };
            painter.text(pos2(x, text_y), &field.text, colours.field_fg);
            slot += 1;
        }
    }

    if cursor.is_some() {
        if offset > 0.0 {
            painter.text(pos2(rect.left(), text_y), LEFT_ARROW, colours.arrow);
        }
        if x0 + layout.width() > rect.right() {
            let w = metrics.text_width(RIGHT_ARROW);
            painter.text(pos2(rect.right() - w, text_y), RIGHT_ARROW, colours.arrow);
        }
    }

    painter.set_clip(None);
}
