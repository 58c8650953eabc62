// Pattern stack - vertical layout of the pattern instances of a song

use crate::sheet::tstamp::Tstamp;

/// Pixel height of a pattern: `ceil((length + 1/BEAT) * px_per_beat)`
pub fn pat_height(length: Tstamp, px_per_beat: f64) -> i64 {
    ((length + Tstamp::UNIT).as_f64() * px_per_beat).ceil() as i64
}

/// Start offsets of consecutive patterns
///
/// Neighbouring patterns overlap by one pixel so that the end line of one
/// pattern and the start of the next share a row.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternStack {
    lengths: Vec<Tstamp>,
    starts: Vec<i64>,
    heights: Vec<i64>,
    px_per_beat: f64,
    trigger_height: i64,
}

impl PatternStack {
    pub fn new(lengths: Vec<Tstamp>, px_per_beat: f64, trigger_height: f32) -> Self {
        let heights: Vec<i64> = lengths.iter().map(|l| pat_height(*l, px_per_beat)).collect();
        let mut starts = Vec::with_capacity(heights.len());
        let mut next = 0;
        for height in &heights {
            starts.push(next);
            next += height - 1;
        }
        Self {
            lengths,
            starts,
            heights,
            px_per_beat,
            trigger_height: trigger_height.ceil() as i64,
        }
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    pub fn px_per_beat(&self) -> f64 {
        self.px_per_beat
    }

    pub fn start(&self, index: usize) -> Option<i64> {
        self.starts.get(index).copied()
    }

    pub fn height(&self, index: usize) -> Option<i64> {
        self.heights.get(index).copied()
    }

    pub fn length(&self, index: usize) -> Option<Tstamp> {
        self.lengths.get(index).copied()
    }

    /// Last start plus last height plus room for one trigger-row
    pub fn total_height(&self) -> i64 {
        match (self.starts.last(), self.heights.last()) {
            (Some(start), Some(height)) => start + height + self.trigger_height,
            _ => 0,
        }
    }

    /// Stack pixel of `ts` within pattern `index`
    pub fn y_of(&self, index: usize, ts: Tstamp) -> Option<f64> {
        let start = self.start(index)?;
        Some(start as f64 + ts.as_f64() * self.px_per_beat)
    }

    /// Pattern and timestamp under stack pixel `y`
    ///
    /// On a seam row the later pattern wins. Positions past the end of a
    /// pattern clamp to its length.
    pub fn locate(&self, y: f64) -> Option<(usize, Tstamp)> {
        if self.is_empty() {
            return None;
        }
        let y = y.max(0.0);
        let index = self
            .starts
            .partition_point(|start| (*start as f64) <= y)
            .saturating_sub(1);
        let length = self.lengths[index];
        let ts = Tstamp::from_f64((y - self.starts[index] as f64) / self.px_per_beat);
        Some((index, ts.clamp(Tstamp::ZERO, length)))
    }

    /// Patterns intersecting stack pixels `[top, bottom)`
    pub fn visible(&self, top: f64, bottom: f64) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(move |&i| {
            let start = self.starts[i] as f64;
            start < bottom && start + self.heights[i] as f64 > top
        })
    }
}
