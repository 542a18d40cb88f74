//! Statistical window aggregation over a point snapshot.

use std::collections::btree_map;
use std::iter::Peekable;

use crate::types::StatPoint;

/// Largest point width accepted by aligned window queries.
pub const MAX_POINT_WIDTH: u32 = 62;

/// Largest depth accepted by arbitrary window queries.
pub const MAX_WINDOW_DEPTH: u32 = 63;

/// Running min/max/mean/variance (Welford).
#[derive(Debug, Clone, Copy, Default)]
pub struct Accumulator {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Population statistics for the window starting at `time`.
    pub fn finish(&self, time: i64) -> StatPoint {
        let stddev = if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).max(0.0).sqrt()
        };
        StatPoint {
            time,
            min: self.min,
            mean: self.mean,
            max: self.max,
            count: self.count,
            stddev,
        }
    }
}

/// Round `t` down to a multiple of `2^pw`.
pub fn align_down(t: i64, pw: u32) -> i64 {
    let width = 1i128 << pw;
    let aligned = (t as i128).div_euclid(width) * width;
    aligned.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Bucketing rule for a window query.
#[derive(Debug, Clone, Copy)]
pub enum Windowing {
    /// `[t, t + 2^pw)` with `t` a multiple of `2^pw`.
    Aligned { point_width: u32 },
    /// `[origin + k*width, origin + (k+1)*width)`.
    Fixed { origin: i64, width: u64 },
}

impl Windowing {
    fn window_start(&self, t: i64) -> i64 {
        match *self {
            Windowing::Aligned { point_width } => align_down(t, point_width),
            Windowing::Fixed { origin, width } => {
                let width = width as i128;
                let offset = (t as i128 - origin as i128).div_euclid(width) * width;
                (origin as i128 + offset) as i64
            }
        }
    }
}

/// The half-open span covered by an aligned window query over `[start, end)`.
pub fn aligned_span(start: i64, end: i64, point_width: u32) -> (i64, i64) {
    (align_down(start, point_width), align_down(end, point_width))
}

/// The half-open span tiled by complete `width` windows from `start` before `end`.
pub fn fixed_span(start: i64, end: i64, width: u64) -> (i64, i64) {
    let len = (end as i128 - start as i128).max(0);
    let windows = len / width as i128;
    let limit = start as i128 + windows * width as i128;
    (start, limit as i64)
}

/// Groups consecutive points into non-empty windows, in time order.
pub struct WindowIter<'a> {
    points: Peekable<btree_map::Range<'a, i64, f64>>,
    windowing: Windowing,
}

impl<'a> WindowIter<'a> {
    pub fn new(points: btree_map::Range<'a, i64, f64>, windowing: Windowing) -> Self {
        Self {
            points: points.peekable(),
            windowing,
        }
    }
}

impl Iterator for WindowIter<'_> {
    type Item = StatPoint;

    fn next(&mut self) -> Option<StatPoint> {
        let (&first_time, &first_value) = self.points.next()?;
        let window = self.windowing.window_start(first_time);

        let mut acc = Accumulator::default();
        acc.push(first_value);
        while let Some(&(&time, &value)) = self.points.peek() {
            if self.windowing.window_start(time) != window {
                break;
            }
            acc.push(value);
            self.points.next();
        }

        Some(acc.finish(window))
    }
}
