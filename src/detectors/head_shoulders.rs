//! Head-and-shoulders (bearish) and inverse head-and-shoulders (bullish)
//!
//! Detection runs in two phases:
//!
//! 1. **Confirmation** turns every shoulder-head-shoulder pivot triple into a
//!    [`PatternEvent`] carrying its head, neckline and expiry.
//! 2. **Resolution** ([`resolve_events`]) projects the events forward in head
//!    order over a per-position owner table and reads the annotations off it.
//!
//! Overlap rules applied during resolution:
//!
//! - a bullish event claims every position of its window;
//! - a bearish event claims positions until it reaches one already owned by a
//!   bearish event, and stops there;
//! - at the same head the bullish event is applied first.

use std::collections::HashMap;

use super::pivots::{find_heads, find_pivot_highs, find_pivot_lows, Pivot};
use crate::{
    params::{get_count, get_period, ParamMeta, ParameterizedDetector},
    Direction, Period, Result, OHLCV,
};

impl_with_defaults!(HeadShouldersDetector);

// ============================================================
// DETECTOR
// ============================================================

/// Head-and-shoulders detector configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HeadShouldersDetector {
    /// Offset of the left comparison bar of a pivot
    pub leftbars: Period,
    /// Offset of the right comparison bar of a pivot
    pub rightbars: Period,
    /// Bars after the head over which the pattern stays active
    pub threshold: usize,
}

impl Default for HeadShouldersDetector {
    fn default() -> Self {
        Self {
            leftbars: Period::new_const(4),
            rightbars: Period::new_const(4),
            threshold: 10,
        }
    }
}

impl HeadShouldersDetector {
    pub fn new(leftbars: usize, rightbars: usize, threshold: usize) -> Result<Self> {
        Ok(Self {
            leftbars: Period::new(leftbars)?,
            rightbars: Period::new(rightbars)?,
            threshold,
        })
    }

    /// Shortest series that can hold a full shoulder-head-shoulder triple.
    pub fn min_bars(&self) -> usize {
        self.leftbars.get() + self.rightbars.get() + 3
    }

    /// Confirmed patterns in application order (head, then bullish before bearish).
    pub fn confirm<T: OHLCV>(&self, bars: &[T]) -> Vec<PatternEvent> {
        let (left, right) = (self.leftbars.get(), self.rightbars.get());
        let lows = find_pivot_lows(bars, left, right);
        let highs = find_pivot_highs(bars, left, right);

        let mut events: Vec<PatternEvent> = find_heads(&lows)
            .filter_map(|head| self.event_at(bars, head, Direction::Bullish))
            .chain(
                find_heads(&highs).filter_map(|head| self.event_at(bars, head, Direction::Bearish)),
            )
            .collect();
        events.sort_by_key(|e| (e.head, e.direction));
        events
    }

    /// Annotate every bar of `bars`.
    ///
    /// Never fails: a series shorter than [`min_bars`](Self::min_bars) simply
    /// carries no pattern.
    pub fn detect<T: OHLCV>(&self, bars: &[T]) -> HsSeries {
        let mut events = self.confirm(bars);
        let annotations = resolve_events(&mut events, bars.len());
        HsSeries {
            annotations,
            events,
        }
    }

    /// Neckline = mean of the opposite extreme at `head - rightbars` and
    /// `head + leftbars`. Skipped when either reference bar is outside the series.
    fn event_at<T: OHLCV>(
        &self,
        bars: &[T],
        head: Pivot,
        direction: Direction,
    ) -> Option<PatternEvent> {
        let before = bars.get(head.index.checked_sub(self.rightbars.get())?)?;
        let after = bars.get(head.index + self.leftbars.get())?;
        let neckline = match direction {
            Direction::Bullish => (before.high() + after.high()) / 2.0,
            Direction::Bearish => (before.low() + after.low()) / 2.0,
        };
        Some(PatternEvent::new(direction, head.index, neckline, self.threshold))
    }
}

// ============================================================
// EVENTS + RESOLUTION
// ============================================================

/// One confirmed pattern
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PatternEvent {
    pub direction: Direction,
    /// Index of the head pivot; the projection starts here
    pub head: usize,
    pub neckline: f64,
    /// Last index (inclusive) of the projection window, before clipping
    pub expiry: usize,
    /// Positions claimed when the event was applied
    pub written: usize,
}

impl PatternEvent {
    pub fn new(direction: Direction, head: usize, neckline: f64, threshold: usize) -> Self {
        Self {
            direction,
            head,
            neckline,
            expiry: head.saturating_add(threshold),
            written: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Claim {
    direction: Direction,
    neckline: f64,
}

/// Apply `events` in slice order to a series of `len` bars.
///
/// Sets each event's `written` count and returns the per-bar annotations.
pub fn resolve_events(events: &mut [PatternEvent], len: usize) -> Vec<HsAnnotation> {
    let mut owners: Vec<Option<Claim>> = vec![None; len];

    for event in events.iter_mut() {
        event.written = 0;
        if event.head >= len {
            continue;
        }
        let last = event.expiry.min(len - 1);

        for slot in &mut owners[event.head..=last] {
            let blocked = event.direction.is_bearish()
                && matches!(slot, Some(claim) if claim.direction.is_bearish());
            if blocked {
                break;
            }
            *slot = Some(Claim {
                direction: event.direction,
                neckline: event.neckline,
            });
            event.written += 1;
        }
    }

    owners
        .into_iter()
        .map(|owner| match owner {
            Some(claim) => HsAnnotation {
                bullish: claim.direction.is_bullish(),
                bearish: claim.direction.is_bearish(),
                neckline: Some(claim.neckline),
            },
            None => HsAnnotation::default(),
        })
        .collect()
}

// ============================================================
// OUTPUT
// ============================================================

/// Pattern state of a single bar
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct HsAnnotation {
    pub bullish: bool,
    pub bearish: bool,
    pub neckline: Option<f64>,
}

/// Annotated series returned by [`HeadShouldersDetector::detect`]
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct HsSeries {
    annotations: Vec<HsAnnotation>,
    events: Vec<PatternEvent>,
}

impl HsSeries {
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HsAnnotation> {
        self.annotations.get(index)
    }

    pub fn annotations(&self) -> &[HsAnnotation] {
        &self.annotations
    }

    /// Confirmed events with their `written` counts
    pub fn events(&self) -> &[PatternEvent] {
        &self.events
    }

    /// `1` where bullish, `0` elsewhere
    pub fn bullish_column(&self) -> Vec<u8> {
        self.annotations.iter().map(|a| a.bullish as u8).collect()
    }

    /// `1` where bearish, `0` elsewhere
    pub fn bearish_column(&self) -> Vec<u8> {
        self.annotations.iter().map(|a| a.bearish as u8).collect()
    }

    /// Neckline per bar, NaN where no pattern is active
    pub fn neckline_column(&self) -> Vec<f64> {
        self.annotations
            .iter()
            .map(|a| a.neckline.unwrap_or(f64::NAN))
            .collect()
    }

    pub fn bullish_count(&self) -> usize {
        self.annotations.iter().filter(|a| a.bullish).count()
    }

    pub fn bearish_count(&self) -> usize {
        self.annotations.iter().filter(|a| a.bearish).count()
    }
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATION
// ============================================================

static HEAD_SHOULDERS_PARAMS: &[ParamMeta] = &[
    ParamMeta::period(
        "leftbars",
        4.0,
        (2.0, 10.0, 1.0),
        "Offset of the left comparison bar of a pivot",
    ),
    ParamMeta::period(
        "rightbars",
        4.0,
        (2.0, 10.0, 1.0),
        "Offset of the right comparison bar of a pivot",
    ),
    ParamMeta::count(
        "threshold",
        10.0,
        (0.0, 30.0, 2.0),
        "Bars a confirmed pattern stays active after its head",
    ),
];

impl ParameterizedDetector for HeadShouldersDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HEAD_SHOULDERS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            leftbars: get_period(params, "leftbars", 4)?,
            rightbars: get_period(params, "rightbars", 4)?,
            threshold: get_count(params, "threshold", 10)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "HEAD_SHOULDERS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(direction: Direction, head: usize, neckline: f64, threshold: usize) -> PatternEvent {
        PatternEvent::new(direction, head, neckline, threshold)
    }

    #[test]
    fn test_defaults() {
        let d = HeadShouldersDetector::with_defaults();
        assert_eq!(d.leftbars.get(), 4);
        assert_eq!(d.rightbars.get(), 4);
        assert_eq!(d.threshold, 10);
        assert_eq!(d.min_bars(), 11);
    }

    #[test]
    fn test_new_rejects_zero_windows() {
        assert!(HeadShouldersDetector::new(0, 4, 10).is_err());
        assert!(HeadShouldersDetector::new(4, 0, 10).is_err());
        assert!(HeadShouldersDetector::new(4, 4, 0).is_ok());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let d: HeadShouldersDetector = serde_json::from_str(r#"{"threshold": 5}"#).unwrap();
        assert_eq!(d.threshold, 5);
        assert_eq!(d.leftbars.get(), 4);
        assert!(serde_json::from_str::<HeadShouldersDetector>(r#"{"leftbars": 0}"#).is_err());
    }

    #[test]
    fn test_resolve_bullish_window_clipped() {
        let mut events = [event(Direction::Bullish, 5, 100.0, 10)];
        let out = resolve_events(&mut events, 8);
        assert_eq!(events[0].written, 3);
        assert!(out[..5].iter().all(|a| *a == HsAnnotation::default()));
        assert!(out[5..].iter().all(|a| a.bullish && !a.bearish && a.neckline == Some(100.0)));
    }

    #[test]
    fn test_resolve_bearish_stops_at_active_bearish() {
        let mut events = [
            event(Direction::Bearish, 10, 50.0, 10),
            event(Direction::Bearish, 15, 60.0, 10),
        ];
        let out = resolve_events(&mut events, 40);
        assert_eq!(events[0].written, 11);
        assert_eq!(events[1].written, 0);
        assert!(out[10..=20].iter().all(|a| a.bearish && a.neckline == Some(50.0)));
        assert!(out[21..].iter().all(|a| !a.bearish && a.neckline.is_none()));
    }

    #[test]
    fn test_resolve_bearish_fills_until_blocked() {
        // Second bearish starts before the first and runs into it
        let mut events = [
            event(Direction::Bearish, 8, 50.0, 2),
            event(Direction::Bearish, 5, 60.0, 10),
        ];
        let out = resolve_events(&mut events, 30);
        assert_eq!(events[1].written, 3);
        assert_eq!(out[5].neckline, Some(60.0));
        assert_eq!(out[7].neckline, Some(60.0));
        assert_eq!(out[8].neckline, Some(50.0));
        assert!(out[11..].iter().all(|a| !a.bearish));
    }

    #[test]
    fn test_resolve_bullish_overrides_bearish() {
        let mut events = [
            event(Direction::Bearish, 10, 50.0, 10),
            event(Direction::Bullish, 14, 70.0, 10),
        ];
        let out = resolve_events(&mut events, 40);
        assert!(out[10..14].iter().all(|a| a.bearish && a.neckline == Some(50.0)));
        assert!(out[14..=24].iter().all(|a| a.bullish && !a.bearish && a.neckline == Some(70.0)));
    }

    #[test]
    fn test_resolve_bearish_overrides_bullish_mid_window() {
        let mut events = [
            event(Direction::Bullish, 10, 70.0, 10),
            event(Direction::Bearish, 14, 50.0, 10),
        ];
        let out = resolve_events(&mut events, 40);
        assert!(out[10..14].iter().all(|a| a.bullish));
        assert!(out[14..=24].iter().all(|a| a.bearish && !a.bullish && a.neckline == Some(50.0)));
    }

    #[test]
    fn test_resolve_bearish_resumes_after_bullish_cleared_it() {
        // bullish at 12 clears the first bearish projection from 12 on,
        // so the second bearish projection is no longer blocked
        let mut events = [
            event(Direction::Bearish, 10, 50.0, 10),
            event(Direction::Bullish, 12, 70.0, 10),
            event(Direction::Bearish, 15, 60.0, 10),
        ];
        let out = resolve_events(&mut events, 40);
        assert_eq!(events[2].written, 11);
        assert!(out[12..15].iter().all(|a| a.bullish));
        assert!(out[15..=25].iter().all(|a| a.bearish && a.neckline == Some(60.0)));
    }

    #[test]
    fn test_resolve_same_head_bearish_wins() {
        let mut events = [
            event(Direction::Bullish, 10, 70.0, 3),
            event(Direction::Bearish, 10, 50.0, 3),
        ];
        let out = resolve_events(&mut events, 20);
        assert!(out[10..=13].iter().all(|a| a.bearish && !a.bullish));
    }

    #[test]
    fn test_resolve_head_past_end_is_ignored() {
        let mut events = [event(Direction::Bullish, 12, 70.0, 3)];
        let out = resolve_events(&mut events, 10);
        assert_eq!(events[0].written, 0);
        assert!(out.iter().all(|a| *a == HsAnnotation::default()));
    }

    #[test]
    fn test_threshold_overflow_saturates() {
        let mut events = [event(Direction::Bullish, 2, 1.0, usize::MAX)];
        let out = resolve_events(&mut events, 5);
        assert_eq!(events[0].expiry, usize::MAX);
        assert_eq!(events[0].written, 3);
        assert!(out[2..].iter().all(|a| a.bullish));
    }

    #[test]
    fn test_columns() {
        let mut events = [event(Direction::Bearish, 1, 42.0, 1)];
        let annotations = resolve_events(&mut events, 4);
        let series = HsSeries {
            annotations,
            events: events.to_vec(),
        };
        assert_eq!(series.bullish_column(), vec![0, 0, 0, 0]);
        assert_eq!(series.bearish_column(), vec![0, 1, 1, 0]);
        let necklines = series.neckline_column();
        assert!(necklines[0].is_nan());
        assert_eq!(necklines[1], 42.0);
        assert_eq!(necklines[2], 42.0);
        assert!(necklines[3].is_nan());
        assert_eq!(series.bearish_count(), 2);
    }

    #[test]
    fn test_with_params() {
        let mut params = HashMap::new();
        params.insert("threshold", 0.0);
        params.insert("leftbars", 3.0);

        let d = HeadShouldersDetector::with_params(&params).unwrap();
        assert_eq!(d.leftbars.get(), 3);
        assert_eq!(d.rightbars.get(), 4);
        assert_eq!(d.threshold, 0);

        params.insert("rightbars", 0.0);
        assert!(HeadShouldersDetector::with_params(&params).is_err());
    }
}
