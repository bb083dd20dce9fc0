//! Neckline levels: true range, ATR and the neckline ± ATR band
//!
//! ATR follows TA-Lib alignment: the first value sits at index `period` and is
//! the simple mean of TR[1..=period]; later values use Wilder smoothing.

use crate::{OHLCVExt, Period, OHLCV};

/// ATR lookback used for the neckline band
pub const DEFAULT_ATR_PERIOD: usize = 14;

/// True range per bar. The first bar has no previous close and uses high - low.
pub fn true_range<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    let mut prev_close = None;
    bars.iter()
        .map(|bar| {
            let tr = bar.true_range(prev_close);
            prev_close = Some(bar.close());
            tr
        })
        .collect()
}

/// Average true range, NaN until `period` bars of true range are available.
pub fn atr<T: OHLCV>(bars: &[T], period: Period) -> Vec<f64> {
    let n = bars.len();
    let period = period.get();
    let mut out = vec![f64::NAN; n];
    if n <= period {
        return out;
    }

    let tr = true_range(bars);
    let p = period as f64;

    let mut prev = tr[1..=period].iter().sum::<f64>() / p;
    out[period] = prev;
    for i in period + 1..n {
        prev = (prev * (p - 1.0) + tr[i]) / p;
        out[i] = prev;
    }
    out
}

/// Neckline band of a bar
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct NecklineBand {
    #[serde(rename = "neckline_upper")]
    pub upper: f64,
    #[serde(rename = "neckline_lower")]
    pub lower: f64,
}

impl NecklineBand {
    /// True when both edges are defined
    pub fn is_defined(&self) -> bool {
        !self.upper.is_nan() && !self.lower.is_nan()
    }
}

/// Pairwise `neckline ± atr`. NaN on either input propagates to both edges.
pub fn neckline_bands(necklines: &[f64], atr: &[f64]) -> Vec<NecklineBand> {
    necklines
        .iter()
        .zip(atr)
        .map(|(&neckline, &atr)| NecklineBand {
            upper: neckline + atr,
            lower: neckline - atr,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    struct Bar {
        h: f64,
        l: f64,
        c: f64,
    }

    impl OHLCV for Bar {
        fn open(&self) -> f64 {
            self.c
        }

        fn high(&self) -> f64 {
            self.h
        }

        fn low(&self) -> f64 {
            self.l
        }

        fn close(&self) -> f64 {
            self.c
        }

        fn volume(&self) -> f64 {
            1000.0
        }
    }

    fn flat(n: usize, range: f64) -> Vec<Bar> {
        (0..n)
            .map(|_| Bar {
                h: 100.0 + range / 2.0,
                l: 100.0 - range / 2.0,
                c: 100.0,
            })
            .collect()
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let bars = [
            Bar { h: 11.0, l: 9.0, c: 10.0 },
            Bar { h: 15.0, l: 14.0, c: 14.5 },
        ];
        assert_eq!(true_range(&bars), vec![2.0, 5.0]);
    }

    #[test]
    fn test_atr_alignment() {
        let bars = flat(20, 4.0);
        let out = atr(&bars, Period::new_const(14));
        assert_eq!(out.len(), 20);
        assert!(out[..14].iter().all(|v| v.is_nan()));
        assert!(out[14..].iter().all(|v| (v - 4.0).abs() < 1e-12));
    }

    #[test]
    fn test_atr_short_series_all_nan() {
        let bars = flat(14, 4.0);
        assert!(atr(&bars, Period::new_const(14)).iter().all(|v| v.is_nan()));
        let empty: Vec<Bar> = Vec::new();
        assert!(atr(&empty, Period::new_const(14)).is_empty());
    }

    #[test]
    fn test_atr_wilder_smoothing() {
        // TR: [2, 2, 2, 8] with period 2 -> ATR[2] = 2, ATR[3] = (2 * 1 + 8) / 2 = 5
        let mut bars = flat(3, 2.0);
        bars.push(Bar { h: 104.0, l: 96.0, c: 100.0 });
        let out = atr(&bars, Period::new_const(2));
        assert!(out[0].is_nan() && out[1].is_nan());
        assert!((out[2] - 2.0).abs() < 1e-12);
        assert!((out[3] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_bands_propagate_nan() {
        let bands = neckline_bands(&[f64::NAN, 100.0, 100.0], &[1.0, f64::NAN, 2.5]);
        assert!(!bands[0].is_defined());
        assert!(!bands[1].is_defined());
        assert_eq!(bands[2], NecklineBand { upper: 102.5, lower: 97.5 });
    }
}
