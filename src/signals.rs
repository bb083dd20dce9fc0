//! Long entry/exit signals built from neckline band crossings
//!
//! - **entry**: bullish pattern active, close crosses above the lower band and
//!   stays below the upper band;
//! - **exit**: close crosses above the upper band.

use crate::{detectors::HsSeries, levels::NecklineBand, OHLCV};

/// `a` crosses above `b` at `index`: a > b now and a <= b on the previous bar.
///
/// False at index 0, past either slice's end, and whenever a NaN is involved.
pub fn crossed_above(a: &[f64], b: &[f64], index: usize) -> bool {
    if index == 0 || index >= a.len() || index >= b.len() {
        return false;
    }
    a[index] > b[index] && a[index - 1] <= b[index - 1]
}

/// Per-bar signal columns
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SignalColumns {
    pub enter_long: Vec<bool>,
    pub exit_long: Vec<bool>,
}

impl SignalColumns {
    pub fn entry_count(&self) -> usize {
        self.enter_long.iter().filter(|&&s| s).count()
    }

    pub fn exit_count(&self) -> usize {
        self.exit_long.iter().filter(|&&s| s).count()
    }
}

/// Entry and exit columns for `bars` given their annotations and bands.
pub fn neckline_signals<T: OHLCV>(
    bars: &[T],
    series: &HsSeries,
    bands: &[NecklineBand],
) -> SignalColumns {
    let close: Vec<f64> = bars.iter().map(|b| b.close()).collect();
    let upper: Vec<f64> = bands.iter().map(|b| b.upper).collect();
    let lower: Vec<f64> = bands.iter().map(|b| b.lower).collect();

    let enter_long = (0..bars.len())
        .map(|i| {
            let bullish = series.get(i).is_some_and(|a| a.bullish);
            bullish
                && crossed_above(&close, &lower, i)
                && upper.get(i).is_some_and(|&u| close[i] < u)
        })
        .collect();

    let exit_long = (0..bars.len())
        .map(|i| crossed_above(&close, &upper, i))
        .collect();

    SignalColumns {
        enter_long,
        exit_long,
    }
}
