//! Pivot highs and lows
//!
//! A pivot is a bar whose high (low) is strictly above (below) the bar
//! `leftbars` positions earlier and the bar `rightbars` positions later. Only
//! those two offsets are compared, not the whole neighbourhood.

use crate::OHLCV;

/// Which extreme a pivot is taken on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PivotKind {
    High,
    Low,
}

impl PivotKind {
    /// The price this kind of pivot is measured on.
    #[inline]
    pub fn price<T: OHLCV>(self, bar: &T) -> f64 {
        match self {
            PivotKind::High => bar.high(),
            PivotKind::Low => bar.low(),
        }
    }

    /// True if `price` is strictly more extreme than `other`.
    /// NaN on either side never dominates.
    #[inline]
    pub fn dominates(self, price: f64, other: f64) -> bool {
        match self {
            PivotKind::High => price > other,
            PivotKind::Low => price < other,
        }
    }
}

/// Confirmed pivot
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Pivot {
    pub index: usize,
    pub price: f64,
    pub kind: PivotKind,
}

/// All pivots of `kind`, in ascending index order.
///
/// Positions closer than `leftbars` to the start or `rightbars` to the end
/// cannot be evaluated and never appear.
pub fn find_pivots<T: OHLCV>(
    bars: &[T],
    kind: PivotKind,
    leftbars: usize,
    rightbars: usize,
) -> Vec<Pivot> {
    let end = bars.len().saturating_sub(rightbars);
    if leftbars >= end {
        return Vec::new();
    }

    (leftbars..end)
        .filter_map(|index| {
            let price = kind.price(&bars[index]);
            let left = kind.price(&bars[index - leftbars]);
            let right = kind.price(&bars[index + rightbars]);
            (kind.dominates(price, left) && kind.dominates(price, right)).then_some(Pivot {
                index,
                price,
                kind,
            })
        })
        .collect()
}

#[inline]
pub fn find_pivot_highs<T: OHLCV>(bars: &[T], leftbars: usize, rightbars: usize) -> Vec<Pivot> {
    find_pivots(bars, PivotKind::High, leftbars, rightbars)
}

#[inline]
pub fn find_pivot_lows<T: OHLCV>(bars: &[T], leftbars: usize, rightbars: usize) -> Vec<Pivot> {
    find_pivots(bars, PivotKind::Low, leftbars, rightbars)
}

/// Heads of shoulder-head-shoulder triples.
///
/// A head is a pivot whose immediate neighbours (index - 1 and index + 1) are
/// pivots of the same kind and whose price is strictly more extreme than both.
/// `pivots` must be sorted by index and of a single kind.
pub fn find_heads(pivots: &[Pivot]) -> impl Iterator<Item = Pivot> + '_ {
    pivots.windows(3).filter_map(|w| {
        let (left, head, right) = (w[0], w[1], w[2]);
        let adjacent = left.index + 1 == head.index && head.index + 1 == right.index;
        let extreme = head.kind.dominates(head.price, left.price)
            && head.kind.dominates(head.price, right.price);
        (adjacent && extreme).then_some(head)
    })
}
