//! Window helpers shared by the confirmation rules

use crate::OHLCV;

/// No bar in `window` trades above `ceiling`
#[inline]
pub fn no_high_above<T: OHLCV>(window: &[T], ceiling: f64) -> bool {
    window.iter().all(|b| b.high() <= ceiling)
}

/// Some bar in `window` trades below `floor`
#[inline]
pub fn any_low_below<T: OHLCV>(window: &[T], floor: f64) -> bool {
    window.iter().any(|b| b.low() < floor)
}

/// Position (within `window`) of the highest high; earliest bar wins ties
#[inline]
pub fn highest_high<T: OHLCV>(window: &[T]) -> Option<usize> {
    window
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, b)| match best {
            Some((_, high)) if b.high() <= high => best,
            _ => Some((i, b.high())),
        })
        .map(|(i, _)| i)
}

/// Position (within `window`) of the lowest low; earliest bar wins ties
#[inline]
pub fn lowest_low<T: OHLCV>(window: &[T]) -> Option<usize> {
    window
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, b)| match best {
            Some((_, low)) if b.low() >= low => best,
            _ => Some((i, b.low())),
        })
        .map(|(i, _)| i)
}
