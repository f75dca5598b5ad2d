//! Pure calculation functions for compression.
//!
//! All functions here are pure and testable without any I/O or images.

/// Dimensions that fit `source` inside a `max_edge` box, preserving aspect.
///
/// Returns `None` when the source already fits and no resize is needed.
///
/// # Examples
/// ```
/// # use place_photos::compress::fit_within;
/// // 4000x3000 landscape, 1920 cap → 1920x1440
/// assert_eq!(fit_within((4000, 3000), 1920), Some((1920, 1440)));
///
/// // Already small enough
/// assert_eq!(fit_within((800, 600), 1920), None);
/// ```
pub fn fit_within(source: (u32, u32), max_edge: u32) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    let longer_edge = src_w.max(src_h);

    if longer_edge <= max_edge || src_w == 0 || src_h == 0 {
        return None;
    }

    let ratio = max_edge as f64 / longer_edge as f64;
    if src_w >= src_h {
        // Landscape or square
        let h = ((src_h as f64 * ratio).round() as u32).max(1);
        Some((max_edge, h))
    } else {
        // Portrait
        let w = ((src_w as f64 * ratio).round() as u32).max(1);
        Some((w, max_edge))
    }
}

/// Qualities to try, from `start` down to `min` in `step` decrements.
///
/// `min` is always the last rung, even when the step overshoots it. A zero
/// step or `start <= min` yields the single rung `start.max(min)`.
pub fn quality_ladder(start: u32, min: u32, step: u32) -> Vec<u32> {
    if step == 0 || start <= min {
        return vec![start.max(min)];
    }

    let mut rungs: Vec<u32> = (0..)
        .map(|i| start.saturating_sub(i * step))
        .take_while(|&q| q > min)
        .collect();
    rungs.push(min);
    rungs
}
