//! Rounding helpers shared by every aggregate so charts and deltas agree.

/// Rounds half-way values towards positive infinity (`-2.5` becomes `-2`).
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

pub(crate) fn round_to_hundredths(value: f64) -> f64 {
    round_half_up(value * 100.0) / 100.0
}

/// `round(part / whole * 100)`, or 0 for an empty whole.
pub(crate) fn percent_of(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    round_half_up(part as f64 / whole as f64 * 100.0) as u32
}
