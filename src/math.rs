/// Rounds to `dp` decimal places through decimal formatting, so the result
/// matches what a printed value with that many places reads back as.
#[inline(always)]
pub fn round_dp(value: f64, dp: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let formatted = format!("{:.*}", dp, value);
    formatted.parse::<f64>().unwrap_or(value)
}

/// Round half toward positive infinity (2.5 -> 3, -2.5 -> -2).
#[inline(always)]
pub fn round_half_up(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    (value + 0.5).floor()
}

/// `floor` as an integer; non-finite input collapses to 0.
#[inline(always)]
pub fn floor_i64(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    value.floor() as i64
}

/// Substitutes 1.0 for a zero or non-finite divisor.
#[inline(always)]
pub fn nonzero_or_one(value: f64) -> f64 {
    if value == 0.0 || !value.is_finite() { 1.0 } else { value }
}
