// =============================================================================
// Slope estimators
// =============================================================================
//
// Two different notions of "slope" are used and must not be confused:
//
//   regression_slope      least-squares slope of raw values per step
//                         (CCI slope, in CCI points per day)
//   percent_change_slope  (end - start) / start * 100 over a span
//                         (MA20 slope, in percent)
//
// Both return 0.0 when there are fewer than `n` values or the denominator is
// zero.
// =============================================================================

/// Least-squares slope of the last `n` values against x = 0, 1, .., n-1.
pub fn regression_slope(values: &[f64], n: usize) -> f64 {
    if n < 2 || values.len() < n {
        return 0.0;
    }

    let window = &values[values.len() - n..];
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = window.iter().sum::<f64>() / nf;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in window.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }

    if den == 0.0 {
        return 0.0;
    }
    let slope = num / den;
    if slope.is_finite() {
        slope
    } else {
        0.0
    }
}

/// Percent change from the first to the last of the last `n` values.
pub fn percent_change_slope(values: &[f64], n: usize) -> f64 {
    if n < 2 || values.len() < n {
        return 0.0;
    }

    let start = values[values.len() - n];
    let end = values[values.len() - 1];
    if start == 0.0 {
        return 0.0;
    }
    let pct = (end - start) / start * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}
