// =============================================================================
// Moving Averages (SMA / EMA)
// =============================================================================
//
// SMA_t = mean(values[t - period + 1 ..= t])
//
// EMA:
//   multiplier = 2 / (period + 1)
//   EMA_t      = value_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The first EMA value is seeded with the SMA of the first `period` values.
// Output element `i` of either series corresponds to input index
// `i + period - 1`. `warmup_sma_tail` is the exception: it averages over
// whatever history exists before the first full period.
// =============================================================================

/// Rolling simple moving average.
///
/// Returns an empty `Vec` when `period == 0` or the input is shorter than
/// `period`.
pub fn sma_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let p = period as f64;
    let mut sum: f64 = values[..period].iter().sum();
    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(sum / p);

    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out.push(sum / p);
    }

    out
}

/// The last `count` moving averages, where an average that would need bars
/// before the start of `values` is taken over the bars that exist instead
/// (`min(period, i + 1)` values ending at index `i`).
///
/// Returns fewer than `count` values only when `values` itself is shorter.
pub fn warmup_sma_tail(values: &[f64], period: usize, count: usize) -> Vec<f64> {
    if period == 0 {
        return Vec::new();
    }
    let first = values.len().saturating_sub(count);
    (first..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(period);
            let window = &values[start..=i];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}

/// EMA series seeded with the SMA of the first `period` values.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `values.len() < period` => empty vec
/// - A non-finite intermediate value truncates the series.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;

    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);

    let mut prev = seed;
    for &v in &values[period..] {
        let ema = v * multiplier + prev * (1.0 - multiplier);
        if !ema.is_finite() {
            break;
        }
        out.push(ema);
        prev = ema;
    }

    out
}
