//! Robust scalar statistics used by the background model and the BDC scan.

/// Huber tuning constant giving 95% efficiency under Gaussian noise.
pub const HUBER_K: f64 = 1.345;
/// Scales a median absolute deviation to a Gaussian standard deviation.
pub const MAD_TO_SIGMA: f64 = 1.4826;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Zero for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Median of the values. Sorts a copy; NaN values compare as equal.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation around the median.
pub fn mad(values: &[f64]) -> f64 {
    let m = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    median(&deviations)
}

/// Pearson correlation of two equally long series. Zero when either side has no variance.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a), mean(b));
    let mut sab = 0.0;
    let mut saa = 0.0;
    let mut sbb = 0.0;
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - ma, y - mb);
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    let denom = (saa * sbb).sqrt();
    if denom <= f64::EPSILON * n as f64 || !denom.is_finite() {
        return 0.0;
    }
    sab / denom
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HuberFit {
    pub slope: f64,
    pub iterations: usize,
    /// The weighted sum of squared predictors vanished; `slope` holds the fallback.
    pub degenerate: bool,
}

/// Robust slope of `y ≈ slope · x` by Huber-weighted iteratively reweighted least squares.
///
/// Residuals are scaled by `1.4826 · MAD` of the current residuals. When the weighted
/// `Σ w x²` is below `min_denominator` the fit is abandoned and `fallback` returned.
pub fn huber_slope_through_origin(
    x: &[f64],
    y: &[f64],
    max_iterations: usize,
    tolerance: f64,
    min_denominator: f64,
    fallback: f64,
) -> HuberFit {
    let n = x.len().min(y.len());
    let (x, y) = (&x[..n], &y[..n]);
    let mut weights = vec![1.0; n];

    let weighted_slope = |weights: &[f64]| -> Option<f64> {
        let mut sxy = 0.0;
        let mut sxx = 0.0;
        for ((xi, yi), wi) in x.iter().zip(y).zip(weights) {
            sxy += wi * xi * yi;
            sxx += wi * xi * xi;
        }
        (sxx > min_denominator && sxx.is_finite()).then(|| sxy / sxx)
    };

    let Some(mut slope) = weighted_slope(&weights) else {
        return HuberFit {
            slope: fallback,
            iterations: 0,
            degenerate: true,
        };
    };

    let mut iterations = 0;
    while iterations < max_iterations {
        iterations += 1;
        let residuals: Vec<f64> = x.iter().zip(y).map(|(xi, yi)| yi - slope * xi).collect();
        let scale = MAD_TO_SIGMA * mad(&residuals);
        if scale <= f64::EPSILON {
            break;
        }
        for (w, r) in weights.iter_mut().zip(&residuals) {
            let u = (r / scale).abs();
            *w = if u <= HUBER_K { 1.0 } else { HUBER_K / u };
        }
        let Some(next) = weighted_slope(&weights) else {
            break;
        };
        let converged = (next - slope).abs() <= tolerance * slope.abs().max(1.0);
        slope = next;
        if converged {
            break;
        }
    }

    HuberFit {
        slope,
        iterations,
        degenerate: false,
    }
}

/// Standard deviation after iterative `k`-sigma clipping around the mean.
///
/// Each pass drops the values further than `k` standard deviations from the mean of the
/// values kept so far. Stops when nothing is dropped, after `max_passes`, or when fewer than
/// three values would remain.
pub fn clipped_std(values: &[f64], k: f64, max_passes: usize) -> f64 {
    let mut kept: Vec<f64> = values.to_vec();
    for _ in 0..max_passes {
        let m = mean(&kept);
        let s = sample_std(&kept);
        if s <= 0.0 {
            break;
        }
        let next: Vec<f64> = kept
            .iter()
            .copied()
            .filter(|v| (v - m).abs() <= k * s)
            .collect();
        if next.len() == kept.len() || next.len() < 3 {
            break;
        }
        kept = next;
    }
    sample_std(&kept)
}
