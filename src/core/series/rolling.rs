use std::num::NonZeroUsize;

impl RollingMean for [f64] {}

/// Rolling means which shrink their window at the series edges instead of dropping points.
pub trait RollingMean {
    /// Mean of each value and up to `window − 1` preceding values.
    #[must_use]
    fn rolling_mean_forward(&self, window: NonZeroUsize) -> Vec<f64>
    where
        Self: AsRef<[f64]>,
    {
        let values = self.as_ref();
        let sums = prefix_sums(values);
        (0..values.len())
            .map(|index| {
                let start = (index + 1).saturating_sub(window.get());
                mean(&sums, start, index + 1)
            })
            .collect()
    }

    /// Mean of each value and up to `window − 1` following values.
    #[must_use]
    fn rolling_mean_backward(&self, window: NonZeroUsize) -> Vec<f64>
    where
        Self: AsRef<[f64]>,
    {
        let values = self.as_ref();
        let sums = prefix_sums(values);
        (0..values.len())
            .map(|index| {
                let end = (index + window.get()).min(values.len());
                mean(&sums, index, end)
            })
            .collect()
    }
}

fn prefix_sums(values: &[f64]) -> Vec<f64> {
    let mut sums = Vec::with_capacity(values.len() + 1);
    sums.push(0.0);
    let mut total = 0.0;
    for value in values {
        total += value;
        sums.push(total);
    }
    sums
}

#[expect(clippy::cast_precision_loss)]
fn mean(sums: &[f64], start: usize, end: usize) -> f64 {
    (sums[end] - sums[start]) / (end - start) as f64
}
