use std::num::NonZeroUsize;

use crate::{
    core::{
        point::{PredictedPower, Reading},
        series::RollingMean,
        settings::Settings,
    },
    quantity::power::Kilowatts,
};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SmoothingMode {
    /// Mean of each point and its predecessors, lags behind the series.
    Causal,

    /// Average of the forward and backward rolling means, no phase lag.
    #[default]
    Symmetric,
}

#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct SmoothingEngine {
    window: NonZeroUsize,
}

impl SmoothingEngine {
    pub const fn new(settings: &Settings) -> Self {
        Self::with_window(settings.smoothing_window)
    }

    pub const fn with_window(window: NonZeroUsize) -> Self {
        Self { window }
    }

    /// Smooth the series keeping its length, order, timestamps, and provenance.
    ///
    /// Negative readings are clamped before averaging, and the output is rounded to whole kilowatts.
    #[must_use]
    pub fn smooth(&self, points: &[PredictedPower], mode: SmoothingMode) -> Vec<PredictedPower> {
        let values: Vec<f64> = points.iter().map(|point| point.power.non_negative().0).collect();
        let forward = values.rolling_mean_forward(self.window);
        let means = match mode {
            SmoothingMode::Causal => forward,
            SmoothingMode::Symmetric => forward
                .into_iter()
                .zip(values.rolling_mean_backward(self.window))
                .map(|(forward, backward)| f64::midpoint(forward, backward))
                .collect(),
        };
        points
            .iter()
            .zip(means)
            .map(|(point, mean)| point.with_power(Kilowatts(mean).round()))
            .collect()
    }
}
