use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::core::{
    access::AccessController,
    error::RequestError,
    horizon::{ForecastHorizon, HorizonPolicy},
    point::{ActualPower, PredictedPower, Reading},
    report::ReportFormatter,
    series::{Resampler, SmoothingEngine, SmoothingMode},
    settings::Settings,
    window::{Window, WindowCalculator},
};

/// All the core components built from the same settings snapshot.
#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct Pipeline {
    pub windows: WindowCalculator,
    pub policy: HorizonPolicy,
    pub smoothing: SmoothingEngine,
    pub resampler: Resampler,
    pub access: AccessController,
    pub reports: ReportFormatter,
    day_ahead_window_cutoff: bool,
}

impl Pipeline {
    pub fn new(settings: &Settings) -> Self {
        Self {
            windows: WindowCalculator::new(settings),
            policy: HorizonPolicy::new(settings),
            smoothing: SmoothingEngine::new(settings),
            resampler: Resampler,
            access: AccessController::new(settings),
            reports: ReportFormatter::new(settings),
            day_ahead_window_cutoff: settings.day_ahead_window_cutoff,
        }
    }

    pub const fn timezone(&self) -> Tz {
        self.policy.timezone()
    }

    /// Retrieval window of a request, the cutoff rule only shortens day-ahead requests.
    pub fn window(&self, now: DateTime<Utc>, horizon: Option<ForecastHorizon>) -> Window {
        let day_ahead_cutoff =
            self.day_ahead_window_cutoff && horizon == Some(ForecastHorizon::DayAhead);
        self.windows.compute_window(now, day_ahead_cutoff)
    }

    /// Clamp, select, and optionally smooth the forecast.
    ///
    /// Day-ahead forecasts are never smoothed.
    #[must_use]
    pub fn forecast(
        &self,
        mut points: Vec<PredictedPower>,
        horizon: ForecastHorizon,
        smooth: bool,
        now: DateTime<Utc>,
    ) -> Vec<PredictedPower> {
        points.sort_by_key(|point| point.time);
        let points: Vec<_> = points.into_iter().map(Reading::non_negative).collect();
        let selected = self.policy.select(&points, horizon, now);
        if smooth && horizon != ForecastHorizon::DayAhead {
            self.smoothing.smooth(&selected, SmoothingMode::Symmetric)
        } else {
            selected
        }
    }

    /// Clamp and optionally resample the generation, keeping only what has already happened.
    pub fn generation(
        &self,
        mut points: Vec<ActualPower>,
        resample_minutes: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ActualPower>, RequestError> {
        points.sort_by_key(|point| point.time);
        let mut points: Vec<_> = points.into_iter().map(Reading::non_negative).collect();
        if let Some(resample_minutes) = resample_minutes {
            points = self.resampler.resample(&points, resample_minutes)?;
        }
        points.retain(|point| point.time < now);
        Ok(points)
    }
}
