use std::num::NonZeroUsize;

use bon::Builder;
use chrono::TimeDelta;
use chrono_tz::Tz;

use crate::prelude::*;

/// Read-only snapshot of the pipeline configuration, shared by all components.
#[must_use]
#[derive(Copy, Clone, Debug, Builder)]
pub struct Settings {
    /// Local hour (0–23) of the day-ahead cutoff.
    #[builder(default = 9)]
    pub cutoff_hour: u32,

    #[builder(default = chrono_tz::Asia::Kolkata)]
    pub timezone: Tz,

    #[builder(default = NonZeroUsize::MIN.saturating_add(3))]
    pub smoothing_window: NonZeroUsize,

    /// Horizon to select when a horizon request does not specify one.
    #[builder(default = 60)]
    pub default_horizon_minutes: u32,

    #[builder(default = 0)]
    pub horizon_tolerance_minutes: u32,

    /// Uploaded generation may not exceed `capacity × factor`.
    #[builder(default = 1.0)]
    pub capacity_factor: f64,

    /// Report interval width used when the series is too short to infer its step.
    #[builder(default = TimeDelta::minutes(15))]
    pub native_step: TimeDelta,

    /// Shorten the window of day-ahead requests made before the cutoff.
    #[builder(default = false)]
    pub day_ahead_window_cutoff: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Settings {
    pub fn validate(self) -> Result<Self> {
        ensure!(self.cutoff_hour < 24, "cutoff hour must be within 0..24, got {}", self.cutoff_hour);
        ensure!(
            self.capacity_factor.is_finite() && self.capacity_factor > 0.0,
            "capacity factor must be positive, got {}",
            self.capacity_factor,
        );
        ensure!(self.native_step > TimeDelta::zero(), "native step must be positive");
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() -> Result {
        let settings = Settings::default().validate()?;
        assert_eq!(settings.cutoff_hour, 9);
        assert_eq!(settings.timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(settings.smoothing_window.get(), 4);
        Ok(())
    }

    #[test]
    fn invalid_cutoff_hour() {
        assert!(Settings::builder().cutoff_hour(24).build().validate().is_err());
    }
}
