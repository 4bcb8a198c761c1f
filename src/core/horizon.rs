use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::core::{point::PredictedPower, settings::Settings};

/// Which forecast points a client asks for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ForecastHorizon {
    /// Everything from now on.
    Latest,

    /// Tomorrow's local calendar day.
    DayAhead,

    /// Points forecasted the given number of minutes before their target time.
    Horizon(Option<u32>),
}

/// Query form of [`ForecastHorizon`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum HorizonKind {
    Latest,
    Horizon,
    #[default]
    DayAhead,
}

impl ForecastHorizon {
    /// Minutes are only meaningful for [`HorizonKind::Horizon`] and ignored otherwise.
    pub const fn from_query(kind: HorizonKind, minutes: Option<u32>) -> Self {
        match kind {
            HorizonKind::Latest => Self::Latest,
            HorizonKind::DayAhead => Self::DayAhead,
            HorizonKind::Horizon => Self::Horizon(minutes),
        }
    }
}

#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct HorizonPolicy {
    timezone: Tz,
    cutoff_hour: u32,
    default_horizon: TimeDelta,
    tolerance: TimeDelta,
}

impl HorizonPolicy {
    pub fn new(settings: &Settings) -> Self {
        Self {
            timezone: settings.timezone,
            cutoff_hour: settings.cutoff_hour,
            default_horizon: TimeDelta::minutes(settings.default_horizon_minutes.into()),
            tolerance: TimeDelta::minutes(settings.horizon_tolerance_minutes.into()),
        }
    }

    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Keep the points of the series which the horizon asks for, preserving their order.
    #[must_use]
    pub fn select(
        &self,
        points: &[PredictedPower],
        horizon: ForecastHorizon,
        now: DateTime<Utc>,
    ) -> Vec<PredictedPower> {
        match horizon {
            ForecastHorizon::Latest => {
                points.iter().filter(|point| point.time >= now).copied().collect()
            }
            ForecastHorizon::DayAhead => {
                let Some(tomorrow) = self.local_date(now).checked_add_days(Days::new(1)) else {
                    return Vec::new();
                };
                points.iter().filter(|point| self.local_date(point.time) == tomorrow).copied().collect()
            }
            ForecastHorizon::Horizon(minutes) => {
                let horizon =
                    minutes.map_or(self.default_horizon, |minutes| TimeDelta::minutes(minutes.into()));
                points
                    .iter()
                    .filter(|point| {
                        point.created_time.is_some_and(|created_time| {
                            (point.time - created_time - horizon).abs() <= self.tolerance
                        })
                    })
                    .copied()
                    .collect()
            }
        }
    }

    /// Whether the submission deadline for the target date has passed.
    ///
    /// The deadline is the cutoff hour in the local timezone on the day before the target date.
    #[must_use]
    pub fn is_past_cutoff(&self, target_date: NaiveDate, now: DateTime<Utc>) -> bool {
        self.deadline(target_date).is_some_and(|deadline| now >= deadline)
    }

    #[must_use]
    pub fn is_submission_valid(&self, target_date: NaiveDate, now: DateTime<Utc>) -> bool {
        !self.is_past_cutoff(target_date, now)
    }

    /// Human-readable explanation of the deadline rule, with an example relative to now.
    #[must_use]
    pub fn timing_message(&self, now: DateTime<Utc>) -> String {
        let local_now = now.with_timezone(&self.timezone);
        let example_date = local_now + TimeDelta::days(2);
        let example_cutoff = (local_now.date_naive() + Days::new(1))
            .and_hms_opt(self.cutoff_hour, 0, 0)
            .map_or_else(String::new, |cutoff| cutoff.format("%Y-%m-%d %H:%M").to_string());
        format!(
            "Forecasts are generated before {}:00 {} on the day before the forecast date. \
             For example, a forecast for {} would be generated before {example_cutoff}.",
            self.cutoff_hour,
            local_now.format("%Z"),
            example_date.format("%Y-%m-%d %H:%M"),
        )
    }

    pub fn local_date(&self, time: DateTime<Utc>) -> NaiveDate {
        time.with_timezone(&self.timezone).date_naive()
    }

    fn deadline(&self, target_date: NaiveDate) -> Option<DateTime<Utc>> {
        let deadline = target_date
            .checked_sub_days(Days::new(1))?
            .and_time(NaiveTime::from_hms_opt(self.cutoff_hour, 0, 0)?);
        let local = self
            .timezone
            .from_local_datetime(&deadline)
            .earliest()
            .unwrap_or_else(|| self.timezone.from_utc_datetime(&deadline));
        Some(local.with_timezone(&Utc))
    }
}
