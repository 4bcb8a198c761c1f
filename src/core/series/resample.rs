use std::collections::BTreeMap;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use crate::{
    core::{error::RequestError, point::ActualPower},
    quantity::power::Kilowatts,
};

impl<T> Resample for T where T: ?Sized {}

pub trait Resample {
    /// Average the values within the buckets of the specified width, counted from the origin.
    ///
    /// Empty buckets are skipped.
    #[must_use]
    fn bucket_means(
        self,
        origin: DateTime<Utc>,
        width: TimeDelta,
    ) -> impl Iterator<Item = (DateTime<Utc>, f64)>
    where
        Self: Iterator<Item = (DateTime<Utc>, f64)> + Sized,
    {
        let width = width.num_seconds().max(1);
        let mut buckets: BTreeMap<DateTime<Utc>, (f64, u32)> = BTreeMap::new();
        for (time, value) in self {
            let index = (time - origin).num_seconds().div_euclid(width);
            let (sum, count) = buckets.entry(origin + TimeDelta::seconds(index * width)).or_default();
            *sum += value;
            *count += 1;
        }
        buckets.into_iter().map(|(start, (sum, count))| (start, sum / f64::from(count)))
    }
}

/// Downsamples actual generation into fixed buckets.
#[must_use]
#[derive(Copy, Clone, Debug, Default)]
pub struct Resampler;

impl Resampler {
    /// Average the readings per bucket, truncating the means to whole kilowatts.
    ///
    /// Negative readings are clamped to zero first, so truncation rounds the mean down.
    /// Buckets start at the UTC midnight of the earliest reading.
    pub fn resample(
        self,
        points: &[ActualPower],
        bucket_minutes: i64,
    ) -> Result<Vec<ActualPower>, RequestError> {
        if bucket_minutes <= 0 {
            return Err(RequestError::InvalidArgument(format!(
                "resample interval must be positive, got {bucket_minutes} minutes",
            )));
        }
        let width = TimeDelta::try_minutes(bucket_minutes).ok_or_else(|| {
            RequestError::InvalidArgument(format!("resample interval is too large: {bucket_minutes}"))
        })?;
        let Some(first) = points.iter().map(|point| point.time).min() else {
            return Ok(Vec::new());
        };
        let origin = first.duration_trunc(TimeDelta::days(1)).map_err(|error| {
            RequestError::InvalidArgument(format!("failed to align `{first}` to midnight: {error}"))
        })?;
        Ok(points
            .iter()
            .map(|point| (point.time, point.power.non_negative().0))
            .bucket_means(origin, width)
            .map(|(time, mean)| ActualPower::new(time, Kilowatts(mean).trunc()))
            .collect())
    }
}
