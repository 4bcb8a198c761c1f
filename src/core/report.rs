use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use chrono_tz::Tz;
use itertools::Itertools;

use crate::{
    core::{
        horizon::{ForecastHorizon, HorizonPolicy},
        point::PredictedPower,
        settings::Settings,
    },
    prelude::*,
    quantity::power::{Kilowatts, Megawatts},
};

#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    pub time: DateTime<Utc>,
    pub date: NaiveDate,

    /// Local `HH:MM - HH:MM` interval starting at the point.
    pub interval: String,

    pub power: Megawatts,
}

#[must_use]
#[derive(Clone, Debug)]
pub struct Report {
    pub timezone: Tz,
    pub horizon: ForecastHorizon,
    pub rows: Vec<ReportRow>,

    /// When the report was built.
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// Timezone abbreviation as shown in the date column header.
    #[must_use]
    pub fn timezone_abbreviation(&self) -> String {
        let time = self.rows.first().map_or(self.generated_at, |row| row.time);
        time.with_timezone(&self.timezone).format("%Z").to_string()
    }

    /// The local date the report is about: the first row's date, or the requested day otherwise.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.rows.first().map_or_else(
            || {
                let today = self.generated_at.with_timezone(&self.timezone).date_naive();
                match self.horizon {
                    ForecastHorizon::DayAhead => today.succ_opt().unwrap_or(today),
                    ForecastHorizon::Latest | ForecastHorizon::Horizon(_) => today,
                }
            },
            |row| row.date,
        )
    }

    #[must_use]
    pub const fn forecast_type(&self) -> &'static str {
        match self.horizon {
            ForecastHorizon::DayAhead => "da",
            ForecastHorizon::Latest | ForecastHorizon::Horizon(_) => "intraday",
        }
    }

    #[must_use]
    pub fn file_name(&self, region: &str, source: &str) -> String {
        format!("{region}_{source}_{}_{}.csv", self.forecast_type(), self.date())
    }

    /// Provenance line appended after the CSV table.
    #[must_use]
    pub fn description(
        &self,
        region: &str,
        source: &str,
        created_at: Option<DateTime<Utc>>,
    ) -> String {
        let created_at = created_at.map_or_else(
            || "an unknown time".to_owned(),
            |created_at| created_at.with_timezone(&self.timezone).to_rfc3339(),
        );
        format!(
            "Forecast for {region} for {source}, {}, for {}. The Forecast was created at {created_at} and downloaded at {}",
            self.forecast_type(),
            self.date(),
            self.generated_at.with_timezone(&self.timezone).to_rfc3339(),
        )
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            format!("Date [{}]", self.timezone_abbreviation()),
            "Time".to_owned(),
            "PowerMW".to_owned(),
        ])?;
        for row in &self.rows {
            writer.write_record([row.date.to_string(), row.interval.clone(), row.power.0.to_string()])?;
        }
        let buffer = writer.into_inner().context("failed to flush the CSV writer")?;
        String::from_utf8(buffer).context("CSV output is not valid UTF-8")
    }
}

/// Builds localized, horizon-filtered forecast reports.
#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct ReportFormatter {
    policy: HorizonPolicy,
    native_step: TimeDelta,
}

impl ReportFormatter {
    pub fn new(settings: &Settings) -> Self {
        Self { policy: HorizonPolicy::new(settings), native_step: settings.native_step }
    }

    /// Build the report rows and the latest creation time among the rows included.
    #[instrument(skip_all, fields(n_points = points.len(), horizon = ?horizon))]
    pub fn format(
        &self,
        points: &[PredictedPower],
        horizon: ForecastHorizon,
        now: DateTime<Utc>,
    ) -> (Report, Option<DateTime<Utc>>) {
        let timezone = self.policy.timezone();
        let step = self.infer_step(points);
        let selected = self.policy.select(points, horizon, now);
        let created_at = selected.iter().filter_map(|point| point.created_time).max();
        let rows = selected
            .into_iter()
            .sorted_by_key(|point| point.time)
            .map(|point| {
                let start = point.time.with_timezone(&timezone);
                let end = start + step;
                ReportRow {
                    time: point.time,
                    date: start.date_naive(),
                    interval: format!("{} - {}", start.format("%H:%M"), end.format("%H:%M")),
                    power: Megawatts::from(point.power.max(Kilowatts::ZERO)),
                }
            })
            .collect_vec();
        debug!(n_rows = rows.len(), ?created_at, "formatted");
        (Report { timezone, horizon, rows, generated_at: now }, created_at)
    }

    /// The smallest positive gap between consecutive points, or the configured step.
    fn infer_step(&self, points: &[PredictedPower]) -> TimeDelta {
        points
            .iter()
            .map(|point| point.time)
            .sorted()
            .tuple_windows()
            .map(|(lhs, rhs)| rhs - lhs)
            .filter(|gap| *gap > TimeDelta::zero())
            .min()
            .unwrap_or(self.native_step)
    }
}
