use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::quantity::power::Kilowatts;

/// Forecasted power at a single instant.
#[must_use]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct PredictedPower {
    #[serde(rename = "Time")]
    pub time: DateTime<Utc>,

    #[serde(rename = "PowerKW")]
    pub power: Kilowatts,

    /// When the forecast run that produced this point was generated.
    #[serde(rename = "CreatedTime", default, skip_serializing)]
    pub created_time: Option<DateTime<Utc>>,
}

impl PredictedPower {
    pub const fn new(time: DateTime<Utc>, power: Kilowatts) -> Self {
        Self { time, power, created_time: None }
    }

    pub const fn with_created_time(mut self, created_time: DateTime<Utc>) -> Self {
        self.created_time = Some(created_time);
        self
    }
}

/// Measured power at a single instant.
#[must_use]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize, derive_more::Constructor)]
pub struct ActualPower {
    #[serde(rename = "Time")]
    pub time: DateTime<Utc>,

    #[serde(rename = "PowerKW")]
    pub power: Kilowatts,
}

/// Common accessors of both kinds of power points.
pub trait Reading: Copy {
    fn time(&self) -> DateTime<Utc>;

    fn power(&self) -> Kilowatts;

    #[must_use]
    fn with_power(self, power: Kilowatts) -> Self;

    /// Clamp negative raw readings to zero.
    #[must_use]
    fn non_negative(self) -> Self {
        self.with_power(self.power().non_negative())
    }

    fn localize<Tz: TimeZone>(&self, timezone: &Tz) -> LocalPower<Tz> {
        LocalPower { time: self.time().with_timezone(timezone), power: self.power() }
    }
}

impl Reading for PredictedPower {
    fn time(&self) -> DateTime<Utc> {
        self.time
    }

    fn power(&self) -> Kilowatts {
        self.power
    }

    fn with_power(mut self, power: Kilowatts) -> Self {
        self.power = power;
        self
    }
}

impl Reading for ActualPower {
    fn time(&self) -> DateTime<Utc> {
        self.time
    }

    fn power(&self) -> Kilowatts {
        self.power
    }

    fn with_power(mut self, power: Kilowatts) -> Self {
        self.power = power;
        self
    }
}

/// Power point rendered in the client's local timezone.
#[derive(Clone, Debug, Serialize)]
#[serde(bound(serialize = ""))]
pub struct LocalPower<Tz: TimeZone> {
    #[serde(rename = "Time")]
    pub time: DateTime<Tz>,

    #[serde(rename = "PowerKW")]
    pub power: Kilowatts,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::Asia::Kolkata;

    use super::*;
    use crate::prelude::*;

    #[test]
    fn predicted_power_hides_created_time() -> Result {
        let time = Utc.with_ymd_and_hms(2024, 2, 9, 17, 15, 0).unwrap();
        let point = PredictedPower::new(time, Kilowatts(1.5)).with_created_time(time);
        let json = serde_json::to_value(point)?;
        assert_eq!(json, serde_json::json!({"Time": "2024-02-09T17:15:00Z", "PowerKW": 1.5}));
        Ok(())
    }

    #[test]
    fn actual_power_from_upload() -> Result {
        // language=json
        let body = r#"{"Time": "2024-02-09T17:19:35.986Z", "PowerKW": 1.452}"#;
        let point: ActualPower = serde_json::from_str(body)?;
        assert_eq!(point.power, Kilowatts(1.452));
        Ok(())
    }

    #[test]
    fn non_negative_reading() {
        let time = Utc.with_ymd_and_hms(2024, 2, 9, 0, 0, 0).unwrap();
        assert_eq!(ActualPower::new(time, Kilowatts(-2.0)).non_negative().power, Kilowatts::ZERO);
    }

    #[test]
    fn localize() -> Result {
        let time = Utc.with_ymd_and_hms(2024, 2, 9, 0, 0, 0).unwrap();
        let local = ActualPower::new(time, Kilowatts(1.0)).localize(&Kolkata);
        assert_eq!(serde_json::to_value(local)?["Time"], "2024-02-09T05:30:00+05:30");
        Ok(())
    }
}
