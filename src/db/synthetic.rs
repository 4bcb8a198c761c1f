//! Generated series for demos and local development.

use std::{
    collections::BTreeSet,
    f64::consts::{PI, TAU},
    iter,
};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    core::{
        point::{ActualPower, PredictedPower},
        settings::Settings,
        site::{AssetType, Site, SiteProperties, Target},
        window::Window,
    },
    db::Datastore,
    prelude::*,
    quantity::power::Kilowatts,
};

/// The only site, owned by every caller.
pub const DUMMY_SITE_UUID: Uuid = Uuid::from_u128(0x0d0e_6a2c_5f3b_4c1e_9a7d_3b2f_1c4e_5a60);

const STEP: TimeDelta = TimeDelta::minutes(15);

/// Peak power of the generated series.
const SCALE: Kilowatts = Kilowatts(10_000.0);

pub struct SyntheticStore {
    timezone: Tz,

    /// How long before its target time each forecast point is created.
    lead_time: TimeDelta,

    /// Everyone who has called the API, and therefore belongs to the dummy site group.
    callers: RwLock<BTreeSet<String>>,
}

impl SyntheticStore {
    pub fn new(settings: &Settings) -> Self {
        Self {
            timezone: settings.timezone,
            lead_time: TimeDelta::minutes(settings.default_horizon_minutes.into()),
            callers: RwLock::default(),
        }
    }

    fn dummy_site() -> Site {
        Site {
            site_uuid: DUMMY_SITE_UUID,
            client_site_name: Some("dummy".to_owned()),
            orientation_deg: 180.0,
            tilt_deg: 35.0,
            latitude: 26.0,
            longitude: 76.0,
            capacity: Kilowatts(76.0),
        }
    }

    fn asset_type(target: &Target) -> AssetType {
        match target {
            Target::Region { asset_type, .. } => *asset_type,
            Target::Site(_) => AssetType::Solar,
        }
    }

    /// Whole kilowatts on the quarter-hourly grid of the window.
    fn series(
        &self,
        asset_type: AssetType,
        window: Window,
    ) -> impl Iterator<Item = (DateTime<Utc>, Kilowatts)> {
        iter::successors(Some(window.start), |time| Some(*time + STEP))
            .take_while(move |time| *time < window.end)
            .map(move |time| {
                let power = match asset_type {
                    AssetType::Solar => self.solar(time),
                    AssetType::Wind => Self::wind(time),
                };
                (time, power.trunc())
            })
    }

    /// Daily sine wave peaking at local noon, higher in summer and steepened to a bell.
    fn solar(&self, time: DateTime<Utc>) -> Kilowatts {
        let local = time.with_timezone(&self.timezone);
        let hour = f64::from(local.hour()) + f64::from(local.minute()) / 60.0;
        let seasonal = (PI / 6.0).mul_add(f64::from(local.month()), -PI / 2.0).sin() / 2.0;
        let base = ((PI / 12.0).mul_add(hour, -PI / 2.0).sin() + seasonal).max(0.0);
        SCALE * (base.powi(4) / 1.5_f64.powi(4))
    }

    /// Two slow incommensurate waves, always within 10–90% of the scale.
    #[expect(clippy::cast_precision_loss)]
    fn wind(time: DateTime<Utc>) -> Kilowatts {
        let hours = time.timestamp() as f64 / 3600.0;
        let wobble = (TAU * hours / 7.0).sin() * (TAU * hours / 29.0).cos();
        SCALE * 0.4f64.mul_add(wobble, 0.5)
    }
}

#[async_trait]
impl Datastore for SyntheticStore {
    #[instrument(skip_all, fields(target = ?target, window = ?window))]
    async fn fetch_predicted(&self, target: &Target, window: Window) -> Result<Vec<PredictedPower>> {
        Ok(self
            .series(Self::asset_type(target), window)
            .map(|(time, power)| {
                PredictedPower::new(time, power).with_created_time(time - self.lead_time)
            })
            .collect())
    }

    #[instrument(skip_all, fields(target = ?target, window = ?window))]
    async fn fetch_actual(&self, target: &Target, window: Window) -> Result<Vec<ActualPower>> {
        Ok(self
            .series(Self::asset_type(target), window)
            .map(|(time, power)| ActualPower::new(time, power))
            .collect())
    }

    async fn regions(&self, asset_type: AssetType) -> Result<Vec<String>> {
        Ok((1..=2).map(|index| format!("dummy_{asset_type}_region{index}")).collect())
    }

    async fn list_sites(&self, _email: &str) -> Result<Option<Vec<Site>>> {
        Ok(Some(vec![Self::dummy_site()]))
    }

    async fn site_group_members(&self, site_uuid: Uuid) -> Result<Vec<String>> {
        if site_uuid == DUMMY_SITE_UUID {
            Ok(self.callers.read().await.iter().cloned().collect())
        } else {
            Ok(Vec::new())
        }
    }

    async fn find_site(&self, site_uuid: Uuid) -> Result<Option<Site>> {
        Ok((site_uuid == DUMMY_SITE_UUID).then(Self::dummy_site))
    }

    async fn update_site(
        &self,
        site_uuid: Uuid,
        properties: SiteProperties,
    ) -> Result<Option<Site>> {
        // Not stored, the next read returns the original site:
        Ok(self.find_site(site_uuid).await?.map(|site| properties.apply_to(site)))
    }

    async fn persist_actual(&self, site_uuid: Uuid, readings: &[ActualPower]) -> Result {
        info!(%site_uuid, n_readings = readings.len(), "dropping the readings");
        Ok(())
    }

    async fn record_api_call(&self, path: &str, email: &str) -> Result {
        debug!(path, email, "API call");
        self.callers.write().await.insert(email.to_owned());
        Ok(())
    }
}
