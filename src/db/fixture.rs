//! In-memory store seeded from a TOML file.

use std::{collections::VecDeque, fs, path::Path};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    core::{
        point::{ActualPower, PredictedPower},
        site::{AssetType, Site, SiteProperties, Target},
        window::Window,
    },
    db::Datastore,
    prelude::*,
};

#[derive(Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    site_groups: Vec<SiteGroup>,

    #[serde(default)]
    regions: Vec<RegionSeries>,

    #[serde(default)]
    sites: Vec<SiteSeries>,
}

#[derive(Deserialize)]
struct SiteGroup {
    members: Vec<String>,

    #[serde(default)]
    sites: Vec<Site>,
}

impl SiteGroup {
    fn has_member(&self, email: &str) -> bool {
        self.members.iter().any(|member| member.eq_ignore_ascii_case(email))
    }
}

#[derive(Deserialize)]
struct RegionSeries {
    name: String,
    asset_type: AssetType,

    #[serde(default)]
    forecast: Vec<PredictedPower>,

    #[serde(default)]
    generation: Vec<ActualPower>,
}

#[derive(Deserialize)]
struct SiteSeries {
    site_uuid: Uuid,

    #[serde(default)]
    forecast: Vec<PredictedPower>,

    #[serde(default)]
    generation: Vec<ActualPower>,
}

impl SiteSeries {
    const fn new(site_uuid: Uuid) -> Self {
        Self { site_uuid, forecast: Vec::new(), generation: Vec::new() }
    }
}

/// Number of the most recent API calls kept in memory.
const API_CALL_HISTORY: usize = 1024;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiCall {
    pub path: String,
    pub email: String,
}

#[derive(Default)]
pub struct FixtureStore {
    fixture: RwLock<Fixture>,
    api_calls: RwLock<VecDeque<ApiCall>>,
}

impl FixtureStore {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read the fixture `{}`", path.display()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut fixture: Fixture = toml::from_str(contents).context("failed to parse the fixture")?;
        for series in &mut fixture.regions {
            series.forecast.sort_by_key(|point| point.time);
            series.generation.sort_by_key(|point| point.time);
        }
        for series in &mut fixture.sites {
            series.forecast.sort_by_key(|point| point.time);
            series.generation.sort_by_key(|point| point.time);
        }
        info!(
            n_site_groups = fixture.site_groups.len(),
            n_regions = fixture.regions.len(),
            n_site_series = fixture.sites.len(),
            "loaded the fixture",
        );
        Ok(Self { fixture: RwLock::new(fixture), api_calls: RwLock::default() })
    }

    /// The most recent API calls, oldest first.
    pub async fn api_calls(&self) -> Vec<ApiCall> {
        self.api_calls.read().await.iter().cloned().collect()
    }

    /// Generation stored for the site, ordered by time.
    pub async fn site_generation(&self, site_uuid: Uuid) -> Vec<ActualPower> {
        self.fixture
            .read()
            .await
            .sites
            .iter()
            .find(|series| series.site_uuid == site_uuid)
            .map(|series| series.generation.clone())
            .unwrap_or_default()
    }
}

impl Fixture {
    fn region(&self, name: &str, asset_type: AssetType) -> Option<&RegionSeries> {
        self.regions.iter().find(|series| series.name == name && series.asset_type == asset_type)
    }

    fn site_series(&self, site_uuid: Uuid) -> Option<&SiteSeries> {
        self.sites.iter().find(|series| series.site_uuid == site_uuid)
    }

    fn sites_mut(&mut self) -> impl Iterator<Item = &mut Site> {
        self.site_groups.iter_mut().flat_map(|group| group.sites.iter_mut())
    }

    fn predicted(&self, target: &Target) -> &[PredictedPower] {
        match target {
            Target::Region { name, asset_type } => {
                self.region(name, *asset_type)
                    .map(|series| series.forecast.as_slice())
                    .unwrap_or_default()
            }
            Target::Site(site_uuid) => {
                self.site_series(*site_uuid)
                    .map(|series| series.forecast.as_slice())
                    .unwrap_or_default()
            }
        }
    }

    fn actual(&self, target: &Target) -> &[ActualPower] {
        match target {
            Target::Region { name, asset_type } => {
                self.region(name, *asset_type)
                    .map(|series| series.generation.as_slice())
                    .unwrap_or_default()
            }
            Target::Site(site_uuid) => {
                self.site_series(*site_uuid)
                    .map(|series| series.generation.as_slice())
                    .unwrap_or_default()
            }
        }
    }
}

#[async_trait]
impl Datastore for FixtureStore {
    #[instrument(skip_all, fields(target = ?target, window = ?window))]
    async fn fetch_predicted(&self, target: &Target, window: Window) -> Result<Vec<PredictedPower>> {
        let fixture = self.fixture.read().await;
        let points: Vec<_> = fixture
            .predicted(target)
            .iter()
            .filter(|point| window.contains(point.time))
            .copied()
            .collect();
        debug!(n_points = points.len(), "fetched");
        Ok(points)
    }

    #[instrument(skip_all, fields(target = ?target, window = ?window))]
    async fn fetch_actual(&self, target: &Target, window: Window) -> Result<Vec<ActualPower>> {
        let fixture = self.fixture.read().await;
        let points: Vec<_> = fixture
            .actual(target)
            .iter()
            .filter(|point| window.contains(point.time))
            .copied()
            .collect();
        debug!(n_points = points.len(), "fetched");
        Ok(points)
    }

    async fn regions(&self, asset_type: AssetType) -> Result<Vec<String>> {
        Ok(self
            .fixture
            .read()
            .await
            .regions
            .iter()
            .filter(|series| series.asset_type == asset_type)
            .map(|series| series.name.clone())
            .collect())
    }

    #[instrument(skip_all, fields(email = %email))]
    async fn list_sites(&self, email: &str) -> Result<Option<Vec<Site>>> {
        let fixture = self.fixture.read().await;
        let mut groups =
            fixture.site_groups.iter().filter(|group| group.has_member(email)).peekable();
        if groups.peek().is_none() {
            return Ok(None);
        }
        Ok(Some(groups.flat_map(|group| group.sites.iter().cloned()).collect()))
    }

    async fn site_group_members(&self, site_uuid: Uuid) -> Result<Vec<String>> {
        Ok(self
            .fixture
            .read()
            .await
            .site_groups
            .iter()
            .filter(|group| group.sites.iter().any(|site| site.site_uuid == site_uuid))
            .flat_map(|group| group.members.iter().cloned())
            .collect())
    }

    async fn find_site(&self, site_uuid: Uuid) -> Result<Option<Site>> {
        Ok(self
            .fixture
            .read()
            .await
            .site_groups
            .iter()
            .flat_map(|group| &group.sites)
            .find(|site| site.site_uuid == site_uuid)
            .cloned())
    }

    #[instrument(skip_all, fields(site_uuid = %site_uuid))]
    async fn update_site(
        &self,
        site_uuid: Uuid,
        properties: SiteProperties,
    ) -> Result<Option<Site>> {
        let mut fixture = self.fixture.write().await;
        let Some(site) = fixture.sites_mut().find(|site| site.site_uuid == site_uuid) else {
            return Ok(None);
        };
        *site = properties.apply_to(site.clone());
        info!("updated");
        Ok(Some(site.clone()))
    }

    /// Upsert the readings by time.
    #[instrument(skip_all, fields(site_uuid = %site_uuid, n_readings = readings.len()))]
    async fn persist_actual(&self, site_uuid: Uuid, readings: &[ActualPower]) -> Result {
        let mut fixture = self.fixture.write().await;
        let index = match fixture.sites.iter().position(|series| series.site_uuid == site_uuid) {
            Some(index) => index,
            None => {
                fixture.sites.push(SiteSeries::new(site_uuid));
                fixture.sites.len() - 1
            }
        };
        let generation = &mut fixture.sites[index].generation;
        for reading in readings {
            match generation.binary_search_by_key(&reading.time, |point| point.time) {
                Ok(index) => generation[index] = *reading,
                Err(index) => generation.insert(index, *reading),
            }
        }
        info!(n_total = generation.len(), "persisted");
        Ok(())
    }

    async fn record_api_call(&self, path: &str, email: &str) -> Result {
        debug!(path, email, "api call");
        let mut api_calls = self.api_calls.write().await;
        if api_calls.len() == API_CALL_HISTORY {
            api_calls.pop_front();
        }
        api_calls.push_back(ApiCall { path: path.to_owned(), email: email.to_owned() });
        Ok(())
    }
}
