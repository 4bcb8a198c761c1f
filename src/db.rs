pub mod fixture;
pub mod synthetic;

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    core::{
        point::{ActualPower, PredictedPower},
        settings::Settings,
        site::{AssetType, Site, SiteProperties, Target},
        window::Window,
    },
    db::{fixture::FixtureStore, synthetic::SyntheticStore},
    prelude::*,
};

/// Storage of sites and their power series.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Forecast points of the target within the window, ordered by time.
    async fn fetch_predicted(&self, target: &Target, window: Window) -> Result<Vec<PredictedPower>>;

    /// Measured points of the target within the window, ordered by time.
    async fn fetch_actual(&self, target: &Target, window: Window) -> Result<Vec<ActualPower>>;

    async fn regions(&self, asset_type: AssetType) -> Result<Vec<String>>;

    /// Sites owned by the user's site group, or [`None`] if there is no such user.
    async fn list_sites(&self, email: &str) -> Result<Option<Vec<Site>>>;

    /// Emails of the members of the group owning the site.
    async fn site_group_members(&self, site_uuid: Uuid) -> Result<Vec<String>>;

    async fn find_site(&self, site_uuid: Uuid) -> Result<Option<Site>>;

    /// Apply the properties and return the updated site, or [`None`] if there is no such site.
    async fn update_site(
        &self,
        site_uuid: Uuid,
        properties: SiteProperties,
    ) -> Result<Option<Site>>;

    async fn persist_actual(&self, site_uuid: Uuid, readings: &[ActualPower]) -> Result;

    async fn record_api_call(&self, path: &str, email: &str) -> Result;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum Source {
    /// Generated series, nothing is stored.
    Synthetic,

    /// In-memory store seeded from a TOML file.
    Fixture,
}

impl Source {
    #[instrument(skip_all, fields(source = ?self))]
    pub fn open(self, settings: &Settings, fixture_path: Option<&Path>) -> Result<Arc<dyn Datastore>> {
        match self {
            Self::Synthetic => Ok(Arc::new(SyntheticStore::new(settings))),
            Self::Fixture => {
                let store = match fixture_path {
                    Some(path) => FixtureStore::from_path(path)?,
                    None => {
                        warn!("no fixture path is given, starting empty");
                        FixtureStore::default()
                    }
                };
                Ok(Arc::new(store))
            }
        }
    }
}
