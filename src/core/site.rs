use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{core::error::RequestError, quantity::power::Kilowatts};

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Solar,
    Wind,
}

impl AssetType {
    pub const ALL: [Self; 2] = [Self::Wind, Self::Solar];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Solar => "solar",
            Self::Wind => "wind",
        }
    }
}

impl Display for AssetType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = RequestError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        match source {
            "solar" => Ok(Self::Solar),
            "wind" => Ok(Self::Wind),
            _ => Err(RequestError::InvalidArgument(format!(
                "unknown source {source}; valid sources are 'wind' and 'solar'",
            ))),
        }
    }
}

/// What a series is requested for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Target {
    Region { name: String, asset_type: AssetType },
    Site(Uuid),
}

#[must_use]
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Site {
    pub site_uuid: Uuid,

    #[serde(default)]
    pub client_site_name: Option<String>,

    /// Panel rotation in degrees, 180° points south.
    #[serde(rename = "orientation", default = "default_orientation")]
    pub orientation_deg: f64,

    /// Panel tilt in degrees, 90° is vertical.
    #[serde(rename = "tilt", default = "default_tilt")]
    pub tilt_deg: f64,

    pub latitude: f64,
    pub longitude: f64,

    #[serde(rename = "capacity_kw")]
    pub capacity: Kilowatts,
}

const fn default_orientation() -> f64 {
    180.0
}

const fn default_tilt() -> f64 {
    35.0
}

/// Partial site update, unset fields stay as they are.
#[must_use]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SiteProperties {
    pub client_site_name: Option<String>,
    pub orientation: Option<f64>,
    pub tilt: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub capacity_kw: Option<Kilowatts>,
}

impl SiteProperties {
    pub fn validate(self) -> Result<Self, RequestError> {
        if let Some(latitude) = self.latitude
            && !(-90.0..=90.0).contains(&latitude)
        {
            return Err(RequestError::InvalidArgument(format!(
                "latitude must be within [-90, 90], got {latitude}",
            )));
        }
        if let Some(longitude) = self.longitude
            && !(-180.0..=180.0).contains(&longitude)
        {
            return Err(RequestError::InvalidArgument(format!(
                "longitude must be within [-180, 180], got {longitude}",
            )));
        }
        if let Some(capacity) = self.capacity_kw
            && capacity < Kilowatts::ZERO
        {
            return Err(RequestError::InvalidArgument(format!(
                "capacity must be non-negative, got {capacity}",
            )));
        }
        Ok(self)
    }

    pub fn apply_to(self, mut site: Site) -> Site {
        if let Some(client_site_name) = self.client_site_name {
            site.client_site_name = Some(client_site_name);
        }
        if let Some(orientation) = self.orientation {
            site.orientation_deg = orientation;
        }
        if let Some(tilt) = self.tilt {
            site.tilt_deg = tilt;
        }
        if let Some(latitude) = self.latitude {
            site.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            site.longitude = longitude;
        }
        if let Some(capacity) = self.capacity_kw {
            site.capacity = capacity;
        }
        site
    }
}
