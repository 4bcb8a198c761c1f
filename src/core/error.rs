use chrono::{DateTime, Utc};
use itertools::Itertools;
use uuid::Uuid;

use crate::quantity::power::Kilowatts;

/// Client-side failures of a request, never retried.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no credentials were provided")]
    Unauthenticated,

    #[error("user ({email}) is not found")]
    UserNotFound { email: String },

    #[error(
        "forbidden, user ({email}) does not have access to this site {site_uuid}, user has access to [{}]",
        .accessible.iter().join(", ")
    )]
    Forbidden { email: String, site_uuid: Uuid, accessible: Vec<Uuid> },

    #[error("site {0} is not found")]
    SiteNotFound(Uuid),

    #[error("region `{0}` is not found")]
    RegionNotFound(String),

    #[error(
        "{} generation value(s) exceed {bound} (the site capacity of {capacity}), first at {}",
        .offending.len(),
        .offending.first().map_or_else(String::new, |(time, power)| format!("{time}: {power}"))
    )]
    CapacityExceeded {
        site_uuid: Uuid,
        capacity: Kilowatts,
        bound: Kilowatts,
        offending: Vec<(DateTime<Utc>, Kilowatts)>,
    },
}
