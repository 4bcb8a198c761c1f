use uuid::Uuid;

use crate::{
    core::{error::RequestError, point::ActualPower, settings::Settings, site::Site},
    prelude::*,
};

/// Whether the caller may act on a site, derived afresh for every request.
#[must_use]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AccessGrant {
    pub site_uuid: Uuid,
    pub is_granted: bool,
}

impl AccessGrant {
    /// Derive the grant from the members of the site group owning the site.
    pub fn derive(email: &str, site_uuid: Uuid, members: &[String]) -> Self {
        Self { site_uuid, is_granted: members.iter().any(|member| member.eq_ignore_ascii_case(email)) }
    }
}

#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct AccessController {
    capacity_factor: f64,
}

impl AccessController {
    pub const fn new(settings: &Settings) -> Self {
        Self { capacity_factor: settings.capacity_factor }
    }

    /// Authorize the caller against the sites owned by their site group.
    ///
    /// `owned_sites` is [`None`] when no account matches the email.
    pub fn authorize(
        &self,
        email: &str,
        site_uuid: Uuid,
        owned_sites: Option<&[Site]>,
    ) -> Result<(), RequestError> {
        let Some(owned_sites) = owned_sites else {
            warn!(email, "user is not found");
            return Err(RequestError::UserNotFound { email: email.to_owned() });
        };
        if owned_sites.iter().any(|site| site.site_uuid == site_uuid) {
            return Ok(());
        }
        warn!(email, %site_uuid, "forbidden");
        Err(RequestError::Forbidden {
            email: email.to_owned(),
            site_uuid,
            accessible: owned_sites.iter().map(|site| site.site_uuid).collect(),
        })
    }

    /// Authorize the caller by an already derived grant.
    pub fn check_grant(&self, email: &str, grant: AccessGrant) -> Result<(), RequestError> {
        if grant.is_granted {
            Ok(())
        } else {
            warn!(email, %grant.site_uuid, "forbidden");
            Err(RequestError::Forbidden {
                email: email.to_owned(),
                site_uuid: grant.site_uuid,
                accessible: Vec::new(),
            })
        }
    }

    /// Reject uploads containing readings above the site capacity, the capacity itself is allowed.
    pub fn validate_generation_submission(
        &self,
        site: &Site,
        readings: &[ActualPower],
    ) -> Result<(), RequestError> {
        let bound = site.capacity * self.capacity_factor;
        let offending: Vec<_> = readings
            .iter()
            .filter(|reading| reading.power > bound)
            .map(|reading| (reading.time, reading.power))
            .collect();
        if offending.is_empty() {
            return Ok(());
        }
        warn!(%site.site_uuid, n_offending = offending.len(), %bound, "capacity exceeded");
        Err(RequestError::CapacityExceeded {
            site_uuid: site.site_uuid,
            capacity: site.capacity,
            bound,
            offending,
        })
    }
}
