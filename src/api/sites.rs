use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    api::{
        AppState,
        error::ApiError,
        extract::{Caller, ValidPath},
    },
    core::{
        access::AccessGrant,
        error::RequestError,
        horizon::ForecastHorizon,
        point::{ActualPower, PredictedPower},
        site::{Site, SiteProperties, Target},
    },
    prelude::*,
};

/// Check that the caller's site group owns the site.
async fn authorize(state: &AppState, email: &str, site_uuid: Uuid) -> Result<(), ApiError> {
    let owned_sites = state.store.list_sites(email).await?;
    state.pipeline.access.authorize(email, site_uuid, owned_sites.as_deref())?;
    Ok(())
}

#[instrument(skip_all, fields(email = %email))]
pub async fn get_sites(
    State(state): State<Arc<AppState>>,
    Caller(email): Caller,
) -> Result<Json<Vec<Site>>, ApiError> {
    let sites = state
        .store
        .list_sites(&email)
        .await?
        .ok_or_else(|| RequestError::UserNotFound { email: email.clone() })?;
    Ok(Json(sites))
}

#[instrument(skip_all, fields(email = %email, site_uuid = %site_uuid))]
pub async fn put_site(
    State(state): State<Arc<AppState>>,
    Caller(email): Caller,
    ValidPath(site_uuid): ValidPath<Uuid>,
    Json(properties): Json<SiteProperties>,
) -> Result<Json<Site>, ApiError> {
    let properties = properties.validate()?;
    let members = state.store.site_group_members(site_uuid).await?;
    state.pipeline.access.check_grant(&email, AccessGrant::derive(&email, site_uuid, &members))?;
    let site = state
        .store
        .update_site(site_uuid, properties)
        .await?
        .ok_or(RequestError::SiteNotFound(site_uuid))?;
    info!("updated the site");
    Ok(Json(site))
}

#[instrument(skip_all, fields(email = %email, site_uuid = %site_uuid))]
pub async fn get_forecast(
    State(state): State<Arc<AppState>>,
    Caller(email): Caller,
    ValidPath(site_uuid): ValidPath<Uuid>,
) -> Result<Json<Vec<PredictedPower>>, ApiError> {
    authorize(&state, &email, site_uuid).await?;
    let now = Utc::now();
    let horizon = ForecastHorizon::Latest;
    let window = state.pipeline.window(now, Some(horizon));
    let points = state.store.fetch_predicted(&Target::Site(site_uuid), window).await?;
    Ok(Json(state.pipeline.forecast(points, horizon, false, now)))
}

#[instrument(skip_all, fields(email = %email, site_uuid = %site_uuid))]
pub async fn get_generation(
    State(state): State<Arc<AppState>>,
    Caller(email): Caller,
    ValidPath(site_uuid): ValidPath<Uuid>,
) -> Result<Json<Vec<ActualPower>>, ApiError> {
    authorize(&state, &email, site_uuid).await?;
    let now = Utc::now();
    let window = state.pipeline.window(now, None);
    let points = state.store.fetch_actual(&Target::Site(site_uuid), window).await?;
    Ok(Json(state.pipeline.generation(points, None, now)?))
}

/// Accept actual generation readings in kilowatts, timestamps in UTC.
#[instrument(skip_all, fields(email = %email, site_uuid = %site_uuid, n_readings = readings.len()))]
pub async fn post_generation(
    State(state): State<Arc<AppState>>,
    Caller(email): Caller,
    ValidPath(site_uuid): ValidPath<Uuid>,
    Json(readings): Json<Vec<ActualPower>>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &email, site_uuid).await?;
    let site =
        state.store.find_site(site_uuid).await?.ok_or(RequestError::SiteNotFound(site_uuid))?;
    state.pipeline.access.validate_generation_submission(&site, &readings)?;
    state.store.persist_actual(site_uuid, &readings).await?;
    info!("persisted the readings");
    Ok(StatusCode::OK)
}
