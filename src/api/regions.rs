use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{
    api::{
        AppState,
        error::ApiError,
        extract::{Caller, ValidPath, ValidQuery},
    },
    core::{
        error::RequestError,
        horizon::{ForecastHorizon, HorizonKind},
        point::{LocalPower, Reading},
        site::{AssetType, Target},
    },
    prelude::*,
};

#[derive(Serialize)]
pub struct Sources {
    sources: [AssetType; 2],
}

#[derive(Serialize)]
pub struct Regions {
    regions: Vec<String>,
}

/// Series rendered in the local timezone.
#[derive(Serialize)]
pub struct Values {
    values: Vec<LocalPower<Tz>>,
}

impl Values {
    fn new<R: Reading>(points: &[R], timezone: Tz) -> Self {
        Self { values: points.iter().map(|point| point.localize(&timezone)).collect() }
    }
}

#[derive(Deserialize)]
pub struct GenerationQuery {
    resample_minutes: Option<i64>,
}

#[derive(Deserialize)]
pub struct ForecastQuery {
    #[serde(default)]
    forecast_horizon: HorizonKind,

    forecast_horizon_minutes: Option<u32>,

    #[serde(default = "default_smooth_flag")]
    smooth_flag: bool,
}

const fn default_smooth_flag() -> bool {
    true
}

#[derive(Deserialize)]
pub struct CsvQuery {
    forecast_horizon: Option<HorizonKind>,
}

pub async fn get_sources() -> Json<Sources> {
    Json(Sources { sources: AssetType::ALL })
}

#[instrument(skip_all, fields(source = %source))]
pub async fn get_regions(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    ValidPath(source): ValidPath<String>,
) -> Result<Json<Regions>, ApiError> {
    let asset_type: AssetType = source.parse()?;
    let regions = state.store.regions(asset_type).await?;
    Ok(Json(Regions { regions }))
}

/// Resolve the path into a known region.
async fn region_target(state: &AppState, source: &str, region: &str) -> Result<Target, ApiError> {
    let asset_type: AssetType = source.parse()?;
    if !state.store.regions(asset_type).await?.iter().any(|known| known == region) {
        return Err(RequestError::RegionNotFound(region.to_owned()).into());
    }
    Ok(Target::Region { name: region.to_owned(), asset_type })
}

#[instrument(skip_all, fields(source = %source, region = %region))]
pub async fn get_generation(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    ValidPath((source, region)): ValidPath<(String, String)>,
    ValidQuery(query): ValidQuery<GenerationQuery>,
) -> Result<Json<Values>, ApiError> {
    let target = region_target(&state, &source, &region).await?;
    let now = Utc::now();
    let window = state.pipeline.window(now, None);
    let points = state.store.fetch_actual(&target, window).await?;
    let points = state.pipeline.generation(points, query.resample_minutes, now)?;
    info!(n_points = points.len(), "served");
    Ok(Json(Values::new(&points, state.pipeline.timezone())))
}

#[instrument(skip_all, fields(source = %source, region = %region))]
pub async fn get_forecast(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    ValidPath((source, region)): ValidPath<(String, String)>,
    ValidQuery(query): ValidQuery<ForecastQuery>,
) -> Result<Json<Values>, ApiError> {
    let target = region_target(&state, &source, &region).await?;
    let horizon =
        ForecastHorizon::from_query(query.forecast_horizon, query.forecast_horizon_minutes);
    let now = Utc::now();
    let window = state.pipeline.window(now, Some(horizon));
    let points = state.store.fetch_predicted(&target, window).await?;
    let points = state.pipeline.forecast(points, horizon, query.smooth_flag, now);
    info!(?horizon, n_points = points.len(), "served");
    Ok(Json(Values::new(&points, state.pipeline.timezone())))
}

#[instrument(skip_all, fields(source = %source, region = %region))]
pub async fn get_forecast_csv(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    ValidPath((source, region)): ValidPath<(String, String)>,
    ValidQuery(query): ValidQuery<CsvQuery>,
) -> Result<Response, ApiError> {
    let horizon = match query.forecast_horizon.unwrap_or(HorizonKind::Latest) {
        HorizonKind::Latest => ForecastHorizon::Latest,
        HorizonKind::DayAhead => ForecastHorizon::DayAhead,
        HorizonKind::Horizon => {
            return Err(RequestError::InvalidArgument(
                "forecast horizon must be either `latest` or `day_ahead`".to_owned(),
            )
            .into());
        }
    };
    let target = region_target(&state, &source, &region).await?;
    let now = Utc::now();
    let window = state.pipeline.window(now, Some(horizon));
    let points = state.store.fetch_predicted(&target, window).await?;
    let points = state.pipeline.forecast(points, horizon, false, now);
    let (report, created_at) = state.pipeline.reports.format(&points, horizon, now);

    let mut description = report.description(&region, &source, created_at);
    if horizon == ForecastHorizon::DayAhead
        && state.pipeline.policy.is_submission_valid(report.date(), now)
    {
        // The day-ahead forecast may still be revised:
        description = format!("{description}. {}", state.pipeline.policy.timing_message(now));
    }
    let body = format!("{}{description}", report.to_csv()?);
    let disposition = format!("attachment;filename={}", report.file_name(&region, &source));
    info!(n_rows = report.rows.len(), ?created_at, "served");
    let headers =
        [(header::CONTENT_TYPE, "text/csv".to_owned()), (header::CONTENT_DISPOSITION, disposition)];
    Ok((headers, body).into_response())
}
