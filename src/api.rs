mod error;
mod extract;
mod regions;
mod sites;

use std::{sync::Arc, time::Duration};

use axum::{
    Json,
    Router,
    http::HeaderName,
    routing::{get, put},
};
use clap::crate_version;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{core::pipeline::Pipeline, db::Datastore, prelude::*};

/// Where the caller's identity comes from.
#[derive(Clone, Debug)]
pub struct Identity {
    /// Header carrying the email verified by the authenticating proxy.
    pub email_header: HeaderName,

    /// Identity assumed when the header is missing.
    pub dummy_email: Option<String>,
}

pub struct AppState {
    pub store: Arc<dyn Datastore>,
    pub pipeline: Pipeline,
    pub identity: Identity,
}

#[derive(Copy, Clone, Debug)]
pub struct Limits {
    pub max_in_flight_requests: usize,
    pub request_timeout: Duration,
}

pub fn router(state: AppState, limits: Limits) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/sources", get(regions::get_sources))
        .route("/sites", get(sites::get_sites))
        .route("/sites/{site_uuid}", put(sites::put_site))
        .route("/sites/{site_uuid}/forecast", get(sites::get_forecast))
        .route(
            "/sites/{site_uuid}/generation",
            get(sites::get_generation).post(sites::post_generation),
        )
        .route("/{source}/regions", get(regions::get_regions))
        .route("/{source}/{region}/generation", get(regions::get_generation))
        .route("/{source}/{region}/forecast", get(regions::get_forecast))
        .route("/{source}/{region}/forecast/csv", get(regions::get_forecast_csv))
        .with_state(Arc::new(state))
        .layer((
            TraceLayer::new_for_http(),
            TimeoutLayer::new(limits.request_timeout),
            GlobalConcurrencyLimitLayer::new(limits.max_in_flight_requests),
        ))
}

pub async fn serve(listener: TcpListener, state: AppState, limits: Limits) -> Result {
    let address = listener.local_addr()?;
    info!(version = crate_version!(), %address, ?limits, "serving…");
    axum::serve(listener, router(state, limits))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("the server has failed")
}

async fn get_health() -> Json<Value> {
    Json(json!({ "status": 200 }))
}

/// Per <https://github.com/tokio-rs/axum/blob/main/examples/graceful-shutdown/src/main.rs>.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutting down…");
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use chrono::{DateTime, DurationRound, TimeDelta, Utc};
    use chrono_tz::Asia::Kolkata;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{
        core::{point::ActualPower, settings::Settings},
        db::fixture::{
            FixtureStore,
            tests::{FIXTURE, OTHER_SITE_UUID, SITE_UUID},
        },
        quantity::power::Kilowatts,
    };

    const OWNER: &str = "owner@example.com";

    fn app_with(store: Arc<FixtureStore>, dummy_email: Option<&str>) -> Router {
        let state = AppState {
            store,
            pipeline: Pipeline::new(&Settings::default()),
            identity: Identity {
                email_header: HeaderName::from_static("x-user-email"),
                dummy_email: dummy_email.map(ToOwned::to_owned),
            },
        };
        let limits = Limits { max_in_flight_requests: 4, request_timeout: Duration::from_secs(5) };
        router(state, limits)
    }

    fn app() -> Result<Router> {
        Ok(app_with(Arc::new(FixtureStore::from_toml(FIXTURE)?), None))
    }

    fn request(
        method: Method,
        uri: &str,
        email: Option<&str>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(email) = email {
            builder = builder.header("x-user-email", email);
        }
        let body = match body {
            Some(body) => {
                builder = builder.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        builder.body(body).unwrap()
    }

    async fn call(app: Router, request: Request<Body>) -> Result<(StatusCode, String)> {
        let response = app.oneshot(request).await?;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, String::from_utf8(body.to_vec())?))
    }

    async fn call_json(app: Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let (status, body) = call(app, request).await?;
        Ok((status, serde_json::from_str(&body)?))
    }

    #[tokio::test]
    async fn health() -> Result {
        let (status, body) = call_json(app()?, request(Method::GET, "/health", None, None)).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": 200}));
        Ok(())
    }

    #[tokio::test]
    async fn sources() -> Result {
        let (_, body) = call_json(app()?, request(Method::GET, "/sources", None, None)).await?;
        assert_eq!(body, json!({"sources": ["wind", "solar"]}));
        Ok(())
    }

    #[tokio::test]
    async fn unauthenticated() -> Result {
        let (status, body) =
            call_json(app()?, request(Method::GET, "/solar/regions", None, None)).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["detail"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn dummy_email_and_api_calls() -> Result {
        let store = Arc::new(FixtureStore::from_toml(FIXTURE)?);
        let app = app_with(Arc::clone(&store), Some(OWNER));
        let (status, body) = call_json(app, request(Method::GET, "/sites", None, None)).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["site_uuid"], SITE_UUID.to_string());
        let calls = store.api_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/sites");
        assert_eq!(calls[0].email, OWNER);
        Ok(())
    }

    #[tokio::test]
    async fn regions() -> Result {
        let (status, body) =
            call_json(app()?, request(Method::GET, "/solar/regions", Some(OWNER), None)).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"regions": ["rajasthan"]}));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_source() -> Result {
        let (status, _) =
            call_json(app()?, request(Method::GET, "/hydro/regions", Some(OWNER), None)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_region() -> Result {
        let uri = "/solar/kerala/forecast";
        let (status, _) = call_json(app()?, request(Method::GET, uri, Some(OWNER), None)).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_resample_minutes() -> Result {
        let uri = "/solar/rajasthan/generation?resample_minutes=0";
        let (status, _) = call_json(app()?, request(Method::GET, uri, Some(OWNER), None)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let uri = "/solar/rajasthan/generation?resample_minutes=soon";
        let (status, _) = call_json(app()?, request(Method::GET, uri, Some(OWNER), None)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn region_series_outside_of_window_are_empty() -> Result {
        // The fixture is dated in the past, so nothing falls into the current window:
        let uri = "/solar/rajasthan/forecast?forecast_horizon=latest";
        let (status, body) =
            call_json(app()?, request(Method::GET, uri, Some(OWNER), None)).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"values": []}));
        Ok(())
    }

    fn forecast_point(time: DateTime<Utc>, power: f64, horizon_minutes: i64) -> String {
        let created_time = time - TimeDelta::minutes(horizon_minutes);
        format!(
            r#"{{ Time = "{}", PowerKW = {power:.1}, CreatedTime = "{}" }}"#,
            time.to_rfc3339(),
            created_time.to_rfc3339(),
        )
    }

    fn generation_point(time: DateTime<Utc>, power: f64) -> String {
        format!(r#"{{ Time = "{}", PowerKW = {power:.1} }}"#, time.to_rfc3339())
    }

    fn local(time: DateTime<Utc>) -> String {
        time.with_timezone(&Kolkata).to_rfc3339()
    }

    /// Region series laid out around the current time, so that they fall into the request window.
    struct Recent {
        app: Router,

        /// First future forecast point, the series goes on every 15 minutes.
        forecast_start: DateTime<Utc>,

        /// First generation reading, on a whole hour.
        generation_start: DateTime<Utc>,
    }

    impl Recent {
        fn new() -> Result<Self> {
            let now = Utc::now();
            let forecast_start =
                now.duration_trunc(TimeDelta::minutes(15))? + TimeDelta::minutes(30);
            let generation_start = now.duration_trunc(TimeDelta::hours(1))? - TimeDelta::hours(3);

            let mut forecast: Vec<String> = [0.0, 400.0, 0.0, 400.0]
                .into_iter()
                .zip(0..)
                .map(|(power, index)| {
                    forecast_point(forecast_start + TimeDelta::minutes(15 * index), power, 60)
                })
                .collect();
            // Only reachable by a two-hour horizon:
            forecast.push(forecast_point(forecast_start - TimeDelta::minutes(90), 250.0, 120));
            let generation: Vec<String> = [(0, 1.0), (10, 2.0), (20, -3.0), (40, 6.0)]
                .into_iter()
                .map(|(minutes, power)| {
                    generation_point(generation_start + TimeDelta::minutes(minutes), power)
                })
                .collect();
            let fixture = format!(
                "[[regions]]\nname = \"rajasthan\"\nasset_type = \"solar\"\nforecast = [{}]\ngeneration = [{}]\n",
                forecast.join(", "),
                generation.join(", "),
            );
            let store = Arc::new(FixtureStore::from_toml(&fixture)?);
            Ok(Self { app: app_with(store, None), forecast_start, generation_start })
        }

        fn forecast_time(&self, index: i64) -> DateTime<Utc> {
            self.forecast_start + TimeDelta::minutes(15 * index)
        }

        fn generation_time(&self, minutes: i64) -> DateTime<Utc> {
            self.generation_start + TimeDelta::minutes(minutes)
        }

        async fn values(&self, uri: &str) -> Result<Vec<(String, f64)>> {
            let (status, body) =
                call_json(self.app.clone(), request(Method::GET, uri, Some(OWNER), None)).await?;
            assert_eq!(status, StatusCode::OK, "{body}");
            let values = body["values"].as_array().cloned().unwrap_or_default();
            Ok(values
                .iter()
                .map(|value| {
                    (
                        value["Time"].as_str().unwrap_or_default().to_owned(),
                        value["PowerKW"].as_f64().unwrap_or_default(),
                    )
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn forecast_smooth_flag() -> Result {
        let recent = Recent::new()?;
        let times: Vec<String> = (0..4).map(|index| local(recent.forecast_time(index))).collect();
        assert!(times.iter().all(|time| time.ends_with("+05:30")), "{times:?}");

        let uri = "/solar/rajasthan/forecast?forecast_horizon=latest&smooth_flag=false";
        let raw = recent.values(uri).await?;
        assert_eq!(
            raw,
            times.iter().cloned().zip([0.0, 400.0, 0.0, 400.0]).collect::<Vec<_>>(),
        );

        let smoothed = recent.values("/solar/rajasthan/forecast?forecast_horizon=latest").await?;
        assert_eq!(
            smoothed,
            times.iter().cloned().zip([100.0, 233.0, 167.0, 300.0]).collect::<Vec<_>>(),
        );
        Ok(())
    }

    #[tokio::test]
    async fn forecast_horizon_minutes() -> Result {
        let recent = Recent::new()?;
        let uri = "/solar/rajasthan/forecast\
            ?forecast_horizon=horizon&forecast_horizon_minutes=120&smooth_flag=false";
        assert_eq!(
            recent.values(uri).await?,
            [(local(recent.forecast_time(0) - TimeDelta::minutes(90)), 250.0)],
        );

        // The default horizon is one hour:
        let uri = "/solar/rajasthan/forecast?forecast_horizon=horizon&smooth_flag=false";
        let powers: Vec<f64> =
            recent.values(uri).await?.into_iter().map(|(_, power)| power).collect();
        assert_eq!(powers, [0.0, 400.0, 0.0, 400.0]);
        Ok(())
    }

    #[tokio::test]
    async fn region_generation_resampled() -> Result {
        let recent = Recent::new()?;
        assert_eq!(
            recent.values("/solar/rajasthan/generation").await?,
            [
                (local(recent.generation_time(0)), 1.0),
                (local(recent.generation_time(10)), 2.0),
                (local(recent.generation_time(20)), 0.0),
                (local(recent.generation_time(40)), 6.0),
            ],
        );
        assert_eq!(
            recent.values("/solar/rajasthan/generation?resample_minutes=30").await?,
            [(local(recent.generation_time(0)), 1.0), (local(recent.generation_time(30)), 6.0)],
        );
        Ok(())
    }

    #[tokio::test]
    async fn csv_rows_and_provenance() -> Result {
        let recent = Recent::new()?;
        let uri = "/solar/rajasthan/forecast/csv?forecast_horizon=latest";
        let (status, body) =
            call(recent.app.clone(), request(Method::GET, uri, Some(OWNER), None)).await?;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body.lines().count(), 6, "{body}");

        let start = recent.forecast_time(1).with_timezone(&Kolkata);
        let end = start + TimeDelta::minutes(15);
        let row = format!(
            "{},{} - {},0.4\n",
            start.date_naive(),
            start.format("%H:%M"),
            end.format("%H:%M"),
        );
        assert!(body.contains(&row), "{body}");

        let created_at = recent.forecast_time(3) - TimeDelta::minutes(60);
        let provenance = format!("The Forecast was created at {}", local(created_at));
        assert!(body.contains(&provenance), "{body}");
        Ok(())
    }

    #[tokio::test]
    async fn csv_rejects_horizon() -> Result {
        let uri = "/solar/rajasthan/forecast/csv?forecast_horizon=horizon";
        let (status, _) = call_json(app()?, request(Method::GET, uri, Some(OWNER), None)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn csv_header_and_file_name() -> Result {
        let uri = "/solar/rajasthan/forecast/csv?forecast_horizon=day_ahead";
        let response = app()?.oneshot(request(Method::GET, uri, Some(OWNER), None)).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()["content-disposition"].to_str()?.to_owned();
        assert!(disposition.starts_with("attachment;filename=rajasthan_solar_da_"), "{disposition}");
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let body = String::from_utf8(body.to_vec())?;
        assert!(
            body.starts_with("Date [IST],Time,PowerMW\nForecast for rajasthan for solar, da"),
            "{body}",
        );
        Ok(())
    }

    #[tokio::test]
    async fn stranger_is_forbidden() -> Result {
        let uri = format!("/sites/{SITE_UUID}/forecast");
        let (status, body) =
            call_json(app()?, request(Method::GET, &uri, Some("other@example.com"), None)).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let detail = body["detail"].as_str().unwrap_or_default();
        assert!(detail.contains(&OTHER_SITE_UUID.to_string()), "{detail}");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_user() -> Result {
        let (status, _) =
            call_json(app()?, request(Method::GET, "/sites", Some("nobody@example.com"), None))
                .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_site_uuid() -> Result {
        let (status, _) =
            call_json(app()?, request(Method::GET, "/sites/42/forecast", Some(OWNER), None)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn put_site() -> Result {
        let uri = format!("/sites/{SITE_UUID}");
        let body = json!({"capacity_kw": 12.5});
        let (status, site) =
            call_json(app()?, request(Method::PUT, &uri, Some(OWNER), Some(body.clone()))).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(site["capacity_kw"], 12.5);
        assert_eq!(site["client_site_name"], "Jaipur");

        let (status, _) =
            call_json(app()?, request(Method::PUT, &uri, Some("other@example.com"), Some(body)))
                .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let body = json!({"latitude": 100.0});
        let (status, _) =
            call_json(app()?, request(Method::PUT, &uri, Some(OWNER), Some(body))).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    fn reading(time: DateTime<Utc>, power: f64) -> Value {
        json!({"Time": time, "PowerKW": power})
    }

    #[tokio::test]
    async fn post_and_get_generation() -> Result {
        let store = Arc::new(FixtureStore::from_toml(FIXTURE)?);
        let uri = format!("/sites/{SITE_UUID}/generation");
        let time = Utc::now() - TimeDelta::hours(1);
        let body = json!([reading(time, 10.0), reading(time - TimeDelta::minutes(15), 4.0)]);
        let (status, _) = call(
            app_with(Arc::clone(&store), None),
            request(Method::POST, &uri, Some(OWNER), Some(body)),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        // Including the reading from the fixture:
        assert_eq!(store.site_generation(SITE_UUID).await.len(), 3);

        let (status, body) =
            call_json(app_with(store, None), request(Method::GET, &uri, Some(OWNER), None)).await?;
        assert_eq!(status, StatusCode::OK);
        let generation: Vec<ActualPower> = serde_json::from_value(body)?;
        assert_eq!(generation.len(), 2);
        assert_eq!(generation[1].power, Kilowatts(10.0));
        Ok(())
    }

    #[tokio::test]
    async fn capacity_exceeded() -> Result {
        let store = Arc::new(FixtureStore::from_toml(FIXTURE)?);
        let uri = format!("/sites/{SITE_UUID}/generation");
        let body = json!([reading(Utc::now(), 10.5)]);
        let (status, body) = call_json(
            app_with(Arc::clone(&store), None),
            request(Method::POST, &uri, Some(OWNER), Some(body)),
        )
        .await?;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap_or_default().contains("10 kW"));
        assert_eq!(store.site_generation(SITE_UUID).await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_site_generation_is_forbidden() -> Result {
        let uri = format!("/sites/{}/generation", Uuid::from_u128(42));
        let body = json!([]);
        let (status, _) =
            call_json(app()?, request(Method::POST, &uri, Some(OWNER), Some(body))).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }
}
