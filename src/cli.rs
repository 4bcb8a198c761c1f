mod report;
mod serve;

use std::{num::NonZeroUsize, path::PathBuf, sync::Arc};

use axum::http::HeaderName;
use chrono::TimeDelta;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};

pub use self::{report::report, serve::serve};
use crate::{
    core::{horizon::HorizonKind, settings::Settings, site::AssetType},
    db::{Datastore, Source},
    prelude::*,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the HTTP API.
    #[clap(name = "serve")]
    Serve(Box<ServeArgs>),

    /// Print the forecast report of a region.
    #[clap(name = "report")]
    Report(Box<ReportArgs>),
}

#[derive(Parser)]
pub struct ServeArgs {
    #[clap(long, default_value = "0.0.0.0:8000", env = "BIND_ADDRESS")]
    pub bind_address: String,

    /// Maximum number of requests handled at once, the rest are waiting.
    #[clap(long, default_value = "64", env = "MAX_IN_FLIGHT_REQUESTS")]
    pub max_in_flight_requests: usize,

    #[clap(long, default_value = "30s", env = "REQUEST_TIMEOUT")]
    pub request_timeout: humantime::Duration,

    /// Header carrying the caller's email, set by the authenticating proxy.
    #[clap(long, default_value = "x-user-email", env = "AUTH_EMAIL_HEADER")]
    pub auth_email_header: HeaderName,

    /// Caller's email when the header is missing, leave unset in production.
    #[clap(long, env = "DUMMY_EMAIL")]
    pub dummy_email: Option<String>,

    #[clap(flatten)]
    pub store: StoreArgs,

    #[clap(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Parser)]
pub struct ReportArgs {
    #[clap(long = "source", default_value = "solar")]
    pub asset_type: AssetType,

    #[clap(long)]
    pub region: String,

    /// Either `latest` or `day-ahead`.
    #[clap(long, default_value = "latest")]
    pub forecast_horizon: HorizonKind,

    #[clap(flatten)]
    pub store: StoreArgs,

    #[clap(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Parser)]
pub struct StoreArgs {
    #[clap(long = "store", default_value = "synthetic", env = "SOURCE")]
    pub source: Source,

    /// TOML file to seed the fixture store with.
    #[clap(long, env = "FIXTURE_PATH")]
    pub fixture_path: Option<PathBuf>,
}

impl StoreArgs {
    pub fn open(&self, settings: &Settings) -> Result<Arc<dyn Datastore>> {
        self.source.open(settings, self.fixture_path.as_deref())
    }
}

#[derive(Copy, Clone, Parser)]
pub struct PipelineArgs {
    /// Local hour of the day-ahead cutoff.
    #[clap(long, default_value = "9", env = "FORECAST_CUTOFF_HOUR")]
    pub cutoff_hour: u32,

    #[clap(long, default_value = "Asia/Kolkata", env = "LOCAL_TIMEZONE")]
    pub timezone: Tz,

    /// Number of points in the smoothing window.
    #[clap(long, default_value = "4", env = "SMOOTHING_WINDOW")]
    pub smoothing_window: NonZeroUsize,

    /// Horizon of horizon requests which do not specify one.
    #[clap(long, default_value = "60", env = "DEFAULT_HORIZON_MINUTES")]
    pub default_horizon_minutes: u32,

    #[clap(long, default_value = "0", env = "HORIZON_TOLERANCE_MINUTES")]
    pub horizon_tolerance_minutes: u32,

    /// Uploaded generation may exceed the site capacity by this factor.
    #[clap(long, default_value = "1.0", env = "GENERATION_CAPACITY_FACTOR")]
    pub capacity_factor: f64,

    /// Report interval width of series too short to tell their own step.
    #[clap(long, default_value = "15", env = "NATIVE_STEP_MINUTES")]
    pub native_step_minutes: u32,

    /// Retrieve one day ahead instead of two for day-ahead requests made before the cutoff.
    #[clap(long, env = "DAY_AHEAD_WINDOW_CUTOFF")]
    pub day_ahead_window_cutoff: bool,
}

impl PipelineArgs {
    pub fn settings(self) -> Result<Settings> {
        Settings::builder()
            .cutoff_hour(self.cutoff_hour)
            .timezone(self.timezone)
            .smoothing_window(self.smoothing_window)
            .default_horizon_minutes(self.default_horizon_minutes)
            .horizon_tolerance_minutes(self.horizon_tolerance_minutes)
            .capacity_factor(self.capacity_factor)
            .native_step(TimeDelta::minutes(self.native_step_minutes.into()))
            .day_ahead_window_cutoff(self.day_ahead_window_cutoff)
            .build()
            .validate()
    }
}
