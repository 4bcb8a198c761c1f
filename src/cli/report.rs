use chrono::Utc;

use crate::{
    cli::ReportArgs,
    core::{
        error::RequestError,
        horizon::{ForecastHorizon, HorizonKind},
        pipeline::Pipeline,
        site::Target,
    },
    prelude::*,
    tables::build_report_table,
};

#[instrument(skip_all, fields(region = %args.region, source = %args.asset_type))]
pub async fn report(args: &ReportArgs) -> Result {
    let horizon = match args.forecast_horizon {
        HorizonKind::Latest => ForecastHorizon::Latest,
        HorizonKind::DayAhead => ForecastHorizon::DayAhead,
        HorizonKind::Horizon => bail!("reports are either `latest` or `day-ahead`"),
    };
    let settings = args.pipeline.settings()?;
    let store = args.store.open(&settings)?;
    let pipeline = Pipeline::new(&settings);

    let regions = store.regions(args.asset_type).await?;
    if !regions.contains(&args.region) {
        return Err(RequestError::RegionNotFound(args.region.clone()))
            .with_context(|| format!("known regions: {}", regions.join(", ")));
    }
    let target = Target::Region { name: args.region.clone(), asset_type: args.asset_type };

    let now = Utc::now();
    let window = pipeline.window(now, Some(horizon));
    let points = store.fetch_predicted(&target, window).await?;
    info!(n_points = points.len(), ?window, "fetched");
    let points = pipeline.forecast(points, horizon, false, now);
    let (report, created_at) = pipeline.reports.format(&points, horizon, now);

    println!("{}", build_report_table(&report));
    println!("{}", report.description(&args.region, args.asset_type.as_str(), created_at));
    if horizon == ForecastHorizon::DayAhead {
        println!("{}", pipeline.policy.timing_message(now));
    }
    Ok(())
}
