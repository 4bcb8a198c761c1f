use tokio::net::TcpListener;

use crate::{
    api::{self, AppState, Identity, Limits},
    cli::ServeArgs,
    core::pipeline::Pipeline,
    prelude::*,
};

#[instrument(skip_all)]
pub async fn serve(args: ServeArgs) -> Result {
    let settings = args.pipeline.settings()?;
    info!(?settings, source = ?args.store.source, "configured");
    let store = args.store.open(&settings)?;
    if let Some(dummy_email) = &args.dummy_email {
        warn!(dummy_email, "unidentified callers are let in");
    }
    let state = AppState {
        store,
        pipeline: Pipeline::new(&settings),
        identity: Identity {
            email_header: args.auth_email_header,
            dummy_email: args.dummy_email,
        },
    };
    let limits = Limits {
        max_in_flight_requests: args.max_in_flight_requests,
        request_timeout: args.request_timeout.into(),
    };
    let listener = TcpListener::bind(&args.bind_address)
        .await
        .with_context(|| format!("failed to bind to `{}`", args.bind_address))?;
    api::serve(listener, state, limits).await
}
