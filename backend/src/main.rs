//! Backend entry-point: wires health probes, the OpenAPI document and the
//! mini-app WebSocket entry.

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use tracing::{info, info_span, warn};
use tracing_subscriber::{EnvFilter, fmt};

use taskboard::Trace;
use taskboard::doc::openapi_json;
use taskboard::domain::ports::UserRepository;
use taskboard::domain::{GroupContextResolver, IdentityResolver};
use taskboard::inbound::http::health::{HealthState, live, ready};
use taskboard::inbound::shutdown::ShutdownListener;
use taskboard::inbound::ws::{self, OriginAllowList, WsState};
use taskboard::outbound::store::initialize;
use taskboard::settings::AppSettings;

fn startup_error(error: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(error.to_string())
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load().map_err(startup_error)?;
    let mode = settings.run_mode().map_err(startup_error)?;
    let webapp_url = settings.webapp_url().map_err(startup_error)?;
    let extra_origins = settings.allowed_origins().map_err(startup_error)?;
    let port = settings.port();

    let health_state = web::Data::new(HealthState::new());
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let store = initialize(&settings.store_settings(), Arc::clone(&clock))
        .await
        .map_err(startup_error)?;

    let users: Arc<dyn UserRepository> = store.users;
    let ws_state = web::Data::new(WsState::new(
        store.tasks,
        IdentityResolver::new(users, clock, mode, info_span!("identity")),
        GroupContextResolver::new(mode, info_span!("group_context")),
        OriginAllowList::new(webapp_url.as_ref(), &extra_origins, port),
    ));

    // Clone for server factory so readiness probe remains accessible.
    let server_health_state = health_state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(server_health_state.clone())
            .app_data(ws_state.clone())
            .wrap(Trace)
            .service(ws::ws_entry)
            .service(ready)
            .service(live)
            .service(openapi_json)
    })
    .bind((settings.host(), port))?
    .disable_signals()
    .run();

    let handle = server.handle();
    let draining = health_state.clone();
    let shutdown = ShutdownListener::install();
    actix_web::rt::spawn(async move {
        let signal = shutdown.wait().await;
        info!(%signal, "shutdown requested; draining connections");
        draining.mark_unhealthy();
        handle.stop(true).await;
    });

    health_state.mark_ready();
    info!(port, mode = %mode, "task board server listening");
    server.await
}
