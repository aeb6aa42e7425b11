//! WebSocket inbound adapter serving the mini-app task board.
//!
//! Responsibilities:
//! - validate upgrade requests (origin allow-list)
//! - read the launch parameter and init data from the query string
//! - hand the connection to a per-session task loop

use actix_web::web::{self, Payload};
use actix_web::{
    HttpRequest, HttpResponse, get,
    http::header::{HeaderValue, ORIGIN},
};
use serde::Deserialize;
use tracing::{error, field, info_span, warn};
use url::Url;

use crate::domain::Error;
use crate::inbound::http::ApiResult;
use crate::middleware::trace::TraceId;

mod session;

pub mod messages;
pub mod state;

pub use state::{OriginAllowList, PLATFORM_WEB_ORIGIN, WsState};

/// Query parameters accepted on upgrade.
#[derive(Debug, Default, Deserialize)]
pub struct LaunchQuery {
    /// Base64 launch parameter naming the group.
    pub startapp: Option<String>,
    /// URL-encoded platform init data.
    #[serde(rename = "initData")]
    pub init_data: Option<String>,
}

/// Handle WebSocket upgrade for the `/ws` endpoint.
///
/// Rejections are rendered as JSON [`Error`] bodies.
#[get("/ws")]
pub async fn ws_entry(
    state: web::Data<WsState>,
    query: web::Query<LaunchQuery>,
    req: HttpRequest,
    stream: Payload,
) -> ApiResult<HttpResponse> {
    let mut origin_iter = req.headers().get_all(ORIGIN);
    let origin_header = origin_iter.next().ok_or_else(|| {
        error!("Missing Origin header on WebSocket upgrade");
        Error::forbidden("Origin not allowed")
    })?;
    if origin_iter.next().is_some() {
        error!("Multiple Origin headers on WebSocket upgrade");
        return Err(Error::invalid_request("Invalid Origin header"));
    }

    validate_origin(&state.origins, origin_header)?;

    let (response, session, messages) = actix_ws::handle(&req, stream).map_err(|error| {
        warn!(error = %error, "Rejected WebSocket handshake");
        Error::invalid_request("WebSocket upgrade required")
    })?;

    let span = info_span!("ws_session", trace_id = field::Empty, group = field::Empty);
    if let Some(trace_id) = TraceId::current() {
        span.record("trace_id", field::display(trace_id));
    }
    let LaunchQuery {
        startapp,
        init_data,
    } = query.into_inner();
    let launch = session::LaunchParams {
        start_param: startapp,
        init_data,
    };
    actix_web::rt::spawn(session::handle_ws_session(
        state.get_ref().clone(),
        launch,
        session,
        messages,
        span,
    ));

    Ok(response)
}

fn validate_origin(allowed: &OriginAllowList, origin_header: &HeaderValue) -> Result<(), Error> {
    let origin_value = match origin_header.to_str() {
        Ok(value) => value,
        Err(error) => {
            error!(error = %error, "Failed to parse Origin header as string");
            return Err(Error::invalid_request("Invalid Origin header"));
        }
    };

    let origin = Url::parse(origin_value).map_err(|error| {
        error!(error = %error, "Failed to parse Origin header as URL");
        Error::invalid_request("Invalid Origin header")
    })?;

    if allowed.permits(&origin) {
        Ok(())
    } else {
        warn!(
            origin = origin_value,
            "Rejected WS upgrade due to disallowed Origin"
        );
        Err(Error::forbidden("Origin not allowed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::{fixture, rstest};

    #[fixture]
    fn allowed() -> OriginAllowList {
        let webapp = Url::parse("https://tasks.example.com/app").expect("url");
        OriginAllowList::new(Some(&webapp), &[], 8080)
    }

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).expect("valid header value")
    }

    #[rstest]
    #[case("http://localhost:8080")]
    #[case("https://tasks.example.com")]
    #[case("https://web.telegram.org")]
    fn accepts_configured_origins(allowed: OriginAllowList, #[case] origin: &str) {
        assert!(validate_origin(&allowed, &header(origin)).is_ok());
    }

    #[rstest]
    #[case("http://localhost")]
    #[case("https://example.com")]
    #[case("wss://tasks.example.com")]
    fn rejects_disallowed_origins(allowed: OriginAllowList, #[case] origin: &str) {
        let error = validate_origin(&allowed, &header(origin)).expect_err("origin should be rejected");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    fn rejects_non_utf8_origin_header(allowed: OriginAllowList) {
        let header = HeaderValue::from_bytes(&[0x80]).expect("opaque header value");
        let error = validate_origin(&allowed, &header).expect_err("origin should be rejected");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    fn rejects_unparsable_origin_header(allowed: OriginAllowList) {
        let header = HeaderValue::from_static("not a url");
        let error = validate_origin(&allowed, &header).expect_err("origin should be rejected");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }
}
