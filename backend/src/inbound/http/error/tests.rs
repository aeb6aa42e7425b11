//! Tests for HTTP error mapping.

use super::*;
use actix_web::body::to_bytes;
use rstest::rstest;
use serde_json::{Value, json};

#[rstest]
#[case(Error::invalid_request("bad"), StatusCode::BAD_REQUEST)]
#[case(Error::new(ErrorCode::InvalidGroup, "undecodable"), StatusCode::BAD_REQUEST)]
#[case(Error::new(ErrorCode::GroupRequired, "missing"), StatusCode::BAD_REQUEST)]
#[case(Error::unauthorized("no identity"), StatusCode::UNAUTHORIZED)]
#[case(Error::forbidden("origin"), StatusCode::FORBIDDEN)]
#[case(Error::not_found("missing"), StatusCode::NOT_FOUND)]
#[case(Error::service_unavailable("offline"), StatusCode::SERVICE_UNAVAILABLE)]
#[case(Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
fn status_code_matches_error_code(#[case] error: Error, #[case] status: StatusCode) {
    assert_eq!(ResponseError::status_code(&error), status);
}

async fn response_body(error: &Error) -> Value {
    let response = ResponseError::error_response(error);
    let bytes = to_bytes(response.into_body()).await.expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

#[actix_web::test]
async fn internal_errors_are_redacted() {
    let error = Error::internal("task t1 could not be read").with_details(json!({"id": "t1"}));
    let body = response_body(&error).await;
    assert_eq!(
        body,
        json!({ "code": "internal_error", "message": "Internal server error" })
    );
}

#[actix_web::test]
async fn client_errors_keep_message_and_details() {
    let error = Error::not_found("delete failed for t1")
        .with_details(json!({ "kind": "delete", "target": "t1" }));
    let body = response_body(&error).await;
    assert_eq!(body["code"], "not_found");
    assert_eq!(body["message"], "delete failed for t1");
    assert_eq!(body["details"]["kind"], "delete");
}

#[actix_web::test]
async fn trace_header_is_absent_outside_a_request() {
    let response = ResponseError::error_response(&Error::not_found("missing"));
    assert!(response.headers().get(TRACE_ID_HEADER).is_none());
}
