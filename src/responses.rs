use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Uniform envelope for every HTTP response this service emits.
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Wraps a value with the HTTP status it should be served with.
pub struct Envelope<T: Serialize>(pub StatusCode, pub JsonResponse<T>);

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

pub fn ok<T: Serialize>(data: T) -> Envelope<T> {
    Envelope(StatusCode::OK, JsonResponse::ok(data))
}

pub fn accepted<T: Serialize>(data: T) -> Envelope<T> {
    Envelope(StatusCode::ACCEPTED, JsonResponse::ok(data))
}

pub fn created<T: Serialize>(data: T) -> Envelope<T> {
    Envelope(StatusCode::CREATED, JsonResponse::ok(data))
}
