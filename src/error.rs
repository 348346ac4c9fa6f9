use actix_web::{HttpResponse, ResponseError, http::StatusCode, web};
use derive_more::Display;
use serde_json::json;
use sqlx::error::ErrorKind;

use crate::db::constraint_kind;

/// Every handler error ends up here and is rendered as `{"error": "..."}`.
#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "Internal Server Error")]
    Internal,
}

pub type ApiResult<T = HttpResponse> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match constraint_kind(&err) {
            Some(ErrorKind::UniqueViolation) => {
                tracing::warn!(error = %err, "Unique constraint violation");
                ApiError::conflict("Record conflicts with an existing entry")
            }
            Some(ErrorKind::ForeignKeyViolation) => {
                tracing::warn!(error = %err, "Foreign key violation");
                ApiError::bad_request("Record references missing data or is still in use")
            }
            Some(ErrorKind::NotNullViolation | ErrorKind::CheckViolation) => {
                tracing::warn!(error = %err, "Constraint violation");
                ApiError::bad_request("Record is missing required values")
            }
            _ => {
                tracing::error!(error = %err, "Database error");
                ApiError::Internal
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "Unexpected failure");
        ApiError::Internal
    }
}

/// Malformed bodies, query strings and path segments answer in the same
/// `{"error": ...}` shape as handler errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| ApiError::not_found(err.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn renders_json_error_body() {
        let err = ApiError::forbidden("HR/Admin only");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "HR/Admin only");
    }

    #[test]
    fn constraint_violations_map_to_client_errors() {
        use crate::db::test_support::db_error;

        let err: ApiError = db_error(ErrorKind::UniqueViolation).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        // unknown department_id on insert
        let err: ApiError = db_error(ErrorKind::ForeignKeyViolation).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err: ApiError = db_error(ErrorKind::NotNullViolation).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_error_hides_details() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal Server Error");
    }

    #[actix_web::test]
    async fn malformed_json_is_a_bad_request() {
        use actix_web::{App, test};

        #[derive(serde::Deserialize)]
        struct Body {
            #[allow(dead_code)]
            name: String,
        }

        let app = test::init_service(App::new().app_data(json_config()).route(
            "/",
            web::post().to(|_: web::Json<Body>| async { HttpResponse::Ok().finish() }),
        ))
        .await;

        let req = test::TestRequest::post()
            .uri("/")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{\"name\": 5}")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }
}
