use crate::domain::error::{AppError, RemoteErrorKind};
use crate::domain::test_case::Pagination;
use crate::infrastructure::logging::redact_secrets;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

const GENERIC_ERROR_CODE: &str = "InternalServerError";
const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Body of every JSON response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            pagination: None,
        }
    }

    pub fn paginated(data: T, pagination: Pagination) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::ok(data)
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(error: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            message: Some(message.into()),
            pagination: None,
        }
    }
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(data))
}

pub fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiResponse::failure("ValidationError", message))
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Remote(err) => match err.kind {
                RemoteErrorKind::Authentication => StatusCode::UNAUTHORIZED,
                RemoteErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %redact_secrets(&self.to_string()), "Request failed");
            ApiResponse::failure(GENERIC_ERROR_CODE, GENERIC_ERROR_MESSAGE)
        } else {
            ApiResponse::failure(self.code(), redact_secrets(self.message()))
        };
        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::RemoteError;

    fn remote(status: u16) -> AppError {
        RemoteError::from_response(status, "remote said no".to_string()).into()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(remote(401).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(remote(403).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(remote(429).status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(remote(500).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AppError::DatabaseError("disk".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_envelope_omits_empty_fields() {
        let body = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "data": [1, 2] }));

        let body = serde_json::to_value(ApiResponse::failure("NotFound", "gone")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "success": false, "error": "NotFound", "message": "gone" })
        );

        let body =
            serde_json::to_value(ApiResponse::paginated(Vec::<i32>::new(), Pagination::new(2, 10, 11)))
                .unwrap();
        assert_eq!(
            body["pagination"],
            serde_json::json!({ "page": 2, "limit": 10, "total": 11, "totalPages": 2 })
        );
    }
}
